use anonkit_core::config::{parse_config, AnonKitConfig};
use anonkit_core::generate::value::Value;
use anonkit_core::store::memory::MemoryStore;
use anonkit_core::store::sqlite::SqliteStore;

/// Storefront schema shared by every backend test.
pub const CUSTOMER_SCHEMA: &str = include_str!("../fixtures/customer.sql");

/// Tables in [`CUSTOMER_SCHEMA`], parents first.
pub const CUSTOMER_TABLES: [&str; 3] = ["customer_entity", "customer_address_entity", "sales_order"];

/// Anonymization rules for [`CUSTOMER_SCHEMA`].
pub const CUSTOMER_CONFIG: &str = r#"
[anonymize]
seed = 7
chunk_size = 25

[groups.customer.customer_entity]
pk = "entity_id"

[groups.customer.customer_entity.columns]
email = { formatter = "safeEmail", unique = true, nullColumnBeforeRun = true }
firstname = { formatter = "firstName" }
lastname = { formatter = "lastName" }
dob = { formatter = { name = "date", format = "%Y-%m-%d", max = "-18 years" }, optional = true }
gender = { formatter = "gender", provider = "magento" }
password_hash = { formatter = { name = "fixed", value = "" } }
rp_token = { nullColumnBeforeRun = true }

[groups.customer.customer_address_entity]
pk = "entity_id"

[groups.customer.customer_address_entity.columns]
street = { formatter = "street", provider = "magento" }
city = { formatter = "city" }
postcode = { formatter = "postcode" }
telephone = { formatter = "phoneNumber" }

[groups.sales.sales_order]
pk = "entity_id"

[groups.sales.sales_order.columns]
increment_id = { formatter = { name = "orderIncrementId", prefix = "1" }, provider = "magento" }
customer_email = { formatter = "safeEmail" }
customer_firstname = { formatter = "firstName" }
remote_ip = { formatter = "ipv4" }
"#;

/// [`CUSTOMER_CONFIG`], parsed and validated.
pub fn customer_config() -> AnonKitConfig {
    let config = parse_config(CUSTOMER_CONFIG).expect("fixture config parses");
    config.validate().expect("fixture config is valid");
    config
}

/// Statements that drop the fixture tables, children first.
pub fn drop_statements() -> Vec<String> {
    CUSTOMER_TABLES
        .iter()
        .rev()
        .map(|t| format!("DROP TABLE IF EXISTS {}", t))
        .collect()
}

/// Split a fixture into single statements, skipping `--` comment lines.
pub fn split_statements(sql: &str) -> Vec<String> {
    let cleaned: String = sql
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");
    cleaned
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// INSERTs for `customers` customers, each with one address and one order.
/// Every original value is recognizable: emails are `customer<n>@example.com`.
pub fn seed_statements(customers: usize) -> Vec<String> {
    let mut statements = Vec::with_capacity(customers * 3);
    for n in 1..=customers {
        statements.push(format!(
            "INSERT INTO customer_entity \
             (entity_id, email, firstname, lastname, dob, gender, password_hash, rp_token) \
             VALUES ({n}, 'customer{n}@example.com', 'First{n}', 'Last{n}', '1980-01-01', 1, 'hash{n}', 'token{n}')"
        ));
    }
    for n in 1..=customers {
        statements.push(format!(
            "INSERT INTO customer_address_entity \
             (entity_id, parent_id, street, city, postcode, telephone) \
             VALUES ({n}, {n}, '{n} Real Street', 'Realcity', 'RC{n}', '555-{n}')"
        ));
        statements.push(format!(
            "INSERT INTO sales_order \
             (entity_id, customer_id, increment_id, customer_email, customer_firstname, remote_ip) \
             VALUES ({n}, {n}, 'ORIG{n}', 'customer{n}@example.com', 'First{n}', '10.0.0.{ip}')",
            ip = n % 250
        ));
    }
    statements
}

/// Everything needed to build and fill the fixture, in order.
pub fn fixture_statements(customers: usize) -> Vec<String> {
    let mut statements = drop_statements();
    statements.extend(split_statements(CUSTOMER_SCHEMA));
    statements.extend(seed_statements(customers));
    statements
}

/// In-memory store laid out like [`CUSTOMER_SCHEMA`].
pub fn customer_memory_store(customers: usize) -> MemoryStore {
    let customer_rows = (1..=customers as i64)
        .map(|n| {
            vec![
                Value::Int(n),
                Value::owned(format!("customer{}@example.com", n)),
                Value::owned(format!("First{}", n)),
                Value::owned(format!("Last{}", n)),
                Value::from("1980-01-01"),
                Value::Int(1),
                Value::owned(format!("hash{}", n)),
                Value::owned(format!("token{}", n)),
            ]
        })
        .collect();

    MemoryStore::new()
        .with_table(
            "customer_entity",
            &[
                "entity_id",
                "email",
                "firstname",
                "lastname",
                "dob",
                "gender",
                "password_hash",
                "rp_token",
            ],
            customer_rows,
        )
        .with_numbered_rows(
            "customer_address_entity",
            "entity_id",
            &["parent_id", "street", "city", "postcode", "telephone"],
            customers,
        )
        .with_numbered_rows(
            "sales_order",
            "entity_id",
            &[
                "customer_id",
                "increment_id",
                "customer_email",
                "customer_firstname",
                "remote_ip",
            ],
            customers,
        )
}

/// Fresh in-memory SQLite database holding the fixture.
pub async fn sqlite_customer_store(customers: usize) -> SqliteStore {
    let store = SqliteStore::connect("sqlite::memory:")
        .await
        .expect("sqlite in-memory connect");
    for stmt in fixture_statements(customers) {
        sqlx::query(&stmt)
            .execute(store.pool())
            .await
            .unwrap_or_else(|e| panic!("fixture SQL failed: {}\nStatement: {}", e, stmt));
    }
    store
}
