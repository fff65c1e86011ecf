//! Whole-run behaviour against the in-memory store, where every statement
//! the engine issues can be inspected.

use std::collections::HashSet;
use std::sync::Arc;

use anonkit_core::anonymize::notice::RecordingNotifier;
use anonkit_core::anonymize::{Anonymizer, RunOptions, RunSummary};
use anonkit_core::config::{AnonymizationConfig, ColumnSpec, TableSpec};
use anonkit_core::formatter::ColumnFormatter;
use anonkit_core::generate::cache::GeneratorCache;
use anonkit_core::generate::locale::Locale;
use anonkit_core::generate::provider::ProviderRegistry;
use anonkit_core::generate::value::Value;
use anonkit_core::store::memory::{MemoryStore, Statement};
use anonkit_testutil::{customer_config, customer_memory_store};

async fn run(store: &MemoryStore, config: &AnonymizationConfig, seed: u64, chunk_size: usize) -> RunSummary {
    let notifier = RecordingNotifier::new();
    let cache = GeneratorCache::new(
        Locale::EnUs,
        Some(seed),
        Arc::new(ProviderRegistry::with_defaults().unwrap()),
    );
    let options = RunOptions {
        chunk_size,
        show_progress: false,
    };
    Anonymizer::new(store, cache, &notifier, options)
        .run(config, &[])
        .await
        .expect("run failed")
}

#[tokio::test]
async fn test_memory_customer_fixture_is_anonymized() {
    let store = customer_memory_store(40);
    let config = customer_config();
    let summary = run(&store, &config.groups, 7, config.chunk_size()).await;

    assert_eq!(summary.tables_processed, 3);
    assert_eq!(summary.rows_updated, 120);

    let emails = store.column_values("customer_entity", "email");
    let distinct: HashSet<String> = emails.iter().map(|v| v.to_string()).collect();
    assert_eq!(distinct.len(), 40);
    for email in &emails {
        let email = email.as_str().expect("email rewritten");
        assert!(!email.starts_with("customer"), "original email survived: {}", email);
    }
    assert!(store
        .column_values("customer_entity", "rp_token")
        .iter()
        .all(Value::is_null));

    let ids: Vec<i64> = store
        .column_values("customer_entity", "entity_id")
        .iter()
        .filter_map(Value::as_int)
        .collect();
    assert_eq!(ids, (1..=40).collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_memory_non_default_primary_key_drives_paging() {
    let store = customer_memory_store(10);
    let mut config = AnonymizationConfig::default();
    let table = TableSpec::new("customer_address_entity")
        .with_primary_key("parent_id")
        .with_column("city", ColumnSpec::new(ColumnFormatter::method("city", vec![])));
    config
        .groups
        .entry("customer".to_string())
        .or_default()
        .insert(table.name.clone(), table);

    let summary = run(&store, &config, 3, 4).await;
    assert_eq!(summary.rows_updated, 10);

    let parent_ids: HashSet<String> = store
        .column_values("customer_address_entity", "parent_id")
        .iter()
        .map(|v| v.to_string())
        .collect();
    for statement in store.statements() {
        match statement {
            Statement::FetchChunk { after: Some(after), .. } => {
                assert!(parent_ids.contains(&after.to_string()), "paged on {}", after);
            }
            Statement::Update { key, update, .. } => {
                assert!(parent_ids.contains(&key.to_string()), "updated by {}", key);
                assert!(update.contains_key("city"));
            }
            _ => {}
        }
    }

    let cities = store.column_values("customer_address_entity", "city");
    for (n, city) in cities.iter().enumerate() {
        assert_ne!(city.to_string(), format!("city-{}", n + 1));
    }
    let ids: Vec<i64> = store
        .column_values("customer_address_entity", "entity_id")
        .iter()
        .filter_map(Value::as_int)
        .collect();
    assert_eq!(ids, (1..=10).collect::<Vec<i64>>());
}
