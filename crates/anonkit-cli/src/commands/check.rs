use std::process;

use anyhow::Result;
use comfy_table::{Cell, Table as ComfyTable};

use anonkit_core::config::AnonymizationConfig;
use anonkit_core::store::mysql::MySqlStore;
use anonkit_core::store::postgres::PostgresStore;
use anonkit_core::store::sqlite::SqliteStore;
use anonkit_core::store::{database_type_from_url, AnonymizationStore, DatabaseType};

use crate::args::{CheckArgs, CheckFormat};
use crate::commands::{load_config, resolve_db_url};

/// A configured table or column the live schema lacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drift {
    pub group: String,
    pub table: String,
    /// `None` when the whole table is missing.
    pub column: Option<String>,
}

/// Compare the configuration against the live schema without writing.
///
/// Exit codes:
///   0: every configured table and column exists
///   1: drift detected (or error)
pub async fn run(args: &CheckArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let db_url = resolve_db_url(args.db.as_deref(), &config)?;

    let drift = match database_type_from_url(&db_url)? {
        DatabaseType::PostgreSQL => find_drift(&PostgresStore::connect(&db_url).await?, &config.groups).await?,
        DatabaseType::MySQL => find_drift(&MySqlStore::connect(&db_url).await?, &config.groups).await?,
        DatabaseType::SQLite => find_drift(&SqliteStore::connect(&db_url).await?, &config.groups).await?,
    };

    match args.format {
        CheckFormat::Json => {
            let items: Vec<serde_json::Value> = drift
                .iter()
                .map(|d| {
                    serde_json::json!({
                        "group": d.group,
                        "table": d.table,
                        "column": d.column,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        CheckFormat::Text => {
            if drift.is_empty() {
                println!(
                    "All {} configured tables and their columns exist.",
                    config.groups.table_count()
                );
            } else {
                let mut table = ComfyTable::new();
                table.set_header(vec!["Group", "Table", "Missing"]);
                for d in &drift {
                    table.add_row(vec![
                        Cell::new(&d.group),
                        Cell::new(&d.table),
                        Cell::new(d.column.as_deref().unwrap_or("(table)")),
                    ]);
                }
                println!("{table}");
            }
        }
    }

    if !drift.is_empty() {
        process::exit(1);
    }
    Ok(())
}

pub async fn find_drift<S: AnonymizationStore>(
    store: &S,
    config: &AnonymizationConfig,
) -> Result<Vec<Drift>> {
    let mut drift = Vec::new();
    for (group, spec) in config.tables() {
        if !store.has_table(&spec.name).await? {
            drift.push(Drift {
                group: group.to_string(),
                table: spec.name.clone(),
                column: None,
            });
            continue;
        }
        let columns = std::iter::once(&spec.primary_key).chain(spec.columns.keys());
        for column in columns {
            if !store.has_column(&spec.name, column).await? {
                drift.push(Drift {
                    group: group.to_string(),
                    table: spec.name.clone(),
                    column: Some(column.clone()),
                });
            }
        }
    }
    Ok(drift)
}
