use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::anonymize::notice::{Notice, Notifier};
use crate::anonymize::RunOptions;
use crate::config::{ColumnSpec, TableSpec};
use crate::error::{AnonKitError, Result};
use crate::formatter::{resolve_column, ColumnFormatter, Resolution};
use crate::generate::cache::GeneratorCache;
use crate::progress::ProgressReporter;
use crate::store::{AnonymizationStore, RowUpdate};

/// What happened to one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOutcome {
    pub table: String,
    /// False when the table does not exist in the store.
    pub processed: bool,
    pub rows_seen: u64,
    pub rows_updated: u64,
    pub skipped_columns: Vec<String>,
    pub nullified_columns: Vec<String>,
}

impl TableOutcome {
    fn missing(table: &str) -> Self {
        Self {
            table: table.to_string(),
            processed: false,
            rows_seen: 0,
            rows_updated: 0,
            skipped_columns: Vec::new(),
            nullified_columns: Vec::new(),
        }
    }
}

/// Drives one table through validation, the NULL pre-pass and the chunked
/// per-row rewrite.
pub struct TableProcessor<'a, S: AnonymizationStore> {
    store: &'a S,
    cache: &'a mut GeneratorCache,
    notifier: &'a dyn Notifier,
    options: &'a RunOptions,
}

impl<'a, S: AnonymizationStore> TableProcessor<'a, S> {
    pub fn new(
        store: &'a S,
        cache: &'a mut GeneratorCache,
        notifier: &'a dyn Notifier,
        options: &'a RunOptions,
    ) -> Self {
        Self {
            store,
            cache,
            notifier,
            options,
        }
    }

    pub async fn process(&mut self, table: &TableSpec) -> Result<TableOutcome> {
        let name = table.name.as_str();
        let pk = table.primary_key.as_str();

        if !self.store.has_table(name).await? {
            warn!("Table '{}' does not exist, skipping", name);
            self.notifier.notify(&Notice::MissingTable {
                table: name.to_string(),
            });
            return Ok(TableOutcome::missing(name));
        }
        if !self.store.has_column(name, pk).await? {
            return Err(AnonKitError::config(format!(
                "Primary key '{}' does not exist in table '{}'. Set `pk` for this table.",
                pk, name
            )));
        }

        let mut outcome = TableOutcome::missing(name);
        outcome.processed = true;
        let columns = self.live_columns(table, &mut outcome).await?;

        self.prepare_generators(name, &columns)?;

        self.notifier.notify(&Notice::TableStarted {
            table: name.to_string(),
        });
        let total = self.store.count_rows(name).await?;
        let mut progress = ProgressReporter::new(total, self.options.show_progress);
        info!(
            "Updating {} ({} rows, {} columns, redraw every {} rows)",
            name,
            total,
            columns.len(),
            progress.step()
        );

        for (column, spec) in &columns {
            if spec.null_column_before_run {
                debug!("Nulling {}.{} before run", name, column);
                self.store.nullify_column(name, column).await?;
                outcome.nullified_columns.push(column.clone());
            }
        }

        let chunk_size = self.options.chunk_size.max(1);
        let mut after = None;
        loop {
            let keys = self
                .store
                .fetch_primary_keys(name, pk, after.as_ref(), chunk_size)
                .await?;
            debug!("Fetched {} keys from {}", keys.len(), name);

            for key in &keys {
                let mut update = RowUpdate::new();
                for (column, spec) in &columns {
                    match resolve_column(name, column, spec, self.cache)? {
                        Resolution::Value(value) => {
                            update.insert(column.clone(), value);
                        }
                        Resolution::Skip => {}
                    }
                }
                if !update.is_empty() {
                    self.store.update_row(name, pk, key, &update).await?;
                    outcome.rows_updated += 1;
                }
                outcome.rows_seen += 1;
                progress.advance();
            }

            if keys.len() < chunk_size {
                break;
            }
            after = keys.last().cloned();
        }

        progress.finish();
        info!("Finished {}: {} rows updated", name, outcome.rows_updated);
        self.notifier.notify(&Notice::TableFinished {
            table: name.to_string(),
            rows: outcome.rows_updated,
        });
        Ok(outcome)
    }

    /// Drop configured columns the store does not have, and the primary key
    /// itself, which keyset pagination depends on.
    async fn live_columns(
        &self,
        table: &TableSpec,
        outcome: &mut TableOutcome,
    ) -> Result<IndexMap<String, ColumnSpec>> {
        let mut columns = IndexMap::with_capacity(table.columns.len());
        for (column, spec) in &table.columns {
            if column == &table.primary_key {
                warn!("{}.{} is the primary key, skipping", table.name, column);
                self.notifier.notify(&Notice::KeyColumnSkipped {
                    table: table.name.clone(),
                    column: column.clone(),
                });
                outcome.skipped_columns.push(column.clone());
                continue;
            }
            if !self.store.has_column(&table.name, column).await? {
                warn!("Column '{}.{}' does not exist, skipping", table.name, column);
                self.notifier.notify(&Notice::MissingColumn {
                    table: table.name.clone(),
                    column: column.clone(),
                });
                outcome.skipped_columns.push(column.clone());
                continue;
            }
            columns.insert(column.clone(), spec.clone());
        }
        Ok(columns)
    }

    /// Build every generator up front so a bad provider aborts the run
    /// before any row is written, and flag formatters that will only ever
    /// produce NULL.
    fn prepare_generators(&mut self, table: &str, columns: &IndexMap<String, ColumnSpec>) -> Result<()> {
        for (column, spec) in columns {
            if let Some(ColumnFormatter::Method { name, .. }) = &spec.formatter {
                let handle = self.cache.get(spec)?;
                let generator = handle.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                if !generator.has_formatter(name) {
                    warn!(
                        "{}.{}: unknown formatter '{}', the column will be set to NULL",
                        table, column, name
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    use crate::anonymize::notice::RecordingNotifier;
    use crate::generate::locale::Locale;
    use crate::generate::provider::ProviderRegistry;
    use crate::generate::value::Value;
    use crate::store::memory::{MemoryStore, Statement};

    fn cache() -> GeneratorCache {
        GeneratorCache::new(
            Locale::EnUs,
            Some(11),
            Arc::new(ProviderRegistry::with_defaults().unwrap()),
        )
    }

    fn options() -> RunOptions {
        RunOptions::default()
    }

    async fn process(store: &MemoryStore, table: &TableSpec) -> (TableOutcome, RecordingNotifier) {
        let notifier = RecordingNotifier::new();
        let mut cache = cache();
        let options = options();
        let outcome = TableProcessor::new(store, &mut cache, &notifier, &options)
            .process(table)
            .await
            .unwrap();
        (outcome, notifier)
    }

    #[tokio::test]
    async fn test_fixed_formatter_is_idempotent() {
        let store = MemoryStore::new().with_numbered_rows("users", "entity_id", &["note"], 5);
        let table = TableSpec::new("users")
            .with_column("note", ColumnSpec::new(ColumnFormatter::fixed("redacted")));

        for _ in 0..2 {
            process(&store, &table).await;
            assert!(store
                .column_values("users", "note")
                .iter()
                .all(|v| *v == Value::from("redacted")));
        }
    }

    #[tokio::test]
    async fn test_missing_table_is_reported_not_fatal() {
        let store = MemoryStore::new();
        let (outcome, notifier) = process(&store, &TableSpec::new("ghost")).await;
        assert!(!outcome.processed);
        assert_eq!(notifier.lines(), vec!["Table ghost does not exist."]);
    }

    #[tokio::test]
    async fn test_missing_column_skipped_with_one_notice() {
        let store = MemoryStore::new().with_numbered_rows("users", "entity_id", &["email"], 250);
        let table = TableSpec::new("users")
            .with_column("email", ColumnSpec::new(ColumnFormatter::method("safeEmail", vec![])))
            .with_column("phone", ColumnSpec::new(ColumnFormatter::method("phoneNumber", vec![])));

        let (outcome, notifier) = process(&store, &table).await;
        assert_eq!(outcome.skipped_columns, vec!["phone"]);
        let skips: Vec<_> = notifier
            .notices()
            .into_iter()
            .filter(|n| matches!(n, Notice::MissingColumn { .. }))
            .collect();
        assert_eq!(skips.len(), 1);

        for statement in store.statements() {
            if let Statement::Update { update, .. } = statement {
                assert!(!update.contains_key("phone"));
            }
        }
        assert!(store.rows("users").iter().all(|row| !row.contains_key("phone")));
    }

    #[tokio::test]
    async fn test_chunks_visit_every_row_once() {
        for n in [0usize, 1, 99, 100, 101, 250] {
            let store = MemoryStore::new().with_numbered_rows("t", "entity_id", &["v"], n);
            let table = TableSpec::new("t")
                .with_column("v", ColumnSpec::new(ColumnFormatter::method("randomDigit", vec![])));

            let (outcome, _) = process(&store, &table).await;
            assert_eq!(outcome.rows_seen, n as u64, "n = {}", n);

            let keys: Vec<Value> = store
                .statements()
                .into_iter()
                .filter_map(|s| match s {
                    Statement::Update { key, .. } => Some(key),
                    _ => None,
                })
                .collect();
            let distinct: HashSet<String> = keys.iter().map(|k| k.to_string()).collect();
            assert_eq!(keys.len(), n, "n = {}", n);
            assert_eq!(distinct.len(), n, "n = {}", n);
        }
    }

    #[tokio::test]
    async fn test_null_pre_pass_runs_before_row_updates() {
        let store =
            MemoryStore::new().with_numbered_rows("users", "entity_id", &["email", "name", "token"], 120);
        let mut email = ColumnSpec::new(ColumnFormatter::method("safeEmail", vec![]));
        email.null_column_before_run = true;
        email.unique = true;
        // No formatter: the pre-pass is the only write this column gets.
        let token = ColumnSpec {
            null_column_before_run: true,
            ..ColumnSpec::default()
        };
        let table = TableSpec::new("users")
            .with_column("email", email)
            .with_column("name", ColumnSpec::new(ColumnFormatter::method("name", vec![])))
            .with_column("token", token);

        let (outcome, _) = process(&store, &table).await;
        assert_eq!(outcome.nullified_columns, vec!["email", "token"]);

        let tokens = store.column_values("users", "token");
        assert_eq!(tokens.len(), 120);
        assert!(tokens.iter().all(Value::is_null));
        assert!(store
            .column_values("users", "email")
            .iter()
            .all(|v| !v.is_null() && !v.to_string().starts_with("email-")));

        let statements = store.statements();
        let nullify = statements
            .iter()
            .position(|s| matches!(s, Statement::Nullify { column, .. } if column == "email"))
            .unwrap();
        let first_fetch = statements
            .iter()
            .position(|s| matches!(s, Statement::FetchChunk { .. }))
            .unwrap();
        assert!(nullify < first_fetch);
        for statement in &statements {
            if let Statement::Update { update, .. } = statement {
                assert!(!update.contains_key("token"));
            }
        }
    }

    #[tokio::test]
    async fn test_unique_column_has_no_duplicates() {
        let store = MemoryStore::new().with_numbered_rows("users", "entity_id", &["code"], 300);
        let mut code = ColumnSpec::new(ColumnFormatter::method(
            "numberBetween",
            vec![Value::Int(1), Value::Int(1_000)],
        ));
        code.unique = true;
        let table = TableSpec::new("users").with_column("code", code);

        process(&store, &table).await;
        let values = store.column_values("users", "code");
        let distinct: HashSet<String> = values.iter().map(|v| v.to_unique_key()).collect();
        assert_eq!(distinct.len(), 300);
    }

    #[tokio::test]
    async fn test_primary_key_column_is_never_rewritten() {
        let store = MemoryStore::new().with_numbered_rows("t", "entity_id", &["v"], 3);
        let table = TableSpec::new("t")
            .with_column("entity_id", ColumnSpec::new(ColumnFormatter::fixed(Value::Int(0))))
            .with_column("v", ColumnSpec::new(ColumnFormatter::fixed("x")));
        let (outcome, _) = process(&store, &table).await;
        assert_eq!(outcome.skipped_columns, vec!["entity_id"]);
        assert_eq!(
            store.column_values("t", "entity_id"),
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
    }

    #[tokio::test]
    async fn test_missing_primary_key_is_config_error() {
        let store = MemoryStore::new().with_numbered_rows("t", "id", &["v"], 3);
        let table = TableSpec::new("t").with_column("v", ColumnSpec::new(ColumnFormatter::fixed("x")));
        let notifier = RecordingNotifier::new();
        let mut cache = cache();
        let options = options();
        let result = TableProcessor::new(&store, &mut cache, &notifier, &options)
            .process(&table)
            .await;
        assert!(matches!(result, Err(AnonKitError::Config { .. })));
        assert!(store.statements().is_empty());
    }

    #[tokio::test]
    async fn test_columns_without_formatter_issue_no_updates() {
        let store = MemoryStore::new().with_numbered_rows("t", "entity_id", &["v"], 4);
        let table = TableSpec::new("t").with_column("v", ColumnSpec::default());
        let (outcome, _) = process(&store, &table).await;
        assert_eq!(outcome.rows_seen, 4);
        assert_eq!(outcome.rows_updated, 0);
        assert_eq!(store.update_count("t"), 0);
    }
}
