//! # Anonymization Run
//!
//! [`Anonymizer::run`] walks the configured groups in order, skips groups
//! not named in the filter, and hands each table to a [`TableProcessor`].
//! Foreign-key enforcement is switched off for the session before the first
//! table and back on after the last one.
//!
//! A run is not atomic. If it fails part-way, earlier tables stay
//! anonymized, the current table is partially rewritten, and integrity
//! checks remain off until the session ends.

pub mod notice;
pub mod table;

use tracing::{info, warn};

use crate::config::{AnonymizationConfig, DEFAULT_CHUNK_SIZE};
use crate::error::Result;
use crate::generate::cache::GeneratorCache;
use crate::store::AnonymizationStore;

use self::notice::{Notice, Notifier};
use self::table::{TableOutcome, TableProcessor};

/// Knobs for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Primary keys fetched per chunk.
    pub chunk_size: usize,
    /// Draw a progress bar per table.
    pub show_progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            show_progress: false,
        }
    }
}

/// Totals for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub tables_processed: usize,
    pub tables_skipped: usize,
    pub columns_skipped: usize,
    pub rows_updated: u64,
    pub outcomes: Vec<TableOutcome>,
}

impl RunSummary {
    fn record(&mut self, outcome: TableOutcome) {
        if outcome.processed {
            self.tables_processed += 1;
        } else {
            self.tables_skipped += 1;
        }
        self.columns_skipped += outcome.skipped_columns.len();
        self.rows_updated += outcome.rows_updated;
        self.outcomes.push(outcome);
    }
}

/// Drives a whole anonymization run against one store.
pub struct Anonymizer<'a, S: AnonymizationStore> {
    store: &'a S,
    cache: GeneratorCache,
    notifier: &'a dyn Notifier,
    options: RunOptions,
}

impl<'a, S: AnonymizationStore> Anonymizer<'a, S> {
    pub fn new(store: &'a S, cache: GeneratorCache, notifier: &'a dyn Notifier, options: RunOptions) -> Self {
        Self {
            store,
            cache,
            notifier,
            options,
        }
    }

    /// The generator cache, for inspection after a run.
    pub fn cache(&self) -> &GeneratorCache {
        &self.cache
    }

    /// Anonymize every table of every selected group. An empty
    /// `requested_groups` selects all groups.
    pub async fn run(
        &mut self,
        config: &AnonymizationConfig,
        requested_groups: &[String],
    ) -> Result<RunSummary> {
        for requested in requested_groups {
            if !config.groups.contains_key(requested) {
                warn!("Group '{}' is not configured", requested);
            }
        }

        self.store.set_integrity_checks(false).await?;

        let mut summary = RunSummary::default();
        for (group, tables) in &config.groups {
            if !requested_groups.is_empty() && !requested_groups.contains(group) {
                continue;
            }
            info!("Group '{}': {} tables", group, tables.len());
            for table in tables.values() {
                let outcome = TableProcessor::new(self.store, &mut self.cache, self.notifier, &self.options)
                    .process(table)
                    .await?;
                summary.record(outcome);
            }
        }

        self.store.set_integrity_checks(true).await?;
        info!(
            "Run complete: {} tables, {} rows, {} generators",
            summary.tables_processed,
            summary.rows_updated,
            self.cache.len()
        );
        self.notifier.notify(&Notice::Completed);
        Ok(summary)
    }
}

/// Split a `--group a,b` value into names, dropping blanks.
pub fn parse_group_filter(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::{ColumnSpec, TableSpec};
    use crate::formatter::ColumnFormatter;
    use crate::generate::locale::Locale;
    use crate::generate::provider::ProviderRegistry;
    use crate::store::memory::{MemoryStore, Statement};
    use crate::anonymize::notice::RecordingNotifier;

    fn config() -> AnonymizationConfig {
        let mut config = AnonymizationConfig::default();
        for (group, table) in [("A", "a_table"), ("B", "b_table"), ("C", "c_table")] {
            let spec = TableSpec::new(table)
                .with_column("name", ColumnSpec::new(ColumnFormatter::method("firstName", vec![])));
            config
                .groups
                .entry(group.to_string())
                .or_default()
                .insert(table.to_string(), spec);
        }
        config
    }

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_numbered_rows("a_table", "entity_id", &["name"], 10)
            .with_numbered_rows("b_table", "entity_id", &["name"], 10)
            .with_numbered_rows("c_table", "entity_id", &["name"], 10)
    }

    fn anonymizer<'a>(store: &'a MemoryStore, notifier: &'a RecordingNotifier) -> Anonymizer<'a, MemoryStore> {
        let cache = GeneratorCache::new(
            Locale::EnUs,
            Some(5),
            Arc::new(ProviderRegistry::with_defaults().unwrap()),
        );
        Anonymizer::new(store, cache, notifier, RunOptions::default())
    }

    #[tokio::test]
    async fn test_group_filter_limits_tables() {
        let store = store();
        let notifier = RecordingNotifier::new();
        let summary = anonymizer(&store, &notifier)
            .run(&config(), &["B".to_string()])
            .await
            .unwrap();

        assert_eq!(summary.tables_processed, 1);
        assert_eq!(store.update_count("a_table"), 0);
        assert_eq!(store.update_count("b_table"), 10);
        assert_eq!(store.update_count("c_table"), 0);
    }

    #[tokio::test]
    async fn test_empty_filter_runs_everything_in_order() {
        let store = store();
        let notifier = RecordingNotifier::new();
        let summary = anonymizer(&store, &notifier).run(&config(), &[]).await.unwrap();

        assert_eq!(summary.tables_processed, 3);
        assert_eq!(summary.rows_updated, 30);
        let started: Vec<String> = notifier
            .notices()
            .into_iter()
            .filter_map(|n| match n {
                Notice::TableStarted { table } => Some(table),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec!["a_table", "b_table", "c_table"]);
        assert_eq!(notifier.lines().last().unwrap(), "Database has been anonymized");
    }

    #[tokio::test]
    async fn test_integrity_checks_bracket_the_run() {
        let store = store();
        let notifier = RecordingNotifier::new();
        anonymizer(&store, &notifier).run(&config(), &[]).await.unwrap();

        let statements = store.statements();
        assert_eq!(statements.first(), Some(&Statement::IntegrityChecks(false)));
        assert_eq!(statements.last(), Some(&Statement::IntegrityChecks(true)));
        assert!(store.integrity_checks_enabled());
    }

    #[tokio::test]
    async fn test_identical_specs_share_one_generator() {
        let store = store();
        let notifier = RecordingNotifier::new();
        let mut run = anonymizer(&store, &notifier);
        run.run(&config(), &[]).await.unwrap();
        // Three tables, one identical column spec each.
        assert_eq!(run.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_tables_are_counted_as_skipped() {
        let store = MemoryStore::new().with_numbered_rows("b_table", "entity_id", &["name"], 2);
        let notifier = RecordingNotifier::new();
        let summary = anonymizer(&store, &notifier).run(&config(), &[]).await.unwrap();
        assert_eq!(summary.tables_processed, 1);
        assert_eq!(summary.tables_skipped, 2);
    }

    #[test]
    fn test_parse_group_filter() {
        assert_eq!(parse_group_filter(Some(" customer, ,sales ")), vec!["customer", "sales"]);
        assert!(parse_group_filter(Some("")).is_empty());
        assert!(parse_group_filter(None).is_empty());
    }
}
