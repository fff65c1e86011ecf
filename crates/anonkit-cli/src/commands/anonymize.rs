use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use anonkit_core::anonymize::notice::ConsoleNotifier;
use anonkit_core::anonymize::{parse_group_filter, Anonymizer, RunOptions, RunSummary};
use anonkit_core::config::AnonKitConfig;
use anonkit_core::generate::cache::GeneratorCache;
use anonkit_core::generate::provider::ProviderRegistry;
use anonkit_core::store::mysql::MySqlStore;
use anonkit_core::store::postgres::PostgresStore;
use anonkit_core::store::sqlite::SqliteStore;
use anonkit_core::store::{database_type_from_url, sanitize_url, AnonymizationStore, DatabaseType};

use crate::args::AnonymizeArgs;
use crate::commands::{load_config, resolve_db_url};

const PROMPT: &str = "The data will be irrevocably anonymized. Do you want to continue? (y/n)[y] ";

pub async fn run(args: &AnonymizeArgs) -> Result<()> {
    let mut config = load_config(&args.config)?;
    apply_overrides(&mut config, args);
    config.validate()?;

    let db_url = resolve_db_url(args.db.as_deref(), &config)?;
    let db_type = database_type_from_url(&db_url)?;
    let groups = parse_group_filter(args.group.as_deref());

    if !args.yes && !ask_confirmation()? {
        eprintln!("Database has NOT been anonymized");
        return Ok(());
    }

    info!("Connecting to {} at {}", db_type, sanitize_url(&db_url));
    let summary = match db_type {
        DatabaseType::PostgreSQL => {
            let store = PostgresStore::connect(&db_url).await?;
            execute(&store, &config, &groups).await?
        }
        DatabaseType::MySQL => {
            let store = MySqlStore::connect(&db_url).await?;
            execute(&store, &config, &groups).await?
        }
        DatabaseType::SQLite => {
            let store = SqliteStore::connect(&db_url).await?;
            execute(&store, &config, &groups).await?
        }
    };

    eprintln!(
        "{} tables anonymized, {} rows updated ({} tables and {} columns skipped)",
        summary.tables_processed, summary.rows_updated, summary.tables_skipped, summary.columns_skipped
    );
    Ok(())
}

/// Command-line flags override the `[anonymize]` section.
fn apply_overrides(config: &mut AnonKitConfig, args: &AnonymizeArgs) {
    if let Some(locale) = &args.locale {
        config.anonymize.locale = Some(locale.clone());
    }
    if let Some(seed) = args.seed {
        config.anonymize.seed = Some(seed);
    }
    if let Some(chunk_size) = args.chunk_size {
        config.anonymize.chunk_size = Some(chunk_size);
    }
}

async fn execute<S: AnonymizationStore>(
    store: &S,
    config: &AnonKitConfig,
    groups: &[String],
) -> Result<RunSummary> {
    let providers = ProviderRegistry::with_defaults()?;
    let cache = GeneratorCache::new(config.locale()?, config.anonymize.seed, Arc::new(providers));
    let options = RunOptions {
        chunk_size: config.chunk_size(),
        show_progress: io::stderr().is_terminal(),
    };
    let notifier = ConsoleNotifier;

    let summary = Anonymizer::new(store, cache, &notifier, options)
        .run(&config.groups, groups)
        .await
        .context("Anonymization aborted; tables processed so far stay anonymized")?;
    Ok(summary)
}

fn ask_confirmation() -> Result<bool> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", PROMPT)?;
    stdout.flush()?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(is_yes(&answer))
}

/// An empty answer takes the default, which is yes.
fn is_yes(answer: &str) -> bool {
    let answer = answer.trim();
    answer.is_empty() || answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}
