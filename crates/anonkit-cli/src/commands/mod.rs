pub mod anonymize;
pub mod check;
pub mod formatters;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use anonkit_core::config::{read_config_dir, read_configs, AnonKitConfig, DEFAULT_CONFIG_FILE};
use anonkit_core::error::AnonKitError;

/// Load the explicitly named files, or `anonkit.toml` from the working
/// directory when none are given.
pub fn load_config(paths: &[PathBuf]) -> Result<AnonKitConfig> {
    if !paths.is_empty() {
        return read_configs(paths).context("Failed to load configuration");
    }
    match read_config_dir(Path::new("."))? {
        Some(config) => Ok(config),
        None => bail!(
            "No {} found in the current directory. Pass --config <FILE> to name one.",
            DEFAULT_CONFIG_FILE
        ),
    }
}

/// Resolve the connection URL: `--db`, then `DATABASE_URL` (the `.env`
/// file is loaded at startup), then `[database] url`.
pub fn resolve_db_url(explicit: Option<&str>, config: &AnonKitConfig) -> Result<String> {
    if let Some(url) = explicit {
        return Ok(url.to_string());
    }
    if let Ok(url) = std::env::var("DATABASE_URL") {
        return Ok(url);
    }
    if let Some(url) = &config.database.url {
        return Ok(url.clone());
    }
    Err(AnonKitError::NoDatabaseUrl.into())
}
