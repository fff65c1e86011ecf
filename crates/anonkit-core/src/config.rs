//! # Configuration File Parser
//!
//! Reads and parses `anonkit.toml`, the declarative description of what to
//! anonymize and how. Supports:
//!
//! - `[database]`: default connection URL
//! - `[anonymize]`: locale, RNG seed, chunk size
//! - `[groups.<group>.<table>]`: primary key and per-column formatters
//!
//! Example `anonkit.toml`:
//!
//! ```toml
//! [database]
//! url = "mysql://root@localhost/magento"
//!
//! [anonymize]
//! locale = "en_US"
//! seed = 42
//!
//! [groups.customer.customer_entity]
//! pk = "entity_id"
//!
//! [groups.customer.customer_entity.columns]
//! email = { formatter = "safeEmail", unique = true, nullColumnBeforeRun = true }
//! firstname = { formatter = "firstName" }
//! dob = { formatter = "date", optional = true }
//! gender = { formatter = "gender", provider = "magento" }
//! password_hash = { formatter = { name = "fixed", value = "" } }
//! ```
//!
//! Several files can be layered with repeated `--config` flags. Groups are
//! the unit of merging: a group in a later file replaces the same group
//! from an earlier file, and new groups are appended.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{AnonKitError, Result};
use crate::formatter::{deserialize_formatter, ColumnFormatter};
use crate::generate::generator::Modifier;
use crate::generate::locale::Locale;

/// Default config file name.
pub const DEFAULT_CONFIG_FILE: &str = "anonkit.toml";

/// Primary key assumed when a table does not declare `pk`.
pub const DEFAULT_PRIMARY_KEY: &str = "entity_id";

/// Rows fetched per chunk when not configured.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Top-level anonkit.toml structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnonKitConfig {
    /// Database connection settings.
    pub database: DatabaseConfig,
    /// Run settings.
    pub anonymize: AnonymizeSettings,
    /// What to anonymize, grouped.
    pub groups: AnonymizationConfig,

    /// Files this configuration was read from, in merge order.
    #[serde(skip)]
    pub sources: Vec<PathBuf>,
}

/// Database connection configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "mysql://root@localhost/magento").
    pub url: Option<String>,
}

/// Run settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnonymizeSettings {
    /// Locale for generated data (e.g., "en_US").
    pub locale: Option<String>,
    /// Fixed seed for reproducible runs.
    pub seed: Option<u64>,
    /// Rows per chunk.
    pub chunk_size: Option<usize>,
}

/// Group name → table name → table spec, in document order.
pub type GroupMap = IndexMap<String, IndexMap<String, TableSpec>>;

/// The tables to anonymize, grouped for filtering.
///
/// Groups carry no meaning beyond being selectable with `--group`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "GroupMap")]
pub struct AnonymizationConfig {
    pub groups: GroupMap,
}

impl From<GroupMap> for AnonymizationConfig {
    fn from(mut groups: GroupMap) -> Self {
        for tables in groups.values_mut() {
            for (name, table) in tables.iter_mut() {
                table.name = name.clone();
            }
        }
        Self { groups }
    }
}

/// One table's anonymization rules.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TableSpec {
    /// Table name, taken from the configuration key.
    #[serde(skip)]
    pub name: String,
    #[serde(rename = "pk", default = "default_primary_key")]
    pub primary_key: String,
    #[serde(default)]
    pub columns: IndexMap<String, ColumnSpec>,
}

fn default_primary_key() -> String {
    DEFAULT_PRIMARY_KEY.to_string()
}

impl TableSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: default_primary_key(),
            columns: IndexMap::new(),
        }
    }

    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    pub fn with_column(mut self, name: impl Into<String>, spec: ColumnSpec) -> Self {
        self.columns.insert(name.into(), spec);
        self
    }
}

/// One column's anonymization rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSpec {
    #[serde(deserialize_with = "deserialize_formatter")]
    pub formatter: Option<ColumnFormatter>,
    /// Identifier of a registered value provider to attach.
    pub provider: Option<String>,
    pub unique: bool,
    pub optional: bool,
    /// Set the column to NULL for every row before generation starts.
    #[serde(rename = "nullColumnBeforeRun", alias = "null_column_before_run")]
    pub null_column_before_run: bool,
}

impl ColumnSpec {
    pub fn new(formatter: ColumnFormatter) -> Self {
        Self {
            formatter: Some(formatter),
            ..Self::default()
        }
    }

    pub fn modifier(&self) -> Modifier {
        if self.unique {
            Modifier::Unique
        } else if self.optional {
            Modifier::Optional
        } else {
            Modifier::None
        }
    }
}

impl AnonymizationConfig {
    /// Group names in configuration order.
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.keys().map(|g| g.as_str()).collect()
    }

    /// Every table with its group, in configuration order.
    pub fn tables(&self) -> impl Iterator<Item = (&str, &TableSpec)> {
        self.groups
            .iter()
            .flat_map(|(group, tables)| tables.values().map(move |t| (group.as_str(), t)))
    }

    pub fn table_count(&self) -> usize {
        self.groups.values().map(|t| t.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.table_count() == 0
    }

    /// Layer `other` on top: same-named groups are replaced in place, new
    /// groups are appended.
    pub fn merge(&mut self, other: AnonymizationConfig) {
        for (group, tables) in other.groups {
            self.groups.insert(group, tables);
        }
    }

    /// Validate semantic constraints that serde cannot enforce.
    pub fn validate(&self) -> Result<()> {
        for (group, tables) in &self.groups {
            for (name, table) in tables {
                if name.trim().is_empty() {
                    return Err(AnonKitError::config(format!(
                        "Group '{}' contains a table with an empty name",
                        group
                    )));
                }
                if table.primary_key.trim().is_empty() {
                    return Err(AnonKitError::config(format!(
                        "Table '{}' in group '{}' has an empty pk",
                        name, group
                    )));
                }
                for (column, spec) in &table.columns {
                    if spec.unique && spec.optional {
                        return Err(AnonKitError::config(format!(
                            "Column '{}.{}' sets both unique and optional. \
                             Pick one: unique values cannot be skipped at random.",
                            name, column
                        )));
                    }
                    if spec.provider.as_deref().is_some_and(|p| p.trim().is_empty()) {
                        return Err(AnonKitError::config(format!(
                            "Column '{}.{}' has an empty provider name",
                            name, column
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

impl AnonKitConfig {
    /// Configured locale, `en_US` when unset.
    pub fn locale(&self) -> Result<Locale> {
        match self.anonymize.locale.as_deref() {
            Some(code) => code.parse(),
            None => Ok(Locale::default()),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.anonymize.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE)
    }

    /// Layer `other` on top of `self`. Scalars set in `other` win.
    pub fn merge(&mut self, other: AnonKitConfig) {
        if other.database.url.is_some() {
            self.database.url = other.database.url;
        }
        if other.anonymize.locale.is_some() {
            self.anonymize.locale = other.anonymize.locale;
        }
        if other.anonymize.seed.is_some() {
            self.anonymize.seed = other.anonymize.seed;
        }
        if other.anonymize.chunk_size.is_some() {
            self.anonymize.chunk_size = other.anonymize.chunk_size;
        }
        self.groups.merge(other.groups);
        self.sources.extend(other.sources);
    }

    /// Validate semantic constraints that serde cannot enforce.
    pub fn validate(&self) -> Result<()> {
        self.locale()?;
        if self.anonymize.chunk_size == Some(0) {
            return Err(AnonKitError::config("chunk_size must be at least 1"));
        }
        self.groups.validate()
    }
}

/// Parse configuration text without validating it.
pub fn parse_config(content: &str) -> Result<AnonKitConfig> {
    toml::from_str(content).map_err(|e| AnonKitError::config(format!("Failed to parse config: {}", e)))
}

/// Read one configuration file. Unlike [`read_config_dir`], a missing file
/// is an error because the caller named it explicitly.
pub fn read_config(path: &Path) -> Result<AnonKitConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AnonKitError::config(format!("Failed to read {}: {}", path.display(), e)))?;

    let mut config: AnonKitConfig = toml::from_str(&content)
        .map_err(|e| AnonKitError::config(format!("Failed to parse {}: {}", path.display(), e)))?;
    config.sources.push(path.to_path_buf());
    Ok(config)
}

/// Read `anonkit.toml` from `dir`, if present.
pub fn read_config_dir(dir: &Path) -> Result<Option<AnonKitConfig>> {
    let path = dir.join(DEFAULT_CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let config = read_config(&path)?;
    config.validate()?;
    Ok(Some(config))
}

/// Read and merge several files in order, then validate the result.
pub fn read_configs<P: AsRef<Path>>(paths: &[P]) -> Result<AnonKitConfig> {
    let mut merged = AnonKitConfig::default();
    for path in paths {
        merged.merge(read_config(path.as_ref())?);
    }
    merged.validate()?;
    Ok(merged)
}
