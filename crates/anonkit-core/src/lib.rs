pub mod anonymize;
pub mod config;
pub mod error;
pub mod formatter;
pub mod generate;
pub mod progress;
pub mod store;

// Re-export key types for convenience
pub use anonymize::{Anonymizer, RunOptions, RunSummary};
pub use config::{AnonKitConfig, AnonymizationConfig, ColumnSpec, TableSpec};
pub use error::{AnonKitError, Result};
pub use store::{AnonymizationStore, DatabaseType};
