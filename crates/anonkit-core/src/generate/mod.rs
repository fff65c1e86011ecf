//! # Value Generation
//!
//! Everything that turns a formatter name plus arguments into a replacement
//! value: the built-in formatter registry, pluggable value providers, the
//! per-column [`Generator`](generator::Generator) with its unique/optional
//! modifiers, and the run-wide [`GeneratorCache`](cache::GeneratorCache).

pub mod builtin;
pub mod cache;
pub mod generator;
pub mod locale;
pub mod provider;
pub mod unique;
pub mod value;

use thiserror::Error;

/// Failure of a single formatter invocation.
///
/// Unknown formatters and malformed arguments are recoverable: the column
/// is written as NULL and the run continues. Exhausting the unique retry
/// budget is not.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatterError {
    #[error("unknown formatter '{0}'")]
    UnknownFormatter(String),

    #[error("invalid arguments for formatter '{formatter}': {message}")]
    InvalidArguments { formatter: String, message: String },

    #[error("formatter '{formatter}' could not produce a new unique value after {max_retries} attempts")]
    UniqueExhausted { formatter: String, max_retries: usize },
}

impl FormatterError {
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FormatterError::UniqueExhausted { .. })
    }
}
