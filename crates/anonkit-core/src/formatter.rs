//! # Formatter Resolution
//!
//! Turns one column's configuration into one replacement value.
//!
//! The configuration accepts two shapes for `formatter`:
//!
//! ```toml
//! [groups.customer.customer_entity.columns]
//! firstname = { formatter = "firstName" }
//! dob = { formatter = { name = "dateTimeBetween", start = "-80 years", end = "-18 years" } }
//! password_hash = { formatter = { name = "fixed", value = "" } }
//! ```
//!
//! Both are normalized once, at load time, into [`ColumnFormatter`]. Keys
//! after `name` become positional arguments in document order; their names
//! are only labels.

use std::sync::PoisonError;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::config::ColumnSpec;
use crate::error::{AnonKitError, Result};
use crate::generate::cache::GeneratorCache;
use crate::generate::value::Value;
use crate::generate::FormatterError;

/// Marker name for a literal replacement.
pub const FIXED: &str = "fixed";

/// How a column's replacement value is produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ColumnFormatter {
    /// Write this literal to every row.
    Fixed(Value),
    /// Call a generator formatter with positional arguments.
    Method { name: String, args: Vec<Value> },
}

impl ColumnFormatter {
    pub fn fixed(value: impl Into<Value>) -> Self {
        ColumnFormatter::Fixed(value.into())
    }

    pub fn method(name: impl Into<String>, args: Vec<Value>) -> Self {
        ColumnFormatter::Method {
            name: name.into(),
            args,
        }
    }

    /// Normalize the loose file shape. `None` means there is nothing to call
    /// and the column is left alone.
    fn from_raw(raw: RawFormatter) -> Option<Self> {
        match raw {
            RawFormatter::Name(name) => {
                let name = name.trim();
                if name.is_empty() {
                    None
                } else if name == FIXED {
                    Some(ColumnFormatter::Fixed(Value::Null))
                } else {
                    Some(ColumnFormatter::method(name, Vec::new()))
                }
            }
            RawFormatter::Spec(mut table) => {
                let name = match table.shift_remove("name") {
                    Some(toml::Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
                    _ => return None,
                };
                let mut args: Vec<Value> = table.values().map(Value::from_toml).collect();
                if name == FIXED {
                    let first = if args.is_empty() {
                        Value::Null
                    } else {
                        args.swap_remove(0)
                    };
                    Some(ColumnFormatter::Fixed(first))
                } else {
                    Some(ColumnFormatter::Method { name, args })
                }
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFormatter {
    Name(String),
    Spec(IndexMap<String, toml::Value>),
}

/// `deserialize_with` hook for [`ColumnSpec::formatter`].
pub(crate) fn deserialize_formatter<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<ColumnFormatter>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawFormatter>::deserialize(deserializer)?;
    Ok(raw.and_then(ColumnFormatter::from_raw))
}

/// Outcome of resolving one column for one row.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Write this value (possibly NULL).
    Value(Value),
    /// Leave the column out of the row update.
    Skip,
}

/// Produce the replacement for `column` of `table` according to `spec`.
///
/// Fixed literals never touch the cache. Unknown formatters and bad
/// arguments resolve to NULL; only provider failures and unique exhaustion
/// are returned as errors.
pub fn resolve_column(
    table: &str,
    column: &str,
    spec: &ColumnSpec,
    cache: &mut GeneratorCache,
) -> Result<Resolution> {
    let (name, args) = match &spec.formatter {
        None => return Ok(Resolution::Skip),
        Some(ColumnFormatter::Fixed(value)) => return Ok(Resolution::Value(value.clone())),
        Some(ColumnFormatter::Method { name, args }) => (name, args),
    };

    let handle = cache.get(spec)?;
    let mut generator = handle.lock().unwrap_or_else(PoisonError::into_inner);
    match generator.call(name, args, spec.modifier()) {
        Ok(value) => Ok(Resolution::Value(value)),
        Err(FormatterError::UniqueExhausted {
            formatter,
            max_retries,
        }) => Err(AnonKitError::UniqueExhausted {
            table: table.to_string(),
            column: column.to_string(),
            formatter,
            max_retries,
        }),
        Err(e) => {
            debug!("{}.{}: {}; writing NULL", table, column, e);
            Ok(Resolution::Value(Value::Null))
        }
    }
}
