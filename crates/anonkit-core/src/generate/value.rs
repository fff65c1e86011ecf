use std::borrow::Cow;
use std::cmp::Ordering;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::DatabaseType;

/// A replacement value for a database column, or a primary key read back
/// from the store.
///
/// The `String` variant uses `Cow<'static, str>` so that values drawn from
/// static lookup tables (customer groups, genders, fixed literals baked into
/// providers) stay zero-cost `&'static str` borrows, while generated values
/// (emails, names, sentences) are owned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Cow<'static, str>),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Uuid(Uuid),
    List(Vec<Value>),
}

impl Value {
    /// Build an owned string value.
    pub fn owned(s: impl Into<String>) -> Self {
        Value::String(Cow::Owned(s.into()))
    }

    /// Build a borrowed string value from a static literal.
    pub fn borrowed(s: &'static str) -> Self {
        Value::String(Cow::Borrowed(s))
    }

    /// Convert a literal from the configuration file.
    ///
    /// Datetimes are kept as their TOML text, tables are flattened to their
    /// values in document order.
    pub fn from_toml(value: &toml::Value) -> Self {
        match value {
            toml::Value::String(s) => Value::owned(s.clone()),
            toml::Value::Integer(i) => Value::Int(*i),
            toml::Value::Float(f) => Value::Float(*f),
            toml::Value::Boolean(b) => Value::Bool(*b),
            toml::Value::Datetime(dt) => Value::owned(dt.to_string()),
            toml::Value::Array(items) => Value::List(items.iter().map(Value::from_toml).collect()),
            toml::Value::Table(table) => {
                Value::List(table.values().map(Value::from_toml).collect())
            }
        }
    }

    /// Convert to a SQL literal string suitable for UPDATE statements.
    pub fn to_sql_literal(&self, db_type: &DatabaseType) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => match db_type {
                DatabaseType::MySQL | DatabaseType::SQLite => {
                    if *b {
                        "1".to_string()
                    } else {
                        "0".to_string()
                    }
                }
                DatabaseType::PostgreSQL => {
                    if *b {
                        "TRUE".to_string()
                    } else {
                        "FALSE".to_string()
                    }
                }
            },
            Value::Int(i) => i.to_string(),
            Value::Float(f) => {
                if f.is_nan() {
                    "'NaN'".to_string()
                } else if f.is_infinite() {
                    if f.is_sign_positive() {
                        "'Infinity'".to_string()
                    } else {
                        "'-Infinity'".to_string()
                    }
                } else {
                    format!("{}", f)
                }
            }
            Value::String(s) => quote_string(s, db_type),
            Value::Timestamp(ts) => format!("'{}'", ts.format("%Y-%m-%d %H:%M:%S")),
            Value::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
            Value::Time(t) => format!("'{}'", t.format("%H:%M:%S")),
            Value::Uuid(u) => format!("'{}'", u),
            Value::List(_) => quote_string(&self.to_string(), db_type),
        }
    }

    /// String representation used for uniqueness tracking.
    pub fn to_unique_key(&self) -> String {
        match self {
            Value::Null => "__NULL__".to_string(),
            Value::Float(f) => format!("{:.10}", f),
            other => other.to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Total order used for keyset pagination over primary keys.
    ///
    /// Numbers sort before strings, which sort before everything else.
    /// Within a kind the natural order applies.
    pub fn key_cmp(&self, other: &Value) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Bool(_) | Value::Int(_) | Value::Float(_) => 1,
                Value::String(_) => 2,
                _ => 3,
            }
        }
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (a, b) if rank(a) == 1 && rank(b) == 1 => a
                .as_float()
                .unwrap_or_default()
                .total_cmp(&b.as_float().unwrap_or_default()),
            (a, b) if rank(a) != rank(b) => rank(a).cmp(&rank(b)),
            (a, b) => a.to_string().cmp(&b.to_string()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::owned(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::owned(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "{}", s),
            Value::Timestamp(ts) => write!(f, "{}", ts),
            Value::Date(d) => write!(f, "{}", d),
            Value::Time(t) => write!(f, "{}", t),
            Value::Uuid(u) => write!(f, "{}", u),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

/// Quote a string literal. MySQL treats backslash as an escape character
/// inside literals, so it is doubled there as well.
///
/// Literals are rendered into the statement text rather than bound, so the
/// MySQL branch assumes the session does not run with
/// `NO_BACKSLASH_ESCAPES`. Under that mode each backslash would be stored
/// twice.
fn quote_string(s: &str, db_type: &DatabaseType) -> String {
    let escaped = match db_type {
        DatabaseType::MySQL => s.replace('\\', "\\\\").replace('\'', "''"),
        _ => s.replace('\'', "''"),
    };
    format!("'{}'", escaped)
}
