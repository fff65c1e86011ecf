//! # Storage
//!
//! The [`AnonymizationStore`] trait is everything the table processor needs
//! from a database: existence checks, a row count, keyset-paginated primary
//! keys, per-row and bulk updates, and a session switch for integrity
//! checks. Each backend holds exactly one connection for the whole run so
//! that session settings such as `FOREIGN_KEY_CHECKS = 0` stay in effect.
//!
//! Values are rendered as SQL literals (see
//! [`Value::to_sql_literal`](crate::generate::value::Value::to_sql_literal))
//! rather than bound, since every UPDATE has a different column set.

pub mod memory;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

use std::fmt;

use indexmap::IndexMap;

use crate::error::{AnonKitError, Result};
use crate::generate::value::Value;

/// Column name → replacement value for one row.
pub type RowUpdate = IndexMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseType {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseType::PostgreSQL => write!(f, "PostgreSQL"),
            DatabaseType::MySQL => write!(f, "MySQL"),
            DatabaseType::SQLite => write!(f, "SQLite"),
        }
    }
}

/// Determine the database type from a connection URL.
pub fn database_type_from_url(url: &str) -> Result<DatabaseType> {
    let scheme = url.split(':').next().unwrap_or("");
    match scheme {
        "postgres" | "postgresql" => Ok(DatabaseType::PostgreSQL),
        "mysql" | "mariadb" => Ok(DatabaseType::MySQL),
        "sqlite" | "file" => Ok(DatabaseType::SQLite),
        other => Err(AnonKitError::UnsupportedDatabase {
            scheme: other.to_string(),
        }),
    }
}

/// Database operations used by an anonymization run.
pub trait AnonymizationStore: Send + Sync {
    fn database_type(&self) -> DatabaseType;

    fn has_table(&self, table: &str) -> impl std::future::Future<Output = Result<bool>> + Send;

    fn has_column(
        &self,
        table: &str,
        column: &str,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    fn count_rows(&self, table: &str) -> impl std::future::Future<Output = Result<u64>> + Send;

    /// Set `column` to NULL in every row of `table`.
    fn nullify_column(
        &self,
        table: &str,
        column: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Up to `limit` primary-key values greater than `after`, ascending.
    fn fetch_primary_keys(
        &self,
        table: &str,
        primary_key: &str,
        after: Option<&Value>,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<Value>>> + Send;

    /// Apply `update` to the row whose primary key equals `key`.
    fn update_row(
        &self,
        table: &str,
        primary_key: &str,
        key: &Value,
        update: &RowUpdate,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Enable or disable foreign-key enforcement for this session.
    fn set_integrity_checks(
        &self,
        enabled: bool,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Quote an identifier, doubling any embedded quote character.
pub fn quote_identifier(name: &str, db_type: &DatabaseType) -> String {
    match db_type {
        DatabaseType::MySQL => format!("`{}`", name.replace('`', "``")),
        _ => format!("\"{}\"", name.replace('"', "\"\"")),
    }
}

pub fn build_count_sql(table: &str, db_type: &DatabaseType) -> String {
    format!("SELECT COUNT(*) FROM {}", quote_identifier(table, db_type))
}

pub fn build_nullify_sql(table: &str, column: &str, db_type: &DatabaseType) -> String {
    format!(
        "UPDATE {} SET {} = NULL",
        quote_identifier(table, db_type),
        quote_identifier(column, db_type)
    )
}

/// Keyset page: `SELECT pk FROM t [WHERE pk > last] ORDER BY pk LIMIT n`.
pub fn build_chunk_sql(
    table: &str,
    primary_key: &str,
    after: Option<&Value>,
    limit: usize,
    db_type: &DatabaseType,
) -> String {
    let pk = quote_identifier(primary_key, db_type);
    let filter = match after {
        Some(last) => format!(" WHERE {} > {}", pk, last.to_sql_literal(db_type)),
        None => String::new(),
    };
    format!(
        "SELECT {pk} FROM {table}{filter} ORDER BY {pk} LIMIT {limit}",
        pk = pk,
        table = quote_identifier(table, db_type),
        filter = filter,
        limit = limit
    )
}

/// `UPDATE t SET a = .., b = .. WHERE pk = key`, or `None` when there is
/// nothing to set.
pub fn build_update_sql(
    table: &str,
    primary_key: &str,
    key: &Value,
    update: &RowUpdate,
    db_type: &DatabaseType,
) -> Option<String> {
    if update.is_empty() {
        return None;
    }
    let assignments: Vec<String> = update
        .iter()
        .map(|(column, value)| {
            format!(
                "{} = {}",
                quote_identifier(column, db_type),
                value.to_sql_literal(db_type)
            )
        })
        .collect();
    Some(format!(
        "UPDATE {} SET {} WHERE {} = {}",
        quote_identifier(table, db_type),
        assignments.join(", "),
        quote_identifier(primary_key, db_type),
        key.to_sql_literal(db_type)
    ))
}

/// Truncate a SQL string for error messages.
pub fn truncate_sql(sql: &str, max_len: usize) -> String {
    if sql.len() <= max_len {
        return sql.to_string();
    }
    let mut end = max_len;
    while !sql.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &sql[..end])
}

/// Sanitize a database URL for error messages (hide password).
pub fn sanitize_url(db_url: &str) -> String {
    if let Ok(mut parsed) = url::Url::parse(db_url) {
        if parsed.password().is_some() {
            let _ = parsed.set_password(Some("****"));
        }
        return parsed.to_string();
    }
    // SQLite paths and other non-URL strings pass through.
    db_url.to_string()
}

pub(crate) fn query_error(table: &str, message: &str, sql: &str, source: sqlx::Error) -> AnonKitError {
    AnonKitError::Query {
        table: table.to_string(),
        message: message.to_string(),
        sql_preview: truncate_sql(sql, 200),
        source,
    }
}

pub(crate) fn connection_error(url: &str, source: sqlx::Error) -> AnonKitError {
    AnonKitError::Connection {
        message: "Failed to connect for anonymization".to_string(),
        connection_hint: sanitize_url(url),
        source,
    }
}
