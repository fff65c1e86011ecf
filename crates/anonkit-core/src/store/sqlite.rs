use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;

use crate::error::{AnonKitError, Result};
use crate::generate::value::Value;
use crate::store::{
    build_chunk_sql, build_count_sql, build_nullify_sql, build_update_sql, connection_error,
    query_error, AnonymizationStore, DatabaseType, RowUpdate,
};

const DB: DatabaseType = DatabaseType::SQLite;

/// SQLite backend over a single pooled connection.
///
/// `PRAGMA foreign_keys` is per connection, and an in-memory database only
/// exists on the connection that opened it, so the pool never recycles.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(url)
            .await
            .map_err(|e| connection_error(url, e))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn execute(&self, table: &str, message: &str, sql: &str) -> Result<u64> {
        debug!("{}", sql);
        sqlx::raw_sql(sql)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| query_error(table, message, sql, e))
    }
}

fn decode_key(row: &SqliteRow, table: &str, primary_key: &str) -> Result<Value> {
    if let Ok(i) = row.try_get::<i64, _>(0) {
        return Ok(Value::Int(i));
    }
    if let Ok(s) = row.try_get::<String, _>(0) {
        return Ok(Value::owned(s));
    }
    Err(AnonKitError::UnsupportedKey {
        table: table.to_string(),
        column: primary_key.to_string(),
    })
}

impl AnonymizationStore for SqliteStore {
    fn database_type(&self) -> DatabaseType {
        DB
    }

    async fn has_table(&self, table: &str) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?";
        let n: i64 = sqlx::query_scalar(sql)
            .bind(table)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| query_error(table, "Table lookup failed", sql, e))?;
        Ok(n > 0)
    }

    async fn has_column(&self, table: &str, column: &str) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?";
        let n: i64 = sqlx::query_scalar(sql)
            .bind(table)
            .bind(column)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| query_error(table, "Column lookup failed", sql, e))?;
        Ok(n > 0)
    }

    async fn count_rows(&self, table: &str) -> Result<u64> {
        let sql = build_count_sql(table, &DB);
        let n: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| query_error(table, "Row count failed", &sql, e))?;
        Ok(n.max(0) as u64)
    }

    async fn nullify_column(&self, table: &str, column: &str) -> Result<()> {
        let sql = build_nullify_sql(table, column, &DB);
        self.execute(table, "Bulk NULL update failed", &sql).await?;
        Ok(())
    }

    async fn fetch_primary_keys(
        &self,
        table: &str,
        primary_key: &str,
        after: Option<&Value>,
        limit: usize,
    ) -> Result<Vec<Value>> {
        let sql = build_chunk_sql(table, primary_key, after, limit, &DB);
        debug!("{}", sql);
        let rows = sqlx::query(&sql)
            .persistent(false)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_error(table, "Chunk fetch failed", &sql, e))?;
        rows.iter().map(|r| decode_key(r, table, primary_key)).collect()
    }

    async fn update_row(
        &self,
        table: &str,
        primary_key: &str,
        key: &Value,
        update: &RowUpdate,
    ) -> Result<()> {
        if let Some(sql) = build_update_sql(table, primary_key, key, update, &DB) {
            self.execute(table, "Row UPDATE failed", &sql).await?;
        }
        Ok(())
    }

    async fn set_integrity_checks(&self, enabled: bool) -> Result<()> {
        let sql = if enabled {
            "PRAGMA foreign_keys = ON"
        } else {
            "PRAGMA foreign_keys = OFF"
        };
        self.execute("(session)", "Failed to toggle foreign keys", sql).await?;
        Ok(())
    }
}
