use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::Row;
use tracing::debug;

use crate::error::{AnonKitError, Result};
use crate::generate::value::Value;
use crate::store::{
    build_chunk_sql, build_count_sql, build_nullify_sql, build_update_sql, connection_error,
    query_error, AnonymizationStore, DatabaseType, RowUpdate,
};

const DB: DatabaseType = DatabaseType::MySQL;

/// MySQL / MariaDB backend over a single pooled connection.
///
/// `FOREIGN_KEY_CHECKS` is a session variable, so the one connection is
/// kept for the whole run.
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(url)
            .await
            .map_err(|e| connection_error(url, e))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
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

fn decode_key(row: &MySqlRow, table: &str, primary_key: &str) -> Result<Value> {
    if let Ok(i) = row.try_get::<i64, _>(0) {
        return Ok(Value::Int(i));
    }
    // UNSIGNED columns (Magento's entity_id) decode as u64.
    if let Ok(u) = row.try_get::<u64, _>(0) {
        if let Ok(i) = i64::try_from(u) {
            return Ok(Value::Int(i));
        }
        return Ok(Value::owned(u.to_string()));
    }
    if let Ok(u) = row.try_get::<u32, _>(0) {
        return Ok(Value::Int(i64::from(u)));
    }
    if let Ok(i) = row.try_get::<i32, _>(0) {
        return Ok(Value::Int(i64::from(i)));
    }
    if let Ok(s) = row.try_get::<String, _>(0) {
        return Ok(Value::owned(s));
    }
    Err(AnonKitError::UnsupportedKey {
        table: table.to_string(),
        column: primary_key.to_string(),
    })
}

impl AnonymizationStore for MySqlStore {
    fn database_type(&self) -> DatabaseType {
        DB
    }

    async fn has_table(&self, table: &str) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM information_schema.tables \
                   WHERE table_schema = DATABASE() AND table_name = ?";
        let n: i64 = sqlx::query_scalar(sql)
            .bind(table)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| query_error(table, "Table lookup failed", sql, e))?;
        Ok(n > 0)
    }

    async fn has_column(&self, table: &str, column: &str) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM information_schema.columns \
                   WHERE table_schema = DATABASE() AND table_name = ? AND column_name = ?";
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
            "SET FOREIGN_KEY_CHECKS = 1"
        } else {
            "SET FOREIGN_KEY_CHECKS = 0"
        };
        self.execute("(session)", "Failed to toggle FOREIGN_KEY_CHECKS", sql)
            .await?;
        Ok(())
    }
}
