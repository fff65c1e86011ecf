use std::cmp::Ordering;
use std::sync::{Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;

use crate::error::{AnonKitError, Result};
use crate::generate::value::Value;
use crate::store::{AnonymizationStore, DatabaseType, RowUpdate};

/// A statement the in-memory store has executed, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    IntegrityChecks(bool),
    Nullify {
        table: String,
        column: String,
    },
    FetchChunk {
        table: String,
        after: Option<Value>,
        limit: usize,
    },
    Update {
        table: String,
        key: Value,
        update: RowUpdate,
    },
}

#[derive(Debug, Default)]
struct MemoryTable {
    columns: Vec<String>,
    rows: Vec<IndexMap<String, Value>>,
}

#[derive(Debug)]
struct MemoryState {
    tables: IndexMap<String, MemoryTable>,
    statements: Vec<Statement>,
    integrity_checks: bool,
}

/// In-process [`AnonymizationStore`] that records every statement.
///
/// Rows are plain column → value maps; the primary key is whatever column
/// the caller names.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                tables: IndexMap::new(),
                statements: Vec::new(),
                integrity_checks: true,
            }),
        }
    }

    /// Add a table with explicit rows. Each row lists values in `columns`
    /// order.
    pub fn with_table(self, name: &str, columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        {
            let mut state = self.lock();
            let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
            let rows = rows
                .into_iter()
                .map(|values| columns.iter().cloned().zip(values).collect())
                .collect();
            state
                .tables
                .insert(name.to_string(), MemoryTable { columns, rows });
        }
        self
    }

    /// Add a table of `count` rows keyed `1..=count` in `primary_key`; every
    /// other column holds `"<column>-<n>"`.
    pub fn with_numbered_rows(
        self,
        name: &str,
        primary_key: &str,
        columns: &[&str],
        count: usize,
    ) -> Self {
        let mut all = vec![primary_key];
        all.extend_from_slice(columns);
        let rows = (1..=count)
            .map(|n| {
                let mut row = vec![Value::Int(n as i64)];
                row.extend(columns.iter().map(|c| Value::owned(format!("{}-{}", c, n))));
                row
            })
            .collect();
        self.with_table(name, &all, rows)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every statement executed so far.
    pub fn statements(&self) -> Vec<Statement> {
        self.lock().statements.clone()
    }

    /// Number of row updates issued against `table`.
    pub fn update_count(&self, table: &str) -> usize {
        self.lock()
            .statements
            .iter()
            .filter(|s| matches!(s, Statement::Update { table: t, .. } if t == table))
            .count()
    }

    pub fn integrity_checks_enabled(&self) -> bool {
        self.lock().integrity_checks
    }

    /// Current rows of `table`, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<IndexMap<String, Value>> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Current values of one column, in insertion order.
    pub fn column_values(&self, table: &str, column: &str) -> Vec<Value> {
        self.rows(table)
            .into_iter()
            .map(|row| row.get(column).cloned().unwrap_or(Value::Null))
            .collect()
    }

    fn missing_table(table: &str) -> AnonKitError {
        AnonKitError::Other(format!("no such table: {}", table))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AnonymizationStore for MemoryStore {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    async fn has_table(&self, table: &str) -> Result<bool> {
        Ok(self.lock().tables.contains_key(table))
    }

    async fn has_column(&self, table: &str, column: &str) -> Result<bool> {
        Ok(self
            .lock()
            .tables
            .get(table)
            .is_some_and(|t| t.columns.iter().any(|c| c == column)))
    }

    async fn count_rows(&self, table: &str) -> Result<u64> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.rows.len() as u64)
            .ok_or_else(|| Self::missing_table(table))
    }

    async fn nullify_column(&self, table: &str, column: &str) -> Result<()> {
        let mut state = self.lock();
        state.statements.push(Statement::Nullify {
            table: table.to_string(),
            column: column.to_string(),
        });
        let t = state
            .tables
            .get_mut(table)
            .ok_or_else(|| Self::missing_table(table))?;
        for row in t.rows.iter_mut() {
            row.insert(column.to_string(), Value::Null);
        }
        Ok(())
    }

    async fn fetch_primary_keys(
        &self,
        table: &str,
        primary_key: &str,
        after: Option<&Value>,
        limit: usize,
    ) -> Result<Vec<Value>> {
        let mut state = self.lock();
        state.statements.push(Statement::FetchChunk {
            table: table.to_string(),
            after: after.cloned(),
            limit,
        });
        let t = state
            .tables
            .get(table)
            .ok_or_else(|| Self::missing_table(table))?;
        let mut keys: Vec<Value> = t
            .rows
            .iter()
            .filter_map(|row| row.get(primary_key).cloned())
            .filter(|key| after.is_none_or(|last| key.key_cmp(last) == Ordering::Greater))
            .collect();
        keys.sort_by(|a, b| a.key_cmp(b));
        keys.truncate(limit);
        Ok(keys)
    }

    async fn update_row(
        &self,
        table: &str,
        primary_key: &str,
        key: &Value,
        update: &RowUpdate,
    ) -> Result<()> {
        let mut state = self.lock();
        if update.is_empty() {
            return Ok(());
        }
        state.statements.push(Statement::Update {
            table: table.to_string(),
            key: key.clone(),
            update: update.clone(),
        });
        let t = state
            .tables
            .get_mut(table)
            .ok_or_else(|| Self::missing_table(table))?;
        for row in t.rows.iter_mut() {
            let matches = row
                .get(primary_key)
                .is_some_and(|k| k.key_cmp(key) == Ordering::Equal);
            if matches {
                for (column, value) in update {
                    row.insert(column.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    async fn set_integrity_checks(&self, enabled: bool) -> Result<()> {
        let mut state = self.lock();
        state.statements.push(Statement::IntegrityChecks(enabled));
        state.integrity_checks = enabled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keyset_pages_cover_all_rows() {
        let store = MemoryStore::new().with_numbered_rows("t", "id", &["name"], 7);
        let first = store.fetch_primary_keys("t", "id", None, 3).await.unwrap();
        assert_eq!(first, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let last = store
            .fetch_primary_keys("t", "id", Some(&Value::Int(6)), 3)
            .await
            .unwrap();
        assert_eq!(last, vec![Value::Int(7)]);
    }

    #[tokio::test]
    async fn test_update_and_nullify() {
        let store = MemoryStore::new().with_numbered_rows("t", "id", &["a", "b"], 2);
        store.nullify_column("t", "b").await.unwrap();
        let mut update = RowUpdate::new();
        update.insert("a".to_string(), Value::from("x"));
        store.update_row("t", "id", &Value::Int(2), &update).await.unwrap();

        assert_eq!(store.column_values("t", "a"), vec![Value::from("a-1"), Value::from("x")]);
        assert_eq!(store.column_values("t", "b"), vec![Value::Null, Value::Null]);
        assert_eq!(store.update_count("t"), 1);
    }

    #[tokio::test]
    async fn test_schema_checks() {
        let store = MemoryStore::new().with_table("t", &["id", "email"], vec![]);
        assert!(store.has_table("t").await.unwrap());
        assert!(!store.has_table("u").await.unwrap());
        assert!(store.has_column("t", "email").await.unwrap());
        assert!(!store.has_column("t", "phone").await.unwrap());
        assert_eq!(store.count_rows("t").await.unwrap(), 0);
    }
}
