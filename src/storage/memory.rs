//! In-memory [`Database`] used by tests and dry runs.
//!
//! Inserted rows are kept per table, executed statements are recorded, and
//! query results are scripted by SQL fragment.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use super::{Database, Row, SqlValue, StorageError};

#[derive(Default)]
struct MemoryState {
    tables: HashMap<String, Vec<Vec<SqlValue>>>,
    statements: Vec<String>,
    queries: Vec<String>,
    scripted: Vec<(String, Vec<Row>)>,
    failing_tables: Vec<String>,
    failing_queries: Vec<String>,
    batch_sizes: HashMap<String, Vec<usize>>,
}

#[derive(Default)]
pub struct MemoryDatabase {
    state: Mutex<MemoryState>,
    checkpoints: AtomicUsize,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every query containing `fragment` returns `rows`.
    pub fn script_query(&self, fragment: impl Into<String>, rows: Vec<Row>) {
        self.state().scripted.push((fragment.into(), rows));
    }

    /// Every insert into `table` fails from now on.
    pub fn fail_inserts_into(&self, table: impl Into<String>) {
        self.state().failing_tables.push(table.into());
    }

    /// Every query containing `fragment` fails from now on.
    pub fn fail_queries_containing(&self, fragment: impl Into<String>) {
        self.state().failing_queries.push(fragment.into());
    }

    pub fn rows(&self, table: &str) -> Vec<Vec<SqlValue>> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.state().tables.get(table).map(Vec::len).unwrap_or(0)
    }

    /// Sizes of the multi-row inserts issued against `table`, in order.
    pub fn batch_sizes(&self, table: &str) -> Vec<usize> {
        self.state().batch_sizes.get(table).cloned().unwrap_or_default()
    }

    pub fn statements(&self) -> Vec<String> {
        self.state().statements.clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.state().queries.clone()
    }

    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn execute(&self, sql: &str) -> Result<u64, StorageError> {
        self.state().statements.push(sql.to_string());
        Ok(0)
    }

    async fn insert_batch(
        &self,
        table: &'static str,
        columns: &'static [&'static str],
        rows: Vec<Vec<SqlValue>>,
    ) -> Result<u64, StorageError> {
        let mut state = self.state();
        if state.failing_tables.iter().any(|t| t == table) {
            return Err(StorageError::Unavailable(format!("inserts into '{}' are failing", table)));
        }
        if let Some(bad) = rows.iter().find(|row| row.len() != columns.len()) {
            return Err(StorageError::conversion(
                table,
                format!("expected {} values, got {}", columns.len(), bad.len()),
            ));
        }

        let count = rows.len();
        debug!(table, rows = count, "memory insert");
        state.batch_sizes.entry(table.to_string()).or_default().push(count);
        state.tables.entry(table.to_string()).or_default().extend(rows);
        Ok(count as u64)
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>, StorageError> {
        let mut state = self.state();
        state.queries.push(sql.to_string());
        if state.failing_queries.iter().any(|f| sql.contains(f.as_str())) {
            return Err(StorageError::Unavailable("scripted query failure".to_string()));
        }
        Ok(state
            .scripted
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    async fn checkpoint(&self) -> Result<(), StorageError> {
        self.checkpoints.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
