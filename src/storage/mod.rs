//! Storage backend abstraction
//!
//! The ingestion pipeline and the query layer only talk to a [`Database`]: a
//! handle that executes SQL, inserts batches of rows as one multi-row
//! statement, returns row sets and checkpoints the write-ahead log.
//! PostgreSQL is the production backend (see [`crate::postgres`]),
//! [`memory::MemoryDatabase`] backs the tests.

pub mod errors;
pub mod memory;
pub mod schema;

use async_trait::async_trait;
use serde::Serialize;

pub use errors::StorageError;
pub use memory::MemoryDatabase;
pub use schema::SchemaMigrator;

/// A single SQL value, either bound into an insert or read back from a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(serde_json::Value),
    Timestamp(chrono::DateTime<chrono::Utc>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            SqlValue::Float(v) => float_to_i64(*v),
            SqlValue::Text(v) => v.parse().ok(),
            SqlValue::Timestamp(v) => Some(v.timestamp_millis()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

/// Exact conversion only: fractional, non-finite and out-of-range floats are `None`.
fn float_to_i64(value: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if value.is_finite() && value.fract() == 0.0 && (-LIMIT..LIMIT).contains(&value) {
        Some(value as i64)
    } else {
        None
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(value: serde_json::Value) -> Self {
        SqlValue::Json(value)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for SqlValue {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Self {
        SqlValue::Timestamp(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One row of a query result, addressed by column position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn value(&self, idx: usize) -> Result<&SqlValue, StorageError> {
        self.values
            .get(idx)
            .ok_or_else(|| StorageError::conversion(idx.to_string(), "column index out of range"))
    }

    pub fn i64(&self, idx: usize) -> Result<i64, StorageError> {
        self.opt_i64(idx)?
            .ok_or_else(|| StorageError::conversion(idx.to_string(), "expected a non-null integer"))
    }

    pub fn opt_i64(&self, idx: usize) -> Result<Option<i64>, StorageError> {
        match self.value(idx)? {
            SqlValue::Null => Ok(None),
            value => value
                .as_i64()
                .map(Some)
                .ok_or_else(|| StorageError::conversion(idx.to_string(), format!("expected an integer, got {:?}", value))),
        }
    }

    pub fn text(&self, idx: usize) -> Result<String, StorageError> {
        self.opt_text(idx)?
            .ok_or_else(|| StorageError::conversion(idx.to_string(), "expected non-null text"))
    }

    pub fn opt_text(&self, idx: usize) -> Result<Option<String>, StorageError> {
        match self.value(idx)? {
            SqlValue::Null => Ok(None),
            SqlValue::Text(v) => Ok(Some(v.clone())),
            SqlValue::Json(v) => Ok(Some(v.to_string())),
            value => Err(StorageError::conversion(idx.to_string(), format!("expected text, got {:?}", value))),
        }
    }

    pub fn timestamp(&self, idx: usize) -> Result<chrono::DateTime<chrono::Utc>, StorageError> {
        match self.value(idx)? {
            SqlValue::Timestamp(v) => Ok(*v),
            value => Err(StorageError::conversion(idx.to_string(), format!("expected a timestamp, got {:?}", value))),
        }
    }

    pub fn bool(&self, idx: usize) -> Result<bool, StorageError> {
        self.value(idx)?
            .as_bool()
            .ok_or_else(|| StorageError::conversion(idx.to_string(), "expected a boolean"))
    }
}

/// Executable SQL backend shared by every ingestion worker and reader.
///
/// Implementations must be safe to call from many tasks at once; each call
/// may use its own connection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Database: Send + Sync {
    /// Execute a statement that returns no rows, returning the affected row count.
    async fn execute(&self, sql: &str) -> Result<u64, StorageError>;

    /// Insert `rows` into `table` as one multi-row statement inside a transaction.
    async fn insert_batch(
        &self,
        table: &'static str,
        columns: &'static [&'static str],
        rows: Vec<Vec<SqlValue>>,
    ) -> Result<u64, StorageError>;

    /// Run a SELECT and collect every row.
    async fn query(&self, sql: &str) -> Result<Vec<Row>, StorageError>;

    /// Checkpoint and truncate the write-ahead log.
    async fn checkpoint(&self) -> Result<(), StorageError>;
}

/// Quote a string as a SQL literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
