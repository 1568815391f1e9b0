use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, error};

use super::rows::{EntityRow, EventFieldsRow, EventRow, StacktraceRow, StacktraceTagRow};
use crate::storage::{Database, SqlValue, StorageError};

/// Append-only buffered writer for one table.
///
/// Rows are buffered until `batch_size` is reached and then written as one
/// multi-row insert. [`EntityWriter::close`] flushes the remainder; a writer
/// dropped with buffered rows reports the loss.
pub struct EntityWriter<R: EntityRow> {
    database: Arc<dyn Database>,
    profile_id: Arc<str>,
    batch_size: usize,
    buffer: Vec<Vec<SqlValue>>,
    written: usize,
    _row: PhantomData<fn(R)>,
}

impl<R: EntityRow> EntityWriter<R> {
    pub fn new(database: Arc<dyn Database>, profile_id: Arc<str>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            database,
            profile_id,
            batch_size,
            buffer: Vec::with_capacity(batch_size.min(1024)),
            written: 0,
            _row: PhantomData,
        }
    }

    pub async fn insert(&mut self, row: R) -> Result<(), StorageError> {
        let mut values = Vec::with_capacity(R::COLUMNS.len());
        values.push(SqlValue::Text(self.profile_id.to_string()));
        values.extend(row.into_values());
        self.buffer.push(values);

        if self.buffer.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), StorageError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let rows = std::mem::take(&mut self.buffer);
        let count = rows.len();
        self.database
            .insert_batch(R::TABLE, R::COLUMNS, rows)
            .await
            .map_err(|e| StorageError::write(&self.profile_id, R::TABLE, count, e))?;

        self.written += count;
        debug!(table = R::TABLE, rows = count, total = self.written, "Flushed batch");
        Ok(())
    }

    /// Rows buffered but not yet written.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Flush the remaining rows and return the total written by this writer.
    pub async fn close(mut self) -> Result<usize, StorageError> {
        self.flush().await?;
        Ok(self.written)
    }
}

impl<R: EntityRow> Drop for EntityWriter<R> {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            error!(
                table = R::TABLE,
                profile_id = %self.profile_id,
                rows = self.buffer.len(),
                "Entity writer dropped without close, buffered rows were not written"
            );
        }
    }
}

/// Row counts written by one [`EntityWriters`] group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WrittenCounts {
    pub events: usize,
    pub event_fields: usize,
    pub stacktraces: usize,
    pub stacktrace_tags: usize,
}

/// The writers owned by one ingestion worker.
pub struct EntityWriters {
    pub events: EntityWriter<EventRow>,
    pub event_fields: EntityWriter<EventFieldsRow>,
    pub stacktraces: EntityWriter<StacktraceRow>,
    pub stacktrace_tags: EntityWriter<StacktraceTagRow>,
}

impl EntityWriters {
    pub fn new(database: Arc<dyn Database>, profile_id: Arc<str>, batch_size: usize) -> Self {
        Self {
            events: EntityWriter::new(Arc::clone(&database), Arc::clone(&profile_id), batch_size),
            event_fields: EntityWriter::new(Arc::clone(&database), Arc::clone(&profile_id), batch_size),
            stacktraces: EntityWriter::new(Arc::clone(&database), Arc::clone(&profile_id), batch_size),
            stacktrace_tags: EntityWriter::new(database, profile_id, batch_size),
        }
    }

    /// Close every writer, even after an earlier one failed, and return the
    /// first failure.
    pub async fn close(self) -> Result<WrittenCounts, StorageError> {
        let events = self.events.close().await;
        let event_fields = self.event_fields.close().await;
        let stacktraces = self.stacktraces.close().await;
        let stacktrace_tags = self.stacktrace_tags.close().await;

        Ok(WrittenCounts {
            events: events?,
            event_fields: event_fields?,
            stacktraces: stacktraces?,
            stacktrace_tags: stacktrace_tags?,
        })
    }
}
