use tracing::{debug, info};

use super::{Database, StorageError};
use crate::common::constants::*;

/// Creates the profiling tables and their indexes.
///
/// Every statement is idempotent, so migrating an existing database is a no-op.
#[derive(Debug, Clone, Default)]
pub struct SchemaMigrator;

impl SchemaMigrator {
    pub fn new() -> Self {
        Self
    }

    pub fn create_tables_sql(&self) -> Vec<String> {
        vec![
            format!(
                r#"CREATE TABLE IF NOT EXISTS {PROFILES_TABLE} (
                profile_id TEXT PRIMARY KEY,
                recording_id TEXT NOT NULL,
                name TEXT NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL,
                latest_event_at BIGINT,
                initialized BOOLEAN NOT NULL DEFAULT FALSE
            )"#
            ),
            format!(
                r#"CREATE TABLE IF NOT EXISTS {EVENTS_TABLE} (
                profile_id TEXT NOT NULL,
                event_id BIGINT NOT NULL,
                event_type TEXT NOT NULL,
                timestamp BIGINT NOT NULL,
                timestamp_from_start BIGINT NOT NULL,
                duration BIGINT NOT NULL,
                samples BIGINT NOT NULL,
                weight BIGINT,
                weight_entity TEXT,
                thread_id BIGINT,
                stacktrace_id BIGINT,
                PRIMARY KEY (profile_id, event_id)
            )"#
            ),
            format!(
                r#"CREATE TABLE IF NOT EXISTS {EVENT_FIELDS_TABLE} (
                profile_id TEXT NOT NULL,
                event_id BIGINT NOT NULL,
                fields TEXT NOT NULL,
                PRIMARY KEY (profile_id, event_id)
            )"#
            ),
            format!(
                r#"CREATE TABLE IF NOT EXISTS {EVENT_TYPES_TABLE} (
                profile_id TEXT NOT NULL,
                name TEXT NOT NULL,
                label TEXT NOT NULL,
                samples BIGINT NOT NULL,
                weight BIGINT,
                has_stacktraces BOOLEAN NOT NULL,
                params TEXT NOT NULL,
                PRIMARY KEY (profile_id, name)
            )"#
            ),
            format!(
                r#"CREATE TABLE IF NOT EXISTS {STACKTRACES_TABLE} (
                profile_id TEXT NOT NULL,
                stacktrace_id BIGINT NOT NULL,
                type_id BIGINT NOT NULL,
                frames TEXT NOT NULL,
                PRIMARY KEY (profile_id, stacktrace_id)
            )"#
            ),
            format!(
                r#"CREATE TABLE IF NOT EXISTS {STACKTRACE_TAGS_TABLE} (
                profile_id TEXT NOT NULL,
                stacktrace_id BIGINT NOT NULL,
                tag_id BIGINT NOT NULL,
                PRIMARY KEY (profile_id, stacktrace_id, tag_id)
            )"#
            ),
            format!(
                r#"CREATE TABLE IF NOT EXISTS {THREADS_TABLE} (
                profile_id TEXT NOT NULL,
                thread_id BIGINT NOT NULL,
                java_id BIGINT,
                os_id BIGINT,
                name TEXT NOT NULL,
                PRIMARY KEY (profile_id, thread_id)
            )"#
            ),
        ]
    }

    pub fn create_indexes_sql(&self) -> Vec<String> {
        vec![
            format!("CREATE INDEX IF NOT EXISTS idx_{EVENTS_TABLE}_type ON {EVENTS_TABLE} (profile_id, event_type, timestamp_from_start)"),
            format!("CREATE INDEX IF NOT EXISTS idx_{EVENTS_TABLE}_stacktrace ON {EVENTS_TABLE} (profile_id, stacktrace_id)"),
            format!("CREATE INDEX IF NOT EXISTS idx_{EVENTS_TABLE}_thread ON {EVENTS_TABLE} (profile_id, thread_id)"),
            format!("CREATE INDEX IF NOT EXISTS idx_{STACKTRACE_TAGS_TABLE}_tag ON {STACKTRACE_TAGS_TABLE} (profile_id, tag_id)"),
        ]
    }

    pub async fn migrate(&self, database: &dyn Database) -> Result<(), StorageError> {
        let statements: Vec<String> = self
            .create_tables_sql()
            .into_iter()
            .chain(self.create_indexes_sql())
            .collect();

        for sql in &statements {
            debug!("Applying schema statement: {}", sql.lines().next().unwrap_or_default());
            database.execute(sql).await?;
        }

        info!("✅ Profile schema ready ({} statements)", statements.len());
        Ok(())
    }
}
