use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::errors::ProfileError;
use super::structs::ProfileInfo;
use crate::common::constants::*;
use crate::ingestion::result::SettingParams;
use crate::ingestion::rows::decode_frames;
use crate::ingestion::{EventThread, EventType};
use crate::query::{GenericQueryBuilder, TimeseriesMode, TimeseriesQueryBuilder, TimeseriesSeries};
use crate::storage::{quote_literal, Database, Row, StorageError};

/// Series of one stack trace in the per-stack-trace timeseries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StacktraceSeries {
    pub stacktrace_id: i64,
    pub frames: Vec<String>,
    pub series: TimeseriesSeries,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Timeseries {
    Bucketed { points: Vec<(i64, i64)> },
    PerStacktrace { stacktraces: Vec<StacktraceSeries> },
}

/// Read access to persisted profiles.
pub struct ProfileQueries {
    database: Arc<dyn Database>,
}

impl ProfileQueries {
    pub fn new(database: Arc<dyn Database>) -> Self {
        Self { database }
    }

    pub async fn profile(&self, profile_id: &str) -> Result<Option<ProfileInfo>, ProfileError> {
        let sql = format!(
            "SELECT profile_id, recording_id, name, created_at, latest_event_at, initialized FROM {} WHERE profile_id = {}",
            PROFILES_TABLE,
            quote_literal(profile_id)
        );
        let rows = self.database.query(&sql).await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };

        Ok(Some(ProfileInfo {
            profile_id: row.text(0)?,
            recording_id: row.text(1)?,
            name: row.text(2)?,
            created_at: row.timestamp(3)?,
            latest_event_at: row.opt_i64(4)?,
            initialized: row.bool(5)?,
        }))
    }

    pub async fn event_types(&self, profile_id: &str) -> Result<Vec<EventType>, ProfileError> {
        let sql = format!(
            "SELECT name, label, samples, weight, has_stacktraces, params FROM {} WHERE profile_id = {} ORDER BY name",
            EVENT_TYPES_TABLE,
            quote_literal(profile_id)
        );
        let rows = self.database.query(&sql).await?;
        rows.iter()
            .map(|row| {
                let params: SettingParams = serde_json::from_str(&row.text(5)?)
                    .map_err(|e| StorageError::conversion("params", e.to_string()))?;
                Ok(EventType {
                    name: row.text(0)?,
                    label: row.text(1)?,
                    samples: row.i64(2)?,
                    weight: row.opt_i64(3)?,
                    has_stacktraces: row.bool(4)?,
                    params,
                    columns: Default::default(),
                })
            })
            .collect()
    }

    pub async fn threads(&self, profile_id: &str) -> Result<Vec<EventThread>, ProfileError> {
        let sql = format!(
            "SELECT thread_id, java_id, os_id, name FROM {} WHERE profile_id = {} ORDER BY thread_id",
            THREADS_TABLE,
            quote_literal(profile_id)
        );
        let rows = self.database.query(&sql).await?;
        rows.iter()
            .map(|row| {
                Ok(EventThread {
                    thread_id: row.i64(0)?,
                    java_id: row.opt_i64(1)?,
                    os_id: row.opt_i64(2)?,
                    name: row.text(3)?,
                })
            })
            .collect()
    }

    pub async fn events(&self, builder: &GenericQueryBuilder) -> Result<Vec<Row>, ProfileError> {
        Ok(self.database.query(&builder.build()).await?)
    }

    pub async fn timeseries(&self, builder: &TimeseriesQueryBuilder) -> Result<Timeseries, ProfileError> {
        let rows = self.database.query(&builder.build()).await?;
        match builder.mode() {
            TimeseriesMode::Bucketed => {
                let points = rows
                    .iter()
                    .map(|row| Ok((row.i64(0)?, row.opt_i64(1)?.unwrap_or(0))))
                    .collect::<Result<Vec<_>, StorageError>>()?;
                Ok(Timeseries::Bucketed { points })
            }
            TimeseriesMode::PerStacktrace => {
                let mut stacktraces = Vec::with_capacity(rows.len());
                for row in &rows {
                    stacktraces.push(StacktraceSeries {
                        stacktrace_id: row.i64(0)?,
                        frames: decode_frames(&row.text(1)?),
                        series: TimeseriesSeries::parse(&row.opt_text(2)?.unwrap_or_default())?,
                    });
                }
                Ok(Timeseries::PerStacktrace { stacktraces })
            }
        }
    }

    /// Remove every row belonging to the profile, the profile row last.
    pub async fn delete_profile(&self, profile_id: &str) -> Result<u64, ProfileError> {
        let mut deleted = 0;
        for table in [
            EVENT_FIELDS_TABLE,
            EVENTS_TABLE,
            STACKTRACE_TAGS_TABLE,
            STACKTRACES_TABLE,
            EVENT_TYPES_TABLE,
            THREADS_TABLE,
            PROFILES_TABLE,
        ] {
            let sql = format!("DELETE FROM {} WHERE profile_id = {}", table, quote_literal(profile_id));
            deleted += self.database.execute(&sql).await?;
        }
        info!(profile_id, rows = deleted, "🗑️ Profile deleted");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::EventQueryConfigurer;
    use crate::storage::{MemoryDatabase, SqlValue};

    #[tokio::test]
    async fn test_event_types_decode_params() {
        let db = Arc::new(MemoryDatabase::new());
        db.script_query(
            "FROM event_types",
            vec![Row::new(vec![
                SqlValue::Text(EXECUTION_SAMPLE.into()),
                SqlValue::Text("CPU Samples".into()),
                SqlValue::Int(10),
                SqlValue::Null,
                SqlValue::Bool(true),
                SqlValue::Text(r#"{"source":"jdk"}"#.into()),
            ])],
        );

        let types = ProfileQueries::new(db.clone()).event_types("p1").await.unwrap();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].params.get(PARAM_SOURCE).map(String::as_str), Some(SOURCE_JDK));
        assert_eq!(types[0].weight, None);
        assert!(db.queries()[0].contains("WHERE profile_id = 'p1' ORDER BY name"));
    }

    #[tokio::test]
    async fn test_per_stacktrace_timeseries_is_decoded() {
        let db = Arc::new(MemoryDatabase::new());
        db.script_query(
            "string_agg",
            vec![Row::new(vec![
                SqlValue::Int(4),
                SqlValue::Text("Main.run\nMain.main".into()),
                SqlValue::Text("0,2;3,1".into()),
            ])],
        );
        let builder = TimeseriesQueryBuilder::new(
            "p1",
            EventQueryConfigurer::new().with_event_type(EXECUTION_SAMPLE).with_include_frames(),
        )
        .unwrap();

        match ProfileQueries::new(db).timeseries(&builder).await.unwrap() {
            Timeseries::PerStacktrace { stacktraces } => {
                assert_eq!(stacktraces[0].stacktrace_id, 4);
                assert_eq!(stacktraces[0].frames, vec!["Main.run", "Main.main"]);
                assert_eq!(stacktraces[0].series.points, vec![(0, 2), (3, 1)]);
            }
            other => panic!("Expected per-stacktrace series, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_profile_touches_every_table() {
        let db = Arc::new(MemoryDatabase::new());
        ProfileQueries::new(db.clone()).delete_profile("p1").await.unwrap();

        let statements = db.statements();
        assert_eq!(statements.len(), 7);
        assert_eq!(statements[6], "DELETE FROM profiles WHERE profile_id = 'p1'");
    }

    #[tokio::test]
    async fn test_missing_profile_is_none() {
        let db = Arc::new(MemoryDatabase::new());
        assert!(ProfileQueries::new(db).profile("nope").await.unwrap().is_none());
    }
}
