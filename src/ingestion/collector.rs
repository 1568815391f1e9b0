use std::sync::Arc;

use tracing::{debug, info};

use super::enhancers::EventTypeEnhancer;
use super::entity_writer::EntityWriter;
use super::errors::IngestionError;
use super::result::{EventThread, EventType, EventWriterResult};
use super::rows::{EventTypeRow, ThreadRow};
use super::thread_cleanup::clean_threads;
use crate::common::structs::TimestampMS;
use crate::storage::Database;

/// Finalized output of a whole ingestion run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CombinedResult {
    /// Ordered by name.
    pub event_types: Vec<EventType>,
    pub threads: Vec<EventThread>,
    pub latest_event: Option<TimestampMS>,
}

impl CombinedResult {
    pub fn event_type(&self, name: &str) -> Option<&EventType> {
        self.event_types.iter().find(|event_type| event_type.name == name)
    }
}

impl EventType {
    pub fn to_row(&self) -> Result<EventTypeRow, serde_json::Error> {
        Ok(EventTypeRow {
            name: self.name.clone(),
            label: self.label.clone(),
            samples: self.samples,
            weight: self.weight,
            has_stacktraces: self.has_stacktraces,
            params: serde_json::to_string(&self.params)?,
        })
    }
}

/// Folds worker results and finalizes them once every worker has completed.
///
/// Single caller by contract: the orchestrator joins all workers first.
#[derive(Debug, Default)]
pub struct ResultCollector {
    combined: EventWriterResult,
    partials: usize,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, partial: EventWriterResult) {
        let combined = std::mem::take(&mut self.combined);
        self.combined = combined.merge(partial);
        self.partials += 1;
        debug!(partials = self.partials, "Merged worker result");
    }

    pub fn partials(&self) -> usize {
        self.partials
    }

    /// Enhance every event type and clean thread names without touching storage.
    pub fn finalize(self) -> CombinedResult {
        let EventWriterResult {
            threads,
            event_types,
            active_settings,
            latest_event,
            ..
        } = self.combined;

        let enhancers = EventTypeEnhancer::resolve(&active_settings);
        let event_types = event_types
            .into_values()
            .map(|mut builder| {
                for enhancer in &enhancers {
                    if enhancer.is_applicable(&builder) {
                        enhancer.apply(&mut builder);
                    }
                }
                let params = active_settings.params(&builder.code).cloned();
                builder.build(params.as_ref())
            })
            .collect();

        CombinedResult {
            event_types,
            threads: clean_threads(threads),
            latest_event,
        }
    }

    /// Finalize and persist event types and threads.
    pub async fn combine(
        self,
        database: Arc<dyn Database>,
        profile_id: Arc<str>,
        batch_size: usize,
    ) -> Result<CombinedResult, IngestionError> {
        let combined = self.finalize();

        let mut types: EntityWriter<EventTypeRow> =
            EntityWriter::new(Arc::clone(&database), Arc::clone(&profile_id), batch_size);
        for event_type in &combined.event_types {
            types.insert(event_type.to_row()?).await?;
        }
        let types_written = types.close().await?;

        let mut threads: EntityWriter<ThreadRow> = EntityWriter::new(database, Arc::clone(&profile_id), batch_size);
        for thread in &combined.threads {
            threads
                .insert(ThreadRow {
                    thread_id: thread.thread_id,
                    java_id: thread.java_id,
                    os_id: thread.os_id,
                    name: thread.name.clone(),
                })
                .await?;
        }
        let threads_written = threads.close().await?;

        info!(
            profile_id = %profile_id,
            event_types = types_written,
            threads = threads_written,
            "✅ Event types and threads persisted"
        );
        Ok(combined)
    }
}
