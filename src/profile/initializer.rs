use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::errors::ProfileError;
use super::parser::{RecordChunk, RecordingParser};
use super::recording::RecordingResolver;
use super::structs::{InitializationState, NewProfile};
use crate::common::constants::PROFILES_TABLE;
use crate::derived::{run_calculators, DerivedContext};
use crate::ingestion::{
    CombinedResult, EventWriter, EventWriterResult, IngestionConfig, ProfileSequences, ResultCollector,
};
use crate::storage::{quote_literal, Database, SqlValue};

const PROFILE_COLUMNS: &[&str] = &[
    "profile_id",
    "recording_id",
    "name",
    "created_at",
    "latest_event_at",
    "initialized",
];

/// Tracks and logs the phase of one run; only forward steps are allowed.
struct RunState {
    profile_id: Arc<str>,
    state: InitializationState,
}

impl RunState {
    fn new(profile_id: Arc<str>) -> Self {
        Self {
            profile_id,
            state: InitializationState::Created,
        }
    }

    fn transition(&mut self, to: InitializationState) -> Result<(), ProfileError> {
        if self.state.next() != Some(to) {
            return Err(ProfileError::InvalidTransition { from: self.state });
        }
        info!(profile_id = %self.profile_id, from = %self.state, to = %to, "🔄 Profile state transition");
        self.state = to;
        Ok(())
    }
}

/// Creates profiles and drives their ingestion from recording to finalized rows.
pub struct ProfileInitializer {
    database: Arc<dyn Database>,
    resolver: Arc<dyn RecordingResolver>,
    parser: Arc<dyn RecordingParser>,
    config: IngestionConfig,
}

impl ProfileInitializer {
    pub fn new(
        database: Arc<dyn Database>,
        resolver: Arc<dyn RecordingResolver>,
        parser: Arc<dyn RecordingParser>,
        config: IngestionConfig,
    ) -> Self {
        Self {
            database,
            resolver,
            parser,
            config,
        }
    }

    /// Resolve the recording and write a not-yet-initialized profile row.
    pub async fn new_profile(&self, recording_id: &str) -> Result<NewProfile, ProfileError> {
        let recording = self.resolver.resolve(recording_id)?;
        let profile = NewProfile {
            profile_id: Uuid::new_v4().to_string(),
            recording,
            created_at: Utc::now(),
        };

        let row = vec![
            SqlValue::from(profile.profile_id.as_str()),
            SqlValue::from(profile.recording.recording_id.as_str()),
            SqlValue::from(profile.recording.name.as_str()),
            SqlValue::from(profile.created_at),
            SqlValue::Null,
            SqlValue::Bool(false),
        ];
        self.database.insert_batch(PROFILES_TABLE, PROFILE_COLUMNS, vec![row]).await?;

        info!(
            profile_id = %profile.profile_id,
            recording_id,
            "📁 Profile created"
        );
        Ok(profile)
    }

    /// Resolve, create and fully ingest a profile; returns its id.
    pub async fn create_profile(&self, recording_id: &str) -> Result<String, ProfileError> {
        let profile = self.new_profile(recording_id).await?;
        self.initialize(&profile).await?;
        Ok(profile.profile_id)
    }

    /// Run the whole ingestion of `profile`.
    ///
    /// The write-ahead log is checkpointed after the merge phase and after the
    /// derived-events phase whether or not the phase succeeded. The profile is
    /// only marked initialized when every phase succeeded.
    pub async fn initialize(&self, profile: &NewProfile) -> Result<CombinedResult, ProfileError> {
        let profile_id: Arc<str> = Arc::from(profile.profile_id.as_str());
        let sequences = Arc::new(ProfileSequences::new());
        let mut run = RunState::new(Arc::clone(&profile_id));

        run.transition(InitializationState::Parsing)?;
        let partials = match self.parser.chunks(&profile.recording) {
            Ok(chunks) => {
                self.parse_chunks(chunks, Arc::clone(&profile_id), Arc::clone(&sequences))
                    .await
            }
            Err(e) => Err(e),
        };

        let merged = match partials {
            Ok(partials) => run.transition(InitializationState::Merging).map(|_| {
                let mut collector = ResultCollector::new();
                for partial in partials {
                    collector.add(partial);
                }
                collector
            }),
            Err(e) => Err(e),
        };
        let collector = self.with_checkpoint("merge", merged).await?;

        let finalized = self
            .finalize(collector, &mut run, Arc::clone(&profile_id), sequences)
            .await;
        let combined = self.with_checkpoint("derived events", finalized).await?;

        self.mark_initialized(&profile_id, &combined).await?;
        run.transition(InitializationState::Finalized)?;
        info!(
            profile_id = %profile_id,
            event_types = combined.event_types.len(),
            threads = combined.threads.len(),
            "✅ Profile initialized"
        );
        Ok(combined)
    }

    async fn finalize(
        &self,
        collector: ResultCollector,
        run: &mut RunState,
        profile_id: Arc<str>,
        sequences: Arc<ProfileSequences>,
    ) -> Result<CombinedResult, ProfileError> {
        run.transition(InitializationState::Enhancing)?;
        let combined = collector
            .combine(Arc::clone(&self.database), Arc::clone(&profile_id), self.config.batch_size)
            .await
            .map_err(|source| ProfileError::Ingestion {
                profile_id: profile_id.to_string(),
                source,
            })?;

        run.transition(InitializationState::DerivingEvents)?;
        let ctx = DerivedContext {
            database: Arc::clone(&self.database),
            profile_id: Arc::clone(&profile_id),
            sequences,
            batch_size: self.config.batch_size,
            combined: &combined,
        };
        run_calculators(&ctx).await.map_err(|source| ProfileError::Derived {
            profile_id: profile_id.to_string(),
            source,
        })?;
        Ok(combined)
    }

    /// Checkpoint after `phase`, keeping the phase's own error if it failed.
    async fn with_checkpoint<T>(&self, phase: &str, result: Result<T, ProfileError>) -> Result<T, ProfileError> {
        let checkpoint = self.database.checkpoint().await;
        match (result, checkpoint) {
            (Ok(value), Ok(())) => {
                debug!(phase, "Checkpoint completed");
                Ok(value)
            }
            (Ok(_), Err(e)) => {
                error!(phase, "Checkpoint failed: {}", e);
                Err(e.into())
            }
            (Err(original), Ok(())) => {
                warn!(phase, "Phase failed, log checkpointed: {}", original);
                Err(original)
            }
            (Err(original), Err(e)) => {
                error!(phase, "Phase failed and checkpoint failed too: {}", e);
                Err(original)
            }
        }
    }

    async fn mark_initialized(&self, profile_id: &str, combined: &CombinedResult) -> Result<(), ProfileError> {
        let latest = combined
            .latest_event
            .map(|ts| ts.to_string())
            .unwrap_or_else(|| "NULL".to_string());
        let sql = format!(
            "UPDATE {} SET initialized = TRUE, latest_event_at = {} WHERE profile_id = {}",
            PROFILES_TABLE,
            latest,
            quote_literal(profile_id)
        );
        self.database.execute(&sql).await?;
        Ok(())
    }

    /// One task and one writer per chunk, bounded by the configured parallelism.
    /// Every task is joined before returning; the first failure wins.
    async fn parse_chunks(
        &self,
        chunks: Vec<RecordChunk>,
        profile_id: Arc<str>,
        sequences: Arc<ProfileSequences>,
    ) -> Result<Vec<EventWriterResult>, ProfileError> {
        let permits = Arc::new(Semaphore::new(self.config.parallelism.max(1)));
        let capacity = self.config.channel_capacity.max(1);
        info!(profile_id = %profile_id, chunks = chunks.len(), "🚀 Parsing recording chunks");

        let mut tasks = JoinSet::new();
        for chunk in chunks {
            let permits = Arc::clone(&permits);
            let writer = EventWriter::new(
                Arc::clone(&self.database),
                Arc::clone(&profile_id),
                Arc::clone(&sequences),
                self.config.batch_size,
            );
            let profile_id = Arc::clone(&profile_id);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                ingest_chunk(writer, chunk, profile_id, capacity).await
            });
        }

        let mut partials = Vec::new();
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(ProfileError::from).and_then(|result| result);
            match outcome {
                Ok(partial) => partials.push(partial),
                Err(e) => {
                    error!(profile_id = %profile_id, "Ingestion worker failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(partials),
        }
    }
}

/// Drive one chunk through its writer. Records are read on the blocking pool
/// and handed over through a bounded channel.
async fn ingest_chunk(
    mut writer: EventWriter,
    chunk: RecordChunk,
    profile_id: Arc<str>,
    capacity: usize,
) -> Result<EventWriterResult, ProfileError> {
    let RecordChunk { name, records } = chunk;
    writer.on_thread_start(&name);

    let (tx, mut rx) = mpsc::channel(capacity);
    let reader = tokio::task::spawn_blocking(move || {
        for record in records {
            let failed = record.is_err();
            if tx.blocking_send(record).is_err() || failed {
                break;
            }
        }
    });

    let mut outcome = Ok(());
    while let Some(record) = rx.recv().await {
        let applied = match record {
            Ok(record) => writer.apply(record).await.map_err(|source| ProfileError::Ingestion {
                profile_id: profile_id.to_string(),
                source,
            }),
            Err(e) => Err(e),
        };
        if let Err(e) = applied {
            outcome = Err(e);
            break;
        }
    }
    drop(rx);

    let outcome = match reader.await {
        Ok(()) => outcome,
        Err(e) => outcome.and(Err(ProfileError::Join(e))),
    };
    match outcome {
        Ok(()) => writer
            .on_thread_complete()
            .await
            .map_err(|source| ProfileError::Ingestion {
                profile_id: profile_id.to_string(),
                source,
            }),
        Err(e) => {
            writer.abort().await;
            Err(e)
        }
    }
}
