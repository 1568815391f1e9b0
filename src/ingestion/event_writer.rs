use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use super::entity_writer::EntityWriters;
use super::errors::IngestionError;
use super::records::*;
use super::result::{EventThread, EventTypeBuilder, EventWriterResult};
use super::rows::{encode_frames, EventFieldsRow, EventRow, StacktraceRow, StacktraceTagRow};
use super::sequences::ProfileSequences;
use crate::storage::Database;

/// Ingestion writer owned by exactly one parsing worker.
///
/// Events, fields, stack traces and tags go straight to the worker's entity
/// writers. Fields of the latest event are held back until the next event
/// arrives or the worker completes, so every event gets at most one
/// `event_fields` row. Threads and type statistics are only accumulated; the
/// collector persists them after every worker completed.
pub struct EventWriter {
    profile_id: Arc<str>,
    worker: String,
    sequences: Arc<ProfileSequences>,
    writers: EntityWriters,
    result: EventWriterResult,
    stacktrace_ids: FxHashMap<u64, i64>,
    thread_ids: FxHashMap<u64, i64>,
    last_event: Option<(i64, String)>,
    pending_fields: Option<(i64, serde_json::Value)>,
}

impl EventWriter {
    pub fn new(
        database: Arc<dyn Database>,
        profile_id: Arc<str>,
        sequences: Arc<ProfileSequences>,
        batch_size: usize,
    ) -> Self {
        Self {
            writers: EntityWriters::new(database, Arc::clone(&profile_id), batch_size),
            profile_id,
            worker: String::new(),
            sequences,
            result: EventWriterResult::new(),
            stacktrace_ids: FxHashMap::default(),
            thread_ids: FxHashMap::default(),
            last_event: None,
            pending_fields: None,
        }
    }

    pub fn on_thread_start(&mut self, worker: &str) {
        self.worker = worker.to_string();
        debug!(profile_id = %self.profile_id, worker, "Ingestion worker started");
    }

    pub async fn on_event(&mut self, event: RawEvent) -> Result<(), IngestionError> {
        let event_id = self.sequences.next_event_id();
        let stacktrace_id = event.stacktrace.and_then(|key| self.stacktrace_ids.get(&key).copied());
        let thread_id = event.thread.and_then(|key| self.thread_ids.get(&key).copied());
        if event.stacktrace.is_some() && stacktrace_id.is_none() {
            debug!(event_type = %event.event_type, "Event references an unknown stack trace");
        }

        let builder = self
            .result
            .event_types
            .entry(event.event_type.clone())
            .or_insert_with(|| EventTypeBuilder::new(event.event_type.clone()));
        builder.add_event(event.samples, event.weight);
        if stacktrace_id.is_some() {
            builder.has_stacktraces = true;
            self.result.types_with_stacktraces.insert(event.event_type.clone());
        }
        self.result.latest_event = Some(
            self.result
                .latest_event
                .map_or(event.timestamp, |latest| latest.max(event.timestamp)),
        );

        self.writers
            .events
            .insert(EventRow {
                event_id,
                event_type: event.event_type.clone(),
                timestamp: event.timestamp,
                timestamp_from_start: event.timestamp_from_start,
                duration: event.duration,
                samples: event.samples,
                weight: event.weight,
                weight_entity: event.weight_entity,
                thread_id,
                stacktrace_id,
            })
            .await?;
        self.flush_fields().await?;
        self.last_event = Some((event_id, event.event_type));

        if let Some(fields) = event.fields {
            self.on_event_fields(RawEventFields { fields }).await?;
        }
        Ok(())
    }

    /// Attach auxiliary fields to the most recently written event.
    ///
    /// Repeated fields for the same event are merged key by key, later keys
    /// winning; a non-object value replaces what was collected so far.
    pub async fn on_event_fields(&mut self, fields: RawEventFields) -> Result<(), IngestionError> {
        let (event_id, event_type) = self.last_event.as_ref().ok_or(IngestionError::OrphanFields)?;
        let event_id = *event_id;

        if let Some(object) = fields.fields.as_object() {
            if let Some(builder) = self.result.event_types.get_mut(event_type) {
                builder.columns.extend(object.keys().cloned());
            }
        }

        let same_event = matches!(&self.pending_fields, Some((pending_id, _)) if *pending_id == event_id);
        if same_event {
            if let Some((_, existing)) = self.pending_fields.as_mut() {
                merge_fields(existing, fields.fields);
            }
        } else {
            self.flush_fields().await?;
            self.pending_fields = Some((event_id, fields.fields));
        }
        Ok(())
    }

    async fn flush_fields(&mut self) -> Result<(), IngestionError> {
        if let Some((event_id, fields)) = self.pending_fields.take() {
            let row = EventFieldsRow {
                event_id,
                fields: serde_json::to_string(&fields)?,
            };
            self.writers.event_fields.insert(row).await?;
        }
        Ok(())
    }

    pub fn on_event_setting(&mut self, setting: RawEventSetting) {
        self.result
            .active_settings
            .record(&setting.event_type, &setting.name, &setting.value);
    }

    pub fn on_event_type(&mut self, event_type: RawEventType) {
        let builder = self
            .result
            .event_types
            .entry(event_type.code.clone())
            .or_insert_with(|| EventTypeBuilder::new(event_type.code));
        builder.label = Some(event_type.label);
        builder.columns.extend(event_type.columns);
    }

    pub async fn on_event_stacktrace(&mut self, stacktrace: RawStacktrace) -> Result<(), IngestionError> {
        if self.stacktrace_ids.contains_key(&stacktrace.key) {
            warn!(key = stacktrace.key, "Duplicate stack trace key ignored");
            return Ok(());
        }

        let stacktrace_id = self.sequences.next_stacktrace_id();
        self.stacktrace_ids.insert(stacktrace.key, stacktrace_id);

        self.writers
            .stacktraces
            .insert(StacktraceRow {
                stacktrace_id,
                type_id: stacktrace.type_id.id(),
                frames: encode_frames(&stacktrace.frames),
            })
            .await?;
        for tag in stacktrace.tags {
            self.writers
                .stacktrace_tags
                .insert(StacktraceTagRow {
                    stacktrace_id,
                    tag_id: tag.id(),
                })
                .await?;
        }
        Ok(())
    }

    /// Allocate the thread ID now; the row is written by the collector after cleanup.
    pub fn on_event_thread(&mut self, thread: RawThread) {
        if self.thread_ids.contains_key(&thread.key) {
            warn!(key = thread.key, "Duplicate thread key ignored");
            return;
        }

        let thread_id = self.sequences.next_thread_id();
        self.thread_ids.insert(thread.key, thread_id);
        self.result.threads.push(EventThread {
            thread_id,
            java_id: thread.java_id,
            os_id: thread.os_id,
            name: thread.name.unwrap_or_default(),
        });
    }

    pub async fn apply(&mut self, record: ParsedRecord) -> Result<(), IngestionError> {
        match record {
            ParsedRecord::Event(event) => self.on_event(event).await,
            ParsedRecord::EventFields(fields) => self.on_event_fields(fields).await,
            ParsedRecord::EventSetting(setting) => {
                self.on_event_setting(setting);
                Ok(())
            }
            ParsedRecord::EventType(event_type) => {
                self.on_event_type(event_type);
                Ok(())
            }
            ParsedRecord::EventStacktrace(stacktrace) => self.on_event_stacktrace(stacktrace).await,
            ParsedRecord::EventThread(thread) => {
                self.on_event_thread(thread);
                Ok(())
            }
        }
    }

    /// Flush every entity writer and hand over the accumulated result.
    ///
    /// Once this returns `Ok`, the worker's events, fields, stack traces and
    /// tags are durably written.
    pub async fn on_thread_complete(mut self) -> Result<EventWriterResult, IngestionError> {
        let flushed = self.flush_fields().await;
        let closed = self.writers.close().await;
        flushed?;
        let counts = closed?;
        info!(
            profile_id = %self.profile_id,
            worker = %self.worker,
            events = counts.events,
            stacktraces = counts.stacktraces,
            threads = self.result.threads.len(),
            "✅ Ingestion worker completed"
        );
        Ok(self.result)
    }

    /// Failure path: flush what is buffered and discard the partial result.
    pub async fn abort(mut self) {
        if let Err(e) = self.flush_fields().await {
            warn!(profile_id = %self.profile_id, worker = %self.worker, "Pending event fields lost: {}", e);
        }
        match self.writers.close().await {
            Ok(counts) => warn!(
                profile_id = %self.profile_id,
                worker = %self.worker,
                events = counts.events,
                "Ingestion worker aborted, writers closed"
            ),
            Err(e) => warn!(
                profile_id = %self.profile_id,
                worker = %self.worker,
                "Ingestion worker aborted, closing writers failed: {}",
                e
            ),
        }
    }
}

fn merge_fields(existing: &mut serde_json::Value, incoming: serde_json::Value) {
    match incoming {
        serde_json::Value::Object(source) if existing.is_object() => {
            if let Some(target) = existing.as_object_mut() {
                target.extend(source);
            }
        }
        other => *existing = other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::constants::*;
    use crate::common::structs::{StacktraceTag, StacktraceType};
    use crate::storage::{MemoryDatabase, SqlValue};
    use serde_json::json;

    fn writer(db: &Arc<MemoryDatabase>, sequences: &Arc<ProfileSequences>) -> EventWriter {
        EventWriter::new(db.clone(), Arc::from("p1"), Arc::clone(sequences), 100)
    }

    fn event(event_type: &str, timestamp: i64, stacktrace: Option<u64>, thread: Option<u64>) -> RawEvent {
        RawEvent {
            event_type: event_type.to_string(),
            timestamp,
            timestamp_from_start: timestamp - 1000,
            duration: 0,
            samples: 1,
            weight: None,
            weight_entity: None,
            thread,
            stacktrace,
            fields: None,
        }
    }

    #[tokio::test]
    async fn test_event_references_are_resolved_to_allocated_ids() {
        let db = Arc::new(MemoryDatabase::new());
        let sequences = Arc::new(ProfileSequences::new());
        let mut writer = writer(&db, &sequences);
        writer.on_thread_start("chunk-0");

        writer.on_event_thread(RawThread { key: 77, java_id: Some(1), os_id: Some(10), name: Some("main".into()) });
        writer
            .on_event_stacktrace(RawStacktrace {
                key: 5,
                type_id: StacktraceType::Application,
                frames: vec!["Main.run".into(), "Main.main".into()],
                tags: vec![StacktraceTag::ExcludeIdle],
            })
            .await
            .unwrap();
        writer.on_event(event(EXECUTION_SAMPLE, 2000, Some(5), Some(77))).await.unwrap();
        writer.on_event(event(EXECUTION_SAMPLE, 1500, Some(999), None)).await.unwrap();

        let result = writer.on_thread_complete().await.unwrap();

        let events = db.rows(EVENTS_TABLE);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0][9], SqlValue::Int(1));
        assert_eq!(events[0][10], SqlValue::Int(1));
        assert_eq!(events[1][10], SqlValue::Null);
        assert_eq!(db.rows(STACKTRACES_TABLE)[0][3], SqlValue::Text("Main.run\nMain.main".into()));
        assert_eq!(db.rows(STACKTRACE_TAGS_TABLE)[0][2], SqlValue::Int(0));
        assert_eq!(db.row_count(THREADS_TABLE), 0);

        assert_eq!(result.threads.len(), 1);
        assert_eq!(result.latest_event, Some(2000));
        assert!(result.types_with_stacktraces.contains(EXECUTION_SAMPLE));
        assert_eq!(result.event_type(EXECUTION_SAMPLE).map(|b| b.samples), Some(2));
    }

    #[tokio::test]
    async fn test_fields_attach_to_latest_event() {
        let db = Arc::new(MemoryDatabase::new());
        let sequences = Arc::new(ProfileSequences::new());
        let mut writer = writer(&db, &sequences);

        let orphan = writer.on_event_fields(RawEventFields { fields: json!({"a": 1}) }).await;
        assert!(matches!(orphan, Err(IngestionError::OrphanFields)));

        let mut malloc = event(MALLOC, 1000, None, None);
        malloc.fields = Some(json!({"address": "0x10"}));
        writer.on_event(malloc).await.unwrap();

        let result = writer.on_thread_complete().await.unwrap();
        let fields = db.rows(EVENT_FIELDS_TABLE);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0][1], SqlValue::Int(1));
        assert_eq!(fields[0][2], SqlValue::Text(r#"{"address":"0x10"}"#.into()));
        assert!(result.event_type(MALLOC).unwrap().columns.contains(FIELD_ADDRESS));
    }

    #[tokio::test]
    async fn test_inline_and_trailing_fields_share_one_row() {
        let db = Arc::new(MemoryDatabase::new());
        let sequences = Arc::new(ProfileSequences::new());
        let mut writer = writer(&db, &sequences);

        let mut malloc = event(MALLOC, 1000, None, None);
        malloc.fields = Some(json!({"address": "0x1", "size": 4}));
        writer.on_event(malloc).await.unwrap();
        writer.on_event_fields(RawEventFields { fields: json!({"size": 8}) }).await.unwrap();
        writer.on_event(event(FREE, 1100, None, None)).await.unwrap();
        writer.on_event_fields(RawEventFields { fields: json!({"address": "0x1"}) }).await.unwrap();

        let result = writer.on_thread_complete().await.unwrap();
        let fields = db.rows(EVENT_FIELDS_TABLE);
        let event_ids: Vec<_> = fields.iter().map(|row| row[1].clone()).collect();
        assert_eq!(event_ids, vec![SqlValue::Int(1), SqlValue::Int(2)]);
        assert_eq!(fields[0][2], SqlValue::Text(r#"{"address":"0x1","size":8}"#.into()));
        assert!(result.event_type(MALLOC).unwrap().columns.contains("size"));
    }

    #[tokio::test]
    async fn test_settings_and_types_are_accumulated() {
        let db = Arc::new(MemoryDatabase::new());
        let sequences = Arc::new(ProfileSequences::new());
        let mut writer = writer(&db, &sequences);

        writer
            .apply(ParsedRecord::EventSetting(RawEventSetting {
                event_type: THREAD_PARK.into(),
                name: "enabled".into(),
                value: "true".into(),
            }))
            .await
            .unwrap();
        writer
            .apply(ParsedRecord::EventType(RawEventType {
                code: THREAD_PARK.into(),
                label: "Java Thread Park".into(),
                columns: vec!["parkedClass".into()],
            }))
            .await
            .unwrap();

        let result = writer.on_thread_complete().await.unwrap();
        assert!(result.active_settings.get(THREAD_PARK).unwrap().enabled);
        let builder = result.event_type(THREAD_PARK).unwrap();
        assert_eq!(builder.label.as_deref(), Some("Java Thread Park"));
        assert_eq!(builder.samples, 0);
    }

    #[tokio::test]
    async fn test_flush_failure_surfaces_on_complete() {
        let db = Arc::new(MemoryDatabase::new());
        db.fail_inserts_into(EVENTS_TABLE);
        let sequences = Arc::new(ProfileSequences::new());
        let mut writer = writer(&db, &sequences);
        writer.on_event(event(EXECUTION_SAMPLE, 1000, None, None)).await.unwrap();

        let result = writer.on_thread_complete().await;
        assert!(matches!(result, Err(IngestionError::Storage(_))));
    }
}
