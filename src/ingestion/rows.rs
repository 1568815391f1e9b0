//! Persisted row shapes, one per table written during ingestion.

use crate::common::constants::*;
use crate::common::structs::TimestampMS;
use crate::storage::SqlValue;

/// A row written through an [`EntityWriter`](super::EntityWriter).
///
/// `COLUMNS` starts with `profile_id`; the writer prepends that value, so
/// [`EntityRow::into_values`] yields the remaining columns in order.
pub trait EntityRow: Send + 'static {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    fn into_values(self) -> Vec<SqlValue>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub event_id: i64,
    pub event_type: String,
    pub timestamp: TimestampMS,
    pub timestamp_from_start: TimestampMS,
    pub duration: i64,
    pub samples: i64,
    pub weight: Option<i64>,
    pub weight_entity: Option<String>,
    pub thread_id: Option<i64>,
    pub stacktrace_id: Option<i64>,
}

impl EntityRow for EventRow {
    const TABLE: &'static str = EVENTS_TABLE;
    const COLUMNS: &'static [&'static str] = &[
        "profile_id",
        "event_id",
        "event_type",
        "timestamp",
        "timestamp_from_start",
        "duration",
        "samples",
        "weight",
        "weight_entity",
        "thread_id",
        "stacktrace_id",
    ];

    fn into_values(self) -> Vec<SqlValue> {
        vec![
            self.event_id.into(),
            self.event_type.into(),
            self.timestamp.into(),
            self.timestamp_from_start.into(),
            self.duration.into(),
            self.samples.into(),
            self.weight.into(),
            self.weight_entity.into(),
            self.thread_id.into(),
            self.stacktrace_id.into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventFieldsRow {
    pub event_id: i64,
    pub fields: String,
}

impl EntityRow for EventFieldsRow {
    const TABLE: &'static str = EVENT_FIELDS_TABLE;
    const COLUMNS: &'static [&'static str] = &["profile_id", "event_id", "fields"];

    fn into_values(self) -> Vec<SqlValue> {
        vec![self.event_id.into(), self.fields.into()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StacktraceRow {
    pub stacktrace_id: i64,
    pub type_id: i64,
    pub frames: String,
}

impl EntityRow for StacktraceRow {
    const TABLE: &'static str = STACKTRACES_TABLE;
    const COLUMNS: &'static [&'static str] = &["profile_id", "stacktrace_id", "type_id", "frames"];

    fn into_values(self) -> Vec<SqlValue> {
        vec![self.stacktrace_id.into(), self.type_id.into(), self.frames.into()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StacktraceTagRow {
    pub stacktrace_id: i64,
    pub tag_id: i64,
}

impl EntityRow for StacktraceTagRow {
    const TABLE: &'static str = STACKTRACE_TAGS_TABLE;
    const COLUMNS: &'static [&'static str] = &["profile_id", "stacktrace_id", "tag_id"];

    fn into_values(self) -> Vec<SqlValue> {
        vec![self.stacktrace_id.into(), self.tag_id.into()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventTypeRow {
    pub name: String,
    pub label: String,
    pub samples: i64,
    pub weight: Option<i64>,
    pub has_stacktraces: bool,
    pub params: String,
}

impl EntityRow for EventTypeRow {
    const TABLE: &'static str = EVENT_TYPES_TABLE;
    const COLUMNS: &'static [&'static str] = &[
        "profile_id",
        "name",
        "label",
        "samples",
        "weight",
        "has_stacktraces",
        "params",
    ];

    fn into_values(self) -> Vec<SqlValue> {
        vec![
            self.name.into(),
            self.label.into(),
            self.samples.into(),
            self.weight.into(),
            self.has_stacktraces.into(),
            self.params.into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThreadRow {
    pub thread_id: i64,
    pub java_id: Option<i64>,
    pub os_id: Option<i64>,
    pub name: String,
}

impl EntityRow for ThreadRow {
    const TABLE: &'static str = THREADS_TABLE;
    const COLUMNS: &'static [&'static str] = &["profile_id", "thread_id", "java_id", "os_id", "name"];

    fn into_values(self) -> Vec<SqlValue> {
        vec![
            self.thread_id.into(),
            self.java_id.into(),
            self.os_id.into(),
            self.name.into(),
        ]
    }
}

/// Frames are stored one per line, top frame first.
pub fn encode_frames(frames: &[String]) -> String {
    frames.join("\n")
}

pub fn decode_frames(encoded: &str) -> Vec<String> {
    if encoded.is_empty() {
        return Vec::new();
    }
    encoded.lines().map(str::to_string).collect()
}
