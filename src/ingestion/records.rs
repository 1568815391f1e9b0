//! Typed records emitted by a recording parser for one worker.

use serde::{Deserialize, Serialize};

use crate::common::structs::{StacktraceTag, StacktraceType, TimestampMS};

fn one() -> i64 {
    1
}

/// A primary event. `thread` and `stacktrace` are parser-local keys of
/// previously emitted [`RawThread`] and [`RawStacktrace`] records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub event_type: String,
    pub timestamp: TimestampMS,
    pub timestamp_from_start: TimestampMS,
    #[serde(default)]
    pub duration: i64,
    #[serde(default = "one")]
    pub samples: i64,
    #[serde(default)]
    pub weight: Option<i64>,
    #[serde(default)]
    pub weight_entity: Option<String>,
    #[serde(default)]
    pub thread: Option<u64>,
    #[serde(default)]
    pub stacktrace: Option<u64>,
    /// Inline auxiliary fields, equivalent to a following [`RawEventFields`].
    #[serde(default)]
    pub fields: Option<serde_json::Value>,
}

/// Auxiliary fields of the most recently emitted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEventFields {
    pub fields: serde_json::Value,
}

/// One parameter of an active recording setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEventSetting {
    pub event_type: String,
    pub name: String,
    pub value: String,
}

/// Type metadata announced by the recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEventType {
    pub code: String,
    pub label: String,
    #[serde(default)]
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStacktrace {
    pub key: u64,
    #[serde(default)]
    pub type_id: StacktraceType,
    pub frames: Vec<String>,
    #[serde(default)]
    pub tags: Vec<StacktraceTag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawThread {
    pub key: u64,
    #[serde(default)]
    pub java_id: Option<i64>,
    #[serde(default)]
    pub os_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParsedRecord {
    Event(RawEvent),
    EventFields(RawEventFields),
    EventSetting(RawEventSetting),
    EventType(RawEventType),
    EventStacktrace(RawStacktrace),
    EventThread(RawThread),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_defaults() {
        let record: ParsedRecord = serde_json::from_str(
            r#"{"kind":"event","event_type":"jdk.ExecutionSample","timestamp":1000,"timestamp_from_start":10}"#,
        )
        .unwrap();

        match record {
            ParsedRecord::Event(event) => {
                assert_eq!(event.samples, 1);
                assert_eq!(event.duration, 0);
                assert!(event.weight.is_none());
                assert!(event.stacktrace.is_none());
            }
            other => panic!("Expected event, got {:?}", other),
        }
    }

    #[test]
    fn test_stacktrace_record() {
        let record: ParsedRecord = serde_json::from_str(
            r#"{"kind":"event_stacktrace","key":7,"type_id":"jvm","frames":["a","b"],"tags":["exclude_idle"]}"#,
        )
        .unwrap();

        assert_eq!(
            record,
            ParsedRecord::EventStacktrace(RawStacktrace {
                key: 7,
                type_id: StacktraceType::Jvm,
                frames: vec!["a".to_string(), "b".to_string()],
                tags: vec![StacktraceTag::ExcludeIdle],
            })
        );
    }
}
