use std::collections::HashSet;
use std::sync::Arc;

use crate::common::constants::*;
use crate::common::structs::StacktraceType;
use crate::storage::MemoryDatabase;

use super::records::{RawEvent, RawEventSetting, RawStacktrace, RawThread};
use super::{EventWriter, ParsedRecord, ProfileSequences, ResultCollector};

fn worker_records(worker: u64, events: u64) -> Vec<ParsedRecord> {
    let mut records = vec![
        ParsedRecord::EventSetting(RawEventSetting {
            event_type: EXECUTION_SAMPLE.to_string(),
            name: "enabled".to_string(),
            value: "true".to_string(),
        }),
        ParsedRecord::EventThread(RawThread {
            key: 1,
            java_id: Some(worker as i64),
            os_id: Some(1000 + worker as i64),
            name: Some(format!("worker-{}", worker)),
        }),
        ParsedRecord::EventStacktrace(RawStacktrace {
            key: 1,
            type_id: StacktraceType::Application,
            frames: vec![format!("Worker{}.run", worker)],
            tags: vec![],
        }),
    ];
    for i in 0..events {
        records.push(ParsedRecord::Event(RawEvent {
            event_type: EXECUTION_SAMPLE.to_string(),
            timestamp: 1_000 + (worker * events + i) as i64,
            timestamp_from_start: i as i64,
            duration: 0,
            samples: 1,
            weight: None,
            weight_entity: None,
            thread: Some(1),
            stacktrace: Some(1),
            fields: None,
        }));
    }
    records
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_allocate_unique_ids() -> Result<(), Box<dyn std::error::Error>> {
    let db = Arc::new(MemoryDatabase::new());
    let sequences = Arc::new(ProfileSequences::new());

    let mut handles = Vec::new();
    for worker in 0..6u64 {
        let db = db.clone();
        let sequences = Arc::clone(&sequences);
        handles.push(tokio::spawn(async move {
            let mut writer = EventWriter::new(db, Arc::from("p1"), sequences, 7);
            writer.on_thread_start(&format!("chunk-{}", worker));
            for record in worker_records(worker, 50) {
                writer.apply(record).await?;
            }
            writer.on_thread_complete().await
        }));
    }

    let mut collector = ResultCollector::new();
    for handle in handles {
        collector.add(handle.await??);
    }

    let event_ids: HashSet<_> = db
        .rows(EVENTS_TABLE)
        .iter()
        .filter_map(|row| row[1].as_i64())
        .collect();
    assert_eq!(event_ids.len(), 300);
    assert_eq!(db.row_count(EVENTS_TABLE), 300);

    let stacktrace_ids: HashSet<_> = db
        .rows(STACKTRACES_TABLE)
        .iter()
        .filter_map(|row| row[1].as_i64())
        .collect();
    assert_eq!(stacktrace_ids.len(), 6);

    let combined = collector.finalize();
    let thread_ids: HashSet<_> = combined.threads.iter().map(|t| t.thread_id).collect();
    assert_eq!(thread_ids.len(), 6);
    assert_eq!(combined.event_type(EXECUTION_SAMPLE).map(|t| t.samples), Some(300));
    assert_eq!(combined.latest_event, Some(1_299));
    Ok(())
}

#[tokio::test]
async fn test_merge_order_does_not_change_totals() -> Result<(), Box<dyn std::error::Error>> {
    let mut partials = Vec::new();
    for worker in 0..3u64 {
        let db = Arc::new(MemoryDatabase::new());
        let mut writer = EventWriter::new(db, Arc::from("p1"), Arc::new(ProfileSequences::new()), 100);
        for record in worker_records(worker, worker + 1) {
            writer.apply(record).await?;
        }
        partials.push(writer.on_thread_complete().await?);
    }

    let mut forward = ResultCollector::new();
    for partial in partials.iter().cloned() {
        forward.add(partial);
    }
    let mut backward = ResultCollector::new();
    for partial in partials.into_iter().rev() {
        backward.add(partial);
    }

    let forward = forward.finalize();
    let backward = backward.finalize();
    assert_eq!(forward.event_types, backward.event_types);
    assert_eq!(forward.latest_event, backward.latest_event);
    assert_eq!(forward.threads.len(), backward.threads.len());
    Ok(())
}
