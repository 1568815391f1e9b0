use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use profile_store::common::constants::*;
use profile_store::ingestion::IngestionConfig;
use profile_store::profile::{
    DirectoryRecordingResolver, JsonLinesParser, ProfileError, ProfileInitializer, ProfileQueries, Timeseries,
};
use profile_store::query::{EventQueryConfigurer, GenericQueryBuilder, RelativeTimeRange, TimeseriesQueryBuilder};
use profile_store::storage::{Database, MemoryDatabase, Row, SqlValue};

fn write_chunk(dir: &Path, name: &str, records: &[serde_json::Value]) {
    let lines: Vec<String> = records.iter().map(|r| r.to_string()).collect();
    std::fs::write(dir.join(name), lines.join("\n")).expect("Failed to write chunk");
}

fn execution_sample(timestamp: i64) -> serde_json::Value {
    json!({
        "kind": "event",
        "event_type": EXECUTION_SAMPLE,
        "timestamp": timestamp,
        "timestamp_from_start": timestamp - 1_000,
        "thread": 1,
        "stacktrace": 1
    })
}

fn preamble(thread_name: &str) -> Vec<serde_json::Value> {
    vec![
        json!({"kind": "event_thread", "key": 1, "java_id": 1, "os_id": 100, "name": thread_name}),
        json!({"kind": "event_stacktrace", "key": 1, "type_id": "jvm", "frames": ["Worker.run", "Thread.run"]}),
    ]
}

/// Two-chunk recording with a CPU sampling interval of 10 ms.
fn create_recording(root: &Path, recording_id: &str) {
    let dir = root.join(recording_id);
    std::fs::create_dir_all(&dir).expect("Failed to create recording directory");

    let mut first = vec![
        json!({"kind": "event_setting", "event_type": EXECUTION_SAMPLE, "name": "enabled", "value": "true"}),
        json!({"kind": "event_setting", "event_type": EXECUTION_SAMPLE, "name": "interval", "value": "10 ms"}),
    ];
    first.extend(preamble("main"));
    first.push(execution_sample(2_000));
    first.push(execution_sample(2_010));
    write_chunk(&dir, "0001.jsonl", &first);

    let mut second = preamble("worker-1");
    second.push(execution_sample(2_020));
    second.push(json!({
        "kind": "event",
        "event_type": THREAD_PARK,
        "timestamp": 2_400,
        "timestamp_from_start": 1_400,
        "duration": 5_000_000,
        "thread": 1,
        "stacktrace": 1
    }));
    write_chunk(&dir, "0002.jsonl", &second);
}

fn initializer(db: Arc<dyn Database>, root: &Path) -> ProfileInitializer {
    ProfileInitializer::new(
        db,
        Arc::new(DirectoryRecordingResolver::new(root)),
        Arc::new(JsonLinesParser::new()),
        IngestionConfig {
            batch_size: 3,
            parallelism: 2,
            channel_capacity: 8,
        },
    )
}

#[tokio::test]
async fn test_recording_directory_is_ingested() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    create_recording(temp_dir.path(), "service-a");

    let db = Arc::new(MemoryDatabase::new());
    let profile_id = initializer(db.clone(), temp_dir.path()).create_profile("service-a").await?;

    assert_eq!(db.row_count(PROFILES_TABLE), 1);
    assert_eq!(db.row_count(EVENTS_TABLE), 4);
    assert_eq!(db.row_count(STACKTRACES_TABLE), 2);
    assert_eq!(db.row_count(THREADS_TABLE), 2);
    assert_eq!(db.checkpoint_count(), 2);

    let event_ids: HashSet<i64> = db.rows(EVENTS_TABLE).iter().filter_map(|row| row[1].as_i64()).collect();
    assert_eq!(event_ids.len(), 4, "event ids must be unique across chunks");

    let event_types = db.rows(EVENT_TYPES_TABLE);
    assert_eq!(event_types.len(), 2);
    let cpu = &event_types[0];
    assert_eq!(cpu[1], SqlValue::Text(EXECUTION_SAMPLE.to_string()));
    assert_eq!(cpu[3], SqlValue::Int(3));
    assert_eq!(cpu[4], SqlValue::Int(3 * 10 * NANOS_PER_MILLISECOND));
    assert_eq!(cpu[5], SqlValue::Bool(true));
    assert!(cpu[6].as_str().map_or(false, |params| params.contains("10 ms")));
    assert_eq!(event_types[1][1], SqlValue::Text(THREAD_PARK.to_string()));

    let expected = format!(
        "UPDATE profiles SET initialized = TRUE, latest_event_at = 2400 WHERE profile_id = '{}'",
        profile_id
    );
    assert!(db.statements().contains(&expected));
    Ok(())
}

#[tokio::test]
async fn test_unknown_and_unsafe_recording_ids_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    create_recording(temp_dir.path(), "service-a");

    let db = Arc::new(MemoryDatabase::new());
    let initializer = initializer(db.clone(), temp_dir.path());

    for recording_id in ["service-b", "../service-a", ".."] {
        let result = initializer.create_profile(recording_id).await;
        assert!(
            matches!(result, Err(ProfileError::UnknownRecording(_))),
            "{} should be unknown",
            recording_id
        );
    }
    assert_eq!(db.row_count(PROFILES_TABLE), 0);
    Ok(())
}

#[tokio::test]
async fn test_malformed_chunk_leaves_profile_uninitialized() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    create_recording(temp_dir.path(), "service-a");
    std::fs::write(temp_dir.path().join("service-a").join("0003.jsonl"), "{\"kind\":\"bogus\"}\n")?;

    let db = Arc::new(MemoryDatabase::new());
    let result = initializer(db.clone(), temp_dir.path()).create_profile("service-a").await;

    assert!(result.is_err());
    assert_eq!(db.row_count(PROFILES_TABLE), 1);
    assert_eq!(db.row_count(EVENT_TYPES_TABLE), 0);
    assert!(!db.statements().iter().any(|s| s.starts_with("UPDATE profiles")));
    Ok(())
}

#[tokio::test]
async fn test_queries_are_scoped_to_the_profile() -> Result<(), Box<dyn std::error::Error>> {
    let db = Arc::new(MemoryDatabase::new());
    db.script_query(
        "GROUP BY seconds ORDER BY seconds",
        vec![
            Row::new(vec![SqlValue::Int(0), SqlValue::Int(2)]),
            Row::new(vec![SqlValue::Int(1), SqlValue::Null]),
        ],
    );
    let queries = ProfileQueries::new(db.clone());

    let config = EventQueryConfigurer::new()
        .with_event_type(EXECUTION_SAMPLE)
        .with_time_range(RelativeTimeRange::new(Some(0), Some(2_000))?)
        .with_threads();
    let builder = GenericQueryBuilder::new("p-1", config.clone())?;
    queries.events(&builder).await?;
    assert!(db.queries()[0].contains("events.profile_id = 'p-1'"));

    let builder = TimeseriesQueryBuilder::new("p-1", config)?;
    match queries.timeseries(&builder).await? {
        Timeseries::Bucketed { points } => assert_eq!(points, vec![(0, 2), (1, 0)]),
        other => panic!("Expected bucketed series, got {:?}", other),
    }

    assert_eq!(queries.delete_profile("p-1").await?, 0);
    assert!(queries.profile("p-1").await?.is_none());
    Ok(())
}
