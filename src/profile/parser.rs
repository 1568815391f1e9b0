use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::errors::ProfileError;
use super::structs::Recording;
use crate::ingestion::ParsedRecord;

pub type RecordIter = Box<dyn Iterator<Item = Result<ParsedRecord, ProfileError>> + Send>;

/// One independently parseable part of a recording, handled by one worker.
pub struct RecordChunk {
    pub name: String,
    pub records: RecordIter,
}

/// Splits a recording into chunks of typed records.
///
/// Iteration may block on IO; callers drive it off the async workers.
pub trait RecordingParser: Send + Sync {
    fn chunks(&self, recording: &Recording) -> Result<Vec<RecordChunk>, ProfileError>;
}

/// Reads recordings stored as JSON lines, one serialized [`ParsedRecord`]
/// per line. A directory contributes one chunk per `*.jsonl` file.
#[derive(Debug, Clone, Default)]
pub struct JsonLinesParser;

impl JsonLinesParser {
    pub fn new() -> Self {
        Self
    }

    fn chunk_files(path: &Path) -> Result<Vec<PathBuf>, ProfileError> {
        if path.is_file() {
            return Ok(vec![path.to_path_buf()]);
        }

        let entries = std::fs::read_dir(path).map_err(|e| ProfileError::parse(path.display().to_string(), e))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ProfileError::parse(path.display().to_string(), e))?;
            let file = entry.path();
            if file.is_file() && file.extension().map_or(false, |ext| ext == "jsonl") {
                files.push(file);
            }
        }
        files.sort();
        Ok(files)
    }

    fn open(file: PathBuf) -> Result<RecordChunk, ProfileError> {
        let display = file.display().to_string();
        let reader = BufReader::new(File::open(&file).map_err(|e| ProfileError::parse(display.clone(), e))?);
        let name = file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| display.clone());

        let records = reader
            .lines()
            .enumerate()
            .filter_map(move |(idx, line)| {
                let location = format!("{}:{}", display, idx + 1);
                match line {
                    Err(e) => Some(Err(ProfileError::parse(location, e))),
                    Ok(line) if line.trim().is_empty() => None,
                    Ok(line) => Some(
                        serde_json::from_str::<ParsedRecord>(&line).map_err(|e| ProfileError::parse(location, e)),
                    ),
                }
            });

        Ok(RecordChunk {
            name,
            records: Box::new(records),
        })
    }
}

impl RecordingParser for JsonLinesParser {
    fn chunks(&self, recording: &Recording) -> Result<Vec<RecordChunk>, ProfileError> {
        let files = Self::chunk_files(&recording.path)?;
        debug!(recording_id = %recording.recording_id, chunks = files.len(), "Recording split into chunks");
        files.into_iter().map(Self::open).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn recording(path: PathBuf) -> Recording {
        Recording {
            recording_id: "r1".to_string(),
            name: "r1".to_string(),
            path,
        }
    }

    #[test]
    fn test_directory_yields_sorted_jsonl_chunks() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        std::fs::write(
            temp_dir.path().join("b.jsonl"),
            "{\"kind\":\"event_setting\",\"event_type\":\"jdk.ThreadPark\",\"name\":\"enabled\",\"value\":\"true\"}\n\n",
        )?;
        std::fs::write(temp_dir.path().join("a.jsonl"), "")?;
        std::fs::write(temp_dir.path().join("notes.txt"), "ignored")?;

        let chunks = JsonLinesParser::new().chunks(&recording(temp_dir.path().to_path_buf()))?;
        let names: Vec<_> = chunks.iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["a", "b"]);

        let records: Vec<_> = chunks.into_iter().flat_map(|c| c.records).collect::<Result<_, _>>()?;
        assert_eq!(records.len(), 1);
        Ok(())
    }

    #[test]
    fn test_malformed_line_reports_location() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let file = temp_dir.path().join("r1.jsonl");
        std::fs::write(&file, "{\"kind\":\"nope\"}\n")?;

        let mut chunks = JsonLinesParser::new().chunks(&recording(file))?;
        let first = chunks.remove(0).records.next();
        match first {
            Some(Err(ProfileError::Parse { path, .. })) => assert!(path.ends_with("r1.jsonl:1")),
            other => panic!("Expected parse error, got {:?}", other.map(|r| r.is_ok())),
        }
        Ok(())
    }
}
