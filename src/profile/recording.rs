use std::path::PathBuf;

use serde::Deserialize;
use tracing::debug;

use super::errors::ProfileError;
use super::structs::Recording;

/// Maps a recording id to its source files.
pub trait RecordingResolver: Send + Sync {
    fn resolve(&self, recording_id: &str) -> Result<Recording, ProfileError>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecordingsConfig {
    pub directory: PathBuf,
}

impl Default for RecordingsConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("recordings"),
        }
    }
}

/// Resolves `<directory>/<recording_id>`, either a chunk directory or a
/// `<recording_id>.jsonl` file.
#[derive(Debug, Clone)]
pub struct DirectoryRecordingResolver {
    root: PathBuf,
}

impl DirectoryRecordingResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &RecordingsConfig) -> Self {
        Self::new(config.directory.clone())
    }
}

impl RecordingResolver for DirectoryRecordingResolver {
    fn resolve(&self, recording_id: &str) -> Result<Recording, ProfileError> {
        let invalid = recording_id.is_empty()
            || recording_id.contains(['/', '\\'])
            || recording_id == "."
            || recording_id == "..";
        if invalid {
            return Err(ProfileError::UnknownRecording(recording_id.to_string()));
        }

        let candidates = [
            self.root.join(recording_id),
            self.root.join(format!("{}.jsonl", recording_id)),
        ];
        let path = candidates
            .into_iter()
            .find(|path| path.exists())
            .ok_or_else(|| ProfileError::UnknownRecording(recording_id.to_string()))?;

        debug!(recording_id, path = %path.display(), "Recording resolved");
        Ok(Recording {
            recording_id: recording_id.to_string(),
            name: recording_id.to_string(),
            path,
        })
    }
}
