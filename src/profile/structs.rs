use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::common::structs::TimestampMS;

/// A resolved recording: a JSON-lines file or a directory of chunk files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    pub recording_id: String,
    pub name: String,
    pub path: PathBuf,
}

/// A profile row created before ingestion starts.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProfile {
    pub profile_id: String,
    pub recording: Recording,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileInfo {
    pub profile_id: String,
    pub recording_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub latest_event_at: Option<TimestampMS>,
    pub initialized: bool,
}

/// Phases of one ingestion run, strictly sequential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializationState {
    Created,
    Parsing,
    Merging,
    Enhancing,
    DerivingEvents,
    Finalized,
}

impl InitializationState {
    pub fn next(self) -> Option<InitializationState> {
        match self {
            InitializationState::Created => Some(InitializationState::Parsing),
            InitializationState::Parsing => Some(InitializationState::Merging),
            InitializationState::Merging => Some(InitializationState::Enhancing),
            InitializationState::Enhancing => Some(InitializationState::DerivingEvents),
            InitializationState::DerivingEvents => Some(InitializationState::Finalized),
            InitializationState::Finalized => None,
        }
    }
}

impl fmt::Display for InitializationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InitializationState::Created => "created",
            InitializationState::Parsing => "parsing",
            InitializationState::Merging => "merging",
            InitializationState::Enhancing => "enhancing",
            InitializationState::DerivingEvents => "deriving-events",
            InitializationState::Finalized => "finalized",
        };
        f.write_str(name)
    }
}
