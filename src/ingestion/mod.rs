pub mod collector;
pub mod enhancers;
pub mod entity_writer;
pub mod errors;
pub mod event_writer;
pub mod records;
pub mod result;
pub mod rows;
pub mod sequences;
pub mod thread_cleanup;

#[cfg(test)]
mod tests;

use serde::Deserialize;

use crate::common::constants::DEFAULT_BATCH_SIZE;

pub use collector::{CombinedResult, ResultCollector};
pub use enhancers::EventTypeEnhancer;
pub use entity_writer::{EntityWriter, EntityWriters, WrittenCounts};
pub use errors::IngestionError;
pub use event_writer::EventWriter;
pub use records::ParsedRecord;
pub use result::{ActiveSetting, ActiveSettings, EventThread, EventType, EventTypeBuilder, EventWriterResult};
pub use sequences::ProfileSequences;

/// Ingestion tuning, loaded from the `[ingestion]` table of the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Rows buffered per entity writer before a multi-row insert.
    pub batch_size: usize,
    /// Chunks parsed concurrently.
    pub parallelism: usize,
    /// Records buffered between a chunk reader and its writer.
    pub channel_capacity: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            parallelism: num_cpus::get(),
            channel_capacity: 4096,
        }
    }
}
