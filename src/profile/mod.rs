pub mod errors;
pub mod initializer;
pub mod parser;
pub mod queries;
pub mod recording;
pub mod structs;


pub use errors::ProfileError;
pub use initializer::ProfileInitializer;
pub use parser::{JsonLinesParser, RecordChunk, RecordingParser};
pub use queries::{ProfileQueries, StacktraceSeries, Timeseries};
pub use recording::{DirectoryRecordingResolver, RecordingResolver, RecordingsConfig};
pub use structs::{InitializationState, NewProfile, ProfileInfo, Recording};
