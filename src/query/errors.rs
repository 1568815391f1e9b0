use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("At least one event type is required to build a query")]
    NoEventTypes,

    #[error("Invalid time range: start {start} ms is after end {end} ms")]
    InvalidTimeRange { start: i64, end: i64 },

    #[error("Malformed timeseries value '{0}'")]
    MalformedSeries(String),
}
