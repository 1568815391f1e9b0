use serde::{Deserialize, Serialize};

use super::errors::QueryError;
use crate::common::structs::{StacktraceTag, StacktraceType};

/// Window relative to the recording start, in milliseconds.
///
/// `start` is inclusive, `end` exclusive; either bound may be absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RelativeTimeRange {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl RelativeTimeRange {
    pub fn new(start: Option<i64>, end: Option<i64>) -> Result<Self, QueryError> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(QueryError::InvalidTimeRange { start, end });
            }
        }
        Ok(Self { start, end })
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn from_start(start: i64) -> Self {
        Self { start: Some(start), end: None }
    }

    pub fn until(end: i64) -> Self {
        Self { start: None, end: Some(end) }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StacktraceTagFilter {
    /// Keep only events whose stack trace carries the tag.
    Include(StacktraceTag),
    /// Drop events whose stack trace carries the tag; untagged events stay.
    Exclude(StacktraceTag),
}

/// Declarative description of an event read.
///
/// Every `with_*` call consumes the value and returns the updated one, so a
/// configured query can be cloned and shared freely.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventQueryConfigurer {
    pub event_types: Vec<String>,
    pub time_range: RelativeTimeRange,
    pub include_frames: bool,
    pub stacktrace_types: Vec<StacktraceType>,
    pub tag_filters: Vec<StacktraceTagFilter>,
    pub thread_id: Option<i64>,
    pub include_event_type_info: bool,
    pub include_json_fields: bool,
    pub include_threads: bool,
    pub use_weight: bool,
}

impl EventQueryConfigurer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types.push(event_type.into());
        self
    }

    pub fn with_event_types<I, S>(mut self, event_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.event_types.extend(event_types.into_iter().map(Into::into));
        self
    }

    pub fn with_time_range(mut self, time_range: RelativeTimeRange) -> Self {
        self.time_range = time_range;
        self
    }

    pub fn with_include_frames(mut self) -> Self {
        self.include_frames = true;
        self
    }

    pub fn with_stacktrace_types(mut self, types: impl IntoIterator<Item = StacktraceType>) -> Self {
        self.stacktrace_types.extend(types);
        self
    }

    pub fn with_stacktrace_tags(mut self, filters: impl IntoIterator<Item = StacktraceTagFilter>) -> Self {
        self.tag_filters.extend(filters);
        self
    }

    pub fn with_thread(mut self, thread_id: i64) -> Self {
        self.thread_id = Some(thread_id);
        self
    }

    pub fn with_event_type_info(mut self) -> Self {
        self.include_event_type_info = true;
        self
    }

    pub fn with_json_fields(mut self) -> Self {
        self.include_json_fields = true;
        self
    }

    pub fn with_threads(mut self) -> Self {
        self.include_threads = true;
        self
    }

    pub fn with_weight(mut self) -> Self {
        self.use_weight = true;
        self
    }

    pub(crate) fn included_tags(&self) -> Vec<StacktraceTag> {
        self.tag_filters
            .iter()
            .filter_map(|filter| match filter {
                StacktraceTagFilter::Include(tag) => Some(*tag),
                StacktraceTagFilter::Exclude(_) => None,
            })
            .collect()
    }

    pub(crate) fn excluded_tags(&self) -> Vec<StacktraceTag> {
        self.tag_filters
            .iter()
            .filter_map(|filter| match filter {
                StacktraceTagFilter::Exclude(tag) => Some(*tag),
                StacktraceTagFilter::Include(_) => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_range_rejects_inverted_bounds() {
        assert_eq!(
            RelativeTimeRange::new(Some(10), Some(5)),
            Err(QueryError::InvalidTimeRange { start: 10, end: 5 })
        );
        assert!(RelativeTimeRange::new(Some(5), Some(5)).is_ok());
        assert!(RelativeTimeRange::unbounded().is_unbounded());
    }

    #[test]
    fn test_fluent_configuration_is_a_value() {
        let base = EventQueryConfigurer::new().with_event_type("jdk.ExecutionSample");
        let weighted = base.clone().with_weight().with_thread(3);

        assert!(!base.use_weight);
        assert!(weighted.use_weight);
        assert_eq!(weighted.thread_id, Some(3));
        assert_eq!(weighted.event_types, base.event_types);
    }

    #[test]
    fn test_tag_filters_split_by_semantics() {
        let config = EventQueryConfigurer::new().with_stacktrace_tags([
            StacktraceTagFilter::Exclude(StacktraceTag::ExcludeIdle),
            StacktraceTagFilter::Include(StacktraceTag::UnsafeAllocation),
        ]);
        assert_eq!(config.excluded_tags(), vec![StacktraceTag::ExcludeIdle]);
        assert_eq!(config.included_tags(), vec![StacktraceTag::UnsafeAllocation]);
    }
}
