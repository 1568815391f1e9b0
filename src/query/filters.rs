//! Joins and predicates shared by both query builders.

use super::configurer::EventQueryConfigurer;
use crate::common::constants::*;
use crate::storage::quote_literal;

pub(crate) fn join_on(kind: &str, table: &str, column: &str, other: &str) -> String {
    format!(
        "{kind} JOIN {table} ON (events.profile_id = {table}.profile_id AND events.{column} = {table}.{other})"
    )
}

pub(crate) fn stacktraces_join() -> String {
    join_on("INNER", STACKTRACES_TABLE, "stacktrace_id", "stacktrace_id")
}

pub(crate) fn stacktrace_tags_join() -> String {
    join_on("LEFT", STACKTRACE_TAGS_TABLE, "stacktrace_id", "stacktrace_id")
}

pub(crate) fn event_types_join() -> String {
    join_on("INNER", EVENT_TYPES_TABLE, "event_type", "name")
}

pub(crate) fn event_fields_join() -> String {
    join_on("INNER", EVENT_FIELDS_TABLE, "event_id", "event_id")
}

pub(crate) fn threads_join() -> String {
    join_on("LEFT", THREADS_TABLE, "thread_id", "thread_id")
}

fn id_list(ids: impl IntoIterator<Item = i64>) -> String {
    ids.into_iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}

pub(crate) fn value_column(config: &EventQueryConfigurer) -> &'static str {
    if config.use_weight {
        "events.weight"
    } else {
        "events.samples"
    }
}

/// Joins required by the filters alone, in rendering order.
///
/// `with_stacktraces` forces the stack trace join even without a type filter.
pub(crate) fn filter_joins(config: &EventQueryConfigurer, with_stacktraces: bool) -> Vec<String> {
    let mut joins = Vec::new();
    if with_stacktraces || !config.stacktrace_types.is_empty() {
        joins.push(stacktraces_join());
    }
    if !config.tag_filters.is_empty() {
        joins.push(stacktrace_tags_join());
    }
    joins
}

/// WHERE predicates in fixed order: profile, event type, time window,
/// stack trace type, tags, thread.
pub(crate) fn predicates(profile_id: &str, config: &EventQueryConfigurer) -> Vec<String> {
    let mut predicates = vec![format!("events.profile_id = {}", quote_literal(profile_id))];

    match config.event_types.as_slice() {
        [single] => predicates.push(format!("events.event_type = {}", quote_literal(single))),
        many => predicates.push(format!(
            "events.event_type IN ({})",
            many.iter().map(|t| quote_literal(t)).collect::<Vec<_>>().join(", ")
        )),
    }

    if let Some(start) = config.time_range.start {
        predicates.push(format!("events.timestamp_from_start >= {}", start));
    }
    if let Some(end) = config.time_range.end {
        predicates.push(format!("events.timestamp_from_start < {}", end));
    }

    if !config.stacktrace_types.is_empty() {
        predicates.push(format!(
            "stacktraces.type_id IN ({})",
            id_list(config.stacktrace_types.iter().map(|t| t.id()))
        ));
    }

    let excluded = config.excluded_tags();
    if !excluded.is_empty() {
        predicates.push(format!(
            "(stacktrace_tags.tag_id NOT IN ({}) OR stacktrace_tags.tag_id IS NULL)",
            id_list(excluded.iter().map(|t| t.id()))
        ));
    }
    let included = config.included_tags();
    if !included.is_empty() {
        predicates.push(format!(
            "stacktrace_tags.tag_id IN ({})",
            id_list(included.iter().map(|t| t.id()))
        ));
    }

    if let Some(thread_id) = config.thread_id {
        predicates.push(format!("events.thread_id = {}", thread_id));
    }
    predicates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::structs::{StacktraceTag, StacktraceType};
    use crate::query::configurer::{RelativeTimeRange, StacktraceTagFilter};

    fn config() -> EventQueryConfigurer {
        EventQueryConfigurer::new().with_event_type(EXECUTION_SAMPLE)
    }

    #[test]
    fn test_time_window_bounds_are_independent() {
        let lower = predicates("p", &config().with_time_range(RelativeTimeRange::from_start(100)));
        assert!(lower.contains(&"events.timestamp_from_start >= 100".to_string()));
        assert!(!lower.iter().any(|p| p.contains("timestamp_from_start <")));

        let upper = predicates("p", &config().with_time_range(RelativeTimeRange::until(200)));
        assert!(upper.contains(&"events.timestamp_from_start < 200".to_string()));
        assert!(!upper.iter().any(|p| p.contains(">=")));

        let none = predicates("p", &config());
        assert!(!none.iter().any(|p| p.contains("timestamp_from_start")));
    }

    #[test]
    fn test_multiple_event_types_render_in_list() {
        let predicates = predicates("p", &config().with_event_type(WALL_CLOCK_SAMPLE));
        assert_eq!(
            predicates[1],
            "events.event_type IN ('jdk.ExecutionSample', 'profiler.WallClockSample')"
        );
    }

    #[test]
    fn test_tag_predicate_shapes() {
        let excluded = predicates(
            "p",
            &config().with_stacktrace_tags([StacktraceTagFilter::Exclude(StacktraceTag::ExcludeIdle)]),
        );
        assert_eq!(
            excluded.last().map(String::as_str),
            Some("(stacktrace_tags.tag_id NOT IN (0) OR stacktrace_tags.tag_id IS NULL)")
        );

        let included = predicates(
            "p",
            &config().with_stacktrace_tags([StacktraceTagFilter::Include(StacktraceTag::UnsafeAllocation)]),
        );
        assert_eq!(included.last().map(String::as_str), Some("stacktrace_tags.tag_id IN (1)"));
    }

    #[test]
    fn test_filter_joins() {
        assert!(filter_joins(&config(), false).is_empty());

        let joins = filter_joins(
            &config()
                .with_stacktrace_types([StacktraceType::Jvm])
                .with_stacktrace_tags([StacktraceTagFilter::Exclude(StacktraceTag::ExcludeIdle)]),
            false,
        );
        assert_eq!(
            joins,
            vec![
                "INNER JOIN stacktraces ON (events.profile_id = stacktraces.profile_id AND events.stacktrace_id = stacktraces.stacktrace_id)".to_string(),
                "LEFT JOIN stacktrace_tags ON (events.profile_id = stacktrace_tags.profile_id AND events.stacktrace_id = stacktrace_tags.stacktrace_id)".to_string(),
            ]
        );
    }
}
