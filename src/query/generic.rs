use super::configurer::EventQueryConfigurer;
use super::errors::QueryError;
use super::filters;

const BASE_COLUMNS: &[&str] = &[
    "events.event_type",
    "events.timestamp",
    "events.timestamp_from_start",
    "events.duration",
    "events.samples",
    "events.weight",
    "events.weight_entity",
];

/// Renders a row-level SELECT over `events`.
///
/// Tag filters read `stacktrace_tags` through a LEFT JOIN, which yields one
/// row per tag of a stack trace. A stack trace with several tags therefore
/// returns each of its events once per tag, and under an exclude filter it
/// still matches through the rows of its other tags.
#[derive(Debug, Clone)]
pub struct GenericQueryBuilder {
    profile_id: String,
    config: EventQueryConfigurer,
    group_by: Vec<String>,
    order_by: Vec<String>,
}

impl GenericQueryBuilder {
    pub fn new(profile_id: impl Into<String>, config: EventQueryConfigurer) -> Result<Self, QueryError> {
        if config.event_types.is_empty() {
            return Err(QueryError::NoEventTypes);
        }
        Ok(Self {
            profile_id: profile_id.into(),
            config,
            group_by: Vec::new(),
            order_by: Vec::new(),
        })
    }

    pub fn add_group_by(mut self, clause: impl Into<String>) -> Self {
        self.group_by.push(clause.into());
        self
    }

    pub fn add_order_by(mut self, clause: impl Into<String>) -> Self {
        self.order_by.push(clause.into());
        self
    }

    pub fn config(&self) -> &EventQueryConfigurer {
        &self.config
    }

    pub fn build(&self) -> String {
        let config = &self.config;
        let mut columns: Vec<&str> = BASE_COLUMNS.to_vec();
        let mut joins = filters::filter_joins(config, config.include_frames);

        if config.include_frames {
            columns.extend(["stacktraces.stacktrace_id", "stacktraces.frames"]);
        }
        if config.include_event_type_info {
            columns.push("event_types.label");
            joins.push(filters::event_types_join());
        }
        if config.include_json_fields {
            columns.push("event_fields.fields");
            joins.push(filters::event_fields_join());
        }
        if config.include_threads {
            columns.extend(["threads.name", "threads.os_id", "threads.java_id"]);
            joins.push(filters::threads_join());
        }

        let mut sql = format!("SELECT {} FROM events", columns.join(", "));
        for join in &joins {
            sql.push(' ');
            sql.push_str(join);
        }
        sql.push_str(&format!(
            " WHERE ({})",
            filters::predicates(&self.profile_id, config).join(" AND ")
        ));
        if !self.group_by.is_empty() {
            sql.push_str(&format!(" GROUP BY {}", self.group_by.join(", ")));
        }
        if !self.order_by.is_empty() {
            sql.push_str(&format!(" ORDER BY {}", self.order_by.join(", ")));
        }
        sql
    }
}
