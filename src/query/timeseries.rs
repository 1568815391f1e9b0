use serde::Serialize;

use super::configurer::EventQueryConfigurer;
use super::errors::QueryError;
use super::filters;
use crate::common::constants::MILLISECONDS_PER_SECOND;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeseriesMode {
    /// One row per one-second bucket.
    Bucketed,
    /// One row per stack trace carrying its whole series in `event_values`.
    PerStacktrace,
}

/// Renders time-bucketed aggregates over `events`.
///
/// The mode follows the configuration: requesting frames selects the per
/// stack trace pivot.
///
/// Tag filters join `stacktrace_tags` with one row per tag, so events of a
/// stack trace carrying several tags are summed once per matching tag row,
/// and an excluded tag does not drop a stack trace that has other tags.
#[derive(Debug, Clone)]
pub struct TimeseriesQueryBuilder {
    profile_id: String,
    config: EventQueryConfigurer,
    mode: TimeseriesMode,
}

impl TimeseriesQueryBuilder {
    pub fn new(profile_id: impl Into<String>, config: EventQueryConfigurer) -> Result<Self, QueryError> {
        if config.event_types.is_empty() {
            return Err(QueryError::NoEventTypes);
        }
        let mode = if config.include_frames {
            TimeseriesMode::PerStacktrace
        } else {
            TimeseriesMode::Bucketed
        };
        Ok(Self {
            profile_id: profile_id.into(),
            config,
            mode,
        })
    }

    pub fn mode(&self) -> TimeseriesMode {
        self.mode
    }

    pub fn build(&self) -> String {
        match self.mode {
            TimeseriesMode::Bucketed => self.build_bucketed(),
            TimeseriesMode::PerStacktrace => self.build_per_stacktrace(),
        }
    }

    fn bucket() -> String {
        format!("(events.timestamp_from_start / {})", MILLISECONDS_PER_SECOND)
    }

    fn from_where(&self, joins: &[String]) -> String {
        let mut sql = String::from("FROM events");
        for join in joins {
            sql.push(' ');
            sql.push_str(join);
        }
        sql.push_str(" WHERE ");
        sql.push_str(&filters::predicates(&self.profile_id, &self.config).join(" AND "));
        sql
    }

    fn build_bucketed(&self) -> String {
        let mut joins = filters::filter_joins(&self.config, false);
        let mut columns = format!(
            "{} AS seconds, sum({}) as value",
            Self::bucket(),
            filters::value_column(&self.config)
        );
        if self.config.include_json_fields {
            columns.push_str(", json_agg(event_fields.fields::json) as fields");
            joins.push(filters::event_fields_join());
        }

        format!(
            "SELECT {} {} GROUP BY seconds ORDER BY seconds",
            columns,
            self.from_where(&joins)
        )
    }

    fn build_per_stacktrace(&self) -> String {
        let joins = filters::filter_joins(&self.config, false);
        let bucket = Self::bucket();
        let inner = format!(
            "SELECT events.profile_id, events.stacktrace_id, {bucket} AS seconds, \
             concat({bucket}, ',', sum({value})) AS event_value {from_where} \
             GROUP BY events.profile_id, events.stacktrace_id, seconds",
            value = filters::value_column(&self.config),
            from_where = self.from_where(&joins),
        );

        format!(
            "SELECT stacktraces.stacktrace_id, stacktraces.frames, \
             string_agg(series.event_value, ';' ORDER BY series.seconds) AS event_values \
             FROM ({inner}) AS series \
             INNER JOIN stacktraces ON (series.profile_id = stacktraces.profile_id AND series.stacktrace_id = stacktraces.stacktrace_id) \
             GROUP BY stacktraces.stacktrace_id, stacktraces.frames \
             ORDER BY stacktraces.stacktrace_id"
        )
    }
}

/// A decoded `event_values` string: `(second, value)` pairs in time order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TimeseriesSeries {
    pub points: Vec<(i64, i64)>,
}

impl TimeseriesSeries {
    pub fn parse(encoded: &str) -> Result<Self, QueryError> {
        let mut points = Vec::new();
        for pair in encoded.split(';').filter(|pair| !pair.is_empty()) {
            let (second, value) = pair
                .split_once(',')
                .ok_or_else(|| QueryError::MalformedSeries(pair.to_string()))?;
            let second = second
                .trim()
                .parse()
                .map_err(|_| QueryError::MalformedSeries(pair.to_string()))?;
            let value = value
                .trim()
                .parse()
                .map_err(|_| QueryError::MalformedSeries(pair.to_string()))?;
            points.push((second, value));
        }
        Ok(Self { points })
    }

    pub fn total(&self) -> i64 {
        self.points.iter().map(|(_, value)| value).sum()
    }
}
