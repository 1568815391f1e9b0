//! SQL construction for reads over persisted profile events.
//!
//! Builders are pure: they render one statement string from an immutable
//! [`EventQueryConfigurer`] and never touch the database.

pub mod configurer;
pub mod errors;
mod filters;
pub mod generic;
pub mod timeseries;

pub use configurer::{EventQueryConfigurer, RelativeTimeRange, StacktraceTagFilter};
pub use errors::QueryError;
pub use generic::GenericQueryBuilder;
pub use timeseries::{TimeseriesMode, TimeseriesQueryBuilder, TimeseriesSeries};
