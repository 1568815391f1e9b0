pub mod client;
pub mod errors;

pub use client::{PgDatabase, PostgresConfig};
pub use errors::PostgresError;
