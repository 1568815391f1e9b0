pub mod common;
pub mod config;
pub mod derived;
pub mod ingestion;
pub mod logging;
pub mod postgres;
pub mod profile;
pub mod query;
pub mod storage;
