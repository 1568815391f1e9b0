use std::path::Path;

use serde::Deserialize;

use crate::ingestion::IngestionConfig;
use crate::logging::{LogRotation, LoggingConfig};
use crate::postgres::PostgresConfig;
use crate::profile::RecordingsConfig;

/// Logging section of config.toml; unset keys fall back to [`LoggingConfig::default`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingTomlConfig {
    pub log_dir: Option<String>,
    pub level_filter: Option<String>,
    /// "daily", "hourly" or "size:<MB>"
    pub rotation: Option<String>,
    pub console_timestamps: Option<bool>,
    pub file_json_format: Option<bool>,
    pub cleanup_days: Option<u32>,
}

impl From<LoggingTomlConfig> for LoggingConfig {
    fn from(toml: LoggingTomlConfig) -> Self {
        let defaults = LoggingConfig::default();
        LoggingConfig {
            log_dir: toml.log_dir.unwrap_or(defaults.log_dir),
            level_filter: toml.level_filter.unwrap_or(defaults.level_filter),
            rotation: toml.rotation.as_deref().map(LogRotation::parse).unwrap_or(defaults.rotation),
            console_timestamps: toml.console_timestamps.unwrap_or(defaults.console_timestamps),
            file_json_format: toml.file_json_format.unwrap_or(defaults.file_json_format),
            cleanup_days: toml.cleanup_days.unwrap_or(defaults.cleanup_days),
        }
    }
}

/// Full config.toml structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: PostgresConfig,
    pub ingestion: IngestionConfig,
    pub recordings: RecordingsConfig,
    pub logging: Option<LoggingTomlConfig>,
}

impl AppConfig {
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content)?)
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn logging_config(&self) -> LoggingConfig {
        self.logging.clone().map(LoggingConfig::from).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_config() {
        let config = AppConfig::parse(
            r#"
            [database]
            host = "db.internal"
            database = "profiles_test"

            [ingestion]
            batch_size = 500

            [recordings]
            directory = "/data/recordings"

            [logging]
            rotation = "hourly"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.ingestion.batch_size, 500);
        assert!(config.ingestion.parallelism >= 1);
        assert_eq!(config.recordings.directory, std::path::PathBuf::from("/data/recordings"));

        let logging = config.logging_config();
        assert_eq!(logging.rotation, LogRotation::Hourly);
        assert_eq!(logging.log_dir, "logs");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.database.database, "profiles");
        assert_eq!(config.ingestion.batch_size, crate::common::constants::DEFAULT_BATCH_SIZE);
        assert_eq!(config.logging_config().cleanup_days, 30);
    }
}
