//! Console plus rotating-file logging for the ingestion binary.
//!
//! Console output is human readable; files are JSON by default so long
//! ingestion runs can be analysed afterwards.

use std::path::PathBuf;

use tracing_appender::non_blocking;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

const LOG_FILE_PREFIX: &str = "profile_store";
const DEFAULT_LEVEL_FILTER: &str = "info,profile_store=info";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_dir: String,
    /// e.g. "info" or "info,profile_store=debug"; `RUST_LOG` wins when set
    pub level_filter: String,
    pub rotation: LogRotation,
    pub console_timestamps: bool,
    pub file_json_format: bool,
    /// Log files older than this are removed at startup
    pub cleanup_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRotation {
    Daily,
    Hourly,
    /// Size limit in MB; tracing-appender has no size trigger, rotates daily
    SizeBased(u64),
}

impl LogRotation {
    /// Parse "daily", "hourly" or "size:<MB>"; anything else is daily.
    pub fn parse(value: &str) -> Self {
        match value {
            "hourly" => LogRotation::Hourly,
            "daily" => LogRotation::Daily,
            s if s.starts_with("size:") => {
                let size_mb = s.strip_prefix("size:").and_then(|v| v.parse().ok()).unwrap_or(100);
                LogRotation::SizeBased(size_mb)
            }
            _ => LogRotation::Daily,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            level_filter: DEFAULT_LEVEL_FILTER.to_string(),
            rotation: LogRotation::Daily,
            console_timestamps: true,
            file_json_format: true,
            cleanup_days: 30,
        }
    }
}

fn file_appender(config: &LoggingConfig) -> RollingFileAppender {
    let file_name = format!("{}.log", LOG_FILE_PREFIX);
    match config.rotation {
        LogRotation::Hourly => tracing_appender::rolling::hourly(&config.log_dir, file_name),
        LogRotation::Daily | LogRotation::SizeBased(_) => tracing_appender::rolling::daily(&config.log_dir, file_name),
    }
}

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level_filter))
}

/// Initialize console and rotating file output.
///
/// The returned guard flushes the background file writer on drop and must be
/// held for the lifetime of the process.
pub fn init_dual_logging(
    config: &LoggingConfig,
) -> Result<tracing_appender::non_blocking::WorkerGuard, Box<dyn std::error::Error + Send + Sync>> {
    std::fs::create_dir_all(&config.log_dir)?;

    let (file_writer, guard) = non_blocking(file_appender(config));

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_level(true)
        .with_target(true)
        .with_timer(if config.console_timestamps {
            ChronoUtc::new("%Y-%m-%d %H:%M:%S%.3f UTC".to_string())
        } else {
            ChronoUtc::new("".to_string())
        })
        .with_filter(env_filter(config));

    let file_layer = if config.file_json_format {
        fmt::layer()
            .json()
            .with_writer(file_writer)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_timer(ChronoUtc::new("%Y-%m-%dT%H:%M:%S%.3fZ".to_string()))
            .with_filter(env_filter(config))
            .boxed()
    } else {
        fmt::layer()
            .with_writer(file_writer)
            .with_ansi(false)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_timer(ChronoUtc::new("%Y-%m-%d %H:%M:%S%.3f UTC".to_string()))
            .with_filter(env_filter(config))
            .boxed()
    };

    tracing_subscriber::registry().with(console_layer).with(file_layer).try_init()?;

    tracing::info!(
        log_dir = %config.log_dir,
        rotation = ?config.rotation,
        json_format = config.file_json_format,
        "📁 Dual logging initialized - console + rotating files"
    );
    Ok(guard)
}

/// Console-only logging, used when the log directory is unusable.
pub fn init_simple_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL_FILTER)))
        .try_init()?;

    tracing::info!("🖥️ Simple console logging initialized");
    Ok(())
}

/// Log files written by this binary, sorted by name.
pub fn get_current_log_files(log_dir: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(log_dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| is_own_log_file(path))
                .collect()
        })
        .unwrap_or_default();
    files.sort();
    files
}

fn is_own_log_file(path: &std::path::Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with(LOG_FILE_PREFIX) && name.contains(".log"))
            .unwrap_or(false)
}

/// Remove this binary's log files last modified more than `keep_days` ago.
pub fn cleanup_old_logs(log_dir: &str, keep_days: u32) -> Result<usize, std::io::Error> {
    let cutoff = std::time::SystemTime::now() - std::time::Duration::from_secs(keep_days as u64 * 24 * 3600);

    let mut removed = 0;
    for path in get_current_log_files(log_dir) {
        let modified = path.metadata().and_then(|metadata| metadata.modified());
        if let Ok(modified) = modified {
            if modified < cutoff && std::fs::remove_file(&path).is_ok() {
                removed += 1;
                tracing::debug!("🗑️ Removed old log file: {:?}", path);
            }
        }
    }

    if removed > 0 {
        tracing::info!("🧹 Cleaned up {} old log files (older than {} days)", removed, keep_days);
    }
    Ok(removed)
}

pub fn log_system_info() {
    tracing::info!(
        package_version = env!("CARGO_PKG_VERSION"),
        target_arch = std::env::consts::ARCH,
        target_os = std::env::consts::OS,
        cpu_count = num_cpus::get(),
        "📊 Environment information logged"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert_eq!(config.log_dir, "logs");
        assert_eq!(config.level_filter, "info,profile_store=info");
        assert_eq!(config.rotation, LogRotation::Daily);
        assert_eq!(config.cleanup_days, 30);
    }

    #[test]
    fn test_rotation_parse() {
        assert_eq!(LogRotation::parse("hourly"), LogRotation::Hourly);
        assert_eq!(LogRotation::parse("size:250"), LogRotation::SizeBased(250));
        assert_eq!(LogRotation::parse("size:big"), LogRotation::SizeBased(100));
        assert_eq!(LogRotation::parse("weekly"), LogRotation::Daily);
    }

    #[test]
    fn test_get_current_log_files() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path();

        std::fs::write(log_dir.join("profile_store.log.2025-01-02"), "test").unwrap();
        std::fs::write(log_dir.join("profile_store.log.2025-01-01"), "test").unwrap();
        std::fs::write(log_dir.join("other.log"), "test").unwrap();
        std::fs::write(log_dir.join("profile_store.txt"), "test").unwrap();

        let log_files = get_current_log_files(log_dir.to_str().unwrap());
        assert_eq!(log_files.len(), 2);
        assert!(log_files[0].to_string_lossy().ends_with("2025-01-01"));
    }

    #[test]
    fn test_cleanup_keeps_recent_files() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path();
        std::fs::write(log_dir.join("profile_store.log.recent"), "recent").unwrap();

        let removed = cleanup_old_logs(log_dir.to_str().unwrap(), 7).unwrap();
        assert_eq!(removed, 0);
        assert_eq!(get_current_log_files(log_dir.to_str().unwrap()).len(), 1);
    }
}
