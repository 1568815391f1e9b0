use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};

use profile_store::config::AppConfig;
use profile_store::logging::{cleanup_old_logs, init_dual_logging, init_simple_logging, log_system_info};
use profile_store::postgres::PgDatabase;
use profile_store::profile::{DirectoryRecordingResolver, JsonLinesParser, ProfileInitializer};
use profile_store::storage::{Database, SchemaMigrator};

const USAGE: &str = "Usage: profile_store [--config <path>] <recording-id>...";

struct CliArgs {
    config_path: String,
    recording_ids: Vec<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<CliArgs, String> {
    let mut config_path = "config.toml".to_string();
    let mut recording_ids = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                config_path = args.next().ok_or_else(|| format!("--config requires a path\n{}", USAGE))?;
            }
            "--help" | "-h" => return Err(USAGE.to_string()),
            flag if flag.starts_with('-') => return Err(format!("Unknown option '{}'\n{}", flag, USAGE)),
            _ => recording_ids.push(arg),
        }
    }

    if recording_ids.is_empty() {
        return Err(USAGE.to_string());
    }
    Ok(CliArgs {
        config_path,
        recording_ids,
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(2);
        }
    };

    let config = match AppConfig::from_toml(&args.config_path) {
        Ok(config) => {
            println!("✅ Loaded configuration from {}", args.config_path);
            config
        }
        Err(e) => {
            println!("⚠️ Failed to load {}: {}. Using default configuration", args.config_path, e);
            AppConfig::default()
        }
    };

    let logging_config = config.logging_config();
    let _logging_guard = match init_dual_logging(&logging_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("❌ Failed to initialize logging system: {}", e);
            if let Err(e) = init_simple_logging() {
                eprintln!("❌ Console logging unavailable: {}", e);
            }
            None
        }
    };
    if let Err(e) = cleanup_old_logs(&logging_config.log_dir, logging_config.cleanup_days) {
        warn!("⚠️ Failed to clean up old log files: {}", e);
    }
    log_system_info();

    let database: Arc<dyn Database> = match PgDatabase::connect(&config.database).await {
        Ok(database) => Arc::new(database),
        Err(e) => {
            error!("❌ Failed to connect to PostgreSQL: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = SchemaMigrator::new().migrate(database.as_ref()).await {
        error!("❌ Schema migration failed: {}", e);
        return ExitCode::FAILURE;
    }

    let initializer = ProfileInitializer::new(
        Arc::clone(&database),
        Arc::new(DirectoryRecordingResolver::from_config(&config.recordings)),
        Arc::new(JsonLinesParser::new()),
        config.ingestion.clone(),
    );

    let mut failures = 0;
    for recording_id in &args.recording_ids {
        match initializer.create_profile(recording_id).await {
            Ok(profile_id) => info!(recording_id = %recording_id, profile_id = %profile_id, "🎉 Recording ingested"),
            Err(e) => {
                failures += 1;
                error!(recording_id = %recording_id, "❌ Failed to ingest recording: {}", e);
            }
        }
    }

    if failures > 0 {
        error!(failures, total = args.recording_ids.len(), "Some recordings failed");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
