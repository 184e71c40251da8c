use std::path::PathBuf;

use crate::db::config::env_bool;

const DEFAULT_RECOMPUTE_SCHEDULE: &str = "0 0 3 * * *";

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub logging: LoggingConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Directory for daily-rolling log files; `None` logs to stdout only.
    pub file_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub leader: bool,
    pub recompute_enabled: bool,
    pub recompute_schedule: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            leader: false,
            recompute_enabled: true,
            recompute_schedule: DEFAULT_RECOMPUTE_SCHEDULE.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let file_dir = if env_bool("ENABLE_FILE_LOGS", false) {
            Some(PathBuf::from(
                std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string()),
            ))
        } else {
            None
        };

        let recompute_schedule = std::env::var("RECOMPUTE_SCHEDULE")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_RECOMPUTE_SCHEDULE.to_string());

        Self {
            log_level,
            logging: LoggingConfig { file_dir },
            worker: WorkerConfig {
                leader: env_bool("WORKER_LEADER", false),
                recompute_enabled: env_bool("ENABLE_RECOMPUTE_WORKER", true),
                recompute_schedule,
            },
        }
    }
}
