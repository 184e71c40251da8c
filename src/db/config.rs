use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
use thiserror::Error;

const DEFAULT_DATABASE_PATH: &str = "./data/progress.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    /// Plain filesystem path; parent directories are created on connect.
    Path(PathBuf),
    /// A full `sqlite:` URL handed to sqlx unchanged.
    Url(String),
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub location: DbLocation,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub busy_timeout: Duration,
    pub journal_mode: SqliteJournalMode,
    pub synchronous: SqliteSynchronous,
}

impl DbConfig {
    pub fn from_env() -> Result<Self, DbConfigError> {
        let raw = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| DEFAULT_DATABASE_PATH.to_string());
        let location = parse_location(&raw)?;

        let journal_mode = match std::env::var("SQLITE_JOURNAL_MODE").ok().as_deref() {
            None => SqliteJournalMode::Wal,
            Some(value) => parse_journal_mode(value).ok_or(DbConfigError::Invalid {
                key: "SQLITE_JOURNAL_MODE",
                value: value.to_string(),
            })?,
        };

        let synchronous = match std::env::var("SQLITE_SYNCHRONOUS").ok().as_deref() {
            None => SqliteSynchronous::Normal,
            Some(value) => parse_synchronous(value).ok_or(DbConfigError::Invalid {
                key: "SQLITE_SYNCHRONOUS",
                value: value.to_string(),
            })?,
        };

        Ok(Self {
            location,
            max_connections: env_u32("DB_MAX_CONNECTIONS", 5).max(1),
            acquire_timeout: Duration::from_millis(env_u64("DB_ACQUIRE_TIMEOUT_MS", 5000)),
            busy_timeout: Duration::from_millis(env_u64("SQLITE_BUSY_TIMEOUT_MS", 30_000)),
            journal_mode,
            synchronous,
        })
    }

    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            location: DbLocation::Path(path.into()),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(30),
            journal_mode: SqliteJournalMode::Wal,
            synchronous: SqliteSynchronous::Normal,
        }
    }

    pub fn connect_options(&self) -> Result<SqliteConnectOptions, DbConfigError> {
        let base = match &self.location {
            DbLocation::Path(path) => SqliteConnectOptions::new().filename(path),
            DbLocation::Url(url) => {
                SqliteConnectOptions::from_str(url).map_err(|err| DbConfigError::Invalid {
                    key: "DATABASE_URL",
                    value: format!("{url}: {err}"),
                })?
            }
        };

        Ok(base
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(self.journal_mode)
            .synchronous(self.synchronous)
            .busy_timeout(self.busy_timeout))
    }
}

#[derive(Debug, Error)]
pub enum DbConfigError {
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

fn parse_location(raw: &str) -> Result<DbLocation, DbConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DbConfigError::Invalid {
            key: "DATABASE_URL",
            value: raw.to_string(),
        });
    }
    if trimmed.starts_with("sqlite:") {
        Ok(DbLocation::Url(trimmed.to_string()))
    } else {
        Ok(DbLocation::Path(PathBuf::from(trimmed)))
    }
}

fn parse_journal_mode(value: &str) -> Option<SqliteJournalMode> {
    match value.to_ascii_uppercase().as_str() {
        "WAL" => Some(SqliteJournalMode::Wal),
        "DELETE" => Some(SqliteJournalMode::Delete),
        "TRUNCATE" => Some(SqliteJournalMode::Truncate),
        "MEMORY" => Some(SqliteJournalMode::Memory),
        _ => None,
    }
}

fn parse_synchronous(value: &str) -> Option<SqliteSynchronous> {
    match value.to_ascii_uppercase().as_str() {
        "OFF" => Some(SqliteSynchronous::Off),
        "NORMAL" => Some(SqliteSynchronous::Normal),
        "FULL" => Some(SqliteSynchronous::Full),
        "EXTRA" => Some(SqliteSynchronous::Extra),
        _ => None,
    }
}

pub(crate) fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref() {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        _ => default,
    }
}

pub(crate) fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(default)
}
