// crates/server/src/config.rs
//! Command-line and environment configuration for the server binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use task_progress_db::{default_db_path, DbResult};

/// Default port for the server.
pub const DEFAULT_PORT: u16 = 47893;

/// Default retention of finished task statuses.
pub const DEFAULT_RESULT_TTL_SECS: u64 = 24 * 60 * 60;

/// Default tracing filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "warn,task_progress=info";

#[derive(Parser, Debug, Clone)]
#[command(name = "task-progress")]
#[command(version)]
#[command(about = "Progress reporting and polling service for background tasks", long_about = None)]
pub struct Config {
    /// Port to listen on (localhost only)
    #[arg(long, env = "TASK_PROGRESS_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Database path (default: ~/.cache/task-progress/task-progress.db)
    #[arg(long, env = "TASK_PROGRESS_DB")]
    pub db_path: Option<PathBuf>,

    /// Interval between pushes on a progress stream, in milliseconds
    #[arg(long, env = "TASK_PROGRESS_POLL_MS", default_value_t = 500)]
    pub poll_interval_ms: u64,

    /// Upper bound on waiting for a finished task's result, in milliseconds
    #[arg(long, env = "TASK_PROGRESS_JOIN_TIMEOUT_MS", default_value_t = 1000)]
    pub join_timeout_ms: u64,

    /// How long a finished task's status stays readable, in seconds
    #[arg(long, env = "TASK_PROGRESS_RESULT_TTL_SECS", default_value_t = DEFAULT_RESULT_TTL_SECS)]
    pub result_ttl_secs: u64,

    /// Tracing filter directives
    #[arg(long = "log", env = "RUST_LOG", default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,
}

impl Config {
    pub fn poll_interval(&self) -> Duration {
        // A zero interval would make the stream spin.
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }

    /// The configured database path, or the default cache location.
    pub fn resolve_db_path(&self) -> DbResult<PathBuf> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => default_db_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            db_path: None,
            poll_interval_ms: 500,
            join_timeout_ms: 1000,
            result_ttl_secs: DEFAULT_RESULT_TTL_SECS,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}
