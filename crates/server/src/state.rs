// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::{Duration, Instant};

use task_progress_core::{InMemoryStatusChannel, ProgressQuery, StatusChannel};
use task_progress_db::Database;

use crate::config::Config;
use crate::runner::TaskRunner;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Database handle holding progress records.
    pub db: Database,
    /// Native per-task status, written by reporters and the runner.
    pub channel: Arc<dyn StatusChannel>,
    /// Normalized reads over `channel`.
    pub query: ProgressQuery,
    /// Runs submitted jobs in-process.
    pub runner: Arc<TaskRunner>,
    /// Interval between pushes on a progress stream.
    pub poll_interval: Duration,
}

impl AppState {
    /// Create a new application state with default intervals, wrapped in an Arc for sharing.
    pub fn new(db: Database) -> Arc<Self> {
        Self::from_config(db, &Config::default())
    }

    pub fn from_config(db: Database, config: &Config) -> Arc<Self> {
        let channel: Arc<dyn StatusChannel> =
            Arc::new(InMemoryStatusChannel::with_retention(config.result_ttl()));
        let query = ProgressQuery::new(Arc::clone(&channel)).with_join_timeout(config.join_timeout());
        let runner = Arc::new(TaskRunner::new(Arc::clone(&channel), Arc::new(db.clone())));

        Arc::new(Self {
            start_time: Instant::now(),
            db,
            channel,
            query,
            runner,
            poll_interval: config.poll_interval(),
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
