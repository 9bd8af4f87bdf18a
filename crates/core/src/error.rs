// crates/core/src/error.rs
use thiserror::Error;

use crate::state::TaskId;

/// Errors raised by a status channel backend.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Timed out after {timeout_ms}ms waiting for task {task_id} to finish")]
    JoinTimeout { task_id: TaskId, timeout_ms: u64 },

    #[error("Status channel for task {task_id} closed")]
    Closed { task_id: TaskId },

    #[error("Status channel backend error: {0}")]
    Backend(String),
}

/// Errors raised by a [`ProgressPersistence`](crate::ProgressPersistence) store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Errors surfaced to a job by its progress reporter.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to publish progress: {0}")]
    Channel(#[from] ChannelError),

    #[error("Failed to record task: {0}")]
    Persistence(#[from] PersistenceError),
}

impl ChannelError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

impl PersistenceError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}
