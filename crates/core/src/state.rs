// crates/core/src/state.rs
//! Native job-queue status types.
//!
//! A job-queue exposes, per job id, a state name plus an opaque `info` value:
//! the latest published metadata while running, the return value on success,
//! or the error info on failure. States this crate does not model are kept
//! verbatim in [`TaskState::Other`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// State name published while a job reports incremental progress.
pub const PROGRESS_STATE: &str = "IN_PROGRESS";

/// Unique identifier of a job, shared by the job-queue and the persistent store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The all-zero id.
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TaskId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Native state of a job as reported by the job-queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum TaskState {
    /// Queued, or unknown to the queue.
    Pending,
    /// Picked up by a worker, no progress reported yet.
    Started,
    /// The job published a progress snapshot.
    InProgress,
    Success,
    Failure,
    Retry,
    Revoked,
    /// Any state name this crate does not model.
    Other(String),
}

impl TaskState {
    pub fn as_str(&self) -> &str {
        match self {
            TaskState::Pending => "PENDING",
            TaskState::Started => "STARTED",
            TaskState::InProgress => PROGRESS_STATE,
            TaskState::Success => "SUCCESS",
            TaskState::Failure => "FAILURE",
            TaskState::Retry => "RETRY",
            TaskState::Revoked => "REVOKED",
            TaskState::Other(name) => name,
        }
    }

    /// Whether the job reached a terminal state.
    pub fn is_ready(&self) -> bool {
        matches!(
            self,
            TaskState::Success | TaskState::Failure | TaskState::Revoked
        )
    }

    pub fn is_successful(&self) -> bool {
        matches!(self, TaskState::Success)
    }
}

impl From<String> for TaskState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PENDING" => TaskState::Pending,
            "STARTED" => TaskState::Started,
            PROGRESS_STATE => TaskState::InProgress,
            "SUCCESS" => TaskState::Success,
            "FAILURE" => TaskState::Failure,
            "RETRY" => TaskState::Retry,
            "REVOKED" => TaskState::Revoked,
            _ => TaskState::Other(value),
        }
    }
}

impl From<&str> for TaskState {
    fn from(value: &str) -> Self {
        TaskState::from(value.to_string())
    }
}

impl From<TaskState> for String {
    fn from(value: TaskState) -> Self {
        match value {
            TaskState::Other(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The job-queue's native status record for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: TaskId,
    pub state: TaskState,
    /// Latest meta, return value, or error info depending on `state`.
    pub info: Value,
}

impl TaskStatus {
    /// Status the queue reports for a job it has not seen yet.
    pub fn pending(task_id: TaskId) -> Self {
        Self {
            task_id,
            state: TaskState::Pending,
            info: Value::Null,
        }
    }
}
