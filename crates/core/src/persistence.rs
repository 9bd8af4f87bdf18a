// crates/core/src/persistence.rs
//! Durable record of submitted jobs.
//!
//! The reporter only ever creates records; reading them back is left to
//! dashboards and audits built on the concrete store.

use std::fmt;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::state::TaskId;

/// Owning principal of a job (a user reference in the host application).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Coarse lifecycle state kept in the persistent record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordState {
    #[default]
    Pending,
    Started,
    Finished,
    Failed,
}

impl RecordState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordState::Pending => "PENDING",
            RecordState::Started => "STARTED",
            RecordState::Finished => "FINISHED",
            RecordState::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(RecordState::Pending),
            "STARTED" => Some(RecordState::Started),
            "FINISHED" => Some(RecordState::Finished),
            "FAILED" => Some(RecordState::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields supplied when a job is submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProgressRecord {
    pub task_id: TaskId,
    pub completed: bool,
    pub user: Principal,
    pub state: RecordState,
}

impl NewProgressRecord {
    /// A fresh, not yet completed record in the `PENDING` state.
    pub fn new(task_id: TaskId, user: Principal) -> Self {
        Self {
            task_id,
            completed: false,
            user,
            state: RecordState::Pending,
        }
    }
}

/// A stored job record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub id: i64,
    pub task_id: TaskId,
    pub completed: bool,
    pub user: Principal,
    pub state: RecordState,
    pub created_at: DateTime<Utc>,
}

/// Write-only store for job records.
#[async_trait]
pub trait ProgressPersistence: Send + Sync {
    async fn create(&self, record: NewProgressRecord) -> Result<ProgressRecord, PersistenceError>;
}

/// In-memory implementation for development and testing.
pub struct InMemoryPersistence {
    records: RwLock<Vec<ProgressRecord>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    /// Copy of every record created so far, in creation order.
    pub fn records(&self) -> Vec<ProgressRecord> {
        match self.records.read() {
            Ok(records) => records.clone(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading progress records: {e}");
                Vec::new()
            }
        }
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProgressPersistence for InMemoryPersistence {
    async fn create(&self, record: NewProgressRecord) -> Result<ProgressRecord, PersistenceError> {
        let mut records = self.records.write().map_err(PersistenceError::storage)?;
        let stored = ProgressRecord {
            id: records.len() as i64 + 1,
            task_id: record.task_id,
            completed: record.completed,
            user: record.user,
            state: record.state,
            created_at: Utc::now(),
        };
        records.push(stored.clone());
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_state_strings() {
        for state in [
            RecordState::Pending,
            RecordState::Started,
            RecordState::Finished,
            RecordState::Failed,
        ] {
            assert_eq!(RecordState::parse(state.as_str()), Some(state));
        }
        assert_eq!(RecordState::parse("DONE"), None);
        assert_eq!(RecordState::default(), RecordState::Pending);
        assert_eq!(
            serde_json::to_string(&RecordState::Finished).unwrap(),
            "\"FINISHED\""
        );
    }

    #[test]
    fn test_new_record_defaults() {
        let id = TaskId::new();
        let record = NewProgressRecord::new(id, Principal::new("alice"));
        assert!(!record.completed);
        assert_eq!(record.state, RecordState::Pending);
        assert_eq!(record.task_id, id);
    }

    #[tokio::test]
    async fn test_in_memory_create_assigns_ids() {
        let store = InMemoryPersistence::new();
        let first = store
            .create(NewProgressRecord::new(TaskId::new(), Principal::new("alice")))
            .await
            .unwrap();
        let second = store
            .create(NewProgressRecord::new(TaskId::new(), Principal::new("bob")))
            .await
            .unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.records().len(), 2);
        assert_eq!(store.records()[1].user.as_str(), "bob");
    }
}
