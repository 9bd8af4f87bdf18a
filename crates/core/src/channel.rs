// crates/core/src/channel.rs
//! The job-queue's per-job status channel.
//!
//! Each job id maps to a single latest-state slot. Writers overwrite it
//! (last-write-wins); readers get a copy without blocking writers.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::ChannelError;
use crate::state::{TaskId, TaskState, TaskStatus};

/// Read/write access to the job-queue's status records.
#[async_trait]
pub trait StatusChannel: Send + Sync {
    /// Replace the job's state and info.
    async fn update_state(
        &self,
        task_id: &TaskId,
        state: TaskState,
        info: Value,
    ) -> Result<(), ChannelError>;

    /// Latest status of the job. Unknown ids report [`TaskState::Pending`].
    async fn status(&self, task_id: &TaskId) -> Result<TaskStatus, ChannelError>;

    /// Wait up to `timeout` for the job to reach a terminal state and return
    /// its final status.
    async fn join(&self, task_id: &TaskId, timeout: Duration) -> Result<TaskStatus, ChannelError>;
}

/// How long a finished job's status stays readable by default.
pub const DEFAULT_RESULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

struct Slot {
    sender: watch::Sender<TaskStatus>,
    /// Set while the slot holds a terminal state.
    finished_at: Option<Instant>,
}

impl Slot {
    fn new(status: TaskStatus, now: Instant) -> Self {
        let finished_at = status.state.is_ready().then_some(now);
        Self {
            sender: watch::channel(status).0,
            finished_at,
        }
    }

    fn expired(&self, now: Instant, retention: Duration) -> bool {
        self.finished_at
            .is_some_and(|at| now.saturating_duration_since(at) >= retention)
    }
}

/// In-process status channel backed by one `watch` slot per job.
///
/// Finished jobs are dropped once they have been terminal for longer than
/// the retention period; afterwards their id reads as pending again. Slots
/// of running jobs are never evicted.
pub struct InMemoryStatusChannel {
    slots: RwLock<HashMap<TaskId, Slot>>,
    retention: Duration,
}

impl InMemoryStatusChannel {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RESULT_RETENTION)
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            retention,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Drop finished slots older than the retention period. Returns how many
    /// were removed.
    pub fn evict_expired(&self) -> usize {
        match self.slots.write() {
            Ok(mut slots) => Self::evict(&mut slots, self.retention, Instant::now()),
            Err(e) => {
                tracing::error!("RwLock poisoned writing status slots: {e}");
                0
            }
        }
    }

    fn evict(slots: &mut HashMap<TaskId, Slot>, retention: Duration, now: Instant) -> usize {
        let before = slots.len();
        slots.retain(|_, slot| !slot.expired(now, retention));
        let evicted = before - slots.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = slots.len(), "Evicted finished task statuses");
        }
        evicted
    }

    /// Number of jobs that have published at least one status.
    pub fn len(&self) -> usize {
        match self.slots.read() {
            Ok(slots) => slots.len(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading status slots: {e}");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn subscribe(&self, task_id: &TaskId) -> Result<watch::Receiver<TaskStatus>, ChannelError> {
        if let Some(rx) = self
            .slots
            .read()
            .map_err(ChannelError::backend)?
            .get(task_id)
            .map(|slot| slot.sender.subscribe())
        {
            return Ok(rx);
        }

        // First observer of an unseen job: create its slot so a later write wakes us.
        let mut slots = self.slots.write().map_err(ChannelError::backend)?;
        let slot = slots
            .entry(*task_id)
            .or_insert_with(|| Slot::new(TaskStatus::pending(*task_id), Instant::now()));
        Ok(slot.sender.subscribe())
    }
}

impl Default for InMemoryStatusChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatusChannel for InMemoryStatusChannel {
    async fn update_state(
        &self,
        task_id: &TaskId,
        state: TaskState,
        info: Value,
    ) -> Result<(), ChannelError> {
        let status = TaskStatus {
            task_id: *task_id,
            state,
            info,
        };
        tracing::trace!(task_id = %task_id, state = %status.state, "status update");

        let now = Instant::now();
        let mut slots = self.slots.write().map_err(ChannelError::backend)?;
        match slots.get_mut(task_id) {
            Some(slot) => {
                slot.finished_at = status.state.is_ready().then_some(now);
                slot.sender.send_replace(status);
            }
            None => {
                // Sweep expired slots whenever a new job shows up.
                Self::evict(&mut slots, self.retention, now);
                slots.insert(*task_id, Slot::new(status, now));
            }
        }
        Ok(())
    }

    async fn status(&self, task_id: &TaskId) -> Result<TaskStatus, ChannelError> {
        let slots = self.slots.read().map_err(ChannelError::backend)?;
        Ok(slots
            .get(task_id)
            .map(|slot| slot.sender.borrow().clone())
            .unwrap_or_else(|| TaskStatus::pending(*task_id)))
    }

    async fn join(&self, task_id: &TaskId, timeout: Duration) -> Result<TaskStatus, ChannelError> {
        let mut rx = self.subscribe(task_id)?;

        let waited = tokio::time::timeout(timeout, rx.wait_for(|s| s.state.is_ready())).await;
        match waited {
            Ok(Ok(status)) => Ok(status.clone()),
            Ok(Err(_)) => Err(ChannelError::Closed { task_id: *task_id }),
            Err(_) => Err(ChannelError::JoinTimeout {
                task_id: *task_id,
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }
}
