// crates/server/src/runner.rs
//! In-process task runner that drives jobs through the status channel.

use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde_json::{json, Value};
use task_progress_core::{
    PersistentChannelReporter, Principal, ProgressPersistence, ReportError, StatusChannel,
    TaskError, TaskId, TaskState,
};
use tokio::task::JoinHandle;

use crate::metrics::{record_task_finished, set_tasks_running};

/// Handle to a spawned task.
pub struct TaskHandle {
    pub task_id: TaskId,
    join: JoinHandle<()>,
}

impl TaskHandle {
    /// Wait until the task has published its terminal state.
    pub async fn finished(self) -> bool {
        self.join.await.is_ok()
    }
}

/// Runs jobs on tokio, each with its own [`PersistentChannelReporter`].
///
/// The runner marks a task `STARTED` before the job runs and publishes
/// `SUCCESS` with the job's return value, or `FAILURE` with the error,
/// once it returns.
pub struct TaskRunner {
    channel: Arc<dyn StatusChannel>,
    store: Arc<dyn ProgressPersistence>,
    running: Arc<RwLock<HashSet<TaskId>>>,
}

impl TaskRunner {
    pub fn new(channel: Arc<dyn StatusChannel>, store: Arc<dyn ProgressPersistence>) -> Self {
        Self {
            channel,
            store,
            running: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Submit a job owned by `user`.
    ///
    /// The progress record is created before this returns, so a failed
    /// submission leaves nothing in the channel.
    pub async fn spawn<F, Fut, T>(&self, user: Principal, f: F) -> Result<TaskHandle, ReportError>
    where
        F: FnOnce(Arc<PersistentChannelReporter>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let task_id = TaskId::new();
        let reporter = PersistentChannelReporter::create(
            task_id,
            Arc::clone(&self.channel),
            self.store.as_ref(),
            user,
        )
        .await?;
        self.channel
            .update_state(&task_id, TaskState::Started, Value::Null)
            .await?;

        tracing::info!(task_id = %task_id, user = %reporter.record().user, "Task started");
        self.mark_running(task_id);

        let reporter = Arc::new(reporter);
        let channel = Arc::clone(&self.channel);
        let running = Arc::clone(&self.running);
        let join = tokio::spawn(async move {
            // A panicking job still has to reach a terminal state.
            let outcome = match tokio::spawn(f(Arc::clone(&reporter))).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => {
                    let message = panic_message(e.into_panic());
                    tracing::error!(task_id = %task_id, message = %message, "Task panicked");
                    Err(TaskError::new("panic", message))
                }
                Err(e) => Err(TaskError::new("cancelled", e.to_string())),
            };
            let stopped = reporter.channel_reporter().is_stopped();

            let (state, info) = match outcome {
                Ok(_) if stopped => {
                    tracing::warn!(task_id = %task_id, "Task returned after stop_task; keeping failure");
                    (None, Value::Null)
                }
                Ok(value) => match serde_json::to_value(value) {
                    Ok(info) => (Some(TaskState::Success), info),
                    Err(e) => {
                        let error = TaskError::from_error(&e);
                        (Some(TaskState::Failure), failure_info(&error))
                    }
                },
                // stop_task already published a richer FailureInfo.
                Err(_) if stopped => (None, Value::Null),
                Err(error) => (Some(TaskState::Failure), failure_info(&error)),
            };

            match state {
                Some(state) => {
                    let outcome = if state.is_successful() { "success" } else { "failure" };
                    if let Err(e) = channel.update_state(&task_id, state, info).await {
                        tracing::error!(task_id = %task_id, error = %e, "Failed to publish task outcome");
                    }
                    tracing::info!(task_id = %task_id, outcome, "Task finished");
                    record_task_finished(outcome);
                }
                None => record_task_finished("failure"),
            }

            match running.write() {
                Ok(mut running) => {
                    running.remove(&task_id);
                    set_tasks_running(running.len());
                }
                Err(e) => tracing::error!("RwLock poisoned writing running tasks: {e}"),
            }
        });

        Ok(TaskHandle { task_id, join })
    }

    /// Ids of tasks whose job has not returned yet.
    pub fn running_tasks(&self) -> Vec<TaskId> {
        match self.running.read() {
            Ok(running) => running.iter().copied().collect(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading running tasks: {e}");
                Vec::new()
            }
        }
    }

    fn mark_running(&self, task_id: TaskId) {
        match self.running.write() {
            Ok(mut running) => {
                running.insert(task_id);
                set_tasks_running(running.len());
            }
            Err(e) => tracing::error!("RwLock poisoned writing running tasks: {e}"),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "job panicked".to_string()),
    }
}

fn failure_info(error: &TaskError) -> Value {
    json!({
        "exc_type": error.kind(),
        "exc_message": error.message(),
    })
}
