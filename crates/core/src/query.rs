// crates/core/src/query.rs
//! Normalized progress lookup for polling clients.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channel::StatusChannel;
use crate::error::ChannelError;
use crate::snapshot::ProgressSnapshot;
use crate::state::{TaskId, TaskState, TaskStatus};

/// Default bound on waiting for a finished job's return value.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Normalized progress of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressInfo {
    pub complete: bool,
    /// `None` until the job is complete.
    pub success: Option<bool>,
    pub progress: Value,
    /// Return value on success, error rendering on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl ProgressInfo {
    /// Typed view of `progress`, if it has the snapshot shape.
    pub fn snapshot(&self) -> Option<ProgressSnapshot> {
        serde_json::from_value(self.progress.clone()).ok()
    }
}

/// Answer to a progress query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressResponse {
    Info(ProgressInfo),
    /// The queue's raw info for a state this crate does not model.
    Raw(Value),
}

impl ProgressResponse {
    pub fn info(&self) -> Option<&ProgressInfo> {
        match self {
            ProgressResponse::Info(info) => Some(info),
            ProgressResponse::Raw(_) => None,
        }
    }

    /// Whether polling can stop.
    pub fn is_complete(&self) -> bool {
        self.info().is_some_and(|info| info.complete)
    }
}

/// Which class of native state a query resolved through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Ready,
    InProgress,
    Waiting,
    Passthrough,
}

impl Resolution {
    pub fn of(state: &TaskState) -> Self {
        if state.is_ready() {
            Resolution::Ready
        } else {
            match state {
                TaskState::InProgress => Resolution::InProgress,
                TaskState::Pending | TaskState::Started => Resolution::Waiting,
                _ => Resolution::Passthrough,
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Ready => "ready",
            Resolution::InProgress => "in_progress",
            Resolution::Waiting => "waiting",
            Resolution::Passthrough => "passthrough",
        }
    }
}

/// Resolves a job's native status into a [`ProgressResponse`].
#[derive(Clone)]
pub struct ProgressQuery {
    channel: Arc<dyn StatusChannel>,
    join_timeout: Duration,
}

impl ProgressQuery {
    pub fn new(channel: Arc<dyn StatusChannel>) -> Self {
        Self {
            channel,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }

    pub fn with_join_timeout(self, join_timeout: Duration) -> Self {
        Self {
            join_timeout,
            ..self
        }
    }

    pub async fn get_info(&self, task_id: &TaskId) -> Result<ProgressResponse, ChannelError> {
        self.resolve(task_id).await.map(|(_, response)| response)
    }

    /// Like [`get_info`](Self::get_info), also reporting which branch answered.
    pub async fn resolve(
        &self,
        task_id: &TaskId,
    ) -> Result<(Resolution, ProgressResponse), ChannelError> {
        let status = self.channel.status(task_id).await?;
        let resolution = Resolution::of(&status.state);
        tracing::debug!(
            task_id = %task_id,
            state = %status.state,
            resolution = resolution.as_str(),
            "Resolving progress"
        );

        let response = match resolution {
            Resolution::Ready => {
                let success = status.state.is_successful();
                let result = if success {
                    self.channel.join(task_id, self.join_timeout).await?.info
                } else {
                    Value::String(render_info(&status.info))
                };
                ProgressResponse::Info(ProgressInfo {
                    complete: true,
                    success: Some(success),
                    progress: snapshot_value(ProgressSnapshot::completed()),
                    result: Some(result),
                })
            }
            Resolution::InProgress => ProgressResponse::Info(ProgressInfo {
                complete: false,
                success: None,
                progress: status.info,
                result: None,
            }),
            Resolution::Waiting => ProgressResponse::Info(ProgressInfo {
                complete: false,
                success: None,
                progress: snapshot_value(ProgressSnapshot::unknown(
                    status.state == TaskState::Pending,
                )),
                result: None,
            }),
            Resolution::Passthrough => ProgressResponse::Raw(status.info),
        };

        Ok((resolution, response))
    }

    /// Native status, unresolved.
    pub async fn raw_status(&self, task_id: &TaskId) -> Result<TaskStatus, ChannelError> {
        self.channel.status(task_id).await
    }
}

fn snapshot_value(snapshot: ProgressSnapshot) -> Value {
    // A snapshot only holds numbers, booleans and strings.
    serde_json::to_value(snapshot).unwrap_or(Value::Null)
}

/// Text rendering of a failed job's info.
///
/// Failure info carrying an `exc_message` renders as that message, the way an
/// error displays. Strings are kept as-is; anything else becomes JSON text.
fn render_info(info: &Value) -> String {
    match info {
        Value::Object(fields) => match fields.get("exc_message") {
            Some(Value::String(message)) => message.clone(),
            _ => info.to_string(),
        },
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::InMemoryStatusChannel;
    use crate::reporter::{ChannelReporter, ProgressReporter};
    use crate::snapshot::TaskError;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn setup() -> (Arc<InMemoryStatusChannel>, ProgressQuery) {
        let channel = Arc::new(InMemoryStatusChannel::new());
        let query = ProgressQuery::new(channel.clone()).with_join_timeout(Duration::from_millis(50));
        (channel, query)
    }

    #[tokio::test]
    async fn test_pending_task() {
        let (_channel, query) = setup();
        let response = query.get_info(&TaskId::new()).await.unwrap();

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "complete": false,
                "success": null,
                "progress": {"pending": true, "current": 0, "total": 100, "percent": 0.0},
            })
        );
    }

    #[tokio::test]
    async fn test_started_task_is_not_pending() {
        let (channel, query) = setup();
        let id = TaskId::new();
        channel
            .update_state(&id, TaskState::Started, Value::Null)
            .await
            .unwrap();

        let response = query.get_info(&id).await.unwrap();
        let info = response.info().unwrap();
        assert!(!info.complete);
        assert_eq!(info.success, None);
        assert_eq!(info.snapshot().unwrap(), ProgressSnapshot::unknown(false));
    }

    #[tokio::test]
    async fn test_running_task_passes_snapshot_through() {
        let (channel, query) = setup();
        let id = TaskId::new();
        ChannelReporter::new(id, channel.clone())
            .set_progress(30, 120, "loading")
            .await
            .unwrap();

        let response = query.get_info(&id).await.unwrap();
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "complete": false,
                "success": null,
                "progress": {
                    "pending": false,
                    "current": 30,
                    "total": 120,
                    "percent": 25.0,
                    "description": "loading",
                },
            })
        );
    }

    #[tokio::test]
    async fn test_in_progress_meta_is_not_recomputed() {
        let (channel, query) = setup();
        let id = TaskId::new();
        let odd = json!({"current": 5, "total": 10, "percent": 7.0, "extra": "kept"});
        channel
            .update_state(&id, TaskState::InProgress, odd.clone())
            .await
            .unwrap();

        let response = query.get_info(&id).await.unwrap();
        assert_eq!(response.info().unwrap().progress, odd);
    }

    #[tokio::test]
    async fn test_successful_task_returns_result() {
        let (channel, query) = setup();
        let id = TaskId::new();
        channel
            .update_state(&id, TaskState::Success, json!({"rows": 42}))
            .await
            .unwrap();

        let response = query.get_info(&id).await.unwrap();
        assert!(response.is_complete());
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "complete": true,
                "success": true,
                "progress": {"pending": false, "current": 100, "total": 100, "percent": 100.0},
                "result": {"rows": 42},
            })
        );
    }

    #[tokio::test]
    async fn test_failed_task_returns_error_message() {
        let (channel, query) = setup();
        let id = TaskId::new();
        ChannelReporter::new(id, channel.clone())
            .stop_task(3, 7, &TaskError::new("IOError", "disk full"))
            .await
            .unwrap();

        let response = query.get_info(&id).await.unwrap();
        let info = response.info().unwrap();
        assert!(info.complete);
        assert_eq!(info.success, Some(false));
        assert_eq!(info.snapshot().unwrap(), ProgressSnapshot::completed());

        assert_eq!(info.result, Some(json!("disk full")));
    }

    #[tokio::test]
    async fn test_failed_task_without_message_is_json_text() {
        let (channel, query) = setup();
        let id = TaskId::new();
        channel
            .update_state(&id, TaskState::Failure, json!({"exc_type": "IOError", "exc_message": 5}))
            .await
            .unwrap();

        let response = query.get_info(&id).await.unwrap();
        let rendered = response.info().unwrap().result.clone().unwrap();
        let parsed: Value = serde_json::from_str(rendered.as_str().unwrap()).unwrap();
        assert_eq!(parsed, json!({"exc_type": "IOError", "exc_message": 5}));
    }

    #[tokio::test]
    async fn test_failed_task_with_plain_string_info() {
        let (channel, query) = setup();
        let id = TaskId::new();
        channel
            .update_state(&id, TaskState::Failure, json!("ValueError('bad input')"))
            .await
            .unwrap();

        let response = query.get_info(&id).await.unwrap();
        assert_eq!(
            response.info().unwrap().result,
            Some(json!("ValueError('bad input')"))
        );
    }

    #[tokio::test]
    async fn test_revoked_task_is_complete_and_unsuccessful() {
        let (channel, query) = setup();
        let id = TaskId::new();
        channel
            .update_state(&id, TaskState::Revoked, Value::Null)
            .await
            .unwrap();

        let info = query.get_info(&id).await.unwrap().info().cloned().unwrap();
        assert!(info.complete);
        assert_eq!(info.success, Some(false));
        assert_eq!(info.result, Some(json!("null")));
    }

    #[tokio::test]
    async fn test_unknown_state_returns_raw_info() {
        let (channel, query) = setup();
        let id = TaskId::new();
        let raw = json!({"exc": "ConnectionError", "countdown": 30});
        channel
            .update_state(&id, TaskState::Retry, raw.clone())
            .await
            .unwrap();

        let response = query.get_info(&id).await.unwrap();
        assert_eq!(response, ProgressResponse::Raw(raw.clone()));
        assert!(!response.is_complete());
        assert_eq!(serde_json::to_value(&response).unwrap(), raw);
    }

    #[tokio::test]
    async fn test_custom_state_returns_raw_info() {
        let (channel, query) = setup();
        let id = TaskId::new();
        channel
            .update_state(&id, TaskState::from("THROTTLED"), json!(null))
            .await
            .unwrap();

        let response = query.get_info(&id).await.unwrap();
        assert_eq!(response, ProgressResponse::Raw(Value::Null));
    }

    #[tokio::test]
    async fn test_resolve_reports_branch() {
        let (channel, query) = setup();
        let id = TaskId::new();
        let (resolution, _) = query.resolve(&id).await.unwrap();
        assert_eq!(resolution, Resolution::Waiting);

        ChannelReporter::new(id, channel.clone())
            .set_progress(1, 2, "")
            .await
            .unwrap();
        let (resolution, response) = query.resolve(&id).await.unwrap();
        assert_eq!(resolution, Resolution::InProgress);
        assert!(!response.is_complete());
    }

    #[test]
    fn test_resolution_classes() {
        assert_eq!(Resolution::of(&TaskState::Success), Resolution::Ready);
        assert_eq!(Resolution::of(&TaskState::Failure), Resolution::Ready);
        assert_eq!(Resolution::of(&TaskState::InProgress), Resolution::InProgress);
        assert_eq!(Resolution::of(&TaskState::Pending), Resolution::Waiting);
        assert_eq!(Resolution::of(&TaskState::Started), Resolution::Waiting);
        assert_eq!(Resolution::of(&TaskState::Retry), Resolution::Passthrough);
    }
}
