// crates/server/src/routes/tasks.rs
//! Task submission endpoints.
//!
//! - POST /tasks/countdown - run a demo job that reports progress once per step
//! - GET /tasks?user=... - a user's progress records, newest first

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use task_progress_core::{Principal, ProgressRecord, ProgressReporter, TaskError, TaskId};

use crate::error::{ApiError, ApiResult};
use crate::metrics::RequestTimer;
use crate::state::AppState;

const MAX_STEPS: u64 = 10_000;
const MAX_STEP_MS: u64 = 60_000;
const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 500;

fn default_step_ms() -> u64 {
    100
}

/// Request body for `POST /api/tasks/countdown`.
#[derive(Debug, Deserialize)]
pub struct CountdownRequest {
    pub steps: u64,
    #[serde(default = "default_step_ms")]
    pub step_ms: u64,
    pub user: String,
    /// Abort with a reported failure when this step is reached.
    #[serde(default)]
    pub fail_at: Option<u64>,
}

impl CountdownRequest {
    fn validate(&self) -> ApiResult<()> {
        if self.user.trim().is_empty() {
            return Err(ApiError::BadRequest("user must not be empty".to_string()));
        }
        if self.steps == 0 || self.steps > MAX_STEPS {
            return Err(ApiError::BadRequest(format!(
                "steps must be between 1 and {MAX_STEPS}, got {}",
                self.steps
            )));
        }
        if self.step_ms > MAX_STEP_MS {
            return Err(ApiError::BadRequest(format!(
                "step_ms must be at most {MAX_STEP_MS}, got {}",
                self.step_ms
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct SubmitResponse {
    pub task_id: TaskId,
}

/// POST /api/tasks/countdown - Submit a countdown job.
///
/// Returns 202 with the task id; poll `/api/progress/{task_id}` for progress.
async fn submit_countdown(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CountdownRequest>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let timer = RequestTimer::new("tasks_countdown");
    if let Err(e) = req.validate() {
        timer.finish_err(400);
        return Err(e);
    }

    let CountdownRequest {
        steps,
        step_ms,
        user,
        fail_at,
    } = req;
    let handle = state
        .runner
        .spawn(Principal::new(user), move |reporter| async move {
            for step in 1..=steps {
                tokio::time::sleep(Duration::from_millis(step_ms)).await;
                if fail_at == Some(step) {
                    let error = TaskError::new("CountdownAborted", format!("aborted at step {step}"));
                    reporter
                        .stop_task(step, steps, &error)
                        .await
                        .map_err(|e| TaskError::from_error(&e))?;
                    return Err(error);
                }
                reporter
                    .set_progress(step, steps, &format!("step {step} of {steps}"))
                    .await
                    .map_err(|e| TaskError::from_error(&e))?;
            }
            Ok::<_, TaskError>(json!({ "steps": steps }))
        })
        .await?;

    tracing::info!(task_id = %handle.task_id, steps, step_ms, "Countdown submitted");
    timer.finish_ok();
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            task_id: handle.task_id,
        }),
    ))
}

/// Query parameters for `GET /api/tasks`.
#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    pub user: String,
    pub limit: Option<i64>,
}

/// GET /api/tasks?user=...&limit=... - Progress records owned by a user.
async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Json<Vec<ProgressRecord>>> {
    let timer = RequestTimer::new("tasks_list");
    if query.user.trim().is_empty() {
        timer.finish_err(400);
        return Err(ApiError::BadRequest("user must not be empty".to_string()));
    }
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    if !(1..=MAX_LIST_LIMIT).contains(&limit) {
        timer.finish_err(400);
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {MAX_LIST_LIMIT}, got {limit}"
        )));
    }

    let user = Principal::new(query.user);
    match state.db.list_progress_records_for_user(&user, limit).await {
        Ok(records) => {
            timer.finish_ok();
            Ok(Json(records))
        }
        Err(e) => {
            timer.finish_err(500);
            Err(e.into())
        }
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", get(list_tasks))
        .route("/tasks/countdown", post(submit_countdown))
}
