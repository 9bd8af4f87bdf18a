// crates/server/src/routes/progress.rs
//! Progress polling endpoints.
//!
//! - GET /progress/{task_id} - current normalized progress
//! - GET /progress/{task_id}/stream - SSE stream of progress until the task completes

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::{Json, Router};
use task_progress_core::{ChannelError, ProgressResponse, TaskId};

use crate::error::{ApiError, ApiResult};
use crate::metrics::{record_resolution, RequestTimer};
use crate::state::AppState;

fn parse_task_id(raw: &str) -> ApiResult<TaskId> {
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("invalid task id {raw:?}: {e}")))
}

/// GET /api/progress/{task_id} - Normalized progress of one task.
///
/// Unknown ids report as pending; the job-queue cannot tell them apart from
/// jobs it has not picked up yet.
async fn get_progress(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<ProgressResponse>> {
    let timer = RequestTimer::new("progress");
    let task_id = match parse_task_id(&task_id) {
        Ok(id) => id,
        Err(e) => {
            timer.finish_err(400);
            return Err(e);
        }
    };

    match state.query.resolve(&task_id).await {
        Ok((resolution, response)) => {
            record_resolution(resolution);
            timer.finish_ok();
            Ok(Json(response))
        }
        Err(e) => {
            let status = match e {
                ChannelError::JoinTimeout { .. } => 504,
                _ => 503,
            };
            timer.finish_err(status);
            Err(e.into())
        }
    }
}

/// GET /api/progress/{task_id}/stream - SSE stream of progress.
///
/// Emits a `progress` event every poll interval and ends after the first
/// complete response. A lookup failure emits one `error` event and ends.
async fn stream_progress(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> ApiResult<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>> {
    let task_id = parse_task_id(&task_id)?;
    let query = state.query.clone();
    let poll_interval = state.poll_interval;

    let stream = async_stream::stream! {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            ticker.tick().await;
            match query.resolve(&task_id).await {
                Ok((resolution, response)) => {
                    record_resolution(resolution);
                    let complete = response.is_complete();
                    let json = serde_json::to_string(&response).unwrap_or_default();
                    yield Ok(Event::default().event("progress").data(json));
                    if complete {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(task_id = %task_id, error = %e, "Progress stream lookup failed");
                    yield Ok(Event::default().event("error").data(e.to_string()));
                    break;
                }
            }
        }
        tracing::debug!(task_id = %task_id, "Progress stream closed");
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/progress/{task_id}", get(get_progress))
        .route("/progress/{task_id}/stream", get(stream_progress))
}
