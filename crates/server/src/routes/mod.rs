//! API route handlers for the task progress server.

pub mod health;
pub mod metrics;
pub mod progress;
pub mod tasks;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined router: API routes under `/api` plus `/metrics`.
///
/// Routes:
/// - GET  /api/health - Health check
/// - GET  /api/progress/{task_id} - Normalized progress of a task
/// - GET  /api/progress/{task_id}/stream - SSE stream of progress until complete
/// - GET  /api/tasks?user=... - Progress records owned by a user
/// - POST /api/tasks/countdown - Submit a demo countdown job
/// - GET  /metrics - Prometheus metrics
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", progress::router())
        .nest("/api", tasks::router())
        .merge(metrics::router())
        .with_state(state)
}
