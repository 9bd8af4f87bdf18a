// crates/server/src/lib.rs
//! Task progress server library.
//!
//! Axum HTTP surface over the progress protocol: pollers read normalized
//! progress (one-shot or as an SSE stream) and demo jobs can be submitted to
//! the in-process runner.

pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod runner;
pub mod state;

pub use config::Config;
pub use error::*;
pub use self::metrics::{init_metrics, render_metrics, RequestTimer};
pub use routes::api_routes;
pub use runner::{TaskHandle, TaskRunner};
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use task_progress_db::Database;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with default settings.
pub fn create_app(db: Database) -> Router {
    create_app_with_state(AppState::new(db))
}

/// Create the Axum application over an existing state.
///
/// This sets up:
/// - API routes (health, progress, tasks) and `/metrics`
/// - CORS (allows any origin; pollers are usually browser pages)
/// - Request tracing
pub fn create_app_with_state(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// ============================================================================
// Integration Tests
// ============================================================================
