// crates/server/src/main.rs
//! Task progress server binary.

use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use task_progress_db::Database;
use task_progress_server::{create_app_with_state, init_metrics, AppState, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_filter).unwrap_or_else(|e| {
            eprintln!("Invalid log filter {:?}: {e}", config.log_filter);
            EnvFilter::new(task_progress_server::config::DEFAULT_LOG_FILTER)
        }))
        .compact()
        .init();

    init_metrics();

    eprintln!("\ntask-progress v{}\n", env!("CARGO_PKG_VERSION"));

    let db_path = config.resolve_db_path()?;
    let db = Database::new(&db_path).await?;

    let state = AppState::from_config(db, &config);
    let app = create_app_with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        db_path = %db_path.display(),
        poll_interval_ms = config.poll_interval_ms,
        join_timeout_ms = config.join_timeout_ms,
        "Server listening"
    );
    eprintln!("  -> http://localhost:{}\n", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
