// crates/server/src/main.rs
//! Fintrack server binary.

use std::sync::Arc;

use anyhow::Result;
use fintrack_jobs::JobController;
use fintrack_server::{create_app, AppState, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,fintrack_server=info,fintrack_jobs=info".into()),
        )
        .init();

    let config = ServerConfig::from_env();

    let jobs = Arc::new(JobController::new());
    let _sweeper = jobs.spawn_sweeper(config.sweep_interval, config.job_ttl);

    let app = create_app(AppState::new(jobs));

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        job_ttl_secs = config.job_ttl.as_secs(),
        "Fintrack server listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}
