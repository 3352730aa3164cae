// crates/server/src/routes/mod.rs
//! API route handlers for the fintrack server.

pub mod health;
pub mod jobs;
pub mod observe;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET /api/health - Health check
/// - GET /api/jobs - List job summaries (`?server=` filters by origin tag)
/// - GET /api/jobs/{id} - Full job snapshot
/// - GET /api/jobs/{id}/tasks/{key} - One task by index or title
/// - GET /api/jobs/{id}/ws - WebSocket stream of job updates
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", jobs::router())
        .nest("/api", observe::router())
        .with_state(state)
}
