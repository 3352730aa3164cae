// crates/server/src/routes/jobs.rs
//! API routes for job inspection.
//!
//! - GET /jobs — List job summaries, optionally filtered by origin tag
//! - GET /jobs/{id} — Full job snapshot
//! - GET /jobs/{id}/tasks/{key} — One task, by index or title

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use fintrack_jobs::{JobSnapshot, JobSummary, TaskKey, TaskSnapshot};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    /// Only list jobs created with this origin tag.
    pub server: Option<String>,
}

/// GET /api/jobs — List job summaries, oldest first.
async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListJobsQuery>,
) -> ApiResult<Json<Vec<JobSummary>>> {
    let jobs = match query.server.as_deref() {
        Some("") => {
            return Err(ApiError::BadRequest(
                "server tag must not be empty".to_string(),
            ))
        }
        Some(server) => state.jobs.get_jobs(server),
        None => state.jobs.get_all_jobs(),
    };

    let mut summaries: Vec<JobSummary> = jobs.iter().map(|job| job.summary()).collect();
    summaries.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
    Ok(Json(summaries))
}

/// GET /api/jobs/{id} — Full snapshot of one job.
async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    let job = state
        .jobs
        .get_job(&job_id)
        .ok_or_else(|| ApiError::JobNotFound(job_id.clone()))?;
    Ok(Json(job.snapshot()))
}

/// GET /api/jobs/{id}/tasks/{key} — One task. Numeric keys are positions.
async fn get_task(
    State(state): State<Arc<AppState>>,
    Path((job_id, key)): Path<(String, String)>,
) -> ApiResult<Json<TaskSnapshot>> {
    let job = state
        .jobs
        .get_job(&job_id)
        .ok_or_else(|| ApiError::JobNotFound(job_id.clone()))?;
    let task = job
        .get_task(TaskKey::parse(&key))
        .ok_or_else(|| ApiError::TaskNotFound {
            job_id: job_id.clone(),
            task: key.clone(),
        })?;
    Ok(Json(task.snapshot()))
}

/// Build the jobs router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", get(get_job))
        .route("/jobs/{id}/tasks/{key}", get(get_task))
}
