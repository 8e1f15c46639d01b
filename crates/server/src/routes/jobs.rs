use std::sync::Arc;

use analysis_worker::jobs::{JobRequest, JobStatus, JobStatusView};
use analysis_worker::JobCoordinator;
use axum::{extract::Path, http::StatusCode, Extension, Json};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::error::AppError;
use crate::owner::Owner;

/// Malformed ids are just jobs that do not exist
fn parse_job_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Job not found".into()))
}

/// POST /api/jobs
pub async fn start_job(
    Extension(coordinator): Extension<Arc<JobCoordinator>>,
    Owner(owner): Owner,
    Json(request): Json<JobRequest>,
) -> Result<(StatusCode, Json<JsonValue>), AppError> {
    let job_id = coordinator.start_job(&owner, request).await?;
    tracing::info!(job_id = %job_id, owner = %owner, "Job accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "jobId": job_id,
            "status": JobStatus::Queued,
        })),
    ))
}

/// GET /api/jobs/{job_id}
pub async fn get_job_status(
    Extension(coordinator): Extension<Arc<JobCoordinator>>,
    Owner(owner): Owner,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusView>, AppError> {
    let job_id = parse_job_id(&job_id)?;
    let view = coordinator.get_job_status(&owner, job_id).await?;
    Ok(Json(view))
}

/// POST /api/jobs/{job_id}/cancel
pub async fn cancel_job(
    Extension(coordinator): Extension<Arc<JobCoordinator>>,
    Owner(owner): Owner,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusView>, AppError> {
    let job_id = parse_job_id(&job_id)?;
    let view = coordinator.cancel_job(&owner, job_id).await?;
    Ok(Json(view))
}

/// GET /api/jobs/{job_id}/games
pub async fn list_game_analyses(
    Extension(coordinator): Extension<Arc<JobCoordinator>>,
    Owner(owner): Owner,
    Path(job_id): Path<String>,
) -> Result<Json<JsonValue>, AppError> {
    let job_id = parse_job_id(&job_id)?;
    let games = coordinator.list_game_analyses(&owner, job_id).await?;
    let total = games.len();

    Ok(Json(json!({
        "jobId": job_id,
        "games": games,
        "total": total,
    })))
}
