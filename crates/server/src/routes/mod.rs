pub mod health;
pub mod jobs;

use std::sync::Arc;

use analysis_worker::JobCoordinator;
use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::cors::{Any, CorsLayer};

/// All routes, sharing one coordinator
pub fn router(coordinator: Arc<JobCoordinator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/jobs", post(jobs::start_job))
        .route("/api/jobs/{job_id}", get(jobs::get_job_status))
        .route("/api/jobs/{job_id}/cancel", post(jobs::cancel_job))
        .route("/api/jobs/{job_id}/games", get(jobs::list_game_analyses))
        .layer(Extension(coordinator))
        .layer(cors)
}
