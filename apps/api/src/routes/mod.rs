pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::refinement::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/job-analysis", post(handlers::handle_job_analysis))
        .route(
            "/api/v1/resumes/:id/refine",
            post(handlers::handle_refine_section),
        )
        .route(
            "/api/v1/resumes/:id/refine/experience/stream",
            get(handlers::handle_refine_experience_stream),
        )
        .with_state(state)
}
