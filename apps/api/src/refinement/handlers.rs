//! Axum route handlers for the Refinement API.

use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, Sse},
    Json,
};
use futures::Stream;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::LlmConfig;
use crate::models::resume::{get_resume, ResumeRow};
use crate::refinement::error::RefineError;
use crate::refinement::job_analyzer::{analyze_job_description, JobAnalysis};
use crate::refinement::orchestrator::ANALYSIS_TEMPERATURE;
use crate::refinement::section::{refine_resume_section, ResumeSection, SectionRefinement};
use crate::refinement::sse::{experience_refinement_sse, ExperienceStreamRequest};
use crate::settings::{get_user_settings, resolve_llm_config};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct JobAnalysisRequest {
    pub user_id: Uuid,
    pub job_description: String,
}

#[derive(Debug, Deserialize)]
pub struct SectionRefineRequest {
    pub user_id: Uuid,
    pub job_description: String,
    pub target_section: ResumeSection,
}

#[derive(Debug, Deserialize)]
pub struct ExperienceStreamQuery {
    pub user_id: Uuid,
    pub job_description: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/job-analysis
///
/// Runs the job analyzer on its own, using the caller's LLM settings.
pub async fn handle_job_analysis(
    State(state): State<AppState>,
    Json(request): Json<JobAnalysisRequest>,
) -> Result<Json<JobAnalysis>, AppError> {
    let llm_config = load_llm_config(&state, request.user_id).await?;
    let model = state
        .refinement
        .models
        .build(&llm_config, ANALYSIS_TEMPERATURE)
        .map_err(RefineError::from)?;

    let (analysis, _) = analyze_job_description(model.as_ref(), &request.job_description, None).await?;
    Ok(Json(analysis))
}

/// POST /api/v1/resumes/:id/refine
///
/// Refines one non-experience section synchronously.
pub async fn handle_refine_section(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
    Json(request): Json<SectionRefineRequest>,
) -> Result<Json<SectionRefinement>, AppError> {
    let resume = load_resume(&state, resume_id, request.user_id).await?;
    let llm_config = load_llm_config(&state, request.user_id).await?;

    let refinement = refine_resume_section(
        state.refinement.models.as_ref(),
        &resume.content,
        &request.job_description,
        request.target_section,
        &llm_config,
    )
    .await?;

    Ok(Json(refinement))
}

/// GET /api/v1/resumes/:id/refine/experience/stream
///
/// Streams experience refinement as Server-Sent Events. Lookup failures are
/// reported as regular JSON errors before the stream opens; everything after
/// that, including a bad stored API key, arrives as SSE `error` events.
pub async fn handle_refine_experience_stream(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
    Query(query): Query<ExperienceStreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    if query.job_description.trim().is_empty() {
        return Err(AppError::Validation(
            "job_description cannot be empty".to_string(),
        ));
    }

    let resume = load_resume(&state, resume_id, query.user_id).await?;
    let settings = get_user_settings(&state.db, query.user_id).await?;
    info!("Starting experience refinement stream for resume {resume_id}");

    let request = ExperienceStreamRequest {
        resume_content: resume.content,
        job_description: query.job_description,
        settings,
    };
    Ok(experience_refinement_sse(state.refinement.clone(), request))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

async fn load_resume(state: &AppState, resume_id: Uuid, user_id: Uuid) -> Result<ResumeRow, AppError> {
    get_resume(&state.db, resume_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {resume_id} not found")))
}

async fn load_llm_config(state: &AppState, user_id: Uuid) -> Result<LlmConfig, AppError> {
    let settings = get_user_settings(&state.db, user_id).await?;
    Ok(resolve_llm_config(settings.as_ref(), &state.refinement.cipher)?)
}
