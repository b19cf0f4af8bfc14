//! Experience Orchestrator: refines every role of a résumé against a job description
//! and reports progress as a stream of `OrchestrationEvent`s.
//!
//! Flow: parse roles → job analysis (hard dependency) → introduction (best effort) →
//!       fan-out one task per role behind a semaphore → fan-in through one queue.
//!
//! Role tasks only ever push onto the queue. The stream body is the queue's single
//! consumer, so nothing else needs a lock. Dropping the stream drops the `JoinSet`,
//! which aborts any role task still in flight.

use std::sync::Arc;

use async_stream::try_stream;
use futures::Stream;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::llm_client::{ChatModel, LlmConfig, ModelFactory};
use crate::refinement::error::RefineError;
use crate::refinement::events::OrchestrationEvent;
use crate::refinement::introduction::generate_introduction_from_resume;
use crate::refinement::job_analyzer::{analyze_job_description, JobAnalysis};
use crate::refinement::role_refiner::refine_role;
use crate::resume::markdown::extract_experience_info;
use crate::resume::models::Role;

pub const DEFAULT_MAX_CONCURRENCY: usize = 3;
/// Analysis and introduction stages favour deterministic output.
pub const ANALYSIS_TEMPERATURE: f32 = 0.2;
pub const REFINE_TEMPERATURE: f32 = 0.4;

type EventResult = Result<OrchestrationEvent, RefineError>;

/// Runs the whole experience refinement. The stream ends once every role task has
/// reported; it never emits `done` itself. The first error ends the stream after
/// everything already queued has been yielded.
pub fn refine_experience_section(
    models: Arc<dyn ModelFactory>,
    resume_content: String,
    job_description: String,
    llm_config: LlmConfig,
    max_concurrency: usize,
) -> impl Stream<Item = EventResult> + Send + 'static {
    try_stream! {
        yield OrchestrationEvent::in_progress("Parsing resume...");
        let roles = extract_experience_info(&resume_content)?.roles;
        info!("Parsed {} roles for refinement", roles.len());

        yield OrchestrationEvent::in_progress("Analyzing job description...");
        let analysis_model = models.build(&llm_config, ANALYSIS_TEMPERATURE)?;
        let (job_analysis, _) =
            analyze_job_description(analysis_model.as_ref(), &job_description, None).await?;
        yield OrchestrationEvent::job_analysis_complete();

        yield OrchestrationEvent::in_progress("Generating AI introduction...");
        if let Some(text) =
            generate_introduction(models.as_ref(), &llm_config, &resume_content, &job_description).await
        {
            yield OrchestrationEvent::introduction_generated(text);
        }

        if roles.is_empty() {
            info!("No roles found in resume; nothing to refine");
        } else {
            let refine_model = models.build(&llm_config, REFINE_TEMPERATURE)?;
            let (tx, mut rx) = mpsc::unbounded_channel::<EventResult>();
            let mut tasks = spawn_role_tasks(
                roles,
                Arc::new(job_analysis),
                refine_model,
                max_concurrency,
                tx,
            );

            while let Some(item) = rx.recv().await {
                match item {
                    Ok(event) => yield event,
                    Err(err) => {
                        warn!("Role refinement failed, cancelling {} sibling tasks: {err}", tasks.len());
                        tasks.abort_all();
                        Err::<(), _>(err)?;
                    }
                }
            }

            while let Some(joined) = tasks.join_next().await {
                if let Err(join_err) = joined {
                    if join_err.is_panic() {
                        Err::<(), _>(RefineError::Internal(format!(
                            "role refinement task panicked: {join_err}"
                        )))?;
                    }
                }
            }
            info!("All role refinement tasks finished");
        }
    }
}

/// Best-effort introduction on a freshly built client. Failures are logged and
/// reported as `None`.
async fn generate_introduction(
    models: &dyn ModelFactory,
    llm_config: &LlmConfig,
    resume_content: &str,
    job_description: &str,
) -> Option<String> {
    let model = match models.build(llm_config, ANALYSIS_TEMPERATURE) {
        Ok(model) => model,
        Err(e) => {
            warn!("Skipping introduction, could not build LLM client: {e}");
            return None;
        }
    };

    let text = generate_introduction_from_resume(model.as_ref(), resume_content, job_description).await;
    (!text.is_empty()).then_some(text)
}

/// Creates exactly one task per role. Called once per run, before draining starts.
fn spawn_role_tasks(
    roles: Vec<Role>,
    job_analysis: Arc<JobAnalysis>,
    model: Arc<dyn ChatModel>,
    max_concurrency: usize,
    tx: mpsc::UnboundedSender<EventResult>,
) -> JoinSet<()> {
    let permits = max_concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(permits));
    let mut tasks = JoinSet::new();

    for (index, role) in roles.into_iter().enumerate() {
        tasks.spawn(refine_role_task(
            index,
            role,
            job_analysis.clone(),
            model.clone(),
            semaphore.clone(),
            tx.clone(),
        ));
    }

    info!(
        "Scheduled {} role refinement tasks (max concurrency {permits})",
        tasks.len()
    );
    tasks
}

async fn refine_role_task(
    index: usize,
    role: Role,
    job_analysis: Arc<JobAnalysis>,
    model: Arc<dyn ChatModel>,
    semaphore: Arc<Semaphore>,
    tx: mpsc::UnboundedSender<EventResult>,
) {
    let Ok(_permit) = semaphore.acquire_owned().await else {
        return;
    };

    let label = role.label();
    // A closed queue means the consumer is gone; the task is about to be aborted anyway.
    let _ = tx.send(Ok(OrchestrationEvent::in_progress(format!(
        "Refining role '{label}'..."
    ))));

    let outcome = match refine_role(model.as_ref(), &role, &job_analysis).await {
        Ok(refined) => serde_json::to_value(&refined)
            .map(|data| OrchestrationEvent::role_refined(data, index))
            .map_err(|e| RefineError::Internal(format!("failed to serialize refined role: {e}"))),
        Err(e) => {
            error!("Refinement of role #{index} '{label}' failed: {e}");
            Err(e)
        }
    };

    let _ = tx.send(outcome);
}
