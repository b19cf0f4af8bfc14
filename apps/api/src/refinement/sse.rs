//! SSE Adapter: bridges an experience refinement run onto a Server-Sent-Events body.
//!
//! The orchestrator runs as a background task that forwards its events into a
//! bounded queue. The response stream is that queue's only consumer: it polls
//! with a short timeout, renders each event, collects refined roles, and finally
//! rebuilds the document. Dropping the response stream (client disconnect)
//! cancels the background task through a `CancellationToken` drop guard.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::time::Duration;

use async_stream::stream;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::refinement::error::{RefineError, GENERIC_FAILURE_MESSAGE, INVALID_API_KEY_MESSAGE};
use crate::refinement::events::{EventStatus, OrchestrationEvent};
use crate::refinement::orchestrator::refine_experience_section;
use crate::refinement::RefinementContext;
use crate::render::{self, AlertLevel};
use crate::resume::markdown::{build_complete_resume_from_sections, parse_resume};
use crate::resume::models::{ExperienceInfo, RefinedRole, Role};
use crate::settings::{resolve_llm_config, UserSettings};

pub const EVENT_QUEUE_CAPACITY: usize = 64;
pub const NO_ROLES_REFINED_MESSAGE: &str =
    "Refinement finished, but no roles were found to refine.";
pub const CLOSE_PAYLOAD: &str = "stream complete";
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

// SSE event names
pub const PROGRESS: &str = "progress";
pub const INTRODUCTION_GENERATED: &str = "introduction_generated";
pub const DONE: &str = "done";
pub const ERROR: &str = "error";
pub const CLOSE: &str = "close";

/// Input for one streamed experience refinement. `settings` are the caller's
/// stored LLM settings, already loaded.
#[derive(Debug, Clone)]
pub struct ExperienceStreamRequest {
    pub resume_content: String,
    pub job_description: String,
    pub settings: Option<UserSettings>,
}

/// Builds one named SSE event. axum splits multi-line payloads into one
/// `data:` field per line; carriage returns are not allowed in a field.
fn sse_event(kind: &str, payload: &str) -> Event {
    Event::default().event(kind).data(payload.replace('\r', ""))
}

fn error_event(message: &str, level: AlertLevel) -> Event {
    sse_event(ERROR, &render::alert(message, level))
}

/// Streams SSE events for an experience refinement. Every path that runs to
/// completion ends with exactly one `close` event.
pub fn experience_refinement_sse_stream(
    ctx: RefinementContext,
    request: ExperienceStreamRequest,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    stream! {
        match resolve_llm_config(request.settings.as_ref(), &ctx.cipher) {
            Err(e) => {
                warn!("Stored API key could not be used: {e}");
                yield Ok(error_event(INVALID_API_KEY_MESSAGE, AlertLevel::Error));
            }
            Ok(llm_config) => {
                let (tx, mut rx) = mpsc::channel::<OrchestrationEvent>(EVENT_QUEUE_CAPACITY);
                let token = CancellationToken::new();
                let cancel_on_drop = token.clone().drop_guard();

                let events = refine_experience_section(
                    ctx.models.clone(),
                    request.resume_content.clone(),
                    request.job_description.clone(),
                    llm_config,
                    ctx.max_concurrency,
                );
                let task = tokio::spawn(forward_events(events, tx, token));

                let mut refined: BTreeMap<usize, Value> = BTreeMap::new();
                loop {
                    match timeout(ctx.poll_interval, rx.recv()).await {
                        Ok(Some(event)) => {
                            if let Some(sse) = handle_event(event, &mut refined) {
                                yield Ok(sse);
                            }
                        }
                        Ok(None) => break,
                        Err(_) if task.is_finished() && rx.is_empty() => {
                            info!("Refinement task finished and event queue is drained");
                            break;
                        }
                        Err(_) => debug!("No refinement event yet, polling again"),
                    }
                }

                let outcome = task.await;
                cancel_on_drop.disarm();
                yield Ok(finish(outcome, &request.resume_content, &refined));
            }
        }

        yield Ok(sse_event(CLOSE, CLOSE_PAYLOAD));
    }
}

/// SSE response for an experience refinement, with keep-alive comments while
/// the LLM calls are in flight.
pub fn experience_refinement_sse(
    ctx: RefinementContext,
    request: ExperienceStreamRequest,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(experience_refinement_sse_stream(ctx, request)).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}

/// Background half: pumps orchestrator events into the queue until the run
/// ends, fails, or the consumer goes away.
async fn forward_events<S>(
    events: S,
    tx: mpsc::Sender<OrchestrationEvent>,
    token: CancellationToken,
) -> Result<(), RefineError>
where
    S: Stream<Item = Result<OrchestrationEvent, RefineError>> + Send,
{
    tokio::pin!(events);
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                warn!("Client disconnected; cancelling experience refinement");
                return Ok(());
            }
            next = events.next() => match next {
                Some(Ok(event)) => {
                    if tx.send(event).await.is_err() {
                        warn!("Event queue closed; stopping experience refinement");
                        return Ok(());
                    }
                }
                Some(Err(e)) => return Err(e),
                None => return Ok(()),
            },
        }
    }
}

/// Renders one orchestration event. Refined roles are only collected;
/// they surface in the final `done` message.
fn handle_event(event: OrchestrationEvent, refined: &mut BTreeMap<usize, Value>) -> Option<Event> {
    match event.status {
        EventStatus::InProgress => {
            let message = event.message.unwrap_or_default();
            Some(sse_event(PROGRESS, &render::progress_item(&message)))
        }
        EventStatus::IntroductionGenerated => {
            let text = event
                .data
                .as_ref()
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty());
            match text {
                Some(text) => Some(sse_event(
                    INTRODUCTION_GENERATED,
                    &render::introduction_fragment(text),
                )),
                None => {
                    debug!("Suppressing empty introduction");
                    None
                }
            }
        }
        EventStatus::RoleRefined => {
            match (event.data.filter(|d| !d.is_null()), event.original_index) {
                (Some(data), Some(index)) => {
                    debug!("Collected refined role #{index}");
                    refined.insert(index, data);
                }
                (data, index) => warn!(
                    "Dropping malformed role_refined event (data present: {}, index: {index:?})",
                    data.is_some()
                ),
            }
            None
        }
        EventStatus::JobAnalysisComplete => {
            debug!("Job analysis complete");
            None
        }
        other => {
            warn!("Unhandled orchestration event status {other:?}");
            None
        }
    }
}

fn finish(
    outcome: Result<Result<(), RefineError>, JoinError>,
    resume_content: &str,
    refined: &BTreeMap<usize, Value>,
) -> Event {
    match outcome {
        Ok(Ok(())) if refined.is_empty() => {
            warn!("Experience refinement finished without any refined roles");
            error_event(NO_ROLES_REFINED_MESSAGE, AlertLevel::Warning)
        }
        Ok(Ok(())) => match reconstruct_resume(resume_content, refined) {
            Ok(markdown) => {
                info!("Experience refinement complete: {} roles refined", refined.len());
                sse_event(DONE, &render::refined_result_fragment(&markdown))
            }
            Err(e) => {
                error!("Could not rebuild refined resume: {e}");
                error_event(&e.user_message(), AlertLevel::Error)
            }
        },
        Ok(Err(e)) => {
            if e.is_authentication() {
                warn!("Experience refinement rejected by LLM provider: {e}");
            } else {
                error!("Experience refinement failed: {e}");
            }
            error_event(&e.user_message(), AlertLevel::Error)
        }
        Err(e) => {
            error!("Experience refinement task ended abnormally: {e}");
            error_event(GENERIC_FAILURE_MESSAGE, AlertLevel::Error)
        }
    }
}

fn reconstruct_resume(
    resume_content: &str,
    refined: &BTreeMap<usize, Value>,
) -> Result<String, RefineError> {
    let sections = parse_resume(resume_content)?;
    let experience = ExperienceInfo {
        roles: merge_refined_roles(sections.experience.roles, refined),
    };
    Ok(build_complete_resume_from_sections(
        &sections.personal,
        &sections.education,
        &sections.certifications,
        &experience,
    ))
}

/// Position `i` of the result is the refined role with index `i` when one was
/// collected and deserializes, otherwise the original role. Length is preserved.
pub fn merge_refined_roles(original: Vec<Role>, refined: &BTreeMap<usize, Value>) -> Vec<Role> {
    if let Some(&last) = refined.keys().next_back() {
        if last >= original.len() {
            warn!(
                "Ignoring refined roles beyond index {}",
                original.len().saturating_sub(1)
            );
        }
    }

    original
        .into_iter()
        .enumerate()
        .map(|(index, role)| match refined.get(&index) {
            Some(data) => match serde_json::from_value::<RefinedRole>(data.clone()) {
                Ok(refined_role) => refined_role,
                Err(e) => {
                    warn!("Refined role #{index} is unusable, keeping original: {e}");
                    role
                }
            },
            None => {
                debug!("No refinement for role #{index}, keeping original");
                role
            }
        })
        .collect()
}
