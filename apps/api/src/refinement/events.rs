use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    InProgress,
    JobAnalysisComplete,
    IntroductionGenerated,
    RoleRefined,
    Error,
    Done,
}

/// One message on the orchestrator → caller channel.
///
/// Events are ordered by emission time only; `role_refined` events from
/// different roles interleave freely and must be joined on `original_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationEvent {
    pub status: EventStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_index: Option<usize>,
}

impl OrchestrationEvent {
    fn new(status: EventStatus) -> Self {
        Self {
            status,
            message: None,
            data: None,
            original_index: None,
        }
    }

    pub fn in_progress(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(EventStatus::InProgress)
        }
    }

    pub fn job_analysis_complete() -> Self {
        Self {
            message: Some("Job analysis complete.".to_string()),
            ..Self::new(EventStatus::JobAnalysisComplete)
        }
    }

    pub fn introduction_generated(text: impl Into<String>) -> Self {
        Self {
            data: Some(Value::String(text.into())),
            ..Self::new(EventStatus::IntroductionGenerated)
        }
    }

    pub fn role_refined(data: Value, original_index: usize) -> Self {
        Self {
            data: Some(data),
            original_index: Some(original_index),
            ..Self::new(EventStatus::RoleRefined)
        }
    }
}
