use thiserror::Error;
use tracing::warn;

use crate::llm_client::structured::StructuredOutputError;
use crate::llm_client::LlmError;
use crate::resume::markdown::ExtractError;

/// User-safe text for malformed model output. Raw parse details stay in the logs.
pub const UNEXPECTED_RESPONSE_MESSAGE: &str =
    "The AI service returned an unexpected response. Please try again.";

pub const AUTH_FAILED_MESSAGE: &str = "LLM authentication failed. Please check your API key.";
pub const INVALID_API_KEY_MESSAGE: &str = "Invalid API key. Please update your settings.";
pub const GENERIC_FAILURE_MESSAGE: &str = "An unexpected error occurred. Please try again later.";

/// Errors surfaced by the refinement services.
///
/// `InvalidInput`, `ServiceResponse` and `Extraction` describe a problem the user can
/// act on and are reported verbatim; `Llm` and `Internal` are hidden behind a generic message.
#[derive(Debug, Error)]
pub enum RefineError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Authentication(String),

    #[error("{}", UNEXPECTED_RESPONSE_MESSAGE)]
    ServiceResponse,

    #[error("could not read the resume: {0}")]
    Extraction(#[from] ExtractError),

    #[error("LLM request failed: {0}")]
    Llm(LlmError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<LlmError> for RefineError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Authentication { .. } => RefineError::Authentication(err.to_string()),
            other => RefineError::Llm(other),
        }
    }
}

impl RefineError {
    /// Translates an invoker failure. Parse and validation details are logged
    /// against `stage` and replaced with `ServiceResponse`.
    pub fn from_structured(stage: &str, err: StructuredOutputError) -> Self {
        match err {
            StructuredOutputError::Llm(e) => e.into(),
            StructuredOutputError::Parse(e) => {
                warn!("{stage}: model returned non-JSON output: {e}");
                RefineError::ServiceResponse
            }
            StructuredOutputError::Validation(reason) => {
                warn!("{stage}: model output failed validation: {reason}");
                RefineError::ServiceResponse
            }
        }
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, RefineError::Authentication(_))
    }

    /// Message shown to the end user in an SSE `error` event.
    pub fn user_message(&self) -> String {
        match self {
            RefineError::Authentication(_) => AUTH_FAILED_MESSAGE.to_string(),
            RefineError::InvalidInput(_)
            | RefineError::ServiceResponse
            | RefineError::Extraction(_) => format!("Refinement failed: {self}"),
            RefineError::Llm(_) | RefineError::Internal(_) => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}
