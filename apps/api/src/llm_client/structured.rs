//! Structured-output invocation: send a prompt, strip code fences, parse JSON,
//! then validate against the target type.
//!
//! Parsing and validation failures are kept apart so callers can tell a model that
//! produced garbage from one that produced well-formed JSON in the wrong shape.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::llm_client::{strip_json_fences, ChatModel, LlmError};

#[derive(Debug, Error)]
pub enum StructuredOutputError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("model output is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("model output failed validation: {0}")]
    Validation(String),
}

/// Semantic checks that serde cannot express (date ordering, non-empty lists, ...).
pub trait Validate {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Calls `model` and returns a validated `T`.
/// Transport and authentication errors propagate unchanged and are never retried here.
pub async fn invoke_and_parse<T>(
    model: &dyn ChatModel,
    system: &str,
    prompt: &str,
) -> Result<T, StructuredOutputError>
where
    T: DeserializeOwned + Validate,
{
    let raw = model.complete(system, prompt).await?;
    parse_structured(&raw)
}

/// Parses raw model text into a validated `T`.
pub fn parse_structured<T>(raw: &str) -> Result<T, StructuredOutputError>
where
    T: DeserializeOwned + Validate,
{
    let value: Value =
        serde_json::from_str(strip_json_fences(raw)).map_err(StructuredOutputError::Parse)?;
    let parsed: T = serde_json::from_value(value)
        .map_err(|e| StructuredOutputError::Validation(e.to_string()))?;
    parsed
        .validate()
        .map_err(StructuredOutputError::Validation)?;
    Ok(parsed)
}
