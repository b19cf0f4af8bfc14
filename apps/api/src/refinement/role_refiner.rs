//! Role Refiner: rewrites one role's summary and responsibilities against a job analysis.

use tracing::warn;

use crate::llm_client::prompts::{fill, GROUNDING_INSTRUCTION, SKILL_CONSISTENCY_INSTRUCTION};
use crate::llm_client::structured::invoke_and_parse;
use crate::llm_client::ChatModel;
use crate::refinement::error::RefineError;
use crate::refinement::job_analyzer::JobAnalysis;
use crate::refinement::prompts::{ROLE_REFINE_PROMPT_TEMPLATE, ROLE_REFINE_SYSTEM};
use crate::resume::models::{RefinedRole, Role};

/// Refines `role` with one LLM call. Authentication errors propagate unchanged;
/// malformed output becomes `RefineError::ServiceResponse`.
pub async fn refine_role(
    model: &dyn ChatModel,
    role: &Role,
    job_analysis: &JobAnalysis,
) -> Result<RefinedRole, RefineError> {
    let role_json = serde_json::to_string_pretty(role)
        .map_err(|e| RefineError::Internal(format!("failed to serialize role: {e}")))?;
    let job_analysis_json = serde_json::to_string_pretty(job_analysis)
        .map_err(|e| RefineError::Internal(format!("failed to serialize job analysis: {e}")))?;

    let prompt = fill(
        ROLE_REFINE_PROMPT_TEMPLATE,
        &[
            ("grounding_instruction", GROUNDING_INSTRUCTION),
            ("skill_instruction", SKILL_CONSISTENCY_INSTRUCTION),
            ("job_analysis_json", job_analysis_json.as_str()),
            ("role_json", role_json.as_str()),
        ],
    );

    let stage = format!("role refinement ({})", role.label());
    let mut refined: RefinedRole = invoke_and_parse(model, ROLE_REFINE_SYSTEM, &prompt)
        .await
        .map_err(|e| RefineError::from_structured(&stage, e))?;

    if refined.basics != role.basics {
        warn!("{stage}: model altered factual fields; restoring the original basics");
        refined.basics = role.basics.clone();
    }
    Ok(refined)
}
