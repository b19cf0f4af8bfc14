//! Job Analyzer: one LLM call turning a job description into the shared `JobAnalysis`.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::llm_client::prompts::{fill, GROUNDING_INSTRUCTION};
use crate::llm_client::structured::{invoke_and_parse, Validate};
use crate::llm_client::ChatModel;
use crate::refinement::error::RefineError;
use crate::refinement::prompts::{
    JOB_ANALYSIS_INTRODUCTION_REQUEST, JOB_ANALYSIS_NO_INTRODUCTION, JOB_ANALYSIS_PROMPT_TEMPLATE,
    JOB_ANALYSIS_SYSTEM,
};

/// Structured summary of a job description. Computed once per run and shared
/// read-only by every role refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobAnalysis {
    pub key_skills: Vec<String>,
    #[serde(default)]
    pub primary_duties: Vec<String>,
    #[serde(default)]
    pub nice_to_have_skills: Vec<String>,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introduction: Option<String>,
}

impl Validate for JobAnalysis {
    fn validate(&self) -> Result<(), String> {
        if self.key_skills.iter().all(|s| s.trim().is_empty()) {
            return Err("key_skills must contain at least one skill".to_string());
        }
        Ok(())
    }
}

/// Analyzes `description`. When `resume_for_intro` is given the same call is asked
/// for an introduction; an absent or blank one comes back as `None`.
///
/// Empty descriptions are rejected before any network call.
pub async fn analyze_job_description(
    model: &dyn ChatModel,
    description: &str,
    resume_for_intro: Option<&str>,
) -> Result<(JobAnalysis, Option<String>), RefineError> {
    if description.trim().is_empty() {
        return Err(RefineError::InvalidInput(
            "Job description cannot be empty.".to_string(),
        ));
    }

    let prompt = analysis_prompt(description, resume_for_intro);
    let mut analysis: JobAnalysis = invoke_and_parse(model, JOB_ANALYSIS_SYSTEM, &prompt)
        .await
        .map_err(|e| RefineError::from_structured("job analysis", e))?;

    let introduction = analysis
        .introduction
        .take()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty() && resume_for_intro.is_some());

    info!(
        "Job analysis complete: {} key skills, {} themes",
        analysis.key_skills.len(),
        analysis.themes.len()
    );

    Ok((analysis, introduction))
}

fn analysis_prompt(description: &str, resume_for_intro: Option<&str>) -> String {
    let introduction_request = match resume_for_intro {
        Some(resume) => fill(
            JOB_ANALYSIS_INTRODUCTION_REQUEST,
            &[("grounding_instruction", GROUNDING_INSTRUCTION), ("resume", resume)],
        ),
        None => JOB_ANALYSIS_NO_INTRODUCTION.to_string(),
    };
    fill(
        JOB_ANALYSIS_PROMPT_TEMPLATE,
        &[
            ("introduction_request", introduction_request.as_str()),
            ("job_description", description.trim()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::{FakeLlm, Reply, JOB_ANALYSIS_JSON};

    #[tokio::test]
    async fn test_blank_description_is_rejected_without_calling_model() {
        let model = FakeLlm::default();
        let err = analyze_job_description(&model, "  \n\t", None)
            .await
            .unwrap_err();
        assert!(matches!(err, RefineError::InvalidInput(_)));
        assert_eq!(model.calls(), 0);
    }

    #[test]
    fn test_resume_placeholder_text_is_not_filled_with_job_description() {
        let prompt = analysis_prompt(
            "SECRET-JD",
            Some("Resume mentions {job_description} literally"),
        );
        assert_eq!(prompt.matches("SECRET-JD").count(), 1);
        assert!(prompt.contains("Resume mentions {job_description} literally"));
    }

    #[tokio::test]
    async fn test_analysis_makes_exactly_one_call() {
        let model = FakeLlm::default();
        let (analysis, introduction) = analyze_job_description(&model, "a new job", None)
            .await
            .unwrap();
        assert_eq!(analysis.key_skills, vec!["Rust", "PostgreSQL"]);
        assert_eq!(analysis.nice_to_have_skills, vec!["Kubernetes"]);
        assert!(introduction.is_none());
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_introduction_is_returned_when_requested() {
        let model = FakeLlm {
            job_analysis: Reply::Json(
                r#"{"key_skills": ["Rust"], "introduction": "  Seasoned Rust engineer.  "}"#
                    .to_string(),
            ),
            ..FakeLlm::default()
        };
        let (analysis, introduction) =
            analyze_job_description(&model, "a new job", Some("# Jane"))
                .await
                .unwrap();
        assert_eq!(introduction.as_deref(), Some("Seasoned Rust engineer."));
        assert!(analysis.introduction.is_none());
    }

    #[tokio::test]
    async fn test_blank_introduction_is_none() {
        let model = FakeLlm {
            job_analysis: Reply::Json(r#"{"key_skills": ["Rust"], "introduction": " "}"#.to_string()),
            ..FakeLlm::default()
        };
        let (_, introduction) = analyze_job_description(&model, "a new job", Some("# Jane"))
            .await
            .unwrap();
        assert!(introduction.is_none());
    }

    #[tokio::test]
    async fn test_malformed_output_becomes_service_response_error() {
        let garbage = FakeLlm {
            job_analysis: Reply::Garbage,
            ..FakeLlm::default()
        };
        let wrong_shape = FakeLlm {
            job_analysis: Reply::Json(r#"{"themes": ["speed"]}"#.to_string()),
            ..FakeLlm::default()
        };
        for model in [garbage, wrong_shape] {
            let err = analyze_job_description(&model, "a new job", None)
                .await
                .unwrap_err();
            assert!(matches!(err, RefineError::ServiceResponse));
        }
    }

    #[tokio::test]
    async fn test_authentication_error_propagates() {
        let model = FakeLlm {
            job_analysis: Reply::Auth,
            ..FakeLlm::default()
        };
        let err = analyze_job_description(&model, "a new job", None)
            .await
            .unwrap_err();
        assert!(err.is_authentication());
        assert_eq!(model.calls(), 1);
    }

    #[test]
    fn test_fixture_round_trips() {
        let analysis: JobAnalysis = serde_json::from_str(JOB_ANALYSIS_JSON).unwrap();
        assert!(analysis.validate().is_ok());
        assert!(!serde_json::to_string(&analysis).unwrap().contains("introduction"));
    }
}
