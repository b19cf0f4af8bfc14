//! Introduction Synthesizer, a strictly sequential 3-stage pipeline:
//! job requirements → candidate analysis → strength statements.
//!
//! Failures never escape: any stage error yields an empty string and the
//! caller carries on without an introduction.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::llm_client::prompts::{fill, GROUNDING_INSTRUCTION};
use crate::llm_client::structured::{invoke_and_parse, StructuredOutputError, Validate};
use crate::llm_client::ChatModel;
use crate::refinement::prompts::{
    CANDIDATE_ANALYSIS_PROMPT_TEMPLATE, CANDIDATE_ANALYSIS_SYSTEM, INTRODUCTION_PROMPT_TEMPLATE,
    INTRODUCTION_SYSTEM, REQUIREMENTS_PROMPT_TEMPLATE, REQUIREMENTS_SYSTEM,
};

const MAX_STRENGTHS: usize = 5;

/// Stage 1 output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobKeyRequirements {
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub preferred_skills: Vec<String>,
    #[serde(default)]
    pub key_responsibilities: Vec<String>,
    #[serde(default)]
    pub experience_level: Option<String>,
}

impl Validate for JobKeyRequirements {
    fn validate(&self) -> Result<(), String> {
        if self.required_skills.iter().all(|s| s.trim().is_empty()) {
            return Err("required_skills must not be empty".to_string());
        }
        Ok(())
    }
}

/// Where in the résumé the evidence for a skill was found.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    Experience,
    Education,
    Skills,
    Summary,
    Projects,
    Certifications,
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillAssessment {
    pub skill: String,
    pub present: bool,
    pub evidence_source: EvidenceSource,
    #[serde(default)]
    pub evidence: String,
}

/// Stage 2 output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateAnalysis {
    pub skill_assessments: Vec<SkillAssessment>,
}

impl Validate for CandidateAnalysis {
    fn validate(&self) -> Result<(), String> {
        if self.skill_assessments.is_empty() {
            return Err("skill_assessments must not be empty".to_string());
        }
        for assessment in &self.skill_assessments {
            if assessment.present && assessment.evidence_source == EvidenceSource::NotFound {
                return Err(format!(
                    "skill '{}' is marked present without an evidence source",
                    assessment.skill
                ));
            }
        }
        Ok(())
    }
}

/// Stage 3 output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedIntroduction {
    pub strengths: Vec<String>,
}

impl Validate for GeneratedIntroduction {
    fn validate(&self) -> Result<(), String> {
        let count = self.strengths.iter().filter(|s| !s.trim().is_empty()).count();
        if count == 0 || count > MAX_STRENGTHS {
            return Err(format!(
                "expected 1 to {MAX_STRENGTHS} strength statements, got {count}"
            ));
        }
        Ok(())
    }
}

impl GeneratedIntroduction {
    /// Renders the strengths as a Markdown bullet list.
    pub fn to_text(&self) -> String {
        self.strengths
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| format!("- {s}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Runs the pipeline on `model`, reusing it for all three stages.
/// Returns an empty string if any stage fails.
pub async fn generate_introduction_from_resume(
    model: &dyn ChatModel,
    resume: &str,
    job_description: &str,
) -> String {
    match run_pipeline(model, resume, job_description).await {
        Ok(intro) => {
            info!("Generated introduction with {} strengths", intro.strengths.len());
            intro.to_text()
        }
        Err((stage, err)) => {
            warn!("Introduction generation aborted at {stage}: {err}");
            String::new()
        }
    }
}

async fn run_pipeline(
    model: &dyn ChatModel,
    resume: &str,
    job_description: &str,
) -> Result<GeneratedIntroduction, (&'static str, StructuredOutputError)> {
    let requirements_prompt = fill(
        REQUIREMENTS_PROMPT_TEMPLATE,
        &[("job_description", job_description)],
    );
    let requirements: JobKeyRequirements =
        invoke_and_parse(model, REQUIREMENTS_SYSTEM, &requirements_prompt)
            .await
            .map_err(|e| ("requirements extraction", e))?;

    let requirements_json = to_json(&requirements).map_err(|e| ("candidate analysis", e))?;
    let candidate_prompt = fill(
        CANDIDATE_ANALYSIS_PROMPT_TEMPLATE,
        &[
            ("requirements_json", requirements_json.as_str()),
            ("resume", resume),
        ],
    );
    let analysis: CandidateAnalysis =
        invoke_and_parse(model, CANDIDATE_ANALYSIS_SYSTEM, &candidate_prompt)
            .await
            .map_err(|e| ("candidate analysis", e))?;

    let analysis_json = to_json(&analysis).map_err(|e| ("introduction synthesis", e))?;
    let introduction_prompt = fill(
        INTRODUCTION_PROMPT_TEMPLATE,
        &[
            ("grounding_instruction", GROUNDING_INSTRUCTION),
            ("analysis_json", analysis_json.as_str()),
        ],
    );
    invoke_and_parse(model, INTRODUCTION_SYSTEM, &introduction_prompt)
        .await
        .map_err(|e| ("introduction synthesis", e))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, StructuredOutputError> {
    serde_json::to_string_pretty(value).map_err(StructuredOutputError::Parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::{FakeLlm, Reply};

    #[tokio::test]
    async fn test_pipeline_runs_three_sequential_stages() {
        let model = FakeLlm::default();
        let intro = generate_introduction_from_resume(&model, "# Jane", "a new job").await;
        assert_eq!(
            intro,
            "- Rust engineer who built a production settlement pipeline\n\
             - Cut reconciliation time from 6 hours to 40 minutes"
        );
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn test_invalid_stage_two_output_aborts_with_empty_string() {
        let model = FakeLlm {
            candidate: Reply::Json(r#"{"skill_assessments": []}"#.to_string()),
            ..FakeLlm::default()
        };
        let intro = generate_introduction_from_resume(&model, "# Jane", "a new job").await;
        assert!(intro.is_empty());
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_non_json_stage_one_output_aborts_immediately() {
        let model = FakeLlm {
            requirements: Reply::Garbage,
            ..FakeLlm::default()
        };
        let intro = generate_introduction_from_resume(&model, "# Jane", "a new job").await;
        assert!(intro.is_empty());
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_authentication_failure_is_swallowed() {
        let model = FakeLlm {
            introduction: Reply::Auth,
            ..FakeLlm::default()
        };
        let intro = generate_introduction_from_resume(&model, "# Jane", "a new job").await;
        assert!(intro.is_empty());
    }

    #[test]
    fn test_too_many_strengths_fail_validation() {
        let intro = GeneratedIntroduction {
            strengths: (0..6).map(|i| format!("strength {i}")).collect(),
        };
        assert!(intro.validate().is_err());
    }

    #[test]
    fn test_present_skill_needs_evidence_source() {
        let analysis = CandidateAnalysis {
            skill_assessments: vec![SkillAssessment {
                skill: "Rust".to_string(),
                present: true,
                evidence_source: EvidenceSource::NotFound,
                evidence: String::new(),
            }],
        };
        assert!(analysis.validate().is_err());
    }
}
