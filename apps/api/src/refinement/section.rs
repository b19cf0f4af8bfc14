//! Synchronous single-section refinement for the non-experience sections.
//! Experience is only refined through the streaming endpoint.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::llm_client::prompts::{fill, GROUNDING_INSTRUCTION};
use crate::llm_client::structured::{invoke_and_parse, Validate};
use crate::llm_client::{LlmConfig, ModelFactory};
use crate::refinement::error::RefineError;
use crate::refinement::introduction::generate_introduction_from_resume;
use crate::refinement::job_analyzer::{analyze_job_description, JobAnalysis};
use crate::refinement::orchestrator::ANALYSIS_TEMPERATURE;
use crate::refinement::prompts::{SECTION_REFINE_PROMPT_TEMPLATE, SECTION_REFINE_SYSTEM};
use crate::resume::markdown::{
    extract_certifications_info, extract_education_info, extract_personal_info,
    serialize_certifications_info_to_markdown, serialize_education_info_to_markdown,
    serialize_personal_info_to_markdown,
};
use crate::resume::models::{CertificationsInfo, EducationInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResumeSection {
    Personal,
    Education,
    Experience,
    Certifications,
}

impl ResumeSection {
    fn display_name(self) -> &'static str {
        match self {
            ResumeSection::Personal => "personal",
            ResumeSection::Education => "education",
            ResumeSection::Experience => "experience",
            ResumeSection::Certifications => "certifications",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionRefinement {
    pub refined_markdown: String,
    pub introduction: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefinedSection {
    refined_markdown: String,
}

impl Validate for RefinedSection {
    fn validate(&self) -> Result<(), String> {
        if self.refined_markdown.trim().is_empty() {
            return Err("refined_markdown must not be empty".to_string());
        }
        Ok(())
    }
}

pub async fn refine_resume_section(
    models: &dyn ModelFactory,
    resume: &str,
    job_description: &str,
    section: ResumeSection,
    llm_config: &LlmConfig,
) -> Result<SectionRefinement, RefineError> {
    info!("Refining {} section", section.display_name());
    match section {
        ResumeSection::Experience => Err(RefineError::InvalidInput(
            "The experience section is refined through the streaming endpoint \
             (/api/v1/resumes/:id/refine/experience/stream)."
                .to_string(),
        )),
        ResumeSection::Personal => {
            refine_personal(models, resume, job_description, llm_config).await
        }
        ResumeSection::Education => {
            let body = extract_education_info(resume).body;
            let refined = refine_block(models, &body, job_description, section, llm_config).await?;
            Ok(SectionRefinement {
                refined_markdown: serialize_education_info_to_markdown(&EducationInfo {
                    body: refined,
                }),
                introduction: None,
            })
        }
        ResumeSection::Certifications => {
            let body = extract_certifications_info(resume).body;
            let refined = refine_block(models, &body, job_description, section, llm_config).await?;
            Ok(SectionRefinement {
                refined_markdown: serialize_certifications_info_to_markdown(&CertificationsInfo {
                    body: refined,
                }),
                introduction: None,
            })
        }
    }
}

/// The personal block is returned unchanged; the work is the introduction.
/// The analyzer's introduction is preferred, the 3-stage synthesizer is the fallback.
async fn refine_personal(
    models: &dyn ModelFactory,
    resume: &str,
    job_description: &str,
    llm_config: &LlmConfig,
) -> Result<SectionRefinement, RefineError> {
    let model = models.build(llm_config, ANALYSIS_TEMPERATURE)?;
    let (_, introduction) = analyze_job_description(model.as_ref(), job_description, Some(resume)).await?;

    let introduction = match introduction {
        Some(intro) => Some(intro),
        None => {
            info!("Job analysis returned no introduction, running the introduction pipeline");
            let text = generate_introduction_from_resume(model.as_ref(), resume, job_description).await;
            (!text.is_empty()).then_some(text)
        }
    };

    Ok(SectionRefinement {
        refined_markdown: serialize_personal_info_to_markdown(&extract_personal_info(resume)),
        introduction,
    })
}

async fn refine_block(
    models: &dyn ModelFactory,
    body: &str,
    job_description: &str,
    section: ResumeSection,
    llm_config: &LlmConfig,
) -> Result<String, RefineError> {
    if body.trim().is_empty() {
        return Err(RefineError::InvalidInput(format!(
            "The resume has no {} section to refine.",
            section.display_name()
        )));
    }

    let model = models.build(llm_config, ANALYSIS_TEMPERATURE)?;
    let (job_analysis, _) = analyze_job_description(model.as_ref(), job_description, None).await?;

    let prompt = section_prompt(section, body, &job_analysis)?;
    let refined: RefinedSection = invoke_and_parse(model.as_ref(), SECTION_REFINE_SYSTEM, &prompt)
        .await
        .map_err(|e| RefineError::from_structured("section refinement", e))?;

    Ok(refined.refined_markdown.trim().to_string())
}

fn section_prompt(
    section: ResumeSection,
    body: &str,
    job_analysis: &JobAnalysis,
) -> Result<String, RefineError> {
    let job_analysis_json = serde_json::to_string_pretty(job_analysis)
        .map_err(|e| RefineError::Internal(format!("failed to serialize job analysis: {e}")))?;
    Ok(fill(
        SECTION_REFINE_PROMPT_TEMPLATE,
        &[
            ("grounding_instruction", GROUNDING_INSTRUCTION),
            ("section_name", section.display_name()),
            ("section_markdown", body),
            ("job_analysis_json", job_analysis_json.as_str()),
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::{FakeLlm, FakeModelFactory, Reply};
    use crate::resume::fixtures::{NO_ROLE_RESUME, TWO_ROLE_RESUME};

    async fn refine(
        factory: &FakeModelFactory,
        resume: &str,
        section: ResumeSection,
    ) -> Result<SectionRefinement, RefineError> {
        refine_resume_section(factory, resume, "a new job", section, &LlmConfig::default()).await
    }

    #[tokio::test]
    async fn test_experience_redirects_to_streaming() {
        let factory = FakeModelFactory::new(FakeLlm::default());
        let err = refine(&factory, TWO_ROLE_RESUME, ResumeSection::Experience)
            .await
            .unwrap_err();
        assert!(matches!(err, RefineError::InvalidInput(ref m) if m.contains("stream")));
        assert_eq!(factory.model.calls(), 0);
    }

    #[tokio::test]
    async fn test_personal_prefers_analyzer_introduction() {
        let factory = FakeModelFactory::new(FakeLlm {
            job_analysis: Reply::Json(
                r#"{"key_skills": ["Rust"], "introduction": "Payments engineer."}"#.to_string(),
            ),
            ..FakeLlm::default()
        });
        let result = refine(&factory, TWO_ROLE_RESUME, ResumeSection::Personal)
            .await
            .unwrap();
        assert_eq!(result.introduction.as_deref(), Some("Payments engineer."));
        assert_eq!(
            result.refined_markdown,
            "# Jane Doe\njane@example.com | Berlin\n"
        );
        assert_eq!(factory.model.calls(), 1);
    }

    #[tokio::test]
    async fn test_personal_falls_back_to_pipeline() {
        let factory = FakeModelFactory::new(FakeLlm::default());
        let result = refine(&factory, TWO_ROLE_RESUME, ResumeSection::Personal)
            .await
            .unwrap();
        assert!(result
            .introduction
            .unwrap()
            .starts_with("- Rust engineer who built"));
        assert_eq!(factory.model.calls(), 4);
    }

    #[tokio::test]
    async fn test_personal_without_any_introduction_is_none() {
        let factory = FakeModelFactory::new(FakeLlm {
            requirements: Reply::Garbage,
            ..FakeLlm::default()
        });
        let result = refine(&factory, TWO_ROLE_RESUME, ResumeSection::Personal)
            .await
            .unwrap();
        assert!(result.introduction.is_none());
    }

    #[tokio::test]
    async fn test_certifications_are_refined_in_one_extra_call() {
        let factory = FakeModelFactory::new(FakeLlm::default());
        let result = refine(&factory, TWO_ROLE_RESUME, ResumeSection::Certifications)
            .await
            .unwrap();
        assert_eq!(result.refined_markdown, "## Certifications\n\n- CKA (2022)\n");
        assert!(result.introduction.is_none());
        assert_eq!(factory.model.calls(), 2);
    }

    #[tokio::test]
    async fn test_missing_section_is_invalid_input() {
        let factory = FakeModelFactory::new(FakeLlm::default());
        let err = refine(&factory, NO_ROLE_RESUME, ResumeSection::Certifications)
            .await
            .unwrap_err();
        assert!(matches!(err, RefineError::InvalidInput(_)));
        assert_eq!(factory.model.calls(), 0);
    }

    #[tokio::test]
    async fn test_blank_section_output_is_service_response() {
        let factory = FakeModelFactory::new(FakeLlm {
            section: Reply::Json(r#"{"refined_markdown": "  "}"#.to_string()),
            ..FakeLlm::default()
        });
        let err = refine(&factory, TWO_ROLE_RESUME, ResumeSection::Education)
            .await
            .unwrap_err();
        assert!(matches!(err, RefineError::ServiceResponse));
    }

    #[test]
    fn test_section_names_deserialize_lowercase() {
        let section: ResumeSection = serde_json::from_str(r#""certifications""#).unwrap();
        assert_eq!(section, ResumeSection::Certifications);
    }
}
