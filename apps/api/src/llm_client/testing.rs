//! In-memory chat model for tests. Routes each call by its system prompt and
//! records how many calls were made and how many overlapped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm_client::{ChatModel, LlmConfig, LlmError, ModelFactory};
use crate::refinement::prompts::{
    CANDIDATE_ANALYSIS_SYSTEM, INTRODUCTION_SYSTEM, JOB_ANALYSIS_SYSTEM, REQUIREMENTS_SYSTEM,
    ROLE_REFINE_SYSTEM, SECTION_REFINE_SYSTEM,
};

pub const JOB_ANALYSIS_JSON: &str = r#"{
    "key_skills": ["Rust", "PostgreSQL"],
    "primary_duties": ["Build payment services"],
    "nice_to_have_skills": ["Kubernetes"],
    "themes": ["reliability"]
}"#;

pub const REQUIREMENTS_JSON: &str = r#"{
    "required_skills": ["Rust"],
    "preferred_skills": ["Kubernetes"],
    "key_responsibilities": ["Build payment services"],
    "experience_level": "senior"
}"#;

pub const CANDIDATE_JSON: &str = r#"{
    "skill_assessments": [
        {"skill": "Rust", "present": true, "evidence_source": "experience", "evidence": "Built the settlement pipeline in Rust"},
        {"skill": "Kubernetes", "present": false, "evidence_source": "not_found", "evidence": ""}
    ]
}"#;

pub const INTRODUCTION_JSON: &str = r#"{
    "strengths": [
        "Rust engineer who built a production settlement pipeline",
        "Cut reconciliation time from 6 hours to 40 minutes"
    ]
}"#;

#[derive(Debug, Clone)]
pub enum Reply {
    Json(String),
    Garbage,
    Auth,
    ServerError,
}

impl Reply {
    fn produce(&self) -> Result<String, LlmError> {
        match self {
            Reply::Json(body) => Ok(body.clone()),
            Reply::Garbage => Ok("I'm sorry, I can't help with that.".to_string()),
            Reply::Auth => Err(LlmError::Authentication {
                status: 401,
                message: "Incorrect API key provided".to_string(),
            }),
            Reply::ServerError => Err(LlmError::Api {
                status: 500,
                message: "upstream exploded".to_string(),
            }),
        }
    }
}

/// How role refinement calls respond.
#[derive(Debug, Clone)]
pub enum RoleReply {
    /// Echo the role from the prompt with its summary prefixed by "Refined: ".
    Echo,
    /// Answer every role call with this reply instead of echoing.
    Fail(Reply),
    /// Fail only the role at this company; echo the rest.
    FailCompany(String, Reply),
}

pub struct FakeLlm {
    pub job_analysis: Reply,
    pub requirements: Reply,
    pub candidate: Reply,
    pub introduction: Reply,
    pub section: Reply,
    pub role: RoleReply,
    pub role_delay: Duration,
    pub calls: AtomicUsize,
    pub role_calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl Default for FakeLlm {
    fn default() -> Self {
        Self {
            job_analysis: Reply::Json(JOB_ANALYSIS_JSON.to_string()),
            requirements: Reply::Json(REQUIREMENTS_JSON.to_string()),
            candidate: Reply::Json(CANDIDATE_JSON.to_string()),
            introduction: Reply::Json(INTRODUCTION_JSON.to_string()),
            section: Reply::Json(r#"{"refined_markdown": "- CKA (2022)"}"#.to_string()),
            role: RoleReply::Echo,
            role_delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            role_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }
}

impl FakeLlm {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn role_calls(&self) -> usize {
        self.role_calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn refine_role(&self, prompt: &str) -> Result<String, LlmError> {
        self.role_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.role_delay.is_zero() {
            tokio::time::sleep(self.role_delay).await;
        }
        let result = self.role_reply(prompt);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn role_reply(&self, prompt: &str) -> Result<String, LlmError> {
        let mut role = role_from_prompt(prompt);
        match &self.role {
            RoleReply::Fail(reply) => return reply.produce(),
            RoleReply::FailCompany(company, reply) if role["basics"]["company"] == *company => {
                return reply.produce();
            }
            _ => {}
        }

        let summary = role["summary"]["text"].as_str().unwrap_or_default().to_string();
        role["summary"] = serde_json::json!({ "text": format!("Refined: {summary}") });
        Ok(role.to_string())
    }
}

fn role_from_prompt(prompt: &str) -> Value {
    let start = prompt.find("<role>").expect("role prompt carries <role>") + "<role>".len();
    let end = prompt.find("</role>").expect("role prompt carries </role>");
    serde_json::from_str(prompt[start..end].trim()).expect("role JSON in prompt")
}

#[async_trait]
impl ChatModel for FakeLlm {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match system {
            s if s == JOB_ANALYSIS_SYSTEM => self.job_analysis.produce(),
            s if s == REQUIREMENTS_SYSTEM => self.requirements.produce(),
            s if s == CANDIDATE_ANALYSIS_SYSTEM => self.candidate.produce(),
            s if s == INTRODUCTION_SYSTEM => self.introduction.produce(),
            s if s == SECTION_REFINE_SYSTEM => self.section.produce(),
            s if s == ROLE_REFINE_SYSTEM => self.refine_role(prompt).await,
            other => panic!("unexpected system prompt: {other}"),
        }
    }
}

/// Hands out the same `FakeLlm` for every build and counts builds. Builds are
/// numbered from 1; `fail_build` makes exactly that one fail.
pub struct FakeModelFactory {
    pub model: Arc<FakeLlm>,
    pub fail_build: Option<usize>,
    builds: AtomicUsize,
}

impl FakeModelFactory {
    pub fn new(model: FakeLlm) -> Self {
        Self {
            model: Arc::new(model),
            fail_build: None,
            builds: AtomicUsize::new(0),
        }
    }

    pub fn failing_build(mut self, build: usize) -> Self {
        self.fail_build = Some(build);
        self
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl ModelFactory for FakeModelFactory {
    fn build(&self, _config: &LlmConfig, _temperature: f32) -> Result<Arc<dyn ChatModel>, LlmError> {
        let build = self.builds.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_build == Some(build) {
            return Err(LlmError::Config("fake factory refuses to build".to_string()));
        }
        Ok(self.model.clone())
    }
}
