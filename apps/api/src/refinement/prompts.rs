// All LLM prompt constants for the refinement module.
// Reuses cross-cutting fragments from llm_client::prompts.
// Templates use `{placeholder}` slots filled with `llm_client::prompts::fill`.

/// System prompt for job description analysis.
pub const JOB_ANALYSIS_SYSTEM: &str = "You are an expert recruiter and job description analyst. \
    Extract the skills, duties and themes an employer is looking for. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Job analysis prompt. Replace `{job_description}` and `{introduction_request}`.
pub const JOB_ANALYSIS_PROMPT_TEMPLATE: &str = r#"Analyze the following job description.

Return a JSON object with this EXACT schema:
{
  "key_skills": ["Rust", "distributed systems"],
  "primary_duties": ["Design and operate payment services"],
  "nice_to_have_skills": ["Kubernetes"],
  "themes": ["reliability", "ownership"],
  "introduction": null
}

{introduction_request}

JOB DESCRIPTION:
{job_description}"#;

/// Appended to the job analysis prompt when the caller also wants an introduction.
/// Replace `{resume}` and `{grounding_instruction}`.
pub const JOB_ANALYSIS_INTRODUCTION_REQUEST: &str = r#"Also fill "introduction" with a 2-3 sentence professional summary of the candidate below, tailored to this job.
{grounding_instruction}

CANDIDATE RESUME:
{resume}"#;

pub const JOB_ANALYSIS_NO_INTRODUCTION: &str = r#"Leave "introduction" as null."#;

/// Stage 1 of the introduction pipeline.
pub const REQUIREMENTS_SYSTEM: &str = "You are a hiring manager distilling a job posting \
    into its essential requirements. \
    You MUST respond with valid JSON only. \
    Do NOT use markdown code fences.";

/// Replace `{job_description}`.
pub const REQUIREMENTS_PROMPT_TEMPLATE: &str = r#"Extract the key requirements from this job description.

Return a JSON object:
{
  "required_skills": ["Rust"],
  "preferred_skills": ["Kubernetes"],
  "key_responsibilities": ["Own the payments platform"],
  "experience_level": "senior"
}

"required_skills" must contain at least one entry.

JOB DESCRIPTION:
{job_description}"#;

/// Stage 2 of the introduction pipeline.
pub const CANDIDATE_ANALYSIS_SYSTEM: &str = "You are a meticulous career coach. \
    Assess a candidate strictly on the evidence in their resume. \
    You MUST respond with valid JSON only. \
    Do NOT use markdown code fences.";

/// Replace `{requirements_json}`, `{resume}`.
pub const CANDIDATE_ANALYSIS_PROMPT_TEMPLATE: &str = r#"For each requirement below, decide whether the resume demonstrates it.

REQUIREMENTS:
{requirements_json}

CANDIDATE RESUME:
{resume}

Return a JSON object:
{
  "skill_assessments": [
    {
      "skill": "Rust",
      "present": true,
      "evidence_source": "experience",
      "evidence": "Built the settlement pipeline in Rust at A Company"
    }
  ]
}

"evidence_source" is one of "experience", "education", "skills", "summary", "projects", "certifications", "not_found".
When "present" is false, use "not_found" and an empty "evidence"."#;

/// Stage 3 of the introduction pipeline.
pub const INTRODUCTION_SYSTEM: &str = "You are an expert resume writer. \
    Write concise strength statements grounded only in verified evidence. \
    You MUST respond with valid JSON only. \
    Do NOT use markdown code fences.";

/// Replace `{analysis_json}`, `{grounding_instruction}`.
pub const INTRODUCTION_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

Using ONLY the assessments marked "present": true below, write between 1 and 5 short strength statements for the top of the candidate's resume.

ASSESSMENTS:
{analysis_json}

Return a JSON object:
{
  "strengths": ["Rust engineer who built a production settlement pipeline"]
}"#;

/// System prompt for refining one role.
pub const ROLE_REFINE_SYSTEM: &str = "You are an expert resume writer tailoring one \
    professional role to a target job without inventing experience. \
    You MUST respond with valid JSON only, matching the input role's structure. \
    Do NOT use markdown code fences.";

/// Replace `{grounding_instruction}`, `{skill_instruction}`, `{role_json}`, `{job_analysis_json}`.
pub const ROLE_REFINE_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

{skill_instruction}

Rewrite the role's "summary.text" and "responsibilities.text" so they emphasise what the job analysis values.

HARD RULES:
1. Return the SAME JSON structure as the input role
2. "basics.company", "basics.title", "basics.start_date", "basics.end_date" and "basics.location" MUST be copied unchanged
3. "responsibilities.text" is a newline-separated list of "- " bullets
4. Never add an employer, metric, tool or achievement that the input role does not mention

ROLE:
<role>
{role_json}
</role>

JOB ANALYSIS:
<job_analysis>
{job_analysis_json}
</job_analysis>"#;

/// System prompt for refining a free-form section (education, certifications).
pub const SECTION_REFINE_SYSTEM: &str = "You are an expert resume writer polishing one \
    resume section for a target job without inventing facts. \
    You MUST respond with valid JSON only. \
    Do NOT use markdown code fences.";

/// Replace `{grounding_instruction}`, `{section_name}`, `{section_markdown}`, `{job_analysis_json}`.
pub const SECTION_REFINE_PROMPT_TEMPLATE: &str = r#"{grounding_instruction}

Reorder and rephrase the {section_name} section below so the entries most relevant to the job come first.
Keep every entry; do not change names, institutions, dates or credentials.

SECTION ({section_name}):
{section_markdown}

JOB ANALYSIS:
{job_analysis_json}

Return a JSON object:
{
  "refined_markdown": "the rewritten section body in Markdown, without the '## ' heading"
}"#;
