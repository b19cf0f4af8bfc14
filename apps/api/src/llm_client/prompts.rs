// Shared prompt constants and prompt-building utilities.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// Common instruction appended to every rewriting prompt.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Use ONLY facts present in the candidate's resume. \
    Do NOT invent employers, titles, dates, metrics, tools, certifications or responsibilities. \
    Rephrase and reprioritise existing content to align with the job; \
    if the resume does not support a claim, leave it out.";

/// Keeps the skills list consistent with the rewritten responsibilities.
pub const SKILL_CONSISTENCY_INSTRUCTION: &str = "\
    CRITICAL: Every skill, tool or technology you name in the responsibilities text \
    MUST also appear verbatim in the `skills.skills` list. \
    Keep every skill already present in the input list.";

/// Fills `{placeholder}` slots in a prompt template in a single pass.
/// Substituted text is never scanned again, so user content that happens to
/// contain `{name}` stays literal. Braces that do not name a known slot are
/// kept as they are.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let slot = after
            .find('}')
            .map(|close| (&after[..close], close))
            .and_then(|(key, close)| {
                values
                    .iter()
                    .find(|(name, _)| *name == key)
                    .map(|(_, value)| (*value, close))
            });
        match slot {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
