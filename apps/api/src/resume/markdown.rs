//! Markdown codec for résumés.
//!
//! Layout understood by the extractor:
//!
//! ```text
//! # Jane Doe
//! jane@example.com | Berlin
//!
//! ## Experience
//! ### Staff Engineer @ Acme
//! 2020-01 - Present | Berlin
//! One paragraph of summary prose.
//! - A responsibility bullet
//! Skills: Rust, PostgreSQL
//!
//! ## Education
//! ...
//! ```
//!
//! Parser output is mapped once into the typed structures of `resume::models`;
//! nothing downstream looks at Markdown lines again.

use chrono::{Datelike, NaiveDate};
use thiserror::Error;
use tracing::debug;

use crate::llm_client::structured::Validate;
use crate::resume::models::{
    normalize_skills, CertificationsInfo, EducationInfo, ExperienceInfo, MarkdownSection,
    PersonalInfo, ResumeSections, Role, RoleBasics, RoleResponsibilities, RoleSkills, RoleSummary,
};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("role heading '{0}' must look like '### Title @ Company'")]
    RoleHeading(String),

    #[error("role '{role}' is missing a date line like '2020-01 - Present'")]
    MissingDates { role: String },

    #[error("could not parse date '{0}'")]
    Date(String),

    #[error("role '{role}' is invalid: {reason}")]
    InvalidRole { role: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SectionKind {
    Education,
    Experience,
    Certifications,
}

fn classify_heading(heading: &str) -> Option<SectionKind> {
    match heading.trim().to_lowercase().as_str() {
        "education" => Some(SectionKind::Education),
        "experience" | "work experience" | "professional experience" => {
            Some(SectionKind::Experience)
        }
        "certifications" | "certificates" => Some(SectionKind::Certifications),
        _ => None,
    }
}

#[derive(Default)]
struct RawSections<'a> {
    preamble: Vec<&'a str>,
    education: Vec<&'a str>,
    experience: Vec<&'a str>,
    certifications: Vec<&'a str>,
    additional: Vec<(String, Vec<&'a str>)>,
}

enum Target {
    Preamble,
    Known(SectionKind),
    Additional(usize),
}

fn split_sections(markdown: &str) -> RawSections<'_> {
    let mut raw = RawSections::default();
    let mut target = Target::Preamble;

    for line in markdown.lines() {
        if let Some(heading) = line.strip_prefix("## ") {
            target = match classify_heading(heading) {
                Some(kind) => Target::Known(kind),
                None => {
                    raw.additional.push((heading.trim().to_string(), Vec::new()));
                    Target::Additional(raw.additional.len() - 1)
                }
            };
            continue;
        }

        match target {
            Target::Preamble => raw.preamble.push(line),
            Target::Known(SectionKind::Education) => raw.education.push(line),
            Target::Known(SectionKind::Experience) => raw.experience.push(line),
            Target::Known(SectionKind::Certifications) => raw.certifications.push(line),
            Target::Additional(i) => raw.additional[i].1.push(line),
        }
    }

    raw
}

fn join_block(lines: &[&str]) -> String {
    lines.join("\n").trim().to_string()
}

// ────────────────────────────────────────────────────────────────────────────
// Extraction
// ────────────────────────────────────────────────────────────────────────────

pub fn extract_personal_info(markdown: &str) -> PersonalInfo {
    let raw = split_sections(markdown);

    let mut name = None;
    let mut details = Vec::new();
    for line in raw.preamble {
        match line.strip_prefix("# ") {
            Some(heading) if name.is_none() => name = Some(heading.trim().to_string()),
            _ => details.push(line),
        }
    }

    PersonalInfo {
        name,
        details: join_block(&details),
        additional_sections: raw
            .additional
            .into_iter()
            .map(|(heading, lines)| MarkdownSection {
                heading,
                body: join_block(&lines),
            })
            .collect(),
    }
}

pub fn extract_education_info(markdown: &str) -> EducationInfo {
    EducationInfo {
        body: join_block(&split_sections(markdown).education),
    }
}

pub fn extract_certifications_info(markdown: &str) -> CertificationsInfo {
    CertificationsInfo {
        body: join_block(&split_sections(markdown).certifications),
    }
}

/// Extracts roles in display order. A résumé without an experience section yields no roles.
pub fn extract_experience_info(markdown: &str) -> Result<ExperienceInfo, ExtractError> {
    let raw = split_sections(markdown);
    let mut roles = Vec::new();
    let mut current: Option<RoleDraft> = None;

    for line in raw.experience {
        if let Some(heading) = line.strip_prefix("### ") {
            if let Some(draft) = current.take() {
                roles.push(draft.finish()?);
            }
            current = Some(RoleDraft::from_heading(heading)?);
            continue;
        }

        match current.as_mut() {
            Some(draft) => draft.push_line(line)?,
            None if !line.trim().is_empty() => {
                debug!("Ignoring experience text before the first role: {line}");
            }
            None => {}
        }
    }

    if let Some(draft) = current {
        roles.push(draft.finish()?);
    }

    Ok(ExperienceInfo { roles })
}

pub fn parse_resume(markdown: &str) -> Result<ResumeSections, ExtractError> {
    Ok(ResumeSections {
        personal: extract_personal_info(markdown),
        education: extract_education_info(markdown),
        experience: extract_experience_info(markdown)?,
        certifications: extract_certifications_info(markdown),
    })
}

struct RoleDraft {
    title: String,
    company: String,
    dates: Option<DateLine>,
    summary: Vec<String>,
    responsibilities: Vec<String>,
    skills: Vec<String>,
}

struct DateLine {
    start: NaiveDate,
    end: Option<NaiveDate>,
    location: Option<String>,
}

impl RoleDraft {
    fn from_heading(heading: &str) -> Result<Self, ExtractError> {
        let heading = heading.trim();
        let (title, company) = heading
            .split_once(" @ ")
            .ok_or_else(|| ExtractError::RoleHeading(heading.to_string()))?;
        Ok(Self {
            title: title.trim().to_string(),
            company: company.trim().to_string(),
            dates: None,
            summary: Vec::new(),
            responsibilities: Vec::new(),
            skills: Vec::new(),
        })
    }

    fn label(&self) -> String {
        format!("{} @ {}", self.title, self.company)
    }

    fn push_line(&mut self, line: &str) -> Result<(), ExtractError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        if self.dates.is_none() {
            self.dates = Some(parse_date_line(line).ok_or_else(|| {
                ExtractError::MissingDates { role: self.label() }
            })??);
            return Ok(());
        }

        if let Some(skills) = strip_skills_prefix(line) {
            self.skills
                .extend(skills.split(',').map(|s| s.trim().to_string()));
        } else if let Some(bullet) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
            self.responsibilities.push(format!("- {}", bullet.trim()));
        } else {
            self.summary.push(line.to_string());
        }
        Ok(())
    }

    fn finish(self) -> Result<Role, ExtractError> {
        let label = self.label();
        let dates = self
            .dates
            .ok_or_else(|| ExtractError::MissingDates { role: label.clone() })?;

        let skills = normalize_skills(self.skills);
        let role = Role {
            basics: RoleBasics {
                company: self.company,
                title: self.title,
                start_date: dates.start,
                end_date: dates.end,
                location: dates.location,
            },
            summary: (!self.summary.is_empty()).then(|| RoleSummary {
                text: self.summary.join("\n"),
            }),
            responsibilities: (!self.responsibilities.is_empty()).then(|| RoleResponsibilities {
                text: self.responsibilities.join("\n"),
            }),
            skills: (!skills.is_empty()).then_some(RoleSkills { skills }),
        };

        role.validate()
            .map_err(|reason| ExtractError::InvalidRole { role: label, reason })?;
        Ok(role)
    }
}

fn strip_skills_prefix(line: &str) -> Option<&str> {
    let line = line
        .strip_prefix("**Skills:**")
        .or_else(|| line.strip_prefix("Skills:"))
        .or_else(|| line.strip_prefix("skills:"))?;
    Some(line.trim())
}

/// Returns `None` when the line has no range separator at all, and
/// `Some(Err(..))` when it does but a date does not parse.
fn parse_date_line(line: &str) -> Option<Result<DateLine, ExtractError>> {
    let (range, location) = match line.split_once(" | ") {
        Some((range, location)) => (range, Some(location.trim().to_string())),
        None => (line, None),
    };

    let (start, end) = [" - ", " – ", " — ", " to "]
        .iter()
        .find_map(|sep| range.split_once(sep))?;

    Some(parse_date_range(start, end).map(|(start, end)| DateLine {
        start,
        end,
        location: location.filter(|l| !l.is_empty()),
    }))
}

fn parse_date_range(
    start: &str,
    end: &str,
) -> Result<(NaiveDate, Option<NaiveDate>), ExtractError> {
    let start = parse_resume_date(start)?.ok_or_else(|| ExtractError::Date(start.to_string()))?;
    Ok((start, parse_resume_date(end)?))
}

/// Parses a résumé date. `Present`/`Current`/`Now` yield `Ok(None)`.
pub fn parse_resume_date(text: &str) -> Result<Option<NaiveDate>, ExtractError> {
    let text = text.trim();
    if matches!(text.to_lowercase().as_str(), "present" | "current" | "now") {
        return Ok(None);
    }

    let parsed = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{text}-01"), "%Y-%m-%d"))
        .or_else(|_| NaiveDate::parse_from_str(&format!("1 {text}"), "%d %b %Y"))
        .or_else(|_| NaiveDate::parse_from_str(&format!("1 {text}"), "%d %B %Y"))
        .or_else(|_| NaiveDate::parse_from_str(&format!("{text}-01-01"), "%Y-%m-%d"));

    parsed
        .map(Some)
        .map_err(|_| ExtractError::Date(text.to_string()))
}

pub fn format_resume_date(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

// ────────────────────────────────────────────────────────────────────────────
// Serialization
// ────────────────────────────────────────────────────────────────────────────

pub fn serialize_personal_info_to_markdown(personal: &PersonalInfo) -> String {
    let mut out = String::new();
    if let Some(name) = &personal.name {
        out.push_str(&format!("# {name}\n"));
    }
    if !personal.details.is_empty() {
        out.push_str(&personal.details);
        out.push('\n');
    }
    out
}

pub fn serialize_education_info_to_markdown(education: &EducationInfo) -> String {
    titled_block("Education", &education.body)
}

pub fn serialize_certifications_info_to_markdown(certifications: &CertificationsInfo) -> String {
    titled_block("Certifications", &certifications.body)
}

pub fn serialize_experience_info_to_markdown(experience: &ExperienceInfo) -> String {
    if experience.roles.is_empty() {
        return String::new();
    }
    let roles: Vec<String> = experience.roles.iter().map(serialize_role).collect();
    format!("## Experience\n\n{}", roles.join("\n"))
}

fn titled_block(title: &str, body: &str) -> String {
    if body.trim().is_empty() {
        String::new()
    } else {
        format!("## {title}\n\n{}\n", body.trim())
    }
}

fn serialize_role(role: &Role) -> String {
    let basics = &role.basics;
    let end = basics
        .end_date
        .map(format_resume_date)
        .unwrap_or_else(|| "Present".to_string());

    let mut out = format!(
        "### {} @ {}\n{} - {}",
        basics.title,
        basics.company,
        format_resume_date(basics.start_date),
        end
    );
    if let Some(location) = basics.location.as_deref().filter(|l| !l.is_empty()) {
        out.push_str(&format!(" | {location}"));
    }
    out.push('\n');

    if let Some(summary) = role.summary.as_ref().filter(|s| !s.text.trim().is_empty()) {
        out.push_str(&format!("\n{}\n", summary.text.trim()));
    }

    if let Some(responsibilities) = &role.responsibilities {
        let bullets: Vec<String> = responsibilities
            .text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| {
                let text = l.strip_prefix("- ").or_else(|| l.strip_prefix("* ")).unwrap_or(l);
                format!("- {}", text.trim())
            })
            .collect();
        if !bullets.is_empty() {
            out.push_str(&format!("\n{}\n", bullets.join("\n")));
        }
    }

    if !role.skill_list().is_empty() {
        out.push_str(&format!("\nSkills: {}\n", role.skill_list().join(", ")));
    }

    out
}

/// Reassembles a full résumé. Document order is personal, experience, education,
/// certifications, then any uninterpreted sections.
pub fn build_complete_resume_from_sections(
    personal: &PersonalInfo,
    education: &EducationInfo,
    certifications: &CertificationsInfo,
    experience: &ExperienceInfo,
) -> String {
    let mut blocks = vec![
        serialize_personal_info_to_markdown(personal),
        serialize_experience_info_to_markdown(experience),
        serialize_education_info_to_markdown(education),
        serialize_certifications_info_to_markdown(certifications),
    ];
    blocks.extend(
        personal
            .additional_sections
            .iter()
            .map(|section| titled_block(&section.heading, &section.body)),
    );

    let blocks: Vec<String> = blocks
        .into_iter()
        .map(|b| b.trim_end().to_string())
        .filter(|b| !b.is_empty())
        .collect();
    format!("{}\n", blocks.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resume::fixtures::TWO_ROLE_RESUME;

    fn date(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    #[test]
    fn test_extracts_roles_in_display_order() {
        let experience = extract_experience_info(TWO_ROLE_RESUME).unwrap();
        assert_eq!(experience.roles.len(), 2);

        let first = &experience.roles[0];
        assert_eq!(first.basics.company, "A Company");
        assert_eq!(first.basics.title, "A Role");
        assert_eq!(first.basics.start_date, date(2021, 3));
        assert_eq!(first.basics.end_date, None);
        assert_eq!(first.basics.location.as_deref(), Some("Berlin"));
        assert_eq!(first.skill_list(), ["Rust".to_string(), "PostgreSQL".to_string()]);
        assert!(first
            .responsibilities
            .as_ref()
            .unwrap()
            .text
            .starts_with("- Built"));

        let second = &experience.roles[1];
        assert_eq!(second.basics.company, "B Company");
        assert_eq!(second.basics.end_date, Some(date(2021, 2)));
        assert!(second.summary.is_some());
    }

    #[test]
    fn test_resume_without_experience_has_no_roles() {
        let experience = extract_experience_info("# Jane\n\n## Education\nTU Berlin\n").unwrap();
        assert!(experience.roles.is_empty());
    }

    #[test]
    fn test_heading_without_company_is_rejected() {
        let md = "## Experience\n### Engineer\n2020-01 - Present\n";
        assert!(matches!(
            extract_experience_info(md),
            Err(ExtractError::RoleHeading(_))
        ));
    }

    #[test]
    fn test_missing_date_line_is_rejected() {
        let md = "## Experience\n### Engineer @ Acme\nDid things.\n";
        assert!(matches!(
            extract_experience_info(md),
            Err(ExtractError::MissingDates { .. })
        ));
    }

    #[test]
    fn test_end_before_start_is_rejected() {
        let md = "## Experience\n### Engineer @ Acme\n2022-01 - 2020-01\n";
        assert!(matches!(
            extract_experience_info(md),
            Err(ExtractError::InvalidRole { .. })
        ));
    }

    #[test]
    fn test_parse_resume_date_formats() {
        assert_eq!(parse_resume_date("2020-05-17").unwrap(), NaiveDate::from_ymd_opt(2020, 5, 17));
        assert_eq!(parse_resume_date("2020-05").unwrap(), Some(date(2020, 5)));
        assert_eq!(parse_resume_date("Mar 2019").unwrap(), Some(date(2019, 3)));
        assert_eq!(parse_resume_date("September 2018").unwrap(), Some(date(2018, 9)));
        assert_eq!(parse_resume_date("2017").unwrap(), Some(date(2017, 1)));
        assert_eq!(parse_resume_date("Present").unwrap(), None);
        assert!(parse_resume_date("someday").is_err());
    }

    #[test]
    fn test_personal_and_other_sections() {
        let personal = extract_personal_info(TWO_ROLE_RESUME);
        assert_eq!(personal.name.as_deref(), Some("Jane Doe"));
        assert!(personal.details.contains("jane@example.com"));
        assert_eq!(personal.additional_sections.len(), 1);
        assert_eq!(personal.additional_sections[0].heading, "Projects");

        let education = extract_education_info(TWO_ROLE_RESUME);
        assert!(education.body.contains("TU Berlin"));
        let certifications = extract_certifications_info(TWO_ROLE_RESUME);
        assert!(certifications.body.contains("CKA"));
    }

    #[test]
    fn test_rebuilt_resume_parses_back_to_same_roles() {
        let sections = parse_resume(TWO_ROLE_RESUME).unwrap();
        let rebuilt = build_complete_resume_from_sections(
            &sections.personal,
            &sections.education,
            &sections.certifications,
            &sections.experience,
        );

        assert!(rebuilt.starts_with("# Jane Doe\n"));
        assert!(rebuilt.contains("### A Role @ A Company\n2021-03 - Present | Berlin"));
        assert!(rebuilt.contains("## Projects"));

        let reparsed = parse_resume(&rebuilt).unwrap();
        assert_eq!(reparsed.experience, sections.experience);
        assert_eq!(reparsed.education, sections.education);
    }

    #[test]
    fn test_plain_responsibility_lines_are_serialized_as_bullets() {
        let mut experience = extract_experience_info(TWO_ROLE_RESUME).unwrap();
        experience.roles[0].responsibilities = Some(RoleResponsibilities {
            text: "Owned billing\n* Shipped payouts".to_string(),
        });
        let md = serialize_experience_info_to_markdown(&experience);
        assert!(md.contains("- Owned billing\n- Shipped payouts"));
    }
}
