use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::llm_client::structured::Validate;

/// Factual header of a role. The refiner must return these fields unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleBasics {
    pub company: String,
    pub title: String,
    pub start_date: NaiveDate,
    /// `None` means the role is current.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSummary {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleResponsibilities {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSkills {
    #[serde(deserialize_with = "trimmed_skills")]
    pub skills: Vec<String>,
}

/// One professional position from the experience section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub basics: RoleBasics,
    #[serde(default)]
    pub summary: Option<RoleSummary>,
    #[serde(default)]
    pub responsibilities: Option<RoleResponsibilities>,
    #[serde(default)]
    pub skills: Option<RoleSkills>,
}

/// Output of a refinement call. Same shape as `Role`, validated the same way.
pub type RefinedRole = Role;

impl Role {
    /// "Title @ Company", used in progress messages and logs.
    pub fn label(&self) -> String {
        format!("{} @ {}", self.basics.title, self.basics.company)
    }

    pub fn skill_list(&self) -> &[String] {
        self.skills.as_ref().map(|s| s.skills.as_slice()).unwrap_or(&[])
    }
}

impl Validate for Role {
    fn validate(&self) -> Result<(), String> {
        if self.basics.company.trim().is_empty() {
            return Err("basics.company must not be empty".to_string());
        }
        if self.basics.title.trim().is_empty() {
            return Err("basics.title must not be empty".to_string());
        }
        if let Some(end) = self.basics.end_date {
            if end < self.basics.start_date {
                return Err(format!(
                    "basics.end_date {end} is before start_date {}",
                    self.basics.start_date
                ));
            }
        }
        Ok(())
    }
}

fn trimmed_skills<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    Ok(normalize_skills(raw))
}

/// Trims every skill and drops empties, keeping first-seen order.
pub fn normalize_skills<I>(skills: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = Vec::new();
    for skill in skills {
        let skill = skill.trim();
        if !skill.is_empty() && !out.iter().any(|s| s == skill) {
            out.push(skill.to_string());
        }
    }
    out
}

/// A `## Heading` block the codec does not interpret. Preserved verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkdownSection {
    pub heading: String,
    pub body: String,
}

/// Everything above the first `## ` heading, plus uninterpreted sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalInfo {
    pub name: Option<String>,
    pub details: String,
    #[serde(default)]
    pub additional_sections: Vec<MarkdownSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EducationInfo {
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CertificationsInfo {
    pub body: String,
}

/// Roles in display order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceInfo {
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResumeSections {
    pub personal: PersonalInfo,
    pub education: EducationInfo,
    pub experience: ExperienceInfo,
    pub certifications: CertificationsInfo,
}
