//! Résumé items as supplied by callers. Identity is the exact text.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub text: String,
    /// Set on skills the model suggested; callers render them highlighted.
    #[serde(default)]
    pub highlight: bool,
}

impl Skill {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            highlight: false,
        }
    }

    pub fn highlighted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            highlight: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub text: String,
    #[serde(default)]
    pub highlight: bool,
}

impl Achievement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            highlight: false,
        }
    }
}

/// A titled bucket of skills. Titles are unique within a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillGroup {
    pub title: String,
    #[serde(default)]
    pub skills: Vec<Skill>,
}

impl SkillGroup {
    pub fn new(title: impl Into<String>, skills: &[&str]) -> Self {
        Self {
            title: title.into(),
            skills: skills.iter().map(|s| Skill::new(*s)).collect(),
        }
    }
}

/// Duplicate-detection key: trimmed and case-folded.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_folds_case() {
        assert_eq!(normalize("  TypeScript "), "typescript");
        assert_eq!(normalize("React"), normalize("react"));
    }

    #[test]
    fn test_skill_highlight_defaults_to_false() {
        let skill: Skill = serde_json::from_str(r#"{"text": "Rust"}"#).unwrap();
        assert_eq!(skill, Skill::new("Rust"));
    }

    #[test]
    fn test_skill_group_without_skills_deserializes() {
        let group: SkillGroup = serde_json::from_str(r#"{"title": "Cloud"}"#).unwrap();
        assert!(group.skills.is_empty());
    }
}
