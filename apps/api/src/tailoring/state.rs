//! Invocation state for one tailoring run.
//!
//! Stages read `&InvocationState` and return `DraftUpdate`s; only the
//! orchestrator commits them. `commit` enforces the guards every update must
//! pass, so a bad model answer leaves the prior draft in place.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::resume::normalize;

/// The tailorable content of one role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceDraft {
    pub description: String,
    #[serde(default)]
    pub achievements: Vec<String>,
    #[serde(default)]
    pub tech_stack: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftUpdate {
    Analysis(String),
    Description(String),
    Achievements(Vec<String>),
    TechStack(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct InvocationState {
    pub job_description: String,
    pub position: String,
    pub organization: String,
    /// The caller's content. Never changes during a run.
    pub original: ExperienceDraft,
    pub current: ExperienceDraft,
    /// Alignment analysis written by the first stage.
    pub analysis: String,
}

impl InvocationState {
    pub fn new(
        original: ExperienceDraft,
        position: impl Into<String>,
        organization: impl Into<String>,
        job_description: impl Into<String>,
    ) -> Self {
        Self {
            job_description: job_description.into(),
            position: position.into(),
            organization: organization.into(),
            current: original.clone(),
            original,
            analysis: String::new(),
        }
    }

    /// `Position at Organization`, or whichever half is known.
    pub fn role(&self) -> String {
        match (self.position.trim(), self.organization.trim()) {
            ("", "") => "(unspecified role)".to_string(),
            (position, "") => position.to_string(),
            ("", organization) => format!("a role at {organization}"),
            (position, organization) => format!("{position} at {organization}"),
        }
    }

    /// Whether the caller supplied a description to tailor.
    pub fn has_description(&self) -> bool {
        !self.original.description.trim().is_empty()
    }

    /// Applies `update` if it passes its guard. Returns whether it was applied.
    pub fn commit(&mut self, update: DraftUpdate) -> bool {
        match update {
            DraftUpdate::Analysis(analysis) => {
                self.analysis = analysis.trim().to_string();
                true
            }
            DraftUpdate::Description(description) => {
                if !self.has_description() {
                    warn!("No original description, refusing a written one");
                    return false;
                }
                let description = description.trim();
                if description.is_empty() {
                    warn!("Empty description rewrite, keeping prior description");
                    return false;
                }
                self.current.description = description.to_string();
                true
            }
            DraftUpdate::Achievements(achievements) => {
                if achievements.len() != self.current.achievements.len() {
                    warn!(
                        expected = self.current.achievements.len(),
                        got = achievements.len(),
                        "Achievement count changed, keeping prior achievements"
                    );
                    return false;
                }
                self.current.achievements = achievements;
                true
            }
            DraftUpdate::TechStack(stack) => {
                let stack = dedupe(stack);
                if stack.is_empty() {
                    warn!("Empty tech stack alignment, keeping prior stack");
                    return false;
                }
                self.current.tech_stack = stack;
                true
            }
        }
    }
}

/// Trims, drops blanks and removes case-insensitive duplicates, first spelling wins.
pub fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty() && seen.insert(normalize(item)))
        .collect()
}
