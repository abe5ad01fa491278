//! Response Parser/Validator for sort results.
//!
//! `parse_*` never fail loudly: every rejection is logged and mapped to `None`,
//! which callers treat as "keep the original order". The `check_*` variants
//! expose the typed rejection for diagnosis and tests.

use std::collections::{HashMap, HashSet};

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

use crate::llm_client::strip_json_fences;
use crate::models::resume::{normalize, Achievement, SkillGroup};
use crate::sorting::{AchievementsSortResult, SkillsSortResult};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The payload is not JSON of the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The payload parsed but would drop, invent or duplicate items.
    #[error("contract violation: {0}")]
    ContractViolation(String),
}

/// Validates an achievements ranking. Returns `None` on any rejection.
pub fn parse_achievements_sort(
    raw: &str,
    originals: &[Achievement],
) -> Option<AchievementsSortResult> {
    match check_achievements_sort(raw, originals) {
        Ok(result) => Some(result),
        Err(rejection) => {
            warn!(%rejection, "rejected achievements sort result");
            None
        }
    }
}

/// Validates a skills ranking. Returns `None` on any rejection.
pub fn parse_skills_sort(raw: &str, originals: &[SkillGroup]) -> Option<SkillsSortResult> {
    match check_skills_sort(raw, originals) {
        Ok(result) => Some(result),
        Err(rejection) => {
            warn!(%rejection, "rejected skills sort result");
            None
        }
    }
}

/// Reorder-only contract: the proposed order must contain exactly the original
/// achievement texts, each as many times as it occurs in the originals.
pub fn check_achievements_sort(
    raw: &str,
    originals: &[Achievement],
) -> Result<AchievementsSortResult, Rejection> {
    let result: AchievementsSortResult = decode(raw)?;

    let mut expected: HashMap<&str, usize> = HashMap::new();
    for achievement in originals {
        *expected.entry(achievement.text.as_str()).or_default() += 1;
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    for text in &result.achievement_order {
        let Some(&allowed) = expected.get(text.as_str()) else {
            return Err(Rejection::ContractViolation(format!(
                "unknown achievement {text:?}"
            )));
        };
        let count = seen.entry(text.as_str()).or_default();
        *count += 1;
        if *count > allowed {
            return Err(Rejection::ContractViolation(format!(
                "duplicate achievement {text:?}"
            )));
        }
    }

    for achievement in originals {
        let text = achievement.text.as_str();
        if seen.get(text).copied().unwrap_or(0) < expected[text] {
            return Err(Rejection::ContractViolation(format!(
                "missing achievement {text:?}"
            )));
        }
    }

    Ok(result)
}

/// Reorder-plus-additions contract: every original group appears in
/// `groupOrder`, every original skill appears in its own group's order,
/// and no group order repeats an entry (trimmed, case-insensitive).
pub fn check_skills_sort(
    raw: &str,
    originals: &[SkillGroup],
) -> Result<SkillsSortResult, Rejection> {
    let result: SkillsSortResult = decode(raw)?;

    let mut original_titles = HashSet::new();
    for group in originals {
        if !original_titles.insert(normalize(&group.title)) {
            return Err(Rejection::ContractViolation(format!(
                "original group {:?} is not unique",
                group.title
            )));
        }
    }

    let mut titles = HashSet::new();
    for title in &result.group_order {
        if !titles.insert(normalize(title)) {
            return Err(Rejection::ContractViolation(format!(
                "duplicate group {title:?} in groupOrder"
            )));
        }
    }

    for (title, order) in &result.skill_order {
        let mut in_group = HashSet::new();
        for text in order.iter().filter(|t| !t.trim().is_empty()) {
            if !in_group.insert(normalize(text)) {
                return Err(Rejection::ContractViolation(format!(
                    "duplicate skill {text:?} in group {title:?}"
                )));
            }
        }
    }

    for group in originals.iter().filter(|g| !g.skills.is_empty()) {
        if !result.group_order.iter().any(|t| t == &group.title) {
            return Err(Rejection::ContractViolation(format!(
                "missing group {:?}",
                group.title
            )));
        }
        let proposed = result
            .skill_order
            .get(&group.title)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for skill in &group.skills {
            if !proposed.iter().any(|t| t == &skill.text) {
                return Err(Rejection::ContractViolation(format!(
                    "missing skill {:?} from group {:?}",
                    skill.text, group.title
                )));
            }
        }
    }

    Ok(result)
}

fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, Rejection> {
    let body = strip_json_fences(raw);
    if body.is_empty() {
        return Err(Rejection::Malformed("empty response".to_string()));
    }
    serde_json::from_str(body).map_err(|e| Rejection::Malformed(e.to_string()))
}
