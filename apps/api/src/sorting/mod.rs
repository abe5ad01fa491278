// Reordering subsystem: rank skills or achievements against a job description.
// Flow: extract → classify (model ranking) → validate → apply.
// A model ranking is applied only when it is a permutation of the originals
// (plus, for skills, deduplicated additions). Anything else keeps the caller's order.

pub mod apply;
pub mod handlers;
pub mod prompts;
pub mod sorter;
pub mod validate;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Proposed order for skill groups and the skills inside each group.
/// Skill lists may contain new, model-suggested skills.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillsSortResult {
    pub group_order: Vec<String>,
    pub skill_order: HashMap<String, Vec<String>>,
}

/// Proposed total order over the existing achievements. Reorder only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementsSortResult {
    pub achievement_order: Vec<String>,
}

pub use apply::{apply_achievement_order, apply_skill_order, ApplyError};
pub use sorter::{sort_achievements, sort_skills};
pub use validate::{parse_achievements_sort, parse_skills_sort};
