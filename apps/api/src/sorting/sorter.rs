//! Sort orchestrators: Extract → Classify → validate.
//!
//! Both entry points return `Ok(None)` when the model's ranking is unusable;
//! callers keep their current order. Only transport failures and cancellation
//! are errors.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::agent::{Agent, PipelineError, RunContext};
use crate::llm_client::ModelBackend;
use crate::models::resume::{Achievement, SkillGroup};
use crate::sorting::prompts::{
    achievements_sort_tool, build_achievements_sort_prompt, build_requirements_prompt,
    build_skills_sort_prompt, requirements_system, requirements_tool, skills_sort_tool,
    ACHIEVEMENTS_SORT_SYSTEM, SKILLS_SORT_SYSTEM,
};
use crate::sorting::validate::{parse_achievements_sort, parse_skills_sort};
use crate::sorting::{AchievementsSortResult, SkillsSortResult};

/// Skills a job description asks for. Context for the skills ranking only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequirements {
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub preferred_skills: Vec<String>,
}

impl JobRequirements {
    pub fn is_empty(&self) -> bool {
        self.required_skills.is_empty() && self.preferred_skills.is_empty()
    }
}

/// Ranks skill groups and skills against `job_description`.
///
/// 1. Extract: the job's required/preferred skills (falls back to none).
/// 2. Classify: the model proposes group and skill order, possibly with additions.
/// 3. Validate: the proposal must keep every original skill in its group.
pub async fn sort_skills(
    groups: &[SkillGroup],
    job_description: &str,
    backend: Arc<dyn ModelBackend>,
    ctx: &RunContext,
) -> Result<Option<SkillsSortResult>, PipelineError> {
    if groups.iter().all(|g| g.skills.is_empty()) {
        info!("No skills to sort");
        return Ok(None);
    }

    ctx.checkpoint()?;
    ctx.progress.status("Extracting key requirements from the job description...");
    let extractor = Agent::new("requirements_extractor", requirements_system(), backend.clone())
        .with_tool(requirements_tool());
    let requirements: JobRequirements = extractor
        .run(build_requirements_prompt(job_description), ctx)
        .await?
        .decode_or(extractor.name(), JobRequirements::default());
    info!(
        required = requirements.required_skills.len(),
        preferred = requirements.preferred_skills.len(),
        "Job requirements extracted"
    );

    ctx.checkpoint()?;
    ctx.progress.status("Ranking skills by relevance...");
    let sorter = Agent::new("skills_sorter", SKILLS_SORT_SYSTEM, backend).with_tool(skills_sort_tool());
    let output = sorter
        .run(build_skills_sort_prompt(groups, job_description, &requirements), ctx)
        .await?;

    ctx.progress.status("Validating proposed skill order...");
    let result = parse_skills_sort(&output.payload(), groups);
    info!(accepted = result.is_some(), "Skills sort finished");
    Ok(result)
}

/// Ranks one role's achievements against `job_description`. Reorder only.
pub async fn sort_achievements(
    achievements: &[Achievement],
    position: &str,
    organization: &str,
    job_description: &str,
    backend: Arc<dyn ModelBackend>,
    ctx: &RunContext,
) -> Result<Option<AchievementsSortResult>, PipelineError> {
    if achievements.len() < 2 {
        info!("Fewer than two achievements, nothing to sort");
        return Ok(None);
    }

    ctx.checkpoint()?;
    ctx.progress.status("Ranking achievements by relevance...");
    let sorter = Agent::new("achievements_sorter", ACHIEVEMENTS_SORT_SYSTEM, backend)
        .with_tool(achievements_sort_tool());
    let output = sorter
        .run(
            build_achievements_sort_prompt(achievements, position, organization, job_description),
            ctx,
        )
        .await?;

    let result = parse_achievements_sort(&output.payload(), achievements);
    info!(accepted = result.is_some(), "Achievements sort finished");
    Ok(result)
}
