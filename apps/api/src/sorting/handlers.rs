//! Axum route handlers for the sorting API.
//!
//! A rejected ranking is not an error: the response carries `applied: false`
//! and the caller's data unchanged.

use std::collections::HashSet;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::agent::Progress;
use crate::errors::AppError;
use crate::models::resume::{normalize, Achievement, SkillGroup};
use crate::sorting::{
    apply_achievement_order, apply_skill_order, sort_achievements, sort_skills,
    AchievementsSortResult, SkillsSortResult,
};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSkillsRequest {
    pub skill_groups: Vec<SkillGroup>,
    pub job_description: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSkillsResponse {
    pub applied: bool,
    pub skill_groups: Vec<SkillGroup>,
    pub sort_result: Option<SkillsSortResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortAchievementsRequest {
    pub achievements: Vec<Achievement>,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub organization: String,
    pub job_description: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SortAchievementsResponse {
    pub applied: bool,
    pub achievements: Vec<Achievement>,
    pub sort_result: Option<AchievementsSortResult>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/skills/sort
pub async fn handle_sort_skills(
    State(state): State<AppState>,
    Json(request): Json<SortSkillsRequest>,
) -> Result<Json<SortSkillsResponse>, AppError> {
    require_job_description(&request.job_description)?;
    require_unique_titles(&request.skill_groups)?;

    let ctx = state.run_context(Progress::noop());
    let sort_result = sort_skills(
        &request.skill_groups,
        &request.job_description,
        state.backend.clone(),
        &ctx,
    )
    .await?;

    let response = match sort_result {
        Some(result) => SortSkillsResponse {
            applied: true,
            skill_groups: apply_skill_order(&request.skill_groups, &result),
            sort_result: Some(result),
        },
        None => SortSkillsResponse {
            applied: false,
            skill_groups: request.skill_groups,
            sort_result: None,
        },
    };
    Ok(Json(response))
}

/// POST /api/v1/achievements/sort
pub async fn handle_sort_achievements(
    State(state): State<AppState>,
    Json(request): Json<SortAchievementsRequest>,
) -> Result<Json<SortAchievementsResponse>, AppError> {
    require_job_description(&request.job_description)?;

    let ctx = state.run_context(Progress::noop());
    let sort_result = sort_achievements(
        &request.achievements,
        &request.position,
        &request.organization,
        &request.job_description,
        state.backend.clone(),
        &ctx,
    )
    .await?;

    let response = match sort_result {
        Some(result) => SortAchievementsResponse {
            applied: true,
            achievements: apply_achievement_order(request.achievements, &result)?,
            sort_result: Some(result),
        },
        None => SortAchievementsResponse {
            applied: false,
            achievements: request.achievements,
            sort_result: None,
        },
    };
    Ok(Json(response))
}

fn require_job_description(job_description: &str) -> Result<(), AppError> {
    if job_description.trim().is_empty() {
        return Err(AppError::Validation(
            "jobDescription cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn require_unique_titles(groups: &[SkillGroup]) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    for group in groups {
        if !seen.insert(normalize(&group.title)) {
            return Err(AppError::Validation(format!(
                "skill group titles must be unique, {:?} repeats",
                group.title
            )));
        }
    }
    Ok(())
}
