// All LLM prompt constants for the sorting module.
// Reuses cross-cutting fragments from llm_client::prompts.

use serde_json::json;

use crate::llm_client::prompts::{fill, render_json_list, JSON_ONLY_SYSTEM, PRESERVATION_INSTRUCTION};
use crate::llm_client::ToolSpec;
use crate::models::resume::{Achievement, SkillGroup};
use crate::sorting::sorter::JobRequirements;

pub const REQUIREMENTS_SYSTEM: &str = "You are an expert technical recruiter. \
    Extract the skills a job description asks for, split into required and preferred. \
    Use the job description's own wording.";

pub const SKILLS_SORT_SYSTEM: &str = "You are an expert resume strategist. \
    You order a candidate's skill groups and skills by relevance to a job description. \
    You never drop or rename a skill the candidate listed.";

pub const ACHIEVEMENTS_SORT_SYSTEM: &str = "You are an expert resume strategist. \
    You order a candidate's achievements by relevance to a job description. \
    You only reorder; you never add, drop or rewrite an achievement.";

/// Requirements extraction prompt. Replace `{job_description}`.
pub const REQUIREMENTS_PROMPT_TEMPLATE: &str = r#"Extract the skills this job description asks for.

JOB DESCRIPTION:
{job_description}

Return an object with this EXACT shape:
{"requiredSkills": ["..."], "preferredSkills": ["..."]}"#;

/// Skills ranking prompt.
/// Replace: {preservation_instruction}, {job_description}, {requirements}, {groups_json}
pub const SKILLS_SORT_PROMPT_TEMPLATE: &str = r#"Order the candidate's skill groups and the skills inside each group by relevance to the job.

JOB DESCRIPTION:
{job_description}

KEY REQUIREMENTS EXTRACTED FROM THE JOB:
{requirements}

CANDIDATE SKILL GROUPS (source of truth: every title and skill below must be kept exactly as written):
{groups_json}

{preservation_instruction}

RULES:
1. `groupOrder` lists EVERY group title above, most relevant first. Titles are copied exactly.
2. `skillOrder` maps EVERY group title to ALL of that group's skills, most relevant first.
3. Never move a skill into a different group. Never rename, merge or drop a skill.
4. You MAY append a small number of new skills to a group, only when the job explicitly asks for them
   and they are closely implied by the candidate's existing skills. Never repeat a skill that already
   exists in any group, in any casing.
5. You MAY add a new group only for such new skills.

Return an object with this EXACT shape:
{"groupOrder": ["Title"], "skillOrder": {"Title": ["Skill"]}}"#;

/// Achievements ranking prompt.
/// Replace: {preservation_instruction}, {position}, {organization}, {job_description}, {achievements_json}
pub const ACHIEVEMENTS_SORT_PROMPT_TEMPLATE: &str = r#"Order the achievements of this role by relevance to the job, most relevant first.

ROLE: {position} at {organization}

JOB DESCRIPTION:
{job_description}

ACHIEVEMENTS (source of truth: copy each one exactly, character for character):
{achievements_json}

{preservation_instruction}
This is a reorder only: do not add new achievements, do not drop any, do not edit wording.

Return an object with this EXACT shape:
{"achievementOrder": ["achievement text"]}"#;

pub fn requirements_tool() -> ToolSpec {
    ToolSpec {
        name: "extract_requirements",
        description: "Report the skills the job description requires and prefers.",
        input_schema: json!({
            "type": "object",
            "properties": {
                "requiredSkills": {"type": "array", "items": {"type": "string"}},
                "preferredSkills": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["requiredSkills", "preferredSkills"]
        }),
    }
}

pub fn skills_sort_tool() -> ToolSpec {
    ToolSpec {
        name: "sort_skills",
        description: "Return the relevance order of skill groups and of the skills in each group.",
        input_schema: json!({
            "type": "object",
            "properties": {
                "groupOrder": {"type": "array", "items": {"type": "string"}},
                "skillOrder": {
                    "type": "object",
                    "additionalProperties": {"type": "array", "items": {"type": "string"}}
                }
            },
            "required": ["groupOrder", "skillOrder"]
        }),
    }
}

pub fn achievements_sort_tool() -> ToolSpec {
    ToolSpec {
        name: "sort_achievements",
        description: "Return the achievements in relevance order, copied exactly.",
        input_schema: json!({
            "type": "object",
            "properties": {
                "achievementOrder": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["achievementOrder"]
        }),
    }
}

pub fn requirements_system() -> String {
    format!("{REQUIREMENTS_SYSTEM} {JSON_ONLY_SYSTEM}")
}

pub fn build_requirements_prompt(job_description: &str) -> String {
    fill(REQUIREMENTS_PROMPT_TEMPLATE, &[("job_description", job_description)])
}

pub fn build_skills_sort_prompt(
    groups: &[SkillGroup],
    job_description: &str,
    requirements: &JobRequirements,
) -> String {
    let groups_json = serde_json::to_string_pretty(
        &groups
            .iter()
            .map(|g| {
                json!({
                    "title": g.title,
                    "skills": g.skills.iter().map(|s| s.text.as_str()).collect::<Vec<_>>(),
                })
            })
            .collect::<Vec<_>>(),
    )
    .unwrap_or_else(|_| "[]".to_string());

    let requirements_text = if requirements.is_empty() {
        "(none extracted: judge relevance from the job description)".to_string()
    } else {
        format!(
            "Required: {}\nPreferred: {}",
            requirements.required_skills.join(", "),
            requirements.preferred_skills.join(", ")
        )
    };

    fill(
        SKILLS_SORT_PROMPT_TEMPLATE,
        &[
            ("preservation_instruction", PRESERVATION_INSTRUCTION),
            ("requirements", requirements_text.as_str()),
            ("groups_json", groups_json.as_str()),
            ("job_description", job_description),
        ],
    )
}

pub fn build_achievements_sort_prompt(
    achievements: &[Achievement],
    position: &str,
    organization: &str,
    job_description: &str,
) -> String {
    let texts: Vec<String> = achievements.iter().map(|a| a.text.clone()).collect();
    fill(
        ACHIEVEMENTS_SORT_PROMPT_TEMPLATE,
        &[
            ("preservation_instruction", PRESERVATION_INSTRUCTION),
            ("position", position),
            ("organization", organization),
            ("achievements_json", render_json_list(&texts).as_str()),
            ("job_description", job_description),
        ],
    )
}
