// All LLM prompt constants for the tailoring pipeline.
// Reuses cross-cutting fragments from llm_client::prompts.
//
// Rewriters answer in plain text, one item per line. Reviewers answer with
// APPROVED or a critique that cites items by their [index].

use serde_json::json;

use crate::llm_client::prompts::{
    fill, render_indexed, render_json_list, GROUNDING_INSTRUCTION, JSON_ONLY_SYSTEM,
    PRESERVATION_INSTRUCTION,
};
use crate::llm_client::ToolSpec;
use crate::tailoring::enrichment::EnrichmentMap;
use crate::tailoring::review::ReviewKind;
use crate::tailoring::state::InvocationState;

// ────────────────────────────────────────────────────────────────────────────
// System prompts
// ────────────────────────────────────────────────────────────────────────────

pub const ANALYSIS_SYSTEM: &str = "You are an expert resume strategist. \
    You compare one role from a candidate's resume against a target job and explain, \
    concisely, where they align and which existing experience deserves emphasis.";

pub const DESCRIPTION_SYSTEM: &str = "You are an expert resume writer. \
    You rewrite a role description so it speaks to a target job, using only facts the \
    candidate already stated. Reply with the description text only.";

pub const KEYWORDS_SYSTEM: &str = "You are an expert technical recruiter. \
    You list the job description's important keywords that a resume does not yet mention.";

pub const ENRICHMENT_SYSTEM: &str = "You are a meticulous resume editor. \
    You decide, for each achievement, which keywords it already implies and could honestly name. \
    When in doubt, you leave a keyword out.";

pub const ACHIEVEMENTS_SYSTEM: &str = "You are an expert resume writer. \
    You rewrite achievement bullets for a target job without changing what happened. \
    Reply with the achievements only, one per line, no numbering, no commentary.";

pub const INTEGRITY_AUDIT_SYSTEM: &str = "You are a strict resume integrity auditor. \
    You compare rewritten achievements against the originals and flag anything fabricated, \
    exaggerated, or unsupported.";

pub const TECH_STACK_SYSTEM: &str = "You are an expert technical recruiter. \
    You align the names in a candidate's technology list with the job's terminology \
    without inventing tools the candidate never used.";

pub const TECH_STACK_VALIDATION_SYSTEM: &str = "You are a strict resume integrity auditor. \
    You check that every technology added to a candidate's list is evidenced by their own text.";

pub const FACT_CHECK_SYSTEM: &str = "You are a strict resume fact-checker. \
    You compare a tailored role against the candidate's original text and flag any claim \
    the original does not support.";

pub const RELEVANCE_SYSTEM: &str = "You are a senior hiring manager. \
    You judge whether a tailored role speaks to the job and flag weak or off-target items.";

/// Appended to every reviewer system prompt.
pub const VERDICT_INSTRUCTION: &str = "If there is nothing to fix, reply with the single word APPROVED. \
    Otherwise reply with a short critique. Cite achievements by their [index] and the \
    description as [description]. Do not rewrite anything yourself.";

pub fn keywords_system() -> String {
    format!("{KEYWORDS_SYSTEM} {JSON_ONLY_SYSTEM}")
}

pub fn enrichment_system() -> String {
    format!("{ENRICHMENT_SYSTEM} {JSON_ONLY_SYSTEM}")
}

pub fn tech_stack_system() -> String {
    format!("{TECH_STACK_SYSTEM} {JSON_ONLY_SYSTEM}")
}

pub fn reviewer_system(kind: ReviewKind) -> String {
    let base = match kind {
        ReviewKind::IntegrityAudit => INTEGRITY_AUDIT_SYSTEM,
        ReviewKind::TechStackValidation => TECH_STACK_VALIDATION_SYSTEM,
        ReviewKind::FactCheck => FACT_CHECK_SYSTEM,
        ReviewKind::Relevance => RELEVANCE_SYSTEM,
    };
    format!("{base} {VERDICT_INSTRUCTION}")
}

// ────────────────────────────────────────────────────────────────────────────
// Templates
// ────────────────────────────────────────────────────────────────────────────

/// Replace: {role}, {description}, {achievements}, {tech_stack}, {job_description}
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"Analyze how this role aligns with the target job.

ROLE: {role}

DESCRIPTION:
{description}

ACHIEVEMENTS:
{achievements}

TECH STACK: {tech_stack}

JOB DESCRIPTION:
{job_description}

Cover, in a few short paragraphs:
1. The job's core requirements this role already demonstrates.
2. Which existing achievements and facts deserve emphasis, and why.
3. Terminology in the job that maps onto things the candidate already did.
Do not suggest adding experience the candidate does not have."#;

/// Replace: {grounding_instruction}, {role}, {analysis}, {description}, {job_description}
pub const DESCRIPTION_PROMPT_TEMPLATE: &str = r#"Rewrite the description of this role for the target job.

ROLE: {role}

ALIGNMENT ANALYSIS:
{analysis}

ORIGINAL DESCRIPTION (source of truth):
{description}

JOB DESCRIPTION:
{job_description}

{grounding_instruction}

Keep it to the same length or shorter. Lead with what matters most to this job.
Reply with the rewritten description only."#;

/// Replace: {critique}, {grounding_instruction}, {original_description}, {description}, {job_description}
pub const DESCRIPTION_REVISION_PROMPT_TEMPLATE: &str = r#"Revise this role description to address the reviewer's critique.

REVIEWER CRITIQUE:
{critique}

ORIGINAL DESCRIPTION (source of truth):
{original_description}

CURRENT DESCRIPTION:
{description}

JOB DESCRIPTION:
{job_description}

{grounding_instruction}

Only change what the critique raises about the description. If it raises nothing about the
description, return the current description unchanged. Reply with the description only."#;

/// Replace: {achievements}, {job_description}
pub const KEYWORDS_PROMPT_TEMPLATE: &str = r#"List the important keywords from this job description that the achievements below do NOT already mention.

ACHIEVEMENTS:
{achievements}

JOB DESCRIPTION:
{job_description}

Use the job description's exact spelling. Include technologies, methods and domain terms; skip
generic words such as "team" or "communication".

Return an object with this EXACT shape:
{"missingKeywords": ["..."], "criticalKeywords": ["..."], "niceToHaveKeywords": ["..."]}
`missingKeywords` lists all of them; `criticalKeywords` the ones the job requires;
`niceToHaveKeywords` the ones it only prefers."#;

/// Replace: {achievements}, {candidates}, {job_description}
pub const ENRICHMENT_PROMPT_TEMPLATE: &str = r#"Decide which candidate keywords each achievement could honestly mention.

ACHIEVEMENTS (indexed):
{achievements}

CANDIDATE KEYWORDS:
{candidates}

JOB DESCRIPTION:
{job_description}

A keyword is approved for an achievement ONLY if the achievement already describes that work
in other words (for example "deployed containers to a managed cluster" implies "Kubernetes").
Never approve a keyword just because the job wants it. Use only the candidate keywords above,
spelled exactly as listed. Omit achievements that get no keywords.

Return an object mapping the achievement index (as a string) to its approved keywords:
{"0": ["keyword"], "2": ["keyword", "keyword"]}"#;

/// Replace: {preservation_instruction}, {grounding_instruction}, {role}, {analysis},
///          {achievements}, {count}, {job_description}
pub const ACHIEVEMENTS_PROMPT_TEMPLATE: &str = r#"Rewrite each achievement of this role for the target job.

ROLE: {role}

ALIGNMENT ANALYSIS:
{analysis}

ACHIEVEMENTS (indexed, with the only keywords you may add to each):
{achievements}

JOB DESCRIPTION:
{job_description}

{preservation_instruction}
{grounding_instruction}

RULES:
1. Return exactly {count} achievements, in the same order, one per line.
2. Rewrite wording and emphasis only. Keep every number, tool and outcome as stated.
3. An achievement may gain only the keywords listed after it, and only where they read naturally.
4. No numbering, no bullets, no blank lines, no commentary."#;

/// Replace: {critique}, {preservation_instruction}, {grounding_instruction}, {original},
///          {achievements}, {flagged}, {count}
pub const ACHIEVEMENTS_REVISION_PROMPT_TEMPLATE: &str = r#"Revise the flagged achievements to address the reviewer's critique.

REVIEWER CRITIQUE:
{critique}

ORIGINAL ACHIEVEMENTS (source of truth):
{original}

CURRENT ACHIEVEMENTS:
{achievements}

ACHIEVEMENTS TO REVISE: {flagged}

{preservation_instruction}
{grounding_instruction}

RULES:
1. Return all {count} achievements, in the same order, one per line.
2. Change only the achievements to revise; copy every other one exactly.
3. When in doubt, fall back to the original wording.
4. No numbering, no bullets, no blank lines, no commentary."#;

/// Replace: {original}, {achievements}, {enrichment}
pub const INTEGRITY_AUDIT_PROMPT_TEMPLATE: &str = r#"Audit these rewritten achievements against the originals.

ORIGINAL ACHIEVEMENTS (source of truth):
{original}

REWRITTEN ACHIEVEMENTS:
{achievements}

KEYWORDS THAT WERE APPROVED FOR INJECTION:
{enrichment}

Flag any rewritten achievement that:
- states a number, tool, scope or outcome the original does not;
- uses a keyword that was not approved for it;
- drops a fact the original stated;
- describes a different piece of work than the original at the same index."#;

/// Replace: {original_stack}, {preservation_instruction}, {critique}, {description},
///          {achievements}, {job_description}
pub const TECH_STACK_PROMPT_TEMPLATE: &str = r#"Align this technology list with the job's terminology.

CURRENT TECH STACK (source of truth):
{original_stack}

ROLE DESCRIPTION:
{description}

ACHIEVEMENTS:
{achievements}

JOB DESCRIPTION:
{job_description}
{critique}
{preservation_instruction}

RULES:
1. Keep every listed technology. You may rename one to the job's spelling of the same thing
   (for example "Postgres" to "PostgreSQL").
2. You may add a technology only if the description or achievements above clearly show it was used.
3. Order the list by relevance to the job.

Return an object with this EXACT shape:
{"techStack": ["..."]}"#;

/// Replace: {original_stack}, {proposed}, {additions}, {description}, {achievements}
pub const TECH_STACK_VALIDATION_PROMPT_TEMPLATE: &str = r#"Validate a proposed technology list.

ORIGINAL TECH STACK:
{original_stack}

PROPOSED TECH STACK:
{proposed}

ADDED ENTRIES:
{additions}

ROLE DESCRIPTION:
{description}

ACHIEVEMENTS:
{achievements}

Every added entry must be clearly evidenced by the description or achievements, and every
original technology must still be present (possibly renamed). Name each entry that fails."#;

/// Replace: {original_description}, {original_achievements}, {description}, {achievements}
pub const FACT_CHECK_PROMPT_TEMPLATE: &str = r#"Fact-check this tailored role against the candidate's original text.

ORIGINAL DESCRIPTION:
{original_description}

ORIGINAL ACHIEVEMENTS:
{original_achievements}

TAILORED DESCRIPTION:
{description}

TAILORED ACHIEVEMENTS:
{achievements}

Flag every tailored claim (metric, tool, team size, scope, outcome, employer) that the original
text does not support."#;

/// Replace: {role}, {description}, {achievements}, {job_description}
pub const RELEVANCE_PROMPT_TEMPLATE: &str = r#"Judge how well this tailored role speaks to the job.

ROLE: {role}

TAILORED DESCRIPTION:
{description}

TAILORED ACHIEVEMENTS:
{achievements}

JOB DESCRIPTION:
{job_description}

Flag items that bury the most relevant fact, use vague wording where the job uses precise terms,
or read as generic. Do not ask for experience the candidate does not have."#;

// ────────────────────────────────────────────────────────────────────────────
// Tools
// ────────────────────────────────────────────────────────────────────────────

fn string_array() -> serde_json::Value {
    json!({"type": "array", "items": {"type": "string"}})
}

pub fn keywords_tool() -> ToolSpec {
    ToolSpec {
        name: "extract_keywords",
        description: "Report job keywords that the achievements do not mention yet.",
        input_schema: json!({
            "type": "object",
            "properties": {
                "missingKeywords": string_array(),
                "criticalKeywords": string_array(),
                "niceToHaveKeywords": string_array()
            },
            "required": ["missingKeywords", "criticalKeywords", "niceToHaveKeywords"]
        }),
    }
}

pub fn enrichment_tool() -> ToolSpec {
    ToolSpec {
        name: "classify_enrichment",
        description: "Map achievement indices to the keywords each may honestly mention.",
        input_schema: json!({
            "type": "object",
            "additionalProperties": string_array()
        }),
    }
}

pub fn tech_stack_tool() -> ToolSpec {
    ToolSpec {
        name: "align_tech_stack",
        description: "Return the aligned technology list.",
        input_schema: json!({
            "type": "object",
            "properties": {"techStack": string_array()},
            "required": ["techStack"]
        }),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Builders
// ────────────────────────────────────────────────────────────────────────────

fn or_none(text: &str) -> &str {
    if text.trim().is_empty() {
        "(none)"
    } else {
        text
    }
}

fn render_list(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

fn render_critique(critique: &str) -> String {
    if critique.trim().is_empty() {
        "(the reviewer gave no details; re-check every item against the original)".to_string()
    } else {
        critique.trim().to_string()
    }
}

pub fn build_analysis_prompt(state: &InvocationState) -> String {
    fill(
        ANALYSIS_PROMPT_TEMPLATE,
        &[
            ("role", state.role().as_str()),
            ("description", or_none(&state.current.description)),
            ("achievements", render_indexed(&state.current.achievements).as_str()),
            ("tech_stack", render_list(&state.current.tech_stack).as_str()),
            ("job_description", state.job_description.as_str()),
        ],
    )
}

pub fn build_description_prompt(state: &InvocationState) -> String {
    fill(
        DESCRIPTION_PROMPT_TEMPLATE,
        &[
            ("grounding_instruction", GROUNDING_INSTRUCTION),
            ("role", state.role().as_str()),
            ("analysis", or_none(&state.analysis)),
            ("description", or_none(&state.current.description)),
            ("job_description", state.job_description.as_str()),
        ],
    )
}

pub fn build_description_revision_prompt(state: &InvocationState, description: &str, critique: &str) -> String {
    fill(
        DESCRIPTION_REVISION_PROMPT_TEMPLATE,
        &[
            ("critique", render_critique(critique).as_str()),
            ("grounding_instruction", GROUNDING_INSTRUCTION),
            ("original_description", or_none(&state.original.description)),
            ("description", or_none(description)),
            ("job_description", state.job_description.as_str()),
        ],
    )
}

pub fn build_keywords_prompt(state: &InvocationState) -> String {
    fill(
        KEYWORDS_PROMPT_TEMPLATE,
        &[
            ("achievements", render_indexed(&state.current.achievements).as_str()),
            ("job_description", state.job_description.as_str()),
        ],
    )
}

pub fn build_enrichment_prompt(state: &InvocationState, candidates: &[String]) -> String {
    fill(
        ENRICHMENT_PROMPT_TEMPLATE,
        &[
            ("achievements", render_indexed(&state.current.achievements).as_str()),
            ("candidates", render_json_list(candidates).as_str()),
            ("job_description", state.job_description.as_str()),
        ],
    )
}

/// `[i] text` lines, each followed by the keywords approved for it.
fn render_seeded(achievements: &[String], enrichment: &EnrichmentMap) -> String {
    if achievements.is_empty() {
        return "(none)".to_string();
    }
    achievements
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let seeds = enrichment.for_index(i);
            if seeds.is_empty() {
                format!("[{i}] {text}\n    may add: (nothing)")
            } else {
                format!("[{i}] {text}\n    may add: {}", seeds.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_enrichment(enrichment: &EnrichmentMap, count: usize) -> String {
    let lines: Vec<String> = (0..count)
        .filter(|&i| !enrichment.for_index(i).is_empty())
        .map(|i| format!("[{i}] {}", enrichment.for_index(i).join(", ")))
        .collect();
    if lines.is_empty() {
        "(none, so no achievement should contain new keywords)".to_string()
    } else {
        lines.join("\n")
    }
}

pub fn build_achievements_prompt(state: &InvocationState, enrichment: &EnrichmentMap) -> String {
    fill(
        ACHIEVEMENTS_PROMPT_TEMPLATE,
        &[
            ("preservation_instruction", PRESERVATION_INSTRUCTION),
            ("grounding_instruction", GROUNDING_INSTRUCTION),
            ("role", state.role().as_str()),
            ("analysis", or_none(&state.analysis)),
            ("achievements", render_seeded(&state.current.achievements, enrichment).as_str()),
            ("count", state.current.achievements.len().to_string().as_str()),
            ("job_description", state.job_description.as_str()),
        ],
    )
}

/// `flagged` empty means every achievement may change.
pub fn build_achievements_revision_prompt(
    state: &InvocationState,
    achievements: &[String],
    critique: &str,
    flagged: &[usize],
) -> String {
    let flagged_text = if flagged.is_empty() {
        "all of them".to_string()
    } else {
        flagged.iter().map(|i| format!("[{i}]")).collect::<Vec<_>>().join(", ")
    };

    fill(
        ACHIEVEMENTS_REVISION_PROMPT_TEMPLATE,
        &[
            ("critique", render_critique(critique).as_str()),
            ("preservation_instruction", PRESERVATION_INSTRUCTION),
            ("grounding_instruction", GROUNDING_INSTRUCTION),
            ("original", render_indexed(&state.original.achievements).as_str()),
            ("achievements", render_indexed(achievements).as_str()),
            ("flagged", flagged_text.as_str()),
            ("count", achievements.len().to_string().as_str()),
        ],
    )
}

pub fn build_integrity_audit_prompt(
    state: &InvocationState,
    achievements: &[String],
    enrichment: &EnrichmentMap,
) -> String {
    fill(
        INTEGRITY_AUDIT_PROMPT_TEMPLATE,
        &[
            ("original", render_indexed(&state.original.achievements).as_str()),
            ("achievements", render_indexed(achievements).as_str()),
            ("enrichment", render_enrichment(enrichment, achievements.len()).as_str()),
        ],
    )
}

/// `previous` and `critique` are set when re-aligning after a failed validation.
pub fn build_tech_stack_prompt(
    state: &InvocationState,
    previous: Option<&[String]>,
    critique: Option<&str>,
) -> String {
    let critique_text = match (previous, critique) {
        (Some(previous), Some(critique)) => format!(
            "\nYOUR PREVIOUS PROPOSAL:\n{}\n\nREVIEWER CRITIQUE OF IT:\n{}\n",
            render_list(previous),
            render_critique(critique)
        ),
        _ => String::new(),
    };

    fill(
        TECH_STACK_PROMPT_TEMPLATE,
        &[
            ("original_stack", render_json_list(&state.original.tech_stack).as_str()),
            ("preservation_instruction", PRESERVATION_INSTRUCTION),
            ("critique", critique_text.as_str()),
            ("description", or_none(&state.current.description)),
            ("achievements", render_indexed(&state.current.achievements).as_str()),
            ("job_description", state.job_description.as_str()),
        ],
    )
}

pub fn build_tech_stack_validation_prompt(
    state: &InvocationState,
    proposed: &[String],
    additions: &[String],
) -> String {
    fill(
        TECH_STACK_VALIDATION_PROMPT_TEMPLATE,
        &[
            ("original_stack", render_list(&state.original.tech_stack).as_str()),
            ("proposed", render_list(proposed).as_str()),
            ("additions", render_list(additions).as_str()),
            ("description", or_none(&state.current.description)),
            ("achievements", render_indexed(&state.current.achievements).as_str()),
        ],
    )
}

/// Prompt for one of the two verification reviewers.
pub fn build_verification_prompt(
    kind: ReviewKind,
    state: &InvocationState,
    description: &str,
    achievements: &[String],
) -> String {
    match kind {
        ReviewKind::Relevance => fill(
            RELEVANCE_PROMPT_TEMPLATE,
            &[
                ("role", state.role().as_str()),
                ("description", or_none(description)),
                ("achievements", render_indexed(achievements).as_str()),
                ("job_description", state.job_description.as_str()),
            ],
        ),
        _ => fill(
            FACT_CHECK_PROMPT_TEMPLATE,
            &[
                ("original_description", or_none(&state.original.description)),
                ("original_achievements", render_indexed(&state.original.achievements).as_str()),
                ("description", or_none(description)),
                ("achievements", render_indexed(achievements).as_str()),
            ],
        ),
    }
}
