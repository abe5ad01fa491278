//! Experience tailoring pipeline.
//!
//! Flow: analyze → rewrite description → extract keywords → classify enrichment
//!       → rewrite achievements ⟲ integrity audit → align tech stack ⟲ validation
//!       → fact-check ⟲ revise → relevance ⟲ revise.
//!
//! Each stage reads the invocation state and returns the updates it wants; the
//! orchestrator commits them. Model disagreement never fails a run: a bad answer
//! keeps the prior draft, and an unapproved loop keeps its last draft. Only
//! transport failures and cancellation are errors.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::agent::{Agent, PipelineError, RunContext};
use crate::llm_client::ModelBackend;
use crate::models::resume::normalize;
use crate::tailoring::decode::{decode_item_list, decode_paragraph, flagged_indices, merge_flagged};
use crate::tailoring::enrichment::{EnrichmentMap, KeywordExtraction};
use crate::tailoring::prompts::*;
use crate::tailoring::review::{Next, ReviewKind, ReviewLoop, ReviewReport, Verdict};
use crate::tailoring::state::{dedupe, DraftUpdate, ExperienceDraft, InvocationState};

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TailorRequest {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub achievements: Vec<String>,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub organization: String,
    pub job_description: String,
    #[serde(default)]
    pub tech_stack: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TailoredExperience {
    pub description: String,
    pub achievements: Vec<String>,
    pub tech_stack: Vec<String>,
    /// One report per review loop that ran.
    pub reviews: Vec<ReviewReport>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TechStackAlignment {
    #[serde(default)]
    tech_stack: Vec<String>,
}

/// What a stage hands back to the orchestrator.
#[derive(Debug, Default)]
struct StageOutcome {
    updates: Vec<DraftUpdate>,
    review: Option<ReviewReport>,
}

/// One agent per logical actor of the pipeline.
struct Agents {
    analyst: Agent,
    description_writer: Agent,
    keyword_extractor: Agent,
    enrichment_classifier: Agent,
    achievement_writer: Agent,
    integrity_auditor: Agent,
    tech_stack_aligner: Agent,
    tech_stack_validator: Agent,
    fact_checker: Agent,
    relevance_reviewer: Agent,
}

impl Agents {
    fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            analyst: Agent::new("analyst", ANALYSIS_SYSTEM, backend.clone()),
            description_writer: Agent::new("description_writer", DESCRIPTION_SYSTEM, backend.clone()),
            keyword_extractor: Agent::new("keyword_extractor", keywords_system(), backend.clone())
                .with_tool(keywords_tool()),
            enrichment_classifier: Agent::new("enrichment_classifier", enrichment_system(), backend.clone())
                .with_tool(enrichment_tool()),
            achievement_writer: Agent::new("achievement_writer", ACHIEVEMENTS_SYSTEM, backend.clone()),
            integrity_auditor: Agent::new(
                "integrity_auditor",
                reviewer_system(ReviewKind::IntegrityAudit),
                backend.clone(),
            ),
            tech_stack_aligner: Agent::new("tech_stack_aligner", tech_stack_system(), backend.clone())
                .with_tool(tech_stack_tool()),
            tech_stack_validator: Agent::new(
                "tech_stack_validator",
                reviewer_system(ReviewKind::TechStackValidation),
                backend.clone(),
            ),
            fact_checker: Agent::new("fact_checker", reviewer_system(ReviewKind::FactCheck), backend.clone()),
            relevance_reviewer: Agent::new("relevance_reviewer", reviewer_system(ReviewKind::Relevance), backend),
        }
    }

    fn reviewer(&self, kind: ReviewKind) -> &Agent {
        match kind {
            ReviewKind::IntegrityAudit => &self.integrity_auditor,
            ReviewKind::TechStackValidation => &self.tech_stack_validator,
            ReviewKind::FactCheck => &self.fact_checker,
            ReviewKind::Relevance => &self.relevance_reviewer,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ────────────────────────────────────────────────────────────────────────────

/// Tailors one role's description, achievements and tech stack to a job.
///
/// Runs inside an `info_span` carrying a fresh run id.
pub async fn tailor_experience(
    request: TailorRequest,
    backend: Arc<dyn ModelBackend>,
    ctx: &RunContext,
) -> Result<TailoredExperience, PipelineError> {
    let run_id = Uuid::new_v4();
    let span = info_span!("tailor_experience", %run_id, position = %request.position);
    run_pipeline(request, backend, ctx).instrument(span).await
}

async fn run_pipeline(
    request: TailorRequest,
    backend: Arc<dyn ModelBackend>,
    ctx: &RunContext,
) -> Result<TailoredExperience, PipelineError> {
    let agents = Agents::new(backend);
    let mut state = InvocationState::new(
        ExperienceDraft {
            description: request.description,
            achievements: request.achievements,
            tech_stack: request.tech_stack,
        },
        request.position,
        request.organization,
        request.job_description,
    );
    let mut reviews = Vec::new();
    info!(
        achievements = state.original.achievements.len(),
        tech_stack = state.original.tech_stack.len(),
        "Tailoring started"
    );

    // Stage 1: Analyze & Rewrite
    let outcome = analyze_and_rewrite(&state, &agents, ctx).await?;
    commit(&mut state, &mut reviews, outcome);

    // Stage 2: Achievements
    if state.current.achievements.is_empty() {
        info!("No achievements, skipping enrichment");
    } else {
        let outcome = enrich_achievements(&state, &agents, ctx).await?;
        commit(&mut state, &mut reviews, outcome);
    }

    // Stage 3: Tech Stack
    if state.current.tech_stack.is_empty() {
        info!("No tech stack, skipping alignment");
    } else {
        let outcome = align_tech_stack(&state, &agents, ctx).await?;
        commit(&mut state, &mut reviews, outcome);
    }

    // Stage 4: Verification
    for kind in [ReviewKind::FactCheck, ReviewKind::Relevance] {
        let outcome = verify(kind, &state, &agents, ctx).await?;
        commit(&mut state, &mut reviews, outcome);
    }

    ctx.progress.status("Tailoring complete.");
    info!(reviews = reviews.len(), "Tailoring finished");

    Ok(TailoredExperience {
        description: state.current.description,
        achievements: state.current.achievements,
        tech_stack: state.current.tech_stack,
        reviews,
    })
}

fn commit(state: &mut InvocationState, reviews: &mut Vec<ReviewReport>, outcome: StageOutcome) {
    for update in outcome.updates {
        state.commit(update);
    }
    reviews.extend(outcome.review);
}

// ────────────────────────────────────────────────────────────────────────────
// Stages
// ────────────────────────────────────────────────────────────────────────────

async fn analyze_and_rewrite(
    state: &InvocationState,
    agents: &Agents,
    ctx: &RunContext,
) -> Result<StageOutcome, PipelineError> {
    ctx.checkpoint()?;
    ctx.progress.status("Analyzing how this role aligns with the job...");
    let analysis = agents.analyst.run(build_analysis_prompt(state), ctx).await?.text;

    // Nothing to rewrite: the role stays without a description.
    if !state.has_description() {
        info!("No description, skipping rewrite");
        return Ok(StageOutcome {
            updates: vec![DraftUpdate::Analysis(analysis)],
            review: None,
        });
    }

    // The rewrite needs the analysis, so build the prompt against a scratch copy.
    let mut scratch = state.clone();
    scratch.commit(DraftUpdate::Analysis(analysis.clone()));

    ctx.checkpoint()?;
    ctx.progress.status("Rewriting the role description...");
    let description = agents
        .description_writer
        .run(build_description_prompt(&scratch), ctx)
        .await?;

    Ok(StageOutcome {
        updates: vec![
            DraftUpdate::Analysis(analysis),
            DraftUpdate::Description(decode_paragraph(&description.text)),
        ],
        review: None,
    })
}

async fn enrich_achievements(
    state: &InvocationState,
    agents: &Agents,
    ctx: &RunContext,
) -> Result<StageOutcome, PipelineError> {
    let count = state.current.achievements.len();

    // (a) Extract
    ctx.checkpoint()?;
    ctx.progress.status("Finding job keywords your achievements don't mention yet...");
    let extraction = agents
        .keyword_extractor
        .run(build_keywords_prompt(state), ctx)
        .await?
        .decode_or(agents.keyword_extractor.name(), KeywordExtraction::default())
        .filtered(&state.current.achievements);
    let candidates = extraction.candidates();
    info!(candidates = candidates.len(), "Keywords extracted");

    // (b) Classify
    let enrichment = if candidates.is_empty() {
        EnrichmentMap::default()
    } else {
        ctx.checkpoint()?;
        ctx.progress.status("Checking which keywords each achievement can honestly carry...");
        let raw = agents
            .enrichment_classifier
            .run(build_enrichment_prompt(state, &candidates), ctx)
            .await?
            .decode_or(agents.enrichment_classifier.name(), HashMap::new());
        EnrichmentMap::from_raw(raw, count, &candidates)
    };
    info!(enriched = enrichment.len(), "Enrichment map built");

    // (c) Rewrite
    ctx.checkpoint()?;
    ctx.progress.status("Rewriting achievements...");
    let rewritten = decode_item_list(
        &agents
            .achievement_writer
            .run(build_achievements_prompt(state, &enrichment), ctx)
            .await?
            .text,
    );
    let mut draft = accept_list(&state.current.achievements, rewritten, agents.achievement_writer.name());

    // (d) Integrity audit
    let mut review = ReviewLoop::new(ReviewKind::IntegrityAudit);
    let report = loop {
        ctx.checkpoint()?;
        let iteration = review.begin_audit();
        ctx.progress
            .status(format!("Auditing rewritten achievements (pass {iteration})..."));
        let verdict = Verdict::parse(
            &agents
                .integrity_auditor
                .run(build_integrity_audit_prompt(state, &draft, &enrichment), ctx)
                .await?
                .text,
        );

        match review.record(verdict) {
            Next::Finished(report) => break report,
            Next::Revise(critique) => {
                ctx.checkpoint()?;
                ctx.progress.status("Revising flagged achievements...");
                draft = revise_achievements(state, &draft, &critique, agents, ctx).await?;
            }
        }
    };

    Ok(StageOutcome {
        updates: vec![DraftUpdate::Achievements(draft)],
        review: Some(report),
    })
}

async fn align_tech_stack(
    state: &InvocationState,
    agents: &Agents,
    ctx: &RunContext,
) -> Result<StageOutcome, PipelineError> {
    ctx.checkpoint()?;
    ctx.progress.status("Aligning your tech stack with the job's terminology...");
    let mut proposed = request_alignment(state, None, None, agents, ctx).await?;

    let mut review = ReviewLoop::new(ReviewKind::TechStackValidation);
    let report = loop {
        ctx.checkpoint()?;
        let iteration = review.begin_audit();
        ctx.progress
            .status(format!("Validating tech stack additions (pass {iteration})..."));
        let added = additions(&state.original.tech_stack, &proposed);
        let verdict = Verdict::parse(
            &agents
                .tech_stack_validator
                .run(build_tech_stack_validation_prompt(state, &proposed, &added), ctx)
                .await?
                .text,
        );

        match review.record(verdict) {
            Next::Finished(report) => break report,
            Next::Revise(critique) => {
                ctx.checkpoint()?;
                ctx.progress.status("Re-aligning tech stack...");
                proposed = request_alignment(state, Some(&proposed), Some(&critique), agents, ctx).await?;
            }
        }
    };

    Ok(StageOutcome {
        updates: vec![DraftUpdate::TechStack(proposed)],
        review: Some(report),
    })
}

async fn verify(
    kind: ReviewKind,
    state: &InvocationState,
    agents: &Agents,
    ctx: &RunContext,
) -> Result<StageOutcome, PipelineError> {
    let label = match kind {
        ReviewKind::Relevance => "Checking relevance to the job",
        _ => "Fact-checking against your original text",
    };
    let reviewer = agents.reviewer(kind);
    let mut description = state.current.description.clone();
    let mut achievements = state.current.achievements.clone();

    let mut review = ReviewLoop::new(kind);
    let report = loop {
        ctx.checkpoint()?;
        let iteration = review.begin_audit();
        ctx.progress.status(format!("{label} (pass {iteration})..."));
        let verdict = Verdict::parse(
            &reviewer
                .run(build_verification_prompt(kind, state, &description, &achievements), ctx)
                .await?
                .text,
        );

        match review.record(verdict) {
            Next::Finished(report) => break report,
            Next::Revise(critique) => {
                ctx.checkpoint()?;
                ctx.progress.status("Applying reviewer feedback...");
                if state.has_description() {
                    let revised = agents
                        .description_writer
                        .run(build_description_revision_prompt(state, &description, &critique), ctx)
                        .await?;
                    let revised = decode_paragraph(&revised.text);
                    if revised.is_empty() {
                        warn!(review = kind.as_str(), "Empty description revision, keeping prior draft");
                    } else {
                        description = revised;
                    }
                }

                if flagged_indices(&critique, achievements.len()).is_empty() {
                    continue;
                }
                ctx.checkpoint()?;
                achievements = revise_achievements(state, &achievements, &critique, agents, ctx).await?;
            }
        }
    };

    Ok(StageOutcome {
        updates: vec![
            DraftUpdate::Description(description),
            DraftUpdate::Achievements(achievements),
        ],
        review: Some(report),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

/// Re-runs the achievement writer on the items `critique` flags (all items when
/// it flags none) and merges the result into `draft`.
async fn revise_achievements(
    state: &InvocationState,
    draft: &[String],
    critique: &str,
    agents: &Agents,
    ctx: &RunContext,
) -> Result<Vec<String>, PipelineError> {
    let flagged = flagged_indices(critique, draft.len());
    let output = agents
        .achievement_writer
        .run(build_achievements_revision_prompt(state, draft, critique, &flagged), ctx)
        .await?;

    match merge_flagged(draft, decode_item_list(&output.text), &flagged) {
        Some(merged) => Ok(merged),
        None => {
            warn!(
                agent = agents.achievement_writer.name(),
                expected = draft.len(),
                "Revision did not return one line per achievement, keeping prior draft"
            );
            Ok(draft.to_vec())
        }
    }
}

async fn request_alignment(
    state: &InvocationState,
    previous: Option<&[String]>,
    critique: Option<&str>,
    agents: &Agents,
    ctx: &RunContext,
) -> Result<Vec<String>, PipelineError> {
    let fallback = previous.unwrap_or(state.current.tech_stack.as_slice());
    let aligned = agents
        .tech_stack_aligner
        .run(build_tech_stack_prompt(state, previous, critique), ctx)
        .await?
        .decode_or(agents.tech_stack_aligner.name(), TechStackAlignment::default())
        .tech_stack;

    let aligned = dedupe(aligned);
    if aligned.is_empty() {
        warn!("Empty tech stack alignment, keeping prior proposal");
        return Ok(fallback.to_vec());
    }
    Ok(aligned)
}

/// Entries of `proposed` not in `original`, compared case-insensitively.
fn additions(original: &[String], proposed: &[String]) -> Vec<String> {
    let known: HashSet<String> = original.iter().map(|s| normalize(s)).collect();
    proposed
        .iter()
        .filter(|s| !known.contains(&normalize(s)))
        .cloned()
        .collect()
}

/// Keeps `prior` unless `candidate` has exactly one item per prior item.
fn accept_list(prior: &[String], candidate: Vec<String>, agent: &str) -> Vec<String> {
    if candidate.len() == prior.len() {
        return candidate;
    }
    warn!(
        agent,
        expected = prior.len(),
        got = candidate.len(),
        "Rewrite changed the number of achievements, keeping prior draft"
    );
    prior.to_vec()
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
