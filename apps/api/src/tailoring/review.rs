//! Bounded self-correction loops.
//!
//! Every review loop in the tailoring pipeline runs the same state machine:
//!
//! ```text
//! Drafting ──begin_audit──▶ Auditing ──record(APPROVED)──▶ Approved
//!    ▲                          │
//!    └──── record(critique) ────┤
//!                               └──record(critique) on last iteration──▶ Exhausted
//! ```
//!
//! An exhausted loop keeps the last draft. The returned `ReviewReport` says so.

use serde::Serialize;
use tracing::{info, warn};

/// Upper bound on audits per loop.
pub const MAX_REVIEW_ITERATIONS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewKind {
    IntegrityAudit,
    TechStackValidation,
    FactCheck,
    Relevance,
}

impl ReviewKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewKind::IntegrityAudit => "integrity_audit",
            ReviewKind::TechStackValidation => "tech_stack_validation",
            ReviewKind::FactCheck => "fact_check",
            ReviewKind::Relevance => "relevance",
        }
    }
}

/// A reviewer's answer. Anything that does not lead with `APPROVED` is a critique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Revise(String),
}

impl Verdict {
    /// Reads the first non-empty line, ignoring markdown emphasis, headings and backticks.
    pub fn parse(text: &str) -> Self {
        let first = text
            .lines()
            .map(|line| line.trim_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '#' | '`')))
            .find(|line| !line.is_empty())
            .unwrap_or_default();

        if first.to_ascii_uppercase().starts_with("APPROVED") {
            Verdict::Approved
        } else {
            Verdict::Revise(text.trim().to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Approved,
    Exhausted,
}

/// Outcome of one review loop, returned to the caller with the tailored content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewReport {
    #[serde(rename = "loop")]
    pub kind: ReviewKind,
    pub status: ReviewStatus,
    pub iterations: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Drafting,
    Auditing,
    Approved,
    Exhausted,
}

/// What the orchestrator does after recording a verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    /// Revise the draft with this critique, then audit again.
    Revise(String),
    /// Stop; the current draft is final.
    Finished(ReviewReport),
}

#[derive(Debug, Clone)]
pub struct ReviewLoop {
    kind: ReviewKind,
    max_iterations: u32,
    iterations: u32,
    state: LoopState,
}

impl ReviewLoop {
    pub fn new(kind: ReviewKind) -> Self {
        Self::with_limit(kind, MAX_REVIEW_ITERATIONS)
    }

    pub fn with_limit(kind: ReviewKind, max_iterations: u32) -> Self {
        Self {
            kind,
            max_iterations: max_iterations.max(1),
            iterations: 0,
            state: LoopState::Drafting,
        }
    }

    /// Starts the next audit and returns its 1-based iteration number.
    pub fn begin_audit(&mut self) -> u32 {
        debug_assert_eq!(self.state, LoopState::Drafting, "audit started outside Drafting");
        self.iterations += 1;
        self.state = LoopState::Auditing;
        self.iterations
    }

    pub fn record(&mut self, verdict: Verdict) -> Next {
        debug_assert_eq!(self.state, LoopState::Auditing, "verdict recorded outside Auditing");
        match verdict {
            Verdict::Approved => {
                self.state = LoopState::Approved;
                info!(review = self.kind.as_str(), iterations = self.iterations, "Review approved");
                Next::Finished(self.report(ReviewStatus::Approved))
            }
            Verdict::Revise(_) if self.iterations >= self.max_iterations => {
                self.state = LoopState::Exhausted;
                warn!(
                    review = self.kind.as_str(),
                    iterations = self.iterations,
                    "Review budget exhausted without approval, accepting last draft"
                );
                Next::Finished(self.report(ReviewStatus::Exhausted))
            }
            Verdict::Revise(critique) => {
                self.state = LoopState::Drafting;
                info!(review = self.kind.as_str(), iteration = self.iterations, "Review requested revision");
                Next::Revise(critique)
            }
        }
    }

    fn report(&self, status: ReviewStatus) -> ReviewReport {
        ReviewReport {
            kind: self.kind,
            status,
            iterations: self.iterations,
        }
    }
}
