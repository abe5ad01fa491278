//! Experience tailoring: Analyze → Rewrite → Enrich → Verify.

pub mod decode;
pub mod enrichment;
pub mod handlers;
pub mod pipeline;
pub mod prompts;
pub mod review;
pub mod state;

pub use pipeline::{tailor_experience, TailorRequest, TailoredExperience};
