use std::sync::Arc;

use crate::agent::{Progress, RunContext};
use crate::config::Config;
use crate::llm_client::ModelBackend;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Model backend shared by every pipeline run. `LlmClient` in production.
    pub backend: Arc<dyn ModelBackend>,
    pub config: Config,
}

impl AppState {
    /// A fresh context for one pipeline run. Each request gets its own
    /// cancellation token.
    pub fn run_context(&self, progress: Progress) -> RunContext {
        RunContext::new(progress, self.config.call_timeout)
    }
}
