//! Agent Adapter: wraps one logical actor of a pipeline around a `ModelBackend`.
//!
//! An agent owns a system prompt and, optionally, a forced tool. `Agent::run`
//! streams one call, forwards model reasoning to the progress channel, and
//! returns the collected text plus any tool payload.
//!
//! Hardening on top of the backend:
//! - per-call deadline (`RunContext::call_timeout`) with a single retry;
//! - cancellation via `RunContext::cancel`, checked before each call and
//!   raced against the in-flight stream.

pub mod progress;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::llm_client::{
    strip_json_fences, ChatRequest, LlmError, ModelBackend, StreamChunk, ToolSpec,
};

pub use progress::{Progress, ProgressChunk};

/// Default per-call deadline.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);
/// First attempt plus one retry on timeout.
const CALL_ATTEMPTS: u32 = 2;

/// Failures that abort a pipeline run. Model disagreement is never one of them.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("model call failed: {0}")]
    Transport(#[from] LlmError),

    #[error("pipeline run was cancelled")]
    Cancelled,
}

/// Per-run execution context shared by every agent call of one invocation.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub progress: Progress,
    pub cancel: CancellationToken,
    pub call_timeout: Duration,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(Progress::noop(), DEFAULT_CALL_TIMEOUT)
    }
}

impl RunContext {
    pub fn new(progress: Progress, call_timeout: Duration) -> Self {
        Self {
            progress,
            cancel: CancellationToken::new(),
            call_timeout,
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fails with `Cancelled` once the run's token has fired. Called between stages.
    pub fn checkpoint(&self) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }
}

/// Structured payload returned through a tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub name: String,
    pub input: Value,
}

/// Everything one agent call produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentOutput {
    pub text: String,
    pub tool_output: Option<ToolOutput>,
}

impl AgentOutput {
    /// The raw structured payload: the tool input serialized as JSON when the model
    /// called the tool, otherwise the free text.
    pub fn payload(&self) -> String {
        match &self.tool_output {
            Some(tool) => tool.input.to_string(),
            None => self.text.clone(),
        }
    }

    /// Typed decode of the structured payload. Tool input wins; otherwise the
    /// text is parsed as JSON after stripping code fences.
    pub fn decode<T: DeserializeOwned>(&self) -> Option<T> {
        if let Some(tool) = &self.tool_output {
            match serde_json::from_value(tool.input.clone()) {
                Ok(value) => return Some(value),
                Err(e) => debug!(tool = %tool.name, "tool payload did not match schema: {e}"),
            }
        }
        serde_json::from_str(strip_json_fences(&self.text)).ok()
    }

    /// `decode`, falling back to `fallback` when no payload matches. The fallback
    /// is logged so a missing tool call never goes unnoticed.
    pub fn decode_or<T: DeserializeOwned>(&self, agent: &str, fallback: T) -> T {
        match self.decode() {
            Some(value) => value,
            None => {
                warn!(agent, "no usable structured output, using fallback");
                fallback
            }
        }
    }
}

/// A single-purpose wrapper around one kind of model call.
#[derive(Clone)]
pub struct Agent {
    name: &'static str,
    system: String,
    tool: Option<ToolSpec>,
    backend: Arc<dyn ModelBackend>,
}

impl Agent {
    pub fn new(name: &'static str, system: impl Into<String>, backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            name,
            system: system.into(),
            tool: None,
            backend,
        }
    }

    pub fn with_tool(mut self, tool: ToolSpec) -> Self {
        self.tool = Some(tool);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Runs one model call for `prompt`.
    ///
    /// Transport errors propagate immediately. A call that exceeds the deadline is
    /// abandoned and retried once; a second timeout surfaces as `LlmError::Timeout`.
    pub async fn run(&self, prompt: String, ctx: &RunContext) -> Result<AgentOutput, PipelineError> {
        let request = ChatRequest {
            label: self.name,
            system: self.system.clone(),
            prompt,
            tool: self.tool.clone(),
        };

        for attempt in 1..=CALL_ATTEMPTS {
            ctx.checkpoint()?;
            let call = tokio::time::timeout(ctx.call_timeout, self.collect(&request, &ctx.progress));

            tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => {
                    warn!(agent = self.name, "model call aborted by cancellation");
                    return Err(PipelineError::Cancelled);
                }
                outcome = call => match outcome {
                    Ok(result) => return result.map_err(PipelineError::from),
                    Err(_) => warn!(
                        agent = self.name,
                        attempt,
                        timeout_secs = ctx.call_timeout.as_secs(),
                        "model call timed out"
                    ),
                },
            }
        }

        Err(PipelineError::Transport(LlmError::Timeout {
            secs: ctx.call_timeout.as_secs(),
        }))
    }

    async fn collect(&self, request: &ChatRequest, progress: &Progress) -> Result<AgentOutput, LlmError> {
        let mut stream = self.backend.stream(request).await?;
        let mut output = AgentOutput::default();

        while let Some(chunk) = stream.next().await {
            match chunk? {
                StreamChunk::Text(text) => output.text.push_str(&text),
                StreamChunk::Reasoning(reasoning) => progress.reasoning(reasoning),
                StreamChunk::ToolOutput { name, input } => {
                    output.tool_output = Some(ToolOutput { name, input });
                }
                StreamChunk::Usage {
                    input_tokens,
                    output_tokens,
                } => debug!(
                    agent = self.name,
                    "LLM call usage: input_tokens={}, output_tokens={}", input_tokens, output_tokens
                ),
            }
        }

        Ok(output)
    }
}
