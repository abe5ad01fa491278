/// LLM Client: the single point of entry for all model API calls in the tailoring service.
///
/// ARCHITECTURAL RULE: No other module may call a model endpoint directly.
/// Agents (`crate::agent`) talk to a `ModelBackend`; `LlmClient` is the production backend.
///
/// Every call is streamed. The wire format depends on the configured `Provider`;
/// `stream::StreamDecoder` turns either provider's SSE events into `StreamChunk`s.
use std::fmt;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;
pub mod stream;
#[cfg(test)]
pub mod testing;

use stream::StreamDecoder;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Model used when `LLM_MODEL` is not set.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 4096;
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Model call timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// Which wire protocol the configured endpoint speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Anthropic,
    /// Any Chat Completions-compatible endpoint.
    OpenAi,
}

impl Provider {
    pub fn default_endpoint(self) -> &'static str {
        match self {
            Provider::Anthropic => ANTHROPIC_API_URL,
            Provider::OpenAi => OPENAI_API_URL,
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "openai" | "open_ai" | "openai-compatible" => Ok(Provider::OpenAi),
            other => Err(format!(
                "unknown LLM provider '{other}' (expected 'anthropic' or 'openai')"
            )),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Anthropic => f.write_str("anthropic"),
            Provider::OpenAi => f.write_str("openai"),
        }
    }
}

/// Connection settings for the model endpoint. Opaque to the pipelines.
#[derive(Clone)]
pub struct LlmConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub provider: Provider,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("provider", &self.provider)
            .finish()
    }
}

/// A structured-output tool the model is forced to call.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON Schema of the tool input.
    pub input_schema: Value,
}

/// One model call: a system prompt, a single user prompt and an optional forced tool.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Agent name, used for logging and by test backends.
    pub label: &'static str,
    pub system: String,
    pub prompt: String,
    pub tool: Option<ToolSpec>,
}

/// Incremental output of a streamed model call.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    Text(String),
    Reasoning(String),
    /// Terminal structured payload of a tool call.
    ToolOutput {
        name: String,
        input: Value,
    },
    Usage {
        input_tokens: u32,
        output_tokens: u32,
    },
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, LlmError>> + Send>>;

/// A model endpoint that can stream one call. Implemented by `LlmClient` and by
/// the scripted test backend.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, LlmError>;
}

/// The production model client. Wraps the provider HTTP API with retry logic
/// on connection-level failures.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        // No overall request timeout: streams may legitimately run long.
        // The agent layer enforces a per-call deadline.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn provider(&self) -> Provider {
        self.config.provider
    }

    /// Builds the provider-specific streaming request body.
    fn request_body(&self, request: &ChatRequest) -> Value {
        match self.config.provider {
            Provider::Anthropic => {
                let mut body = json!({
                    "model": self.config.model,
                    "max_tokens": MAX_TOKENS,
                    "system": request.system,
                    "stream": true,
                    "messages": [{"role": "user", "content": request.prompt}],
                });
                if let Some(tool) = &request.tool {
                    body["tools"] = json!([{
                        "name": tool.name,
                        "description": tool.description,
                        "input_schema": tool.input_schema,
                    }]);
                    body["tool_choice"] = json!({"type": "tool", "name": tool.name});
                }
                body
            }
            Provider::OpenAi => {
                let mut body = json!({
                    "model": self.config.model,
                    "max_tokens": MAX_TOKENS,
                    "stream": true,
                    "stream_options": {"include_usage": true},
                    "messages": [
                        {"role": "system", "content": request.system},
                        {"role": "user", "content": request.prompt},
                    ],
                });
                if let Some(tool) = &request.tool {
                    body["tools"] = json!([{
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.input_schema,
                        },
                    }]);
                    body["tool_choice"] = json!({
                        "type": "function",
                        "function": {"name": tool.name},
                    });
                }
                body
            }
        }
    }

    /// Opens the streaming response.
    /// Retries on 429 (rate limit), 5xx and connection errors with exponential backoff.
    async fn open(&self, request: &ChatRequest) -> Result<reqwest::Response, LlmError> {
        let body = self.request_body(request);
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    agent = request.label,
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let builder = self
                .client
                .post(&self.config.endpoint)
                .header("content-type", "application/json")
                .header("accept", "text/event-stream");
            let builder = match self.config.provider {
                Provider::Anthropic => builder
                    .header("x-api-key", &self.config.api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION),
                Provider::OpenAi => builder.bearer_auth(&self.config.api_key),
            };

            let response = match builder.json(&body).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!(agent = request.label, "LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message: api_error_message(&body),
                });
            }

            debug!(
                agent = request.label,
                provider = %self.config.provider,
                model = %self.config.model,
                "LLM stream opened"
            );
            return Ok(response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl ModelBackend for LlmClient {
    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, LlmError> {
        let response = self.open(request).await?;
        let decoder = StreamDecoder::new(self.config.provider);
        Ok(Box::pin(decode_response(response, decoder, request.label)))
    }
}

/// Feeds the SSE events of `response` through `decoder`.
fn decode_response(
    response: reqwest::Response,
    mut decoder: StreamDecoder,
    label: &'static str,
) -> impl Stream<Item = Result<StreamChunk, LlmError>> + Send {
    async_stream::try_stream! {
        let mut events = Box::pin(response.bytes_stream().eventsource());
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| LlmError::Stream(e.to_string()))?;
            for chunk in decoder.feed(&event.event, &event.data)? {
                yield chunk;
            }
            if decoder.is_finished() {
                break;
            }
        }
        for chunk in decoder.finish() {
            yield chunk;
        }
        debug!(agent = label, "LLM stream finished");
    }
}

/// Pulls the human-readable message out of a provider error body.
/// Both providers use `{"error": {"message": ...}}`.
fn api_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorEnvelope {
        error: ErrorBody,
    }
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (json, JSON, ...) up to the end of the first line.
    let rest = match rest.find('\n') {
        Some(newline) if rest[..newline].chars().all(|c| c.is_ascii_alphanumeric()) => {
            &rest[newline + 1..]
        }
        _ => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}
