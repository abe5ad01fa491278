use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::{LlmConfig, Provider, DEFAULT_MODEL};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    /// Deadline for a single model call; a timed-out call is retried once.
    pub call_timeout: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let provider = match std::env::var("LLM_PROVIDER") {
            Ok(value) => value.parse::<Provider>().map_err(anyhow::Error::msg)?,
            Err(_) => Provider::default(),
        };

        Ok(Config {
            llm: LlmConfig {
                endpoint: std::env::var("LLM_ENDPOINT")
                    .unwrap_or_else(|_| provider.default_endpoint().to_string()),
                api_key: require_env("LLM_API_KEY")?,
                model: std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
                provider,
            },
            call_timeout: Duration::from_secs(
                std::env::var("LLM_CALL_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "120".to_string())
                    .parse::<u64>()
                    .context("LLM_CALL_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
