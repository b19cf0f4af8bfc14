use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::{ProviderDefaults, DEFAULT_BASE_URL};
use crate::refinement::orchestrator::DEFAULT_MAX_CONCURRENCY;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Fernet key protecting stored user API keys.
    pub encryption_key: String,
    pub port: u16,
    pub rust_log: String,
    pub openai_base_url: String,
    pub openai_api_key: Option<String>,
    pub refine_max_concurrency: usize,
    pub sse_poll_interval: Duration,
    pub llm_request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            encryption_key: require_env("ENCRYPTION_KEY")?,
            port: parse_env("PORT", 8080u16)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            openai_base_url: optional_env("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            openai_api_key: optional_env("OPENAI_API_KEY"),
            refine_max_concurrency: parse_env("REFINE_MAX_CONCURRENCY", DEFAULT_MAX_CONCURRENCY)?,
            sse_poll_interval: Duration::from_millis(parse_env("SSE_POLL_INTERVAL_MS", 1000u64)?),
            llm_request_timeout: Duration::from_secs(parse_env("LLM_REQUEST_TIMEOUT_SECS", 120u64)?),
        })
    }

    /// Provider settings applied when a user has no endpoint of their own.
    pub fn provider_defaults(&self) -> ProviderDefaults {
        ProviderDefaults {
            base_url: self.openai_base_url.clone(),
            api_key: self.openai_api_key.clone(),
            request_timeout: self.llm_request_timeout,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid {}", std::any::type_name::<T>())),
        None => Ok(default),
    }
}
