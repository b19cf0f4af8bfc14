/// LLM Client: the single point of entry for all chat-completion calls.
///
/// ARCHITECTURAL RULE: No other module may talk to an LLM provider directly.
/// Services receive an `Arc<dyn ChatModel>` built by a `ModelFactory`, so the
/// orchestrator and its tests never depend on the HTTP transport.
///
/// Clients speak the OpenAI-compatible `/chat/completions` protocol, which covers
/// OpenAI itself, OpenRouter and most self-hosted endpoints (Ollama, vLLM, LM Studio).
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;
pub mod structured;
#[cfg(test)]
pub mod testing;

/// Model used when the caller's settings do not name one.
pub const DEFAULT_MODEL: &str = "gpt-4o";
/// Base URL used when the caller's settings do not name an endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Sent to keyless custom endpoints. Many local servers reject an empty bearer token.
pub const PLACEHOLDER_API_KEY: &str = "not-needed";

const OPENROUTER_HOST: &str = "openrouter.ai";
const OPENROUTER_REFERER: &str = "https://github.com/refine-api/refine-api";
const OPENROUTER_TITLE: &str = "Resume Refiner";
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication rejected by LLM provider (status {status}): {message}")]
    Authentication { status: u16, message: String },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

/// Per-invocation LLM settings resolved from the caller's stored preferences.
/// Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model_name: Option<String>,
}

/// Ambient provider configuration used when a caller has no endpoint of their own.
#[derive(Debug, Clone)]
pub struct ProviderDefaults {
    pub base_url: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

impl Default for ProviderDefaults {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// The outcome of applying provider quirks to an `LlmConfig`. Pure data, so the
/// rules can be tested without building an HTTP client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub headers: Vec<(&'static str, &'static str)>,
}

impl ClientSettings {
    pub fn resolve(config: &LlmConfig, defaults: &ProviderDefaults) -> Self {
        let model = non_empty(config.model_name.as_deref())
            .unwrap_or(DEFAULT_MODEL)
            .to_string();
        let api_key = non_empty(config.api_key.as_deref()).map(str::to_string);

        match non_empty(config.endpoint.as_deref()) {
            Some(endpoint) => {
                let openrouter = is_openrouter(endpoint);
                let api_key = match api_key {
                    Some(key) => Some(key),
                    // OpenRouter always needs a real key; let the provider reject the call.
                    None if openrouter => None,
                    None => Some(PLACEHOLDER_API_KEY.to_string()),
                };
                let headers = if openrouter {
                    vec![
                        ("HTTP-Referer", OPENROUTER_REFERER),
                        ("X-Title", OPENROUTER_TITLE),
                    ]
                } else {
                    Vec::new()
                };
                Self {
                    base_url: endpoint.trim_end_matches('/').to_string(),
                    api_key,
                    model,
                    headers,
                }
            }
            None => Self {
                base_url: defaults.base_url.trim_end_matches('/').to_string(),
                api_key: api_key.or_else(|| defaults.api_key.clone()),
                model,
                headers: Vec::new(),
            },
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn is_openrouter(endpoint: &str) -> bool {
    endpoint.to_ascii_lowercase().contains(OPENROUTER_HOST)
}

/// A chat model that turns a system + user prompt into raw completion text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError>;
}

/// Builds configured chat models. Construction never touches the network;
/// failures surface on the first call.
pub trait ModelFactory: Send + Sync {
    fn build(&self, config: &LlmConfig, temperature: f32) -> Result<Arc<dyn ChatModel>, LlmError>;
}

/// Default factory producing HTTP-backed `LlmClient`s.
#[derive(Debug, Clone, Default)]
pub struct HttpModelFactory {
    defaults: ProviderDefaults,
}

impl HttpModelFactory {
    pub fn new(defaults: ProviderDefaults) -> Self {
        Self { defaults }
    }
}

impl ModelFactory for HttpModelFactory {
    fn build(&self, config: &LlmConfig, temperature: f32) -> Result<Arc<dyn ChatModel>, LlmError> {
        let settings = ClientSettings::resolve(config, &self.defaults);
        let client = LlmClient::new(settings, temperature, self.defaults.request_timeout)?;
        Ok(Arc::new(client))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatResponse {
    /// Extracts the text content of the first choice.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

/// HTTP chat-completion client for a single resolved endpoint/model pair.
/// Retries on 429 (rate limit) and 5xx errors; authentication failures are returned immediately.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    settings: ClientSettings,
    temperature: f32,
}

impl LlmClient {
    pub fn new(
        settings: ClientSettings,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::new();
        for &(name, value) in &settings.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| LlmError::Config(format!("invalid header name {name}: {e}")))?;
            headers.insert(name, HeaderValue::from_static(value));
        }

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            settings,
            temperature,
        })
    }

    /// Makes a raw chat-completion call, returning the full response object.
    pub async fn call(&self, prompt: &str, system: &str) -> Result<ChatResponse, LlmError> {
        let url = format!("{}/chat/completions", self.settings.base_url);
        let request_body = ChatRequest {
            model: &self.settings.model,
            temperature: self.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(&url).json(&request_body);
            if let Some(key) = &self.settings.api_key {
                request = request.bearer_auth(key);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::Authentication {
                    status: status.as_u16(),
                    message: provider_message(body),
                });
            }

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(retryable_failure(status, body));
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message: provider_message(body),
                });
            }

            let chat_response: ChatResponse = response.json().await?;

            if let Some(usage) = &chat_response.usage {
                debug!(
                    "LLM call succeeded: model={}, prompt_tokens={}, completion_tokens={}",
                    self.settings.model, usage.prompt_tokens, usage.completion_tokens
                );
            }

            return Ok(chat_response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let response = self.call(prompt, system).await?;
        response
            .text()
            .map(str::to_string)
            .ok_or(LlmError::EmptyContent)
    }
}

/// The error reported if a retryable status is also the final attempt's.
fn retryable_failure(status: StatusCode, body: String) -> LlmError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        LlmError::RateLimited {
            retries: MAX_RETRIES,
        }
    } else {
        LlmError::Api {
            status: status.as_u16(),
            message: provider_message(body),
        }
    }
}

fn provider_message(body: String) -> String {
    serde_json::from_str::<ProviderError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
