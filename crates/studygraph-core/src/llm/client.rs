//! HTTP implementation of [`GenerativeService`]
//!
//! Talks to any OpenAI-compatible chat completions endpoint. Each prompt
//! walks the configured model list in order; a model is abandoned for the
//! next one only on rate limiting or model unavailability, after its own
//! 429 retries are used up.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode, header::RETRY_AFTER};
use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::service::{GenerativeService, ResponseFormat};
use super::types::{ChatRequest, ChatResponse, Completion, Message};

const ASSISTANT_ROLE: &str = "You are a careful assistant for exam and study material.";

const JSON_ONLY: &str = "Return valid JSON only, with no additional text or explanation.";

/// Retry schedule for HTTP 429
#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Exponential delay for `attempt` (1-based), never shorter than the
    /// server's hint, plus up to 10% jitter
    fn delay(&self, attempt: u32, retry_after_secs: u64) -> Duration {
        let exponential = self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1));
        let delay = exponential.max(Duration::from_secs(retry_after_secs));
        let spread = (delay.as_millis() as u64 / 10).max(1);
        delay + Duration::from_millis(clock_jitter() % spread)
    }
}

fn clock_jitter() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()))
        .unwrap_or(0)
}

/// Chat completions client with model fallback
#[derive(Clone)]
pub struct LlmClient {
    http: HttpClient,
    endpoint: String,
    api_key: String,
    config: LlmConfig,
    retry: RetryPolicy,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("endpoint", &self.endpoint)
            .field("models", &self.models())
            .finish()
    }
}

impl LlmClient {
    pub fn new(config: LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::ConfigError("API key is empty".to_string()));
        }

        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            http,
            endpoint: chat_endpoint(&config.base_url),
            api_key,
            config,
            retry: RetryPolicy::default(),
        })
    }

    /// Build from configuration with the key taken from the environment
    pub fn from_config(config: LlmConfig) -> Result<Self> {
        let api_key = config
            .resolved_api_key()
            .map_err(|e| Error::ConfigError(e.to_string()))?
            .ok_or_else(|| {
                Error::ConfigError(
                    "No API key found. Set STUDYGRAPH_API_KEY or OPENROUTER_API_KEY".to_string(),
                )
            })?;
        Self::new(config, api_key)
    }

    /// Point the client at another OpenAI-compatible server
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.endpoint = chat_endpoint(base_url);
        self
    }

    /// Default model followed by fallbacks, without repeats
    pub fn models(&self) -> Vec<&str> {
        let mut models: Vec<&str> = Vec::with_capacity(1 + self.config.fallback_models.len());
        for model in std::iter::once(&self.config.default_model).chain(&self.config.fallback_models) {
            let model = model.trim();
            if !model.is_empty() && !models.contains(&model) {
                models.push(model);
            }
        }
        models
    }

    /// Send `messages` to each model in turn until one answers
    pub async fn complete(&self, messages: &[Message], format: ResponseFormat) -> Result<Completion> {
        let mut last_error = None;

        for model in self.models() {
            let request = ChatRequest::new(
                model,
                messages,
                self.config.temperature,
                self.config.max_tokens,
                format,
            );

            match self.send_with_retry(&request).await {
                Ok(completion) => {
                    info!(
                        model = %completion.model,
                        tokens = completion.total_tokens,
                        "Completion received"
                    );
                    if completion.truncated {
                        warn!(model = %model, "Completion hit max_tokens and may be cut off");
                    }
                    return Ok(completion);
                }
                Err(e) if should_try_next_model(&e) => {
                    warn!(model = %model, error = %e, "Model unavailable, trying next");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::NoSuitableModel("no models configured".to_string())))
    }

    async fn send_with_retry(&self, request: &ChatRequest<'_>) -> Result<Completion> {
        let mut attempt = 1;
        loop {
            match self.send(request).await {
                Err(Error::RateLimited(retry_after)) if attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay(attempt, retry_after);
                    warn!(
                        model = %request.model,
                        attempt = attempt,
                        wait_ms = delay.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<Completion> {
        debug!(model = %request.model, messages = request.messages.len(), "POST chat completion");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("X-Title", "Studygraph")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let header_hint = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body, header_hint));
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| Error::LLMError(format!("unreadable completion body: {}", e)))?
            .into_completion()
            .ok_or_else(|| Error::LLMError("completion had no choices".to_string()))
    }
}

#[async_trait]
impl GenerativeService for LlmClient {
    async fn generate(&self, prompt: &str, format: ResponseFormat) -> Result<String> {
        let system = match format {
            ResponseFormat::Json => format!("{} {}", ASSISTANT_ROLE, JSON_ONLY),
            ResponseFormat::Text => ASSISTANT_ROLE.to_string(),
        };
        let messages = [Message::system(system), Message::user(prompt)];

        Ok(self.complete(&messages, format).await?.content)
    }
}

fn chat_endpoint(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim().trim_end_matches('/'))
}

/// Map a non-2xx response to an error
fn status_error(status: StatusCode, body: &str, retry_after: Option<u64>) -> Error {
    match status.as_u16() {
        429 => Error::RateLimited(retry_after.or_else(|| retry_after_from_body(body)).unwrap_or(60)),
        401 => Error::LLMError(
            "unauthorized; check STUDYGRAPH_API_KEY or OPENROUTER_API_KEY".to_string(),
        ),
        402 => Error::LLMError("payment required; the provider account is out of credits".to_string()),
        404 => Error::LLMError(format!("model not found: {}", body)),
        503 => Error::LLMError(format!("model is unavailable: {}", body)),
        _ => Error::LLMError(format!("HTTP {}: {}", status, body)),
    }
}

fn retry_after_from_body(body: &str) -> Option<u64> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("retry_after")
        .or_else(|| value.get("error").and_then(|e| e.get("retry_after")))
        .and_then(serde_json::Value::as_u64)
}

/// Rate limits and per-model outages are worth another model
fn should_try_next_model(error: &Error) -> bool {
    match error {
        Error::RateLimited(_) => true,
        Error::LLMError(msg) => {
            let msg = msg.to_lowercase();
            [
                "model not found",
                "model is unavailable",
                "no available provider",
                "overloaded",
                "context length",
            ]
            .iter()
            .any(|p| msg.contains(p))
        }
        _ => false,
    }
}
