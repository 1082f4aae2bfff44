use crate::traits::LanguageModel;
use crate::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ChatClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "deepseek/deepseek-r1:free".to_string(),
            api_key: None,
            temperature: 0.3,
            timeout: Duration::from_secs(35),
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl ChatClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = std::env::var("LEXI_LLM_BASE_URL").unwrap_or(defaults.base_url);
        let model = std::env::var("LEXI_LLM_MODEL").unwrap_or(defaults.model);
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        let timeout = std::env::var("LEXI_LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);
        let max_retries = std::env::var("LEXI_LLM_MAX_RETRIES")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(defaults.max_retries);

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
            timeout,
            max_retries,
            ..defaults
        }
    }

    /// Caps the per-request timeout so that every attempt, plus the backoff
    /// sleeps between them, fits inside `budget`.
    pub fn fit_within(mut self, budget: Duration) -> Self {
        let attempts = self.max_retries.saturating_add(1);
        let backoff: Duration = (0..self.max_retries)
            .map(|attempt| backoff_delay(self.initial_backoff, self.max_backoff, attempt))
            .sum();
        let per_attempt = budget.saturating_sub(backoff) / attempts;
        if !per_attempt.is_zero() {
            self.timeout = self.timeout.min(per_attempt);
        }
        self
    }

    /// Worst-case wall time of `complete` when every attempt times out.
    pub fn worst_case(&self) -> Duration {
        let backoff: Duration = (0..self.max_retries)
            .map(|attempt| backoff_delay(self.initial_backoff, self.max_backoff, attempt))
            .sum();
        self.timeout * self.max_retries.saturating_add(1) + backoff
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completions client (OpenRouter by default).
pub struct ChatCompletionClient {
    config: ChatClientConfig,
    endpoint: String,
    http: Client,
}

impl ChatCompletionClient {
    pub fn new(config: ChatClientConfig) -> Result<Self, SearchError> {
        url::Url::parse(&config.base_url)?;
        let http = Client::builder().user_agent("lexi").build()?;
        Ok(Self {
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            config,
            http,
        })
    }

    pub fn config(&self) -> &ChatClientConfig {
        &self.config
    }

    async fn complete_once(&self, prompt: &str) -> Result<String, SearchError> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .timeout(self.config.timeout)
            .json(&ChatRequest {
                model: &self.config.model,
                temperature: self.config.temperature,
                messages: [ChatMessage {
                    role: "user",
                    content: prompt,
                }],
            });
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "llm".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| SearchError::BackendResponse {
                backend: "llm".to_string(),
                details: "completion carried no message content".to_string(),
            })
    }
}

pub fn backoff_delay(initial: Duration, max: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.min(16));
    initial.saturating_mul(factor).min(max)
}

#[async_trait]
impl LanguageModel for ChatCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, SearchError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.complete_once(prompt).await {
                Ok(answer) => return Ok(answer),
                Err(error) => {
                    if attempt > self.config.max_retries || !error.is_transient() {
                        return Err(error);
                    }
                    let delay = backoff_delay(
                        self.config.initial_backoff,
                        self.config.max_backoff,
                        attempt - 1,
                    );
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "llm request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
