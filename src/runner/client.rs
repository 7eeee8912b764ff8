//! @ai:module:intent LLM provider boundary used by workflows and LLM comparators
//! @ai:module:layer infrastructure
//! @ai:module:public_api LlmClientTrait, HttpLlmClient, MockLlmClient, LlmRequest, LlmResponse, TokenUsage
//! @ai:module:stateless false

use crate::config::{ApiConfig, LlmConfig, Provider};
use crate::runner::rate_limiter::{RateLimiter, RateLimiterTrait};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const OPENAI_BASE_URL: &str = "https://api.openai.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// @ai:intent A single-turn completion request
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub model: String,
    pub system: Option<String>,
    pub prompt: String,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            prompt: prompt.into(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// @ai:intent Token counts reported by the provider for one call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// @ai:intent Response from an LLM provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub usage: TokenUsage,
    pub stop_reason: String,
}

/// @ai:intent Trait for LLM completion clients
///
/// Credentials arrive with every call so one client can serve runs with
/// different keys.
pub trait LlmClientTrait: Send + Sync {
    /// @ai:intent Send a request and return the model's text reply
    fn complete(
        &self,
        request: LlmRequest,
        config: &LlmConfig,
    ) -> impl Future<Output = Result<LlmResponse>> + Send;
}

/// @ai:intent Anthropic Messages API request body
#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<ChatMessage<'a>>,
}

/// @ai:intent OpenAI Chat Completions request body
#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    usage: AnthropicUsage,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: OpenAiUsage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// @ai:intent HTTP client for Anthropic and OpenAI with rate limiting
pub struct HttpLlmClient {
    client: reqwest::Client,
    config: ApiConfig,
    rate_limiter: Arc<RateLimiter>,
}

impl HttpLlmClient {
    /// @ai:intent Create a new HTTP client
    /// @ai:effects pure
    pub fn new(config: ApiConfig) -> Result<Self> {
        let rate_limiter = Arc::new(RateLimiter::new(config.requests_per_minute));
        Self::with_rate_limiter(config, rate_limiter)
    }

    /// @ai:intent Create a client sharing an existing rate limiter
    /// @ai:effects pure
    pub fn with_rate_limiter(config: ApiConfig, rate_limiter: Arc<RateLimiter>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// @ai:intent Resolve the API base URL for a provider
    /// @ai:effects pure
    fn base_url(&self, provider: Provider) -> String {
        let base = match (&self.config.base_url, provider) {
            (Some(url), _) => url.as_str(),
            (None, Provider::Anthropic) => ANTHROPIC_BASE_URL,
            (None, Provider::OpenAi) => OPENAI_BASE_URL,
        };
        base.trim_end_matches('/').to_string()
    }

    /// @ai:intent Call the Anthropic Messages API
    /// @ai:effects network
    async fn complete_anthropic(&self, request: &LlmRequest, config: &LlmConfig) -> Result<LlmResponse> {
        let body = AnthropicRequest {
            model: &request.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: request.system.as_deref(),
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url(Provider::Anthropic)))
            .header("x-api-key", &config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Anthropic API")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API error ({}): {}", status, error_text);
        }

        let api_response: AnthropicResponse = response
            .json()
            .await
            .context("Failed to parse Anthropic API response")?;

        let content = api_response
            .content
            .into_iter()
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join("\n");

        Ok(LlmResponse {
            content,
            usage: TokenUsage {
                input_tokens: api_response.usage.input_tokens,
                output_tokens: api_response.usage.output_tokens,
            },
            stop_reason: api_response.stop_reason.unwrap_or_default(),
        })
    }

    /// @ai:intent Call the OpenAI Chat Completions API
    /// @ai:effects network
    async fn complete_openai(&self, request: &LlmRequest, config: &LlmConfig) -> Result<LlmResponse> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = OpenAiRequest {
            model: &request.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            messages,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url(Provider::OpenAi)))
            .bearer_auth(&config.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to OpenAI API")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error ({}): {}", status, error_text);
        }

        let api_response: OpenAiResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI API response")?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("OpenAI API returned no choices"))?;

        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
            usage: TokenUsage {
                input_tokens: api_response.usage.prompt_tokens,
                output_tokens: api_response.usage.completion_tokens,
            },
            stop_reason: choice.finish_reason.unwrap_or_default(),
        })
    }
}

impl LlmClientTrait for HttpLlmClient {
    /// @ai:intent Route the request to the configured provider
    /// @ai:effects network
    async fn complete(&self, request: LlmRequest, config: &LlmConfig) -> Result<LlmResponse> {
        self.rate_limiter.wait().await;

        match config.provider {
            Provider::Anthropic => self.complete_anthropic(&request, config).await,
            Provider::OpenAi => self.complete_openai(&request, config).await,
        }
    }
}

type Responder = dyn Fn(&LlmRequest) -> Result<String> + Send + Sync;

/// @ai:intent Mock client for tests and dry runs
pub struct MockLlmClient {
    responder: Box<Responder>,
    usage: TokenUsage,
    calls: AtomicUsize,
}

impl MockLlmClient {
    /// @ai:intent Create a mock client that returns a fixed response
    /// @ai:effects pure
    pub fn new(response: impl Into<String>) -> Self {
        let response = response.into();
        Self::from_fn(move |_| Ok(response.clone()))
    }

    /// @ai:intent Create a mock client whose reply is computed from the request
    /// @ai:effects pure
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&LlmRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 200,
            },
            calls: AtomicUsize::new(0),
        }
    }

    /// @ai:intent Create a mock client that fails every call
    /// @ai:effects pure
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::from_fn(move |_| Err(anyhow::anyhow!(message.clone())))
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    /// @ai:intent Number of requests received so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmClientTrait for MockLlmClient {
    async fn complete(&self, request: LlmRequest, _config: &LlmConfig) -> Result<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let content = (self.responder)(&request)?;

        Ok(LlmResponse {
            content,
            usage: self.usage,
            stop_reason: "end_turn".to_string(),
        })
    }
}

/// @ai:intent Extract the outermost JSON object from a reply that may contain extra text
/// @ai:effects pure
pub fn extract_json(response: &str) -> Result<&str> {
    let start = response
        .find('{')
        .ok_or_else(|| anyhow::anyhow!("No JSON object found in response"))?;
    let end = response
        .rfind('}')
        .ok_or_else(|| anyhow::anyhow!("No JSON object end found in response"))?;

    if end <= start {
        anyhow::bail!("Invalid JSON structure in response");
    }

    Ok(&response[start..=end])
}
