//! OpenAI-compatible client implementation.
//!
//! Works against any endpoint that implements the chat completions API. The
//! default base URL is Gemini's OpenAI-compatible endpoint.
//!
//! # Examples
//!
//! ```no_run
//! use toolbridge_client::{LLMClient, OpenAIClient};
//! use toolbridge_common::{ChatRequest, Config, ConversationTurn};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::new("openai", "gpt-4o-mini")
//!     .with_api_key("sk-...")
//!     .with_base_url("https://api.openai.com/v1");
//!
//! let client = OpenAIClient::new(config)?;
//! let request = ChatRequest::new(vec![ConversationTurn::user("Hello!")]);
//! let response = client.chat(&request).await?;
//! println!("Reply: {:?}", response.reply);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! - **Authentication errors (401)**: invalid or missing API keys
//! - **Rate limiting (429)**: retried with backoff, honoring `Retry-After`
//! - **Server errors (5xx)**: retried, then reported as service unavailable
//! - **Invalid responses**: missing choices or malformed tool call arguments

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use reqwest_retry_after::RetryAfterMiddleware;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use toolbridge_common::{ChatRequest, ChatResponse, Config, ModelReply, ToolCall};

use crate::LLMClient;
use crate::error::{ClientError, ErrorResponse};
use crate::openai::{ChatCompletionRequest, ChatCompletionResponse, OpenAIMessage};

/// Base URL used when the configuration does not name one.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Client for `OpenAI`-compatible APIs.
///
/// # Security
///
/// The API key is stored using the `secrecy` crate to prevent accidental
/// exposure through debug logs.
#[derive(Clone)]
pub struct OpenAIClient {
    client: ClientWithMiddleware,
    api_key: Arc<SecretString>,
    base_url: String,
    config: Arc<Config>,
}

// Custom Debug implementation to avoid exposing API key
impl std::fmt::Debug for OpenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIClient")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OpenAIClient {
    /// Create a new client from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing, the base URL does not
    /// parse, or the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ClientError::ConfigurationError("API key is required".to_string()))?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        url::Url::parse(&base_url).map_err(|e| {
            ClientError::ConfigurationError(format!("Invalid base URL '{base_url}': {e}"))
        })?;

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(
                config.retry_config.initial_delay,
                config.retry_config.max_delay,
            )
            .build_with_max_retries(config.retry_config.max_retries);

        // None means no timeout
        let reqwest_client = match config.timeout_seconds {
            Some(timeout) => reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout))
                .build()?,
            None => reqwest::Client::builder().build()?,
        };

        // RetryAfterMiddleware goes first so Retry-After headers win over plain backoff.
        let client = reqwest_middleware::ClientBuilder::new(reqwest_client)
            .with(RetryAfterMiddleware::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            api_key: Arc::new(api_key),
            base_url,
            config: Arc::new(config),
        })
    }

    /// The endpoint base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn make_request<T: for<'de> Deserialize<'de>, B: Serialize + Sync>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let request_body = serde_json::to_string(body)?;
        debug!("POST {url}: {request_body}");

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .body(request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.map_err(|e| {
                warn!("Failed to read error response body: {e}");
                ClientError::NetworkError(e)
            })?;

            // Extract the error message from structured response or use raw text
            let error_message = match serde_json::from_str::<ErrorResponse>(&error_text) {
                Ok(parsed) => parsed.error.message,
                Err(parse_err) => {
                    debug!("Failed to parse error response as JSON: {parse_err}. Using raw text instead.");
                    error_text
                }
            };

            error!(
                "API request failed with status {}: {}",
                status.as_u16(),
                error_message
            );

            return Err(match status.as_u16() {
                401 => ClientError::AuthenticationError(error_message),
                429 => ClientError::RateLimitError { retry_after: None },
                500..=599 => ClientError::ServiceUnavailable(error_message),
                _ => ClientError::RequestError(error_message),
            });
        }

        let response_text = response.text().await?;
        debug!("Raw API response: {response_text}");
        Ok(serde_json::from_str(&response_text)?)
    }

    /// Decode the first choice's message into a [`ModelReply`].
    ///
    /// Tool calls take precedence over text. Only the first tool call is kept.
    fn decode_reply(message: &OpenAIMessage) -> Result<ModelReply, ClientError> {
        if let Some(tool_calls) = message.tool_calls.as_ref()
            && let Some(first) = tool_calls.first()
        {
            if tool_calls.len() > 1 {
                warn!(
                    "Model requested {} tool calls in one reply; only '{}' will be executed",
                    tool_calls.len(),
                    first.function.name
                );
            }

            let arguments = parse_arguments(&first.function.arguments)?;
            let call = ToolCall::new(first.function.name.to_string(), arguments);
            let call = if first.id.is_empty() {
                call
            } else {
                call.with_id(first.id.to_string())
            };
            return Ok(ModelReply::ToolCallRequest(call));
        }

        Ok(ModelReply::Text(message.content.clone().unwrap_or_default()))
    }
}

/// Parse the JSON-string arguments of a tool call into an object.
///
/// An empty string or `null` is an object with no fields.
fn parse_arguments(raw: &str) -> Result<Map<String, Value>, ClientError> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(ClientError::InvalidResponse(format!(
            "tool call arguments must be a JSON object, got {other}"
        ))),
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    fn config(&self) -> &Config {
        &self.config
    }

    fn supports_tools(&self) -> bool {
        true
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.validate_request(request)?;

        let openai_request = ChatCompletionRequest::from((request, self.config.as_ref()));

        let response: ChatCompletionResponse = self
            .make_request("chat/completions", &openai_request)
            .await?;

        let choice = response.choices.first().ok_or_else(|| {
            warn!(
                "Received empty choices array from API. Response ID: {}, Model: {}",
                response.id, response.model
            );
            ClientError::InvalidResponse("API returned no choices in response".to_string())
        })?;

        let reply = Self::decode_reply(&choice.message)?;

        let model = if response.model.is_empty() {
            openai_request.model
        } else {
            response.model
        };

        Ok(ChatResponse {
            reply,
            model,
            usage: response.usage,
            response_id: (!response.id.is_empty()).then_some(response.id),
        })
    }
}
