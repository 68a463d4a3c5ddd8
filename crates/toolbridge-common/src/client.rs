use std::fmt;
use std::ops::AddAssign;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::chat::ConversationTurn;
use crate::tools::{Tool, ToolCall};

/// Controls how the model selects which tool to call, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum ToolChoice {
    /// Let the model decide whether to call a tool.
    Auto,
    /// Disable tool calling for this request; the model must answer in text.
    None,
    /// Require the model to call a tool.
    Required,
}

impl fmt::Display for ToolChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::None => write!(f, "none"),
            Self::Required => write!(f, "required"),
        }
    }
}

impl From<ToolChoice> for serde_json::Value {
    fn from(tool_choice: ToolChoice) -> Self {
        Self::String(tool_choice.to_string())
    }
}

/// Configuration for exponential backoff retry behavior on model requests.
///
/// Tool calls against the target API are never retried; this only governs
/// transient failures talking to the LLM endpoint.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use toolbridge_common::RetryConfig;
///
/// let config = RetryConfig {
///     max_retries: 5,
///     initial_delay: Duration::from_millis(500),
///     max_delay: Duration::from_secs(60),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts before failing.
    pub max_retries: u32,
    /// Initial delay before the first retry attempt.
    pub initial_delay: Duration,
    /// Maximum delay between retry attempts (caps exponential growth).
    pub max_delay: Duration,
}

impl RetryConfig {
    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Token usage statistics for a completion request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    /// Number of tokens in the input prompt.
    #[serde(alias = "input_tokens")]
    pub prompt_tokens: u32,
    /// Number of tokens generated in the completion.
    #[serde(alias = "output_tokens")]
    pub completion_tokens: u32,
    /// Total tokens used (prompt + completion).
    pub total_tokens: u32,
}

impl AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self
            .completion_tokens
            .saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// A request for a chat completion from an LLM.
///
/// Carries the system instruction, the full ordered turn history and the tool
/// declarations. Provider clients translate this into their wire format.
///
/// # Examples
///
/// ```
/// use toolbridge_common::{ChatRequest, ConversationTurn, ToolChoice};
///
/// let request = ChatRequest::new(vec![ConversationTurn::user("Hello!")])
///     .with_model("gemini-2.0-flash")
///     .with_system_instruction("You are a helpful assistant.")
///     .with_temperature(0.7)
///     .with_tool_choice(ToolChoice::Auto);
/// assert!(!request.has_tools());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Instruction sent ahead of the history.
    pub system_instruction: Option<String>,
    /// The conversation turns to send to the model, in replay order.
    pub turns: Arc<[ConversationTurn]>,
    /// The model identifier to use for generation.
    pub model: Option<String>,
    /// Sampling temperature controlling randomness (0.0 to 2.0).
    pub temperature: Option<f32>,
    /// Maximum number of tokens to generate in the response.
    pub max_tokens: Option<u32>,
    /// Tools available for the model to call.
    pub tools: Vec<Tool>,
    /// Strategy for tool selection.
    pub tool_choice: Option<ToolChoice>,
}

impl fmt::Display for ChatRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => write!(f, "{json}"),
            Err(_) => write!(f, "Error serializing ChatRequest to JSON"),
        }
    }
}

impl ChatRequest {
    /// Creates a new chat request over the given turns.
    ///
    /// All optional parameters are unset.
    pub fn new(turns: impl Into<Arc<[ConversationTurn]>>) -> Self {
        Self {
            system_instruction: None,
            turns: turns.into(),
            model: None,
            temperature: None,
            max_tokens: None,
            tools: Vec::new(),
            tool_choice: None,
        }
    }

    /// Sets the model to use for this request.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the system instruction.
    #[must_use]
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the maximum number of tokens to generate.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the tools available for the model to call.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    /// Sets the tool selection strategy.
    #[must_use]
    pub const fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = Some(tool_choice);
        self
    }

    /// Validate that this request has at least one turn.
    ///
    /// # Errors
    ///
    /// Returns an error if the turn history is empty.
    pub fn validate_has_turns(&self) -> anyhow::Result<()> {
        if self.turns.is_empty() {
            anyhow::bail!("Chat request must have at least one turn");
        }
        Ok(())
    }

    /// Returns whether this request declares any tools.
    #[must_use]
    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }
}

impl From<(&Config, Vec<ConversationTurn>)> for ChatRequest {
    fn from((config, turns): (&Config, Vec<ConversationTurn>)) -> Self {
        Self {
            model: Some(config.model.clone()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            ..Self::new(turns)
        }
    }
}

/// The decoded shape of a model reply.
///
/// Provider responses are decoded into this at the client boundary so the
/// orchestrator branches on a variant, not on which fields happen to be set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ModelReply {
    /// A plain-text answer for the user.
    Text(String),
    /// A request to run a tool and resubmit with its result.
    ToolCallRequest(ToolCall),
}

/// A response from a chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The decoded reply.
    pub reply: ModelReply,
    /// The identifier of the model that generated this response.
    pub model: String,
    /// Token usage statistics for this request.
    pub usage: Option<Usage>,
    /// Unique identifier for this response from the provider.
    pub response_id: Option<String>,
}

impl fmt::Display for ChatResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => write!(f, "{json}"),
            Err(_) => write!(f, "Error serializing ChatResponse to JSON"),
        }
    }
}

/// Configuration for an LLM client.
///
/// Holds connection details and default generation parameters.
///
/// # Security
///
/// The `api_key` field uses `SecretString` so it is never printed by `Debug`
/// and never serialized.
///
/// # Examples
///
/// ```
/// use toolbridge_common::Config;
///
/// let config = Config::new("gemini", "gemini-2.0-flash")
///     .with_api_key("secret")
///     .with_temperature(0.7);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The LLM provider name (e.g., "gemini", "openai").
    pub provider: String,
    /// The default model identifier to use.
    pub model: String,
    /// Optional custom base URL for API requests.
    pub base_url: Option<String>,
    /// API key for authentication (stored securely, never serialized).
    #[serde(skip_serializing, default)]
    pub api_key: Option<SecretString>,
    /// Request timeout in seconds.
    pub timeout_seconds: Option<u64>,
    /// Retry behavior for transient failures.
    #[serde(skip)]
    pub retry_config: RetryConfig,
    /// Default sampling temperature (0.0 to 2.0).
    pub temperature: Option<f32>,
    /// Default maximum tokens to generate.
    pub max_tokens: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.0-flash".to_string(),
            base_url: None,
            api_key: None,
            timeout_seconds: None,
            retry_config: RetryConfig::default(),
            temperature: None,
            max_tokens: None,
        }
    }
}

impl Config {
    /// Creates a new configuration with the specified provider and model.
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    /// Sets a custom base URL for API requests.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the API key for authentication.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(api_key.into().into()));
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    /// Sets the default sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the default maximum tokens to generate.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the retry configuration.
    #[must_use]
    pub const fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Validates the configuration parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is empty or `temperature` is outside 0.0 to 2.0.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.model.trim().is_empty() {
            anyhow::bail!("Model name must not be empty");
        }

        if let Some(temp) = self.temperature
            && !(0.0..=2.0).contains(&temp)
        {
            anyhow::bail!("Temperature must be between 0.0 and 2.0, got {temp}");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn test_chat_request_from_config() {
        let config = Config::new("gemini", "gemini-2.0-flash")
            .with_temperature(0.7)
            .with_max_tokens(256);
        let request: ChatRequest = (&config, vec![ConversationTurn::user("hi")]).into();

        assert_eq!(request.model.as_deref(), Some("gemini-2.0-flash"));
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.max_tokens, Some(256));
        assert_eq!(request.turns.len(), 1);
        assert!(request.tool_choice.is_none());
    }

    #[test]
    fn test_chat_request_validates_empty_turns() {
        let request = ChatRequest::new(Vec::new());
        assert!(request.validate_has_turns().is_err());

        let request = ChatRequest::new(vec![ConversationTurn::user("hi")]);
        assert!(request.validate_has_turns().is_ok());
    }

    #[test]
    fn test_tool_choice_to_value() {
        assert_eq!(serde_json::Value::from(ToolChoice::Auto), "auto");
        assert_eq!(serde_json::Value::from(ToolChoice::None), "none");
        assert_eq!(serde_json::Value::from(ToolChoice::Required), "required");
    }

    #[test]
    fn test_usage_accumulates() {
        let mut total = Usage::default();
        total += Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        };
        total += Usage {
            prompt_tokens: 1,
            completion_tokens: 2,
            total_tokens: 3,
        };
        assert_eq!(total.prompt_tokens, 11);
        assert_eq!(total.completion_tokens, 7);
        assert_eq!(total.total_tokens, 18);
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::default().validate().is_ok());
        assert!(Config::new("gemini", " ").validate().is_err());
        assert!(
            Config::default()
                .with_temperature(2.5)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_config_never_serializes_api_key() {
        let config = Config::default().with_api_key("super-secret");
        let json = serde_json::to_string(&config).expect("Failed to serialize");
        assert!(!json.contains("super-secret"));
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
