//! # toolbridge-client
//!
//! Client library for the LLM side of the bridge.
//!
//! The [`LLMClient`] trait is the seam the orchestrator talks to. The one
//! shipped implementation, [`OpenAIClient`], speaks the OpenAI chat
//! completions wire format, which Gemini also serves through its
//! OpenAI-compatible endpoint.
//!
//! ## Example
//!
//! ```no_run
//! use toolbridge_client::{LLMClient, OpenAIClient};
//! use toolbridge_common::{ChatRequest, Config, ConversationTurn, ModelReply};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::new("gemini", "gemini-2.0-flash").with_api_key("your-api-key");
//! let client = OpenAIClient::new(config)?;
//!
//! let request: ChatRequest = (client.config(), vec![ConversationTurn::user("Hello!")]).into();
//! let response = client.chat(&request).await?;
//! if let ModelReply::Text(text) = response.reply {
//!     println!("Response: {text}");
//! }
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use async_trait::async_trait;

use toolbridge_common::{ChatRequest, ChatResponse, Config};

pub mod error;
pub mod openai;

pub use error::ClientError;
pub use openai::OpenAIClient;

/// Trait for LLM client implementations.
///
/// Implementations must be thread-safe (Send + Sync) so a single client can
/// be shared by reference for the whole session.
#[must_use = "LLMClient must be used to make requests"]
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Get the client's configuration.
    fn config(&self) -> &Config;

    /// Send a chat completion request to the LLM.
    ///
    /// The provider reply is decoded into a [`toolbridge_common::ModelReply`]
    /// before it is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The request fails validation
    /// - Network communication fails
    /// - The API returns an error (authentication, rate limit, etc.)
    /// - The response cannot be parsed
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Check if the client supports tool/function calling.
    fn supports_tools(&self) -> bool;

    /// Validate a configuration object.
    ///
    /// # Errors
    ///
    /// Returns an error if `temperature` is outside 0.0 to 2.0.
    fn validate_config(&self, config: &Config) -> Result<()> {
        if config
            .temperature
            .is_some_and(|t| !(0.0..=2.0).contains(&t))
        {
            return Err(ClientError::InvalidTemperature.into());
        }
        Ok(())
    }

    /// Validate a chat request before sending.
    ///
    /// Checks that at least one turn is provided and that tools are not sent
    /// to a client that cannot use them.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    fn validate_request(&self, request: &ChatRequest) -> Result<()> {
        request
            .validate_has_turns()
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;

        if !self.supports_tools() && request.has_tools() {
            return Err(ClientError::ToolsNotSupported.into());
        }

        Ok(())
    }
}
