//! OpenAI chat completions wire types.
//!
//! These types mirror the JSON the endpoint expects and returns. Conversation
//! turns are converted into [`OpenAIMessage`]s on the way out; replies are
//! decoded back into a [`toolbridge_common::ModelReply`] by the client.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use toolbridge_common::{ChatRequest, Config, ConversationTurn, Tool, ToolCall, Usage};

pub mod client;
pub use client::OpenAIClient;

/// Role of a message on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAIRole {
    /// Leading instruction message.
    System,
    /// Human input.
    User,
    /// Model output, text or tool calls.
    Assistant,
    /// Tool result answering an assistant tool call.
    Tool,
}

/// A single choice from a chat completion response.
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    /// The index of this choice in the response array.
    #[serde(default)]
    pub index: u32,
    /// The generated message for this choice.
    pub message: OpenAIMessage,
    /// Why generation stopped for this choice.
    ///
    /// Common values: "stop", "length", "tool_calls"
    pub finish_reason: Option<String>,
}

/// OpenAI-compatible message format.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
pub struct OpenAIMessage {
    /// The role of the message author.
    pub role: OpenAIRole,
    /// The text content of the message (absent on tool-call messages).
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool calls requested by the assistant.
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAIToolCall>>,
    /// ID of the tool call this message is responding to (for tool messages).
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl OpenAIMessage {
    /// The leading system message.
    #[must_use]
    pub fn system(instruction: &str) -> Self {
        Self::builder()
            .role(OpenAIRole::System)
            .content(Some(instruction.to_string()))
            .build()
    }
}

impl From<&ConversationTurn> for OpenAIMessage {
    fn from(turn: &ConversationTurn) -> Self {
        match turn {
            ConversationTurn::UserText(text) => Self::builder()
                .role(OpenAIRole::User)
                .content(Some(text.clone()))
                .build(),
            ConversationTurn::ModelText(text) => Self::builder()
                .role(OpenAIRole::Assistant)
                .content(Some(text.clone()))
                .build(),
            ConversationTurn::ToolCall(call) => Self::builder()
                .role(OpenAIRole::Assistant)
                .tool_calls(Some(vec![OpenAIToolCall::from(call)]))
                .build(),
            ConversationTurn::ToolResult { call_id, result } => Self::builder()
                .role(OpenAIRole::Tool)
                .content(Some(result.content()))
                .tool_call_id(Some(call_id.clone()))
                .build(),
        }
    }
}

/// OpenAI-compatible tool call format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIToolCall {
    /// Unique identifier for this tool call.
    #[serde(default)]
    pub id: Cow<'static, str>,
    /// Type of the tool call, typically "function".
    #[serde(rename = "type", default = "default_tool_call_type")]
    pub r#type: Cow<'static, str>,
    /// The function to call with its arguments.
    pub function: OpenAIFunction,
}

impl From<&ToolCall> for OpenAIToolCall {
    fn from(tool_call: &ToolCall) -> Self {
        Self {
            id: Cow::Owned(tool_call.id.clone()),
            r#type: default_tool_call_type(),
            function: OpenAIFunction {
                name: Cow::Owned(tool_call.name.clone()),
                arguments: Cow::Owned(tool_call.arguments_json()),
            },
        }
    }
}

const fn default_tool_call_type() -> Cow<'static, str> {
    Cow::Borrowed("function")
}

/// OpenAI-compatible function call format.
///
/// Arguments travel as a JSON-serialized string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIFunction {
    /// The name of the function to call.
    pub name: Cow<'static, str>,
    /// The arguments as a JSON-serialized string.
    #[serde(default)]
    pub arguments: Cow<'static, str>,
}

/// Request for a chat completion.
#[derive(Debug, Clone, Serialize, TypedBuilder)]
pub struct ChatCompletionRequest {
    /// The model identifier to use.
    pub model: String,
    /// The conversation messages in OpenAI format, system message first.
    pub messages: Vec<OpenAIMessage>,
    /// Maximum tokens to generate.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature 0.0 to 2.0.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Tools available for function calling.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    /// Tool selection strategy.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
    /// Whether the model may request several tools in one reply.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
}

impl From<(&ChatRequest, &Config)> for ChatCompletionRequest {
    fn from((request, config): (&ChatRequest, &Config)) -> Self {
        let mut messages = Vec::with_capacity(request.turns.len() + 1);
        if let Some(instruction) = &request.system_instruction {
            messages.push(OpenAIMessage::system(instruction));
        }
        messages.extend(request.turns.iter().map(OpenAIMessage::from));

        // Providers reject tool_choice and parallel_tool_calls without a tools array.
        let (tools, tool_choice, parallel_tool_calls) = if request.has_tools() {
            (
                Some(request.tools.clone()),
                request.tool_choice.map(serde_json::Value::from),
                Some(false),
            )
        } else {
            (None, None, None)
        };

        Self::builder()
            .model(
                request
                    .model
                    .clone()
                    .unwrap_or_else(|| config.model.clone()),
            )
            .messages(messages)
            .max_tokens(request.max_tokens.or(config.max_tokens))
            .temperature(request.temperature.or(config.temperature))
            .tools(tools)
            .tool_choice(tool_choice)
            .parallel_tool_calls(parallel_tool_calls)
            .build()
    }
}

/// Response from a chat completion request.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    /// Unique identifier for this completion.
    #[serde(default)]
    pub id: String,
    /// Object type, typically "chat.completion".
    #[serde(default)]
    pub object: String,
    /// Unix timestamp of when the completion was created.
    #[serde(default)]
    pub created: u64,
    /// The model that generated this completion.
    #[serde(default)]
    pub model: String,
    /// Generated completions.
    pub choices: Vec<ChatChoice>,
    /// Token usage statistics, if reported.
    pub usage: Option<Usage>,
}
