//! # toolbridge-common
//!
//! Shared data model for bridging an HTTP API to an LLM chat session.
//!
//! This crate provides the types every other toolbridge crate speaks:
//! - Tool declarations handed to the model and the calls it makes back
//! - The ordered, append-only conversation history
//! - Provider-neutral chat request/response types and client configuration
//!
//! ## Example
//!
//! ```
//! use toolbridge_common::{ConversationState, ConversationTurn, Function, Parameters, Property, Tool};
//! use std::collections::BTreeMap;
//!
//! let mut properties = BTreeMap::new();
//! properties.insert("a".to_string(), Property::number("First factor"));
//! properties.insert("b".to_string(), Property::number("Second factor"));
//!
//! let tool = Tool::builder()
//!     .function(Function {
//!         name: "multiply".to_string(),
//!         description: "Multiply two numbers".to_string(),
//!         parameters: Parameters::new(properties, vec!["a".into(), "b".into()]),
//!     })
//!     .build();
//! assert_eq!(tool.name(), "multiply");
//!
//! let mut conversation = ConversationState::new();
//! conversation.append(ConversationTurn::user("What is 3 times 4?"));
//! assert_eq!(conversation.len(), 1);
//! ```

/// Conversation history types.
///
/// Provides the turn variants and the append-only history that is replayed to
/// the model on every request.
pub mod chat;
/// Client configuration and request/response types.
///
/// Contains the provider-neutral request the orchestrator builds and the
/// decoded reply shape it branches on.
pub mod client;
/// Tool declaration, call and invocation result types.
pub mod tools;

pub use chat::{ConversationState, ConversationTurn, TurnRole};
pub use client::{ChatRequest, ChatResponse, Config, ModelReply, RetryConfig, ToolChoice, Usage};
pub use tools::{
    Function, Parameters, Property, Tool, ToolCall, ToolInvocationResult, ToolOutcome,
};
