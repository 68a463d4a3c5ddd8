//! Conversation history for LLM interactions.
//!
//! A conversation is an ordered sequence of [`ConversationTurn`]s. Insertion
//! order is the replay order: the full history is sent to the model on every
//! request, so turns are only ever appended, never edited or removed.
//!
//! # Turn kinds
//!
//! - **UserText**: a line typed by the user
//! - **ModelText**: a plain-text reply from the model
//! - **ToolCall**: the model asking for a tool to be run
//! - **ToolResult**: what running that tool produced (success or failure)
//!
//! # Example
//!
//! ```
//! use serde_json::{Map, json};
//! use toolbridge_common::{ConversationState, ConversationTurn, ToolCall, ToolInvocationResult};
//!
//! let mut conversation = ConversationState::new();
//! conversation.append(ConversationTurn::user("What is 3 times 4?"));
//!
//! let call = ToolCall::new("multiply", Map::new()).with_id("call_1");
//! conversation.append(ConversationTurn::ToolCall(call));
//! conversation.append(ConversationTurn::tool_result(
//!     "call_1",
//!     ToolInvocationResult::success("multiply", json!({"result": 12})),
//! ));
//! conversation.append(ConversationTurn::model("3 times 4 is 12."));
//!
//! assert_eq!(conversation.len(), 4);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tools::{ToolCall, ToolInvocationResult};

/// Who produced a turn.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The human at the prompt.
    User,
    /// The LLM.
    Model,
    /// The host, reporting a tool result.
    Tool,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Model => write!(f, "model"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// One atomic unit of conversation history.
///
/// Turns are immutable once created; [`ConversationState`] owns them.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ConversationTurn {
    /// Text entered by the user.
    UserText(String),
    /// Plain-text reply from the model.
    ModelText(String),
    /// A tool call requested by the model.
    ToolCall(ToolCall),
    /// The result of executing a tool call.
    ToolResult {
        /// ID of the [`ToolCall`] this result answers.
        call_id: String,
        /// Payload or error from the invocation.
        result: ToolInvocationResult,
    },
}

impl ConversationTurn {
    /// Creates a user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self::UserText(text.into())
    }

    /// Creates a model text turn.
    pub fn model(text: impl Into<String>) -> Self {
        Self::ModelText(text.into())
    }

    /// Creates a tool result turn answering `call_id`.
    pub fn tool_result(call_id: impl Into<String>, result: ToolInvocationResult) -> Self {
        Self::ToolResult {
            call_id: call_id.into(),
            result,
        }
    }

    /// The role that produced this turn.
    #[must_use]
    pub const fn role(&self) -> TurnRole {
        match self {
            Self::UserText(_) => TurnRole::User,
            Self::ModelText(_) | Self::ToolCall(_) => TurnRole::Model,
            Self::ToolResult { .. } => TurnRole::Tool,
        }
    }
}

/// Ordered, append-only history of a single chat session.
///
/// Created empty at session start and discarded at session end; nothing is
/// persisted. [`append`](Self::append) is the only mutator.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConversationState {
    /// Identifier used to correlate log lines for this session.
    pub id: Uuid,
    turns: Vec<ConversationTurn>,
}

impl ConversationState {
    /// Creates an empty conversation with a generated ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            turns: Vec::new(),
        }
    }

    /// Appends a turn to the end of the history.
    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// Appends several turns, preserving their order.
    pub fn append_all(&mut self, turns: impl IntoIterator<Item = ConversationTurn>) {
        self.turns.extend(turns);
    }

    /// Returns a copy of the full ordered history.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ConversationTurn> {
        self.turns.clone()
    }

    /// Borrows the history without copying it.
    #[must_use]
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Number of turns recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turn has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod proptests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn append_only_history_keeps_every_turn_in_order(
            texts in prop::collection::vec(".*", 0..50),
        ) {
            let mut conversation = ConversationState::new();
            for (i, text) in texts.iter().enumerate() {
                let turn = if i % 2 == 0 {
                    ConversationTurn::user(text.as_str())
                } else {
                    ConversationTurn::model(text.as_str())
                };
                conversation.append(turn);
                prop_assert_eq!(conversation.len(), i + 1);
            }

            for (turn, text) in conversation.turns().iter().zip(&texts) {
                match turn {
                    ConversationTurn::UserText(t) | ConversationTurn::ModelText(t) => {
                        prop_assert_eq!(t, text);
                    }
                    _ => prop_assert!(false, "unexpected turn kind"),
                }
            }
        }

        #[test]
        fn turn_serialization_roundtrip(content in ".*", is_user in any::<bool>()) {
            let turn = if is_user {
                ConversationTurn::user(content)
            } else {
                ConversationTurn::model(content)
            };
            let json = serde_json::to_string(&turn).unwrap();
            let parsed: ConversationTurn = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(parsed, turn);
        }

        #[test]
        fn fuzz_turn_deserialization(data in prop::collection::vec(any::<u8>(), 0..512)) {
            let _ = serde_json::from_slice::<ConversationTurn>(&data);
        }
    }
}
