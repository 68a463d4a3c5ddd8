//! Event types for orchestrator observability.
//!
//! Events are fire-and-forget notifications about what a turn is doing. The
//! orchestrator awaits the callback but never reacts to it, so a callback
//! cannot change control flow.

use std::future::Future;
use std::pin::Pin;

use toolbridge_common::{ToolCall, ToolInvocationResult, Usage};

/// Events emitted by [`crate::ChatOrchestrator`] during a turn.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    /// The model asked for a tool call; emitted before it runs.
    ToolCallRequested(ToolCall),

    /// A tool call finished, successfully or not.
    ToolResult {
        /// ID of the call this result answers.
        call_id: String,
        /// What the invocation produced.
        result: ToolInvocationResult,
    },

    /// Token usage reported for one model response.
    Usage(Usage),
}

/// Async callback for receiving orchestrator events.
pub type EventCallback =
    Box<dyn Fn(OrchestratorEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;
