//! # toolbridge
//!
//! Lets an LLM call an HTTP API through tools derived from the API's OpenAPI
//! document.
//!
//! At startup the API's `/openapi.json` is fetched and every POST operation
//! becomes a tool. A [`ChatOrchestrator`] then runs the session: each user
//! line goes to the model together with the tool declarations, tool calls the
//! model asks for are executed against the API, and their results are fed
//! back until the model answers in text.
//!
//! ## Quick Start
//!
//! ```no_run
//! use toolbridge::{ApiClient, ChatOrchestrator, Config, OpenAIClient, ToolInvoker, discover_tools};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let api = ApiClient::new("http://localhost:8001")?;
//! let invoker = ToolInvoker::from_tools(discover_tools(&api).await?)?;
//!
//! let config = Config::default().with_api_key("your-key");
//! let client = OpenAIClient::new(config)?;
//!
//! let mut orchestrator = ChatOrchestrator::new(client, invoker);
//! let outcome = orchestrator.handle_input("What is 3 times 4?").await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod events;
pub mod orchestrator;

pub use toolbridge_client::*;
pub use toolbridge_common::*;
pub use toolbridge_tools::*;

pub use error::CoreError;
pub use events::{EventCallback, OrchestratorEvent};
pub use orchestrator::{
    ChatOrchestrator, Console, DEFAULT_MAX_TOOL_ROUND_TRIPS, DEFAULT_SYSTEM_INSTRUCTION,
    EXIT_TOKENS, InputOutcome, ReplCommand, SessionState, is_exit_token,
};
