//! The chat session state machine.
//!
//! ```text
//! AwaitingUserInput -> ModelRequested -> ModelReplied -> AwaitingUserInput
//!                           |   ^
//!                           v   |
//!                   ToolRequested -> ToolExecuted
//! ```
//!
//! `SessionEnded` is entered on an exit token or end of input.
//!
//! The user text is held back until something happens on its behalf. It is
//! committed together with the first executed tool call and its result, or
//! with the model's text reply. Every later call/result pair is committed as
//! soon as the tool has run. A failed model request adds nothing of its own,
//! so a turn whose first request fails leaves history as it was.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use log::{debug, info, warn};

use toolbridge_client::LLMClient;
use toolbridge_common::{
    ChatRequest, ConversationState, ConversationTurn, ModelReply, Tool, ToolChoice, Usage,
};
use toolbridge_tools::ToolInvoker;

use crate::error::CoreError;
use crate::events::{EventCallback, OrchestratorEvent};

/// Instruction sent ahead of every request unless configured otherwise.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful assistant. \
If the user asks for math or multiplication, call the available tool instead of solving it yourself. \
Use the tool's result to answer.";

/// Tool executions allowed per user turn before a text reply is forced.
pub const DEFAULT_MAX_TOOL_ROUND_TRIPS: u32 = 5;

/// Inputs that end the session, compared case-insensitively after trimming.
pub const EXIT_TOKENS: [&str; 3] = ["exit", "quit", "q"];

/// Returns whether `input` is an exit token.
#[must_use]
pub fn is_exit_token(input: &str) -> bool {
    let input = input.trim();
    EXIT_TOKENS.iter().any(|t| input.eq_ignore_ascii_case(t))
}

/// Where the session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingUserInput,
    ModelRequested,
    ToolRequested,
    ToolExecuted,
    ModelReplied,
    SessionEnded,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingUserInput => "awaiting user input",
            Self::ModelRequested => "model requested",
            Self::ToolRequested => "tool requested",
            Self::ToolExecuted => "tool executed",
            Self::ModelReplied => "model replied",
            Self::SessionEnded => "session ended",
        };
        f.write_str(name)
    }
}

/// Local commands that never reach the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    /// List the tool declarations.
    Tools,
    /// List the conversation turns.
    History,
}

impl ReplCommand {
    fn parse(input: &str) -> Option<Self> {
        match input {
            "/tools" => Some(Self::Tools),
            "/history" => Some(Self::History),
            _ => None,
        }
    }
}

/// What one line of input led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    /// Blank input; nothing happened.
    Ignored,
    /// An exit token; the session has ended.
    Exit,
    /// A local command to display something.
    Command(ReplCommand),
    /// The model's final text for this turn.
    Reply(String),
}

/// The line-oriented surface a session talks to.
///
/// `read_line` is the only place the session waits on a human.
pub trait Console {
    /// Reads one line. `Ok(None)` means end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying input fails.
    fn read_line(&mut self) -> anyhow::Result<Option<String>>;

    /// Shows the model's reply.
    fn show_reply(&mut self, text: &str);

    /// Shows a failed turn.
    fn show_error(&mut self, error: &CoreError);

    fn show_tools(&mut self, _tools: &[Tool]) {}

    fn show_history(&mut self, _turns: &[ConversationTurn]) {}
}

/// Drives one chat session between a user, an LLM and a tool set.
pub struct ChatOrchestrator<C: LLMClient> {
    client: C,
    invoker: ToolInvoker,
    conversation: ConversationState,
    system_instruction: String,
    max_tool_round_trips: u32,
    state: SessionState,
    usage: Usage,
    event_callback: Option<EventCallback>,
}

impl<C: LLMClient> ChatOrchestrator<C> {
    pub fn new(client: C, invoker: ToolInvoker) -> Self {
        Self {
            client,
            invoker,
            conversation: ConversationState::new(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            max_tool_round_trips: DEFAULT_MAX_TOOL_ROUND_TRIPS,
            state: SessionState::AwaitingUserInput,
            usage: Usage::default(),
            event_callback: None,
        }
    }

    #[must_use]
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    #[must_use]
    pub const fn with_max_tool_round_trips(mut self, max: u32) -> Self {
        self.max_tool_round_trips = max;
        self
    }

    /// Registers a callback that observes tool activity and usage.
    #[must_use]
    pub fn with_event_callback<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(OrchestratorEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: EventCallback = Box::new(
            move |event: OrchestratorEvent| -> Pin<Box<dyn Future<Output = ()> + Send>> {
                Box::pin(callback(event))
            },
        );
        self.event_callback = Some(callback);
        self
    }

    pub const fn client(&self) -> &C {
        &self.client
    }

    pub const fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Token usage accumulated over the session.
    pub const fn usage(&self) -> Usage {
        self.usage
    }

    /// Tool declarations offered to the model.
    pub fn tools(&self) -> Vec<Tool> {
        self.invoker.get_all_tools()
    }

    async fn emit(&self, event: OrchestratorEvent) {
        if let Some(callback) = &self.event_callback {
            callback(event).await;
        }
    }

    /// Runs the session until an exit token or end of input.
    ///
    /// Failed turns are shown through the console and the loop continues.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Input`] if reading from the console fails.
    pub async fn run(&mut self, console: &mut impl Console) -> Result<(), CoreError> {
        info!(
            "Session {} started with tools: {}",
            self.conversation.id,
            self.invoker.registry().tool_names().join(", ")
        );

        while self.state != SessionState::SessionEnded {
            let line = console
                .read_line()
                .map_err(|e| CoreError::Input(e.to_string()))?;
            let Some(line) = line else {
                debug!("End of input");
                self.state = SessionState::SessionEnded;
                break;
            };

            match self.handle_input(&line).await {
                Ok(InputOutcome::Ignored | InputOutcome::Exit) => {}
                Ok(InputOutcome::Command(ReplCommand::Tools)) => console.show_tools(&self.tools()),
                Ok(InputOutcome::Command(ReplCommand::History)) => {
                    console.show_history(self.conversation.turns());
                }
                Ok(InputOutcome::Reply(text)) => console.show_reply(&text),
                Err(e) => console.show_error(&e),
            }
        }

        info!(
            "Session {} ended after {} turns",
            self.conversation.id,
            self.conversation.len()
        );
        Ok(())
    }

    /// Processes one line of user input.
    ///
    /// Blank input and local commands leave history untouched. An exit token
    /// ends the session. Anything else is a user turn.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreError`] if the turn failed. Tool calls that already ran
    /// stay in history with their results; nothing else of the turn is kept.
    /// The session is back to awaiting input.
    pub async fn handle_input(&mut self, input: &str) -> Result<InputOutcome, CoreError> {
        if self.state == SessionState::SessionEnded {
            return Ok(InputOutcome::Exit);
        }

        let input = input.trim();
        if input.is_empty() {
            return Ok(InputOutcome::Ignored);
        }
        if is_exit_token(input) {
            self.state = SessionState::SessionEnded;
            return Ok(InputOutcome::Exit);
        }
        if let Some(command) = ReplCommand::parse(input) {
            return Ok(InputOutcome::Command(command));
        }

        let result = self.run_turn(input).await;
        self.state = SessionState::AwaitingUserInput;
        result.map(InputOutcome::Reply)
    }

    async fn run_turn(&mut self, text: &str) -> Result<String, CoreError> {
        let mut pending = vec![ConversationTurn::user(text)];
        let tools = self.invoker.get_all_tools();
        let mut round_trips = 0u32;

        loop {
            self.state = SessionState::ModelRequested;
            let forced_text = round_trips >= self.max_tool_round_trips;

            let turns: Vec<ConversationTurn> = self
                .conversation
                .turns()
                .iter()
                .chain(&pending)
                .cloned()
                .collect();
            let request = ChatRequest::from((self.client.config(), turns))
                .with_system_instruction(self.system_instruction.as_str());
            let request = if forced_text {
                request.with_tool_choice(ToolChoice::None)
            } else if tools.is_empty() {
                request
            } else {
                request
                    .with_tools(tools.clone())
                    .with_tool_choice(ToolChoice::Auto)
            };

            info!(
                "Model request {} for session {} ({} turns)",
                round_trips + 1,
                self.conversation.id,
                request.turns.len()
            );
            debug!("Chat request: {request}");

            let response = self.client.chat(&request).await?;
            debug!("Chat response: {response}");

            if let Some(usage) = response.usage {
                self.usage += usage;
                self.emit(OrchestratorEvent::Usage(usage)).await;
            }

            match response.reply {
                ModelReply::Text(reply) => {
                    self.state = SessionState::ModelReplied;
                    pending.push(ConversationTurn::model(reply.as_str()));
                    self.conversation.append_all(pending);
                    return Ok(reply);
                }
                ModelReply::ToolCallRequest(call) => {
                    if forced_text {
                        warn!(
                            "Model asked for tool '{}' after {round_trips} round trips; not running it",
                            call.name
                        );
                        return Err(CoreError::MaxToolRoundTripsExceeded(format!(
                            "model still requested tool '{}' after {} tool round trips",
                            call.name, self.max_tool_round_trips
                        )));
                    }

                    self.state = SessionState::ToolRequested;
                    debug!("Tool call {} -> {}({})", call.id, call.name, call.arguments_json());
                    self.emit(OrchestratorEvent::ToolCallRequested(call.clone()))
                        .await;

                    let result = self.invoker.invoke(&call.name, &call.arguments).await;
                    self.state = SessionState::ToolExecuted;
                    self.emit(OrchestratorEvent::ToolResult {
                        call_id: call.id.clone(),
                        result: result.clone(),
                    })
                    .await;

                    // The API call has happened; its record survives a later failure.
                    let call_id = call.id.clone();
                    pending.push(ConversationTurn::ToolCall(call));
                    pending.push(ConversationTurn::tool_result(call_id, result));
                    self.conversation.append_all(pending.drain(..));
                    round_trips += 1;
                }
            }
        }
    }
}
