//! Display utilities for CLI output formatting
//!
//! Provides formatted output for replies, tool activity, history and errors

use colored::{ColoredString, Colorize};

use toolbridge::{
    ConversationTurn, CoreError, OrchestratorEvent, Tool, ToolCall, ToolInvocationResult,
    TurnRole, Usage,
};

const MAX_RESULT_CHARS: usize = 200;

/// Shortens long text to `max` characters, noting the original length.
pub fn truncate(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max).collect();
    format!("{head}... ({count} chars)")
}

pub fn display_banner(api_url: &str, tools: &[Tool]) {
    println!("{}", "Toolbridge".bright_cyan().bold());
    println!("Connected to {api_url} with {} tool(s)", tools.len());
    println!("Commands:");
    println!("  /tools        - List the available tools");
    println!("  /history      - List the conversation so far");
    println!("  exit, quit, q - Leave the session");
    println!();
}

/// Display a tool call being requested by the model
pub fn display_tool_call_request(tool_call: &ToolCall) {
    println!("  ├─○ Tool Call: {}", tool_call.name.bright_green());
    for (key, value) in &tool_call.arguments {
        println!("  │    {}: {value}", key.bright_black());
    }
}

/// Display tool execution result
pub fn display_tool_result(result: &ToolInvocationResult) {
    let label = if result.is_success() {
        format!("  ├─✓ Tool Result: {}", result.tool_name).bright_green()
    } else {
        format!("  ├─✗ Tool Failed: {}", result.tool_name).bright_red()
    };
    println!("{label}");
    println!("  │    {}", truncate(&result.content(), MAX_RESULT_CHARS));
}

/// Renders orchestrator events as they happen.
pub fn display_event(event: &OrchestratorEvent) {
    match event {
        OrchestratorEvent::ToolCallRequested(call) => display_tool_call_request(call),
        OrchestratorEvent::ToolResult { result, .. } => display_tool_result(result),
        OrchestratorEvent::Usage(_) => {}
    }
}

pub fn display_reply(text: &str) {
    println!("{} {text}", "Assistant:".bright_magenta().bold());
}

pub fn display_error(error: &CoreError) {
    eprintln!("{} {error}", "Error:".bright_red().bold());
}

pub fn display_warning(message: &str) {
    eprintln!("{} {message}", "Warning:".yellow().bold());
}

pub fn display_tools(tools: &[Tool]) {
    println!("\n=== Available Tools ===\n");
    if tools.is_empty() {
        println!("(none)");
    }
    for tool in tools {
        println!("{}: {}", tool.name().bright_green(), tool.function.description);
        for (name, property) in &tool.function.parameters.properties {
            let required = if tool.function.parameters.is_required(name) {
                " (required)"
            } else {
                ""
            };
            println!("      {name}: {}{required}", property.prop_type);
        }
    }
    println!();
}

fn role_label(role: TurnRole) -> ColoredString {
    match role {
        TurnRole::User => "User".bright_cyan(),
        TurnRole::Model => "Assistant".bright_magenta(),
        TurnRole::Tool => "Tool".bright_yellow(),
    }
}

/// List all turns in the conversation
pub fn display_history(turns: &[ConversationTurn]) {
    println!("\n=== Conversation ===\n");
    for (idx, turn) in turns.iter().enumerate() {
        let label = role_label(turn.role());
        match turn {
            ConversationTurn::UserText(text) | ConversationTurn::ModelText(text) => {
                println!("[{idx}] {label}: {text}");
            }
            ConversationTurn::ToolCall(call) => {
                println!(
                    "[{idx}] {label}: call {} {}",
                    call.name.bright_green(),
                    call.arguments_json()
                );
            }
            ConversationTurn::ToolResult { result, .. } => {
                println!(
                    "[{idx}] {label}: {}",
                    truncate(&result.content(), MAX_RESULT_CHARS)
                );
            }
        }
    }
    println!();
}

pub fn display_usage(usage: &Usage) {
    println!(
        "Tokens used: {}↑ {}↓ {}Σ",
        usage.prompt_tokens.to_string().cyan(),
        usage.completion_tokens.to_string().green(),
        usage.total_tokens.to_string().yellow()
    );
}
