//! Rustyline-backed console for the chat session.

use anyhow::Result;
use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use toolbridge::{Console, ConversationTurn, CoreError, Tool};

use crate::display;

/// Terminal console with in-memory line history.
pub struct ReplConsole {
    editor: DefaultEditor,
}

impl ReplConsole {
    /// Creates the line editor.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be initialised.
    pub fn new() -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl Console for ReplConsole {
    fn read_line(&mut self) -> Result<Option<String>> {
        match self.editor.readline(&format!("{} ", "You:".bright_cyan().bold())) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted) => {
                println!("Interrupted");
                Ok(None)
            }
            Err(ReadlineError::Eof) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn show_reply(&mut self, text: &str) {
        display::display_reply(text);
    }

    fn show_error(&mut self, error: &CoreError) {
        display::display_error(error);
    }

    fn show_tools(&mut self, tools: &[Tool]) {
        display::display_tools(tools);
    }

    fn show_history(&mut self, turns: &[ConversationTurn]) {
        display::display_history(turns);
    }
}
