use thiserror::Error;

/// Errors that end a user turn without a reply.
///
/// The session goes back to waiting for input. Tool calls that already ran
/// during the turn stay in history with their results.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Model request failed: {0}")]
    ModelRequest(#[from] anyhow::Error),

    #[error("Maximum tool round trips exceeded: {0}")]
    MaxToolRoundTripsExceeded(String),

    #[error("Input error: {0}")]
    Input(String),
}
