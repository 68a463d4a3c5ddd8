//! Error types for tool discovery and tool invocation.

use thiserror::Error;

/// Errors raised while turning an OpenAPI document into a tool set.
///
/// All of these are fatal to startup: a partial tool set is never used.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SchemaError {
    /// The document could not be retrieved at all.
    #[error("failed to fetch OpenAPI document from {url}: {source}")]
    DocumentFetch {
        /// URL the document was requested from.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The document endpoint answered with a non-success status.
    #[error("OpenAPI document request to {url} returned HTTP {status}")]
    DocumentStatus {
        /// URL the document was requested from.
        url: String,
        /// HTTP status code returned.
        status: u16,
    },

    /// The document body is not a JSON OpenAPI document.
    #[error("invalid OpenAPI document: {0}")]
    InvalidDocument(#[from] serde_json::Error),

    /// An operation's input schema could not be resolved to a usable object schema.
    #[error("cannot resolve schema for POST {path}: {reason}")]
    SchemaResolution {
        /// The API path of the offending operation.
        path: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Two tools would share one name.
    #[error("duplicate tool name '{name}': {detail}")]
    DuplicateToolName {
        /// The colliding name.
        name: String,
        /// Where the collision came from.
        detail: String,
    },
}

impl SchemaError {
    pub(crate) fn resolution(path: &str, reason: impl Into<String>) -> Self {
        Self::SchemaResolution {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while executing a single tool call.
///
/// These never escape the invoker: they are rendered into a failed
/// [`toolbridge_common::ToolInvocationResult`] for the model to read.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ToolInvocationError {
    /// No tool is registered under the requested name.
    #[error("Unknown tool: '{0}'")]
    UnknownTool(String),

    /// The request never produced a response (refused, reset, timed out).
    #[error("request to POST {url} failed: {source}")]
    Transport {
        /// Target URL.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a non-2xx status.
    #[error("HTTP {status} from POST {url}: {body}")]
    Status {
        /// Target URL.
        url: String,
        /// HTTP status code returned.
        status: u16,
        /// Leading excerpt of the response body.
        body: String,
    },

    /// The API answered 2xx with a body that is not JSON.
    #[error("invalid JSON response from POST {url}: {source}")]
    InvalidBody {
        /// Target URL.
        url: String,
        /// Parse failure.
        #[source]
        source: serde_json::Error,
    },

    /// The operation path does not form a valid URL against the base URL.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The URL that failed to parse.
        url: String,
        /// Parser message.
        reason: String,
    },
}

impl ToolInvocationError {
    /// Renders the error with its full source chain, one cause per `: `.
    ///
    /// `reqwest` keeps the interesting part ("connection refused") in the
    /// source chain rather than in its own message.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut text = self.to_string();
        let mut source = std::error::Error::source(self);
        // The first source is already part of our own message.
        if let Some(first) = source {
            source = first.source();
        }
        while let Some(cause) = source {
            text.push_str(": ");
            text.push_str(&cause.to_string());
            source = cause.source();
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message_shape() {
        let err = ToolInvocationError::Status {
            url: "http://localhost:8001/multiply".into(),
            status: 422,
            body: "field required".into(),
        };
        assert_eq!(
            err.describe(),
            "HTTP 422 from POST http://localhost:8001/multiply: field required"
        );
    }

    #[test]
    fn test_unknown_tool_message() {
        let err = ToolInvocationError::UnknownTool("divide".into());
        assert_eq!(err.to_string(), "Unknown tool: 'divide'");
    }

    #[test]
    fn test_schema_resolution_message() {
        let err = SchemaError::resolution("/multiply", "unknown schema 'Missing'");
        assert_eq!(
            err.to_string(),
            "cannot resolve schema for POST /multiply: unknown schema 'Missing'"
        );
    }
}
