//! Error types for the Pili domain, one `thiserror` enum per bounded
//! context.
//!
//! Propagation policy: tool failures are surfaced into the conversation as
//! tool-result text (the agent can react to them); completion failures abort
//! the turn with a fixed fallback message; memory failures degrade to logged
//! no-ops. Only total inability to produce a response reaches the caller.

use thiserror::Error;

/// The top-level error type for all Pili operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures from the LLM completion backend.
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Completion backend not configured: {0}")]
    NotConfigured(String),
}

/// Failures from the tool gateway or in-process tools.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    /// The tool listing could not be fetched at all. Callers degrade to a
    /// no-tool session rather than failing the request.
    #[error("Tool server unavailable: {0}")]
    Unavailable(String),

    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Tool execution failed: {tool_name} — {reason}")]
    Execution { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Failures from the conversation memory backend.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_error_displays_correctly() {
        let err = Error::Completion(CompletionError::Api {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn tool_timeout_distinct_from_execution() {
        let timeout = ToolError::Timeout {
            tool_name: "log_activity".into(),
            timeout_secs: 30,
        };
        let exec = ToolError::Execution {
            tool_name: "log_activity".into(),
            reason: "backend 500".into(),
        };
        assert!(timeout.to_string().contains("timed out"));
        assert!(exec.to_string().contains("failed"));
        assert!(!matches!(exec, ToolError::Timeout { .. }));
    }
}
