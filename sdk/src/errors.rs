//! Error types and handling
//!
//! This module provides the error types used throughout the troupe engine.
//! Configuration errors are raised during load/validate, before any model
//! call. `UnknownNode` is the only fatal graph-time configuration error.
//! Malformed model output is deliberately *not* an error anywhere in the
//! engine; capability failures (LLM, tool) propagate through the `Llm` and
//! `Tool` variants.

use thiserror::Error;

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: missing fields, unknown entry node, invalid squads
/// - **Graph**: unknown node encountered mid-run
/// - **Tools**: unresolved tool names, missing custom-tool exports
/// - **Capabilities**: LLM or tool invocation failures
/// - **Harness**: test-run preconditions
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Missing required configuration field: {0}")]
    MissingField(String),

    #[error("Workflow declares no members")]
    EmptyMemberList,

    #[error("Workflow entry '{0}' is neither a member nor a squad")]
    UnknownEntry(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // Graph errors
    #[error("Workflow node '{0}' is neither a member nor a squad")]
    UnknownNode(String),

    // Tool errors
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Custom tool export '{export}' not found in module '{module}'")]
    CustomToolExportNotFound { module: String, export: String },

    #[error("Tool '{name}' failed: {message}")]
    Tool { name: String, message: String },

    // Library loading errors
    #[error("Library load failed: {0}")]
    LibraryLoadFailed(String),

    // LLM capability errors
    #[error("LLM capability error: {0}")]
    Llm(String),

    // Test harness errors
    #[error("No tests defined for this workflow")]
    NoTestsDefined,

    // Serialization errors
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Shorthand for a tool failure carrying the tool's name.
    pub fn tool(name: impl Into<String>, message: impl ToString) -> Self {
        Self::Tool {
            name: name.into(),
            message: message.to_string(),
        }
    }
}
