//! LLM Capability Abstraction Layer
//!
//! This module provides the interface the engine uses to talk to a language
//! model backend. The `LanguageModel` trait defines the contract; the
//! engine never constructs a concrete client itself and instead receives a
//! `ModelFactory` at construction, which is what lets the test harness and
//! integration tests substitute deterministic stubs.

use async_trait::async_trait;
use futures::stream::BoxStream;
use sdk::errors::EngineError;
use sdk::types::{extract_balanced_object, extract_fenced_block};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::LlmOptions;

pub mod openai;

pub use openai::{DefaultModelFactory, OpenAiCompatibleModel};

/// Message in a conversation history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,

    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a new tool result message
    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message
    User,

    /// Assistant message
    Assistant,

    /// System message
    System,

    /// Tool result message
    Tool,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// One completed (or partial, when streamed) model response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Completion {
    /// Response text
    pub content: String,
}

impl Completion {
    /// Create a new completion
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Lazy, finite, non-restartable sequence of completion chunks
pub type ChunkStream = BoxStream<'static, Result<Completion, EngineError>>;

/// Language-model capability consumed by member runners
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the backend name, e.g. "openai"
    fn name(&self) -> &str;

    /// Generate one complete response for the conversation
    async fn invoke(&self, messages: &[Message]) -> Result<Completion, EngineError>;

    /// Generate a response as a chunk stream
    async fn stream(&self, messages: &[Message]) -> Result<ChunkStream, EngineError>;
}

/// Builds a language model from the workflow's llm options.
///
/// Constructor-injected into the engine so tests can substitute scripted
/// models without touching any engine internals.
pub trait ModelFactory: Send + Sync {
    /// Build a model for the given options
    fn build(&self, options: &LlmOptions) -> Result<Arc<dyn LanguageModel>, EngineError>;
}

/// Tool invocation requested by the model mid-loop
#[derive(Debug, Clone, PartialEq)]
pub struct ToolRequest {
    /// Name of the tool to call
    pub tool: String,

    /// JSON arguments for the call
    pub arguments: serde_json::Value,
}

/// Parse a tool request out of model text.
///
/// Handles the `{"tool": "...", "arguments": {...}}` shape emitted verbatim,
/// inside a markdown code fence, or embedded in prose. Returns `None` for
/// anything else — the caller then treats the text as a final answer.
pub fn parse_tool_request(content: &str) -> Option<ToolRequest> {
    let trimmed = content.trim();

    if let Some(req) = try_parse_tool_json(trimmed) {
        return Some(req);
    }

    if let Some(inner) = extract_fenced_block(trimmed) {
        if let Some(req) = try_parse_tool_json(inner.trim()) {
            return Some(req);
        }
    }

    if let Some(pos) = trimmed.find(r#"{"tool""#) {
        if let Some(candidate) = extract_balanced_object(&trimmed[pos..]) {
            if let Some(req) = try_parse_tool_json(candidate) {
                return Some(req);
            }
        }
    }

    None
}

fn try_parse_tool_json(s: &str) -> Option<ToolRequest> {
    let json: serde_json::Value = serde_json::from_str(s).ok()?;
    let tool = json.get("tool")?.as_str()?.to_string();
    let arguments = json
        .get("arguments")
        .cloned()
        .unwrap_or(serde_json::Value::Null);
    Some(ToolRequest { tool, arguments })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::user("hi").role, MessageRole::User);
        assert_eq!(Message::assistant("ok").role, MessageRole::Assistant);
        assert_eq!(Message::system("be nice").role, MessageRole::System);
        assert_eq!(Message::tool("42").role, MessageRole::Tool);
    }

    #[test]
    fn test_role_display() {
        assert_eq!(MessageRole::User.to_string(), "user");
        assert_eq!(MessageRole::Tool.to_string(), "tool");
    }

    #[test]
    fn test_parse_tool_request_raw() {
        let req =
            parse_tool_request(r#"{"tool": "read_file", "arguments": {"path": "a.txt"}}"#).unwrap();
        assert_eq!(req.tool, "read_file");
        assert_eq!(req.arguments["path"], "a.txt");
    }

    #[test]
    fn test_parse_tool_request_fenced() {
        let content = "```json\n{\"tool\": \"web_search\", \"arguments\": {\"query\": \"rust\"}}\n```";
        let req = parse_tool_request(content).unwrap();
        assert_eq!(req.tool, "web_search");
    }

    #[test]
    fn test_parse_tool_request_embedded() {
        let content = r#"I will search now. {"tool": "web_search", "arguments": {"query": "x"}} done"#;
        let req = parse_tool_request(content).unwrap();
        assert_eq!(req.tool, "web_search");
        assert_eq!(req.arguments["query"], "x");
    }

    #[test]
    fn test_parse_tool_request_missing_arguments() {
        let req = parse_tool_request(r#"{"tool": "list_dir"}"#).unwrap();
        assert_eq!(req.tool, "list_dir");
        assert!(req.arguments.is_null());
    }

    #[test]
    fn test_plain_answer_is_not_a_tool_request() {
        assert!(parse_tool_request("The answer is 42.").is_none());
        assert!(parse_tool_request(r#"{"content": "final", "next": null}"#).is_none());
    }
}
