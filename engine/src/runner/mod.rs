//! Member Turn Execution
//!
//! A `MemberRunner` executes one turn for one member: it assembles the
//! request from the turn input and the accumulated node context, talks to
//! the LLM capability (looping through tool calls when the member declares
//! tools), parses the final text tolerantly, and records the exchange in
//! the member's memory bucket and the observer.
//!
//! Malformed model output is never an error here — it degrades to raw-text
//! content with no hint. Failures of the LLM or a tool capability
//! propagate as fatal.

use sdk::errors::EngineError;
use sdk::tool::Tool;
use sdk::types::StructuredOutput;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::MemberDefinition;
use crate::llm::{parse_tool_request, LanguageModel, Message, MessageRole};
use crate::memory::MemoryStore;
use crate::observer::{EventKind, Observer};

/// Maximum tool round-trips per turn. Exhausting the budget degrades to
/// treating the last model text as the final answer.
const MAX_TOOL_ITERATIONS: usize = 10;

/// Executes turns for a single member
pub struct MemberRunner {
    member: MemberDefinition,
    model: Arc<dyn LanguageModel>,
    tools: Vec<Arc<dyn Tool>>,
    memory: Arc<MemoryStore>,
    observer: Arc<Observer>,
}

impl MemberRunner {
    /// Bind a runner to its member definition and capabilities.
    ///
    /// `tools` are expected to be pre-wrapped for observability by the
    /// registry.
    pub fn new(
        member: MemberDefinition,
        model: Arc<dyn LanguageModel>,
        tools: Vec<Arc<dyn Tool>>,
        memory: Arc<MemoryStore>,
        observer: Arc<Observer>,
    ) -> Self {
        Self {
            member,
            model,
            tools,
            memory,
            observer,
        }
    }

    /// The member's name
    pub fn name(&self) -> &str {
        &self.member.name
    }

    /// Execute one turn.
    ///
    /// `context` is the per-run mapping of already-visited node names to
    /// their results; a serialized snapshot is embedded in the request.
    pub async fn run(
        &self,
        input: &str,
        context: &BTreeMap<String, serde_json::Value>,
    ) -> Result<StructuredOutput, EngineError> {
        self.observer.record(EventKind::MemberMessage {
            member: self.member.name.clone(),
            role: MessageRole::User,
            text: input.to_string(),
            parsed: None,
        });

        let request = build_request(input, context)?;
        let raw = if self.tools.is_empty() {
            self.run_plain(&request).await?
        } else {
            self.run_with_tools(&request).await?
        };

        let output = StructuredOutput::parse(&raw);

        self.memory.append(
            &self.member.memory_id,
            vec![Message::user(input), Message::assistant(&output.content)],
        );

        self.observer.record(EventKind::MemberMessage {
            member: self.member.name.clone(),
            role: MessageRole::Assistant,
            text: raw,
            parsed: Some(output.clone()),
        });

        Ok(output)
    }

    /// Single exchange: persona + prior bucket entries + this turn.
    async fn run_plain(&self, request: &str) -> Result<String, EngineError> {
        let messages = self.conversation(request);
        let completion = self.model.invoke(&messages).await?;
        Ok(completion.content)
    }

    /// Tool-using reasoning loop.
    ///
    /// The model may answer with `{"tool": ..., "arguments": ...}` any
    /// number of times (bounded by `MAX_TOOL_ITERATIONS`); each result is
    /// fed back before the next exchange. A request for a tool the member
    /// does not hold is malformed model output, so it is surfaced to the
    /// model as an error text rather than failing the run.
    async fn run_with_tools(&self, request: &str) -> Result<String, EngineError> {
        let mut messages = self.conversation(request);
        let mut last_text = String::new();

        for iteration in 0..MAX_TOOL_ITERATIONS {
            let completion = self.model.invoke(&messages).await?;
            last_text = completion.content;

            let Some(tool_request) = parse_tool_request(&last_text) else {
                return Ok(last_text);
            };

            debug!(
                "Member '{}' iteration {}: calling tool '{}'",
                self.member.name,
                iteration + 1,
                tool_request.tool
            );

            messages.push(Message::assistant(&last_text));

            match self.tools.iter().find(|t| t.name() == tool_request.tool) {
                Some(tool) => {
                    let result = tool.invoke(&tool_request.arguments).await?;
                    messages.push(Message::tool(result));
                }
                None => {
                    warn!(
                        "Member '{}' requested unknown tool '{}'",
                        self.member.name, tool_request.tool
                    );
                    messages.push(Message::tool(format!(
                        "ERROR: unknown tool '{}'. Available tools: {}",
                        tool_request.tool,
                        self.tool_names().join(", ")
                    )));
                }
            }
        }

        warn!(
            "Member '{}' exhausted {} tool iterations",
            self.member.name, MAX_TOOL_ITERATIONS
        );
        Ok(last_text)
    }

    fn conversation(&self, request: &str) -> Vec<Message> {
        let mut messages = vec![Message::system(self.system_prompt())];
        messages.extend(self.memory.get(&self.member.memory_id));
        messages.push(Message::user(request));
        messages
    }

    fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Persona instructing strict-JSON-only output, plus tool documentation
    /// when the member declares tools.
    fn system_prompt(&self) -> String {
        let mut parts = vec![
            self.member.role.clone(),
            String::new(),
            "RESPONSE FORMAT:".to_string(),
            "Your final reply must be ONLY one JSON object, nothing else:".to_string(),
            r#"{"content": "your answer", "next": "successor-node-or-null", "actions": []}"#
                .to_string(),
            "Set \"next\" to a node name only when handing off; otherwise null.".to_string(),
            r#"Each action is {"type": "...", "details": {...}}."#.to_string(),
        ];

        if !self.tools.is_empty() {
            parts.push(String::new());
            parts.push("TOOLS:".to_string());
            parts.push(
                "To call a tool, your ENTIRE reply must be exactly one JSON object of the form:"
                    .to_string(),
            );
            parts.push(r#"{"tool": "tool_name", "arguments": {...}}"#.to_string());
            parts.push(
                "The result will be provided; call tools as often as needed, then reply with the final JSON object above."
                    .to_string(),
            );
            parts.push(String::new());
            parts.push("Available tools:".to_string());
            for tool in &self.tools {
                parts.push(format!("- {}: {}", tool.name(), tool.description()));
            }
        }

        parts.join("\n")
    }
}

/// Embed the raw input plus a serialized snapshot of the per-node context.
fn build_request(
    input: &str,
    context: &BTreeMap<String, serde_json::Value>,
) -> Result<String, EngineError> {
    if context.is_empty() {
        return Ok(input.to_string());
    }
    let snapshot = serde_json::to_string_pretty(context)?;
    Ok(format!(
        "{input}\n\nResults from earlier workflow nodes:\n{snapshot}"
    ))
}
