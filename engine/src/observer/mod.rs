//! Observability Event Sink
//!
//! Transport-independent recording of what a run did: run and node
//! boundaries, every member exchange, and every tool invocation. Disabling
//! observability makes every recording call a no-op and must never change
//! functional behavior — the observer is an audit surface, not a
//! participant.
//!
//! When a Markdown transcript is requested, `flush_report` renders the
//! recorded events in order and persists them under the workflow's base
//! directory.

use chrono::{DateTime, Utc};
use sdk::errors::EngineError;
use sdk::types::StructuredOutput;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::config::{MarkdownReportConfig, ObservabilityConfig};
use crate::llm::MessageRole;

/// One timestamped observability event
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// Recording time (UTC)
    pub timestamp: DateTime<Utc>,

    /// What happened
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Event payloads, tagged by `type` when serialized
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A graph run began
    RunStart {
        /// Run identifier
        run_id: String,
        /// Input fed to the entry node
        input: String,
    },

    /// A graph run finished
    RunEnd {
        /// Run identifier
        run_id: String,
        /// Name of the last visited node, if any node ran
        final_node: Option<String>,
    },

    /// A node began executing
    NodeStart {
        /// Node name
        node: String,
    },

    /// A node finished executing
    NodeEnd {
        /// Node name
        node: String,
    },

    /// One side of a member exchange. The user-role event carries the turn
    /// input; the assistant-role event carries the verbatim model text plus
    /// the parsed structure, so audits survive parse failure.
    MemberMessage {
        /// Member name
        member: String,
        /// `user` for the turn input, `assistant` for the response
        role: MessageRole,
        /// Verbatim text
        text: String,
        /// Parsed structure, present on assistant-role events
        #[serde(skip_serializing_if = "Option::is_none")]
        parsed: Option<StructuredOutput>,
    },

    /// A tool was invoked on behalf of a member
    ToolCall {
        /// Member the tool was invoked for
        caller: String,
        /// Tool name
        tool: String,
        /// JSON arguments
        arguments: serde_json::Value,
    },

    /// A tool invocation completed
    ToolResult {
        /// Member the tool was invoked for
        caller: String,
        /// Tool name
        tool: String,
        /// Tool output on success
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        /// Failure message on error
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// In-memory, ordered event sink
#[derive(Debug)]
pub struct Observer {
    enabled: bool,
    report: MarkdownReportConfig,
    events: Mutex<Vec<Event>>,
}

impl Observer {
    /// Build an observer from the workflow's observability settings
    pub fn from_config(config: &ObservabilityConfig) -> Self {
        Self {
            enabled: config.enabled,
            report: config.markdown_report.clone(),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Whether recording is active
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Record one event. A no-op when observability is disabled.
    pub fn record(&self, kind: EventKind) {
        if !self.enabled {
            return;
        }
        debug!(event = ?kind, "observability event");
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.push(Event {
            timestamp: Utc::now(),
            kind,
        });
    }

    /// Snapshot of all recorded events, in recording order
    pub fn events(&self) -> Vec<Event> {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.clone()
    }

    /// Render and persist the Markdown transcript, if one was requested.
    ///
    /// Returns the written path, or `None` when the transcript is disabled
    /// (including when observability as a whole is off). Parent directories
    /// are created as needed.
    pub fn flush_report(
        &self,
        base_dir: &Path,
        workflow_name: &str,
    ) -> Result<Option<PathBuf>, EngineError> {
        if !self.enabled || !self.report.enabled {
            return Ok(None);
        }

        let relative = self
            .report
            .file
            .clone()
            .unwrap_or_else(|| format!("reports/{workflow_name}/transcript.md"));
        let path = base_dir.join(relative);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, self.render_markdown(workflow_name))?;
        debug!("Transcript written to {}", path.display());

        Ok(Some(path))
    }

    /// Render member exchanges and tool invocations, in event order.
    fn render_markdown(&self, workflow_name: &str) -> String {
        let mut out = format!("# {workflow_name} — run transcript\n");

        for event in self.events() {
            match &event.kind {
                EventKind::MemberMessage {
                    member, role, text, ..
                } => {
                    out.push_str(&format!("\n## {member} ({role})\n\n{text}\n"));
                }
                EventKind::ToolCall {
                    caller,
                    tool,
                    arguments,
                } => {
                    out.push_str(&format!(
                        "\n### {caller} → tool `{tool}`\n\n```json\n{arguments}\n```\n"
                    ));
                }
                EventKind::ToolResult {
                    tool,
                    output,
                    error,
                    ..
                } => {
                    let body = match (output, error) {
                        (Some(text), _) => text.clone(),
                        (None, Some(message)) => format!("ERROR: {message}"),
                        (None, None) => String::new(),
                    };
                    out.push_str(&format!("\n### tool `{tool}` result\n\n```\n{body}\n```\n"));
                }
                _ => {}
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ObservabilityConfig;

    fn enabled_config(report: bool) -> ObservabilityConfig {
        ObservabilityConfig {
            enabled: true,
            log_level: "info".to_string(),
            markdown_report: MarkdownReportConfig {
                enabled: report,
                file: None,
            },
        }
    }

    #[test]
    fn test_disabled_observer_records_nothing() {
        let observer = Observer::from_config(&ObservabilityConfig {
            enabled: false,
            ..ObservabilityConfig::default()
        });
        observer.record(EventKind::NodeStart {
            node: "m1".to_string(),
        });
        assert!(observer.events().is_empty());
    }

    #[test]
    fn test_events_keep_recording_order() {
        let observer = Observer::from_config(&enabled_config(false));
        observer.record(EventKind::NodeStart {
            node: "a".to_string(),
        });
        observer.record(EventKind::NodeEnd {
            node: "a".to_string(),
        });

        let events = observer.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].kind, EventKind::NodeStart { .. }));
        assert!(matches!(events[1].kind, EventKind::NodeEnd { .. }));
    }

    #[test]
    fn test_flush_is_noop_without_report() {
        let observer = Observer::from_config(&enabled_config(false));
        let written = observer
            .flush_report(Path::new("/definitely/not/used"), "demo")
            .unwrap();
        assert!(written.is_none());
    }

    #[test]
    fn test_flush_writes_default_path() {
        let dir = tempfile::tempdir().unwrap();
        let observer = Observer::from_config(&enabled_config(true));

        observer.record(EventKind::MemberMessage {
            member: "m1".to_string(),
            role: MessageRole::Assistant,
            text: "hello from m1".to_string(),
            parsed: None,
        });
        observer.record(EventKind::ToolCall {
            caller: "m1".to_string(),
            tool: "web_search".to_string(),
            arguments: serde_json::json!({"query": "rust"}),
        });
        observer.record(EventKind::ToolResult {
            caller: "m1".to_string(),
            tool: "web_search".to_string(),
            output: Some("three results".to_string()),
            error: None,
        });

        let path = observer.flush_report(dir.path(), "demo").unwrap().unwrap();
        assert_eq!(path, dir.path().join("reports/demo/transcript.md"));

        let body = std::fs::read_to_string(path).unwrap();
        assert!(body.contains("## m1 (assistant)"));
        assert!(body.contains("hello from m1"));
        assert!(body.contains("tool `web_search`"));
        assert!(body.contains("three results"));
    }

    #[test]
    fn test_flush_respects_configured_file() {
        let dir = tempfile::tempdir().unwrap();
        let observer = Observer::from_config(&ObservabilityConfig {
            enabled: true,
            log_level: "info".to_string(),
            markdown_report: MarkdownReportConfig {
                enabled: true,
                file: Some("audit/run.md".to_string()),
            },
        });

        let path = observer.flush_report(dir.path(), "demo").unwrap().unwrap();
        assert_eq!(path, dir.path().join("audit/run.md"));
        assert!(path.exists());
    }

    #[test]
    fn test_event_serialization_tags() {
        let event = Event {
            timestamp: Utc::now(),
            kind: EventKind::ToolCall {
                caller: "m1".to_string(),
                tool: "scrape".to_string(),
                arguments: serde_json::json!({}),
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"tool_call""#));
    }
}
