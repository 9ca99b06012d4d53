//! Configuration management
//!
//! This module handles loading and validation of a workflow configuration.
//! Configurations are accepted in TOML or JSON (dispatched on file
//! extension) and use camelCase keys on the wire, matching the surface
//! consumed by external front ends:
//!
//! ```json
//! {
//!   "name": "triage", "version": "1", "llm": {"model": "gpt-4o-mini"},
//!   "members": [{"name": "m1", "role": "You triage.", "tools": []}],
//!   "workflow": {"entry": "m1", "steps": []}
//! }
//! ```
//!
//! Validation happens once, before any model call: missing required fields,
//! an empty member list, an unresolvable entry node, and squad declarations
//! that break the node-name invariants are all fatal here.

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Complete workflow configuration
///
/// Immutable once loaded. The four required fields are kept optional at the
/// type level so that their absence is reported as `MissingField` during
/// validation rather than as a deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowConfig {
    /// Workflow name, used to key persisted reports
    #[serde(default)]
    pub name: String,

    /// Configuration schema version (required)
    pub version: Option<String>,

    /// LLM capability options (required)
    pub llm: Option<LlmOptions>,

    /// Ordered member declarations (required, non-empty)
    pub members: Option<Vec<MemberDefinition>>,

    /// Squad declarations
    #[serde(default)]
    pub squads: Vec<SquadDefinition>,

    /// Workflow graph (required)
    pub workflow: Option<WorkflowGraph>,

    /// Observability settings
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Built-in and custom tool settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Regression test definitions
    #[serde(default)]
    pub tests: Vec<TestDefinition>,

    /// Directory the configuration was loaded from; custom-tool modules and
    /// persisted reports resolve relative to it
    #[serde(skip, default = "default_base_dir")]
    pub base_dir: PathBuf,
}

/// LLM capability options passed to the model factory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmOptions {
    /// Model identifier, e.g. "gpt-4o-mini"
    pub model: String,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f64>,
}

/// One member: a named AI worker with a role persona
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDefinition {
    /// Unique member name, addressable as a graph node
    pub name: String,

    /// Role persona text prepended to every turn
    pub role: String,

    /// Names of tools this member may call
    #[serde(default)]
    pub tools: Vec<String>,

    /// Memory bucket shared with every member declaring the same id
    #[serde(default = "default_memory_id")]
    pub memory_id: String,
}

/// A named group of members executed together
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SquadDefinition {
    /// Unique squad name; must not collide with a member name
    pub name: String,

    /// Constituent member names, in declaration order
    pub members: Vec<String>,

    /// Execution mode
    pub mode: SquadMode,
}

/// Squad execution semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SquadMode {
    /// Fan out all members concurrently, join fail-fast
    Parallel,

    /// Chain members; each output feeds the next input
    Sequential,
}

impl fmt::Display for SquadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SquadMode::Parallel => write!(f, "parallel"),
            SquadMode::Sequential => write!(f, "sequential"),
        }
    }
}

/// Entry node plus directed, conditionally labeled edges
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowGraph {
    /// Name of the node the run starts at
    pub entry: String,

    /// Ordered edge declarations; empty means fully hint-driven
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
}

/// One directed edge with an optional condition label
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    /// Source node name
    pub from: String,

    /// Destination node name
    pub to: String,

    /// Condition label; the sentinel "always" matches regardless of hint
    #[serde(default = "default_when")]
    pub when: String,
}

/// Observability settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityConfig {
    /// Master switch; disabling must never change functional behavior
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Per-run Markdown transcript settings
    #[serde(default)]
    pub markdown_report: MarkdownReportConfig,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: default_log_level(),
            markdown_report: MarkdownReportConfig::default(),
        }
    }
}

/// Per-run Markdown transcript settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkdownReportConfig {
    /// Whether to render and persist a transcript after each run
    #[serde(default)]
    pub enabled: bool,

    /// Transcript path relative to the base directory; a default under
    /// `reports/` is used when unset
    #[serde(default)]
    pub file: Option<String>,
}

/// Built-in and custom tool settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsConfig {
    /// Caller-supplied tools resolved through the module loader
    #[serde(default)]
    pub custom: Vec<CustomToolDecl>,

    /// When set, the built-in `rpc_call` tool is registered against this
    /// JSON-RPC endpoint
    #[serde(default)]
    pub rpc_endpoint: Option<String>,
}

/// One custom tool declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomToolDecl {
    /// Name the tool is registered under
    pub name: String,

    /// Module path, relative to the configuration's base directory
    pub module: String,

    /// Export name inside the module
    pub export: String,
}

/// One regression test: an input plus assertions over member outputs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestDefinition {
    /// Test name, used as the run id
    #[serde(default)]
    pub name: String,

    /// Input fed to the workflow entry node
    pub input: String,

    /// Assertions evaluated after the run
    #[serde(default)]
    pub asserts: Vec<Assertion>,
}

/// One assertion over a member's output text
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assertion {
    /// Assertion kind; only "contains" is implemented
    #[serde(rename = "type")]
    pub kind: String,

    /// Target member name
    pub target: String,

    /// Expected value (literal, case-sensitive for "contains")
    pub value: String,
}

fn default_memory_id() -> String {
    "shared".to_string()
}

fn default_when() -> String {
    sdk::types::ALWAYS.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

impl WorkflowConfig {
    /// Load a configuration from a TOML or JSON file, dispatching on the
    /// file extension. The file's parent directory becomes the base
    /// directory for custom-tool modules and persisted reports.
    pub fn from_path(path: &Path) -> Result<Self, EngineError> {
        let raw = fs::read_to_string(path)?;

        let mut config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&raw)
                .map_err(|e| EngineError::Config(format!("invalid TOML config: {e}")))?,
            _ => serde_json::from_str(&raw)
                .map_err(|e| EngineError::Config(format!("invalid JSON config: {e}")))?,
        };

        config.base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(default_base_dir);

        Ok(config)
    }

    /// Declared members, empty when the field is absent.
    pub fn member_list(&self) -> &[MemberDefinition] {
        self.members.as_deref().unwrap_or_default()
    }

    /// True if `name` is a declared member or squad.
    pub fn is_node(&self, name: &str) -> bool {
        self.member_list().iter().any(|m| m.name == name)
            || self.squads.iter().any(|s| s.name == name)
    }

    /// Validate required fields and the node-name invariants.
    ///
    /// # Errors
    ///
    /// - `MissingField` when version, llm, members, or workflow is absent
    /// - `EmptyMemberList` when members is present but empty
    /// - `UnknownEntry` when the graph entry names neither member nor squad
    /// - `Config` for duplicate node names or unresolvable squad members
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.version.as_deref().unwrap_or_default().is_empty() {
            return Err(EngineError::MissingField("version".to_string()));
        }
        let llm = self
            .llm
            .as_ref()
            .ok_or_else(|| EngineError::MissingField("llm".to_string()))?;
        if llm.model.is_empty() {
            return Err(EngineError::MissingField("llm.model".to_string()));
        }

        let members = self
            .members
            .as_deref()
            .ok_or_else(|| EngineError::MissingField("members".to_string()))?;
        if members.is_empty() {
            return Err(EngineError::EmptyMemberList);
        }

        let workflow = self
            .workflow
            .as_ref()
            .ok_or_else(|| EngineError::MissingField("workflow".to_string()))?;

        let mut seen = std::collections::HashSet::new();
        for member in members {
            if !seen.insert(member.name.as_str()) {
                return Err(EngineError::Config(format!(
                    "duplicate node name '{}'",
                    member.name
                )));
            }
        }
        for squad in &self.squads {
            if !seen.insert(squad.name.as_str()) {
                return Err(EngineError::Config(format!(
                    "duplicate node name '{}'",
                    squad.name
                )));
            }
            for name in &squad.members {
                if !members.iter().any(|m| &m.name == name) {
                    return Err(EngineError::Config(format!(
                        "squad '{}' references unknown member '{}'",
                        squad.name, name
                    )));
                }
            }
        }

        if !self.is_node(&workflow.entry) {
            return Err(EngineError::UnknownEntry(workflow.entry.clone()));
        }

        Ok(())
    }
}
