//! Tool Capability Registry
//!
//! Resolves tool names to invocable capabilities and wraps them for
//! observability. Built-ins cover web search, page scraping, directory
//! listing, and file reading; a JSON-RPC call tool joins them when an
//! endpoint is configured. Caller-supplied custom tools are resolved
//! through the abstract [`ModuleLoader`] capability, never by path-based
//! imports inside the engine.

pub mod filesystem;
pub mod rpc;
pub mod web;

pub use filesystem::{ListDirTool, ReadFileTool};
pub use rpc::JsonRpcTool;
pub use web::{ScrapeTool, WebSearchTool};

use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::tool::{ModuleLoader, Tool};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{CustomToolDecl, ToolsConfig};
use crate::observer::{EventKind, Observer};

/// Maximum characters a built-in tool hands back to the model
pub(crate) const MAX_TOOL_OUTPUT_CHARS: usize = 20_000;

/// Truncate tool output on a char boundary, marking the cut.
pub(crate) fn truncate_output(text: String) -> String {
    if text.chars().count() <= MAX_TOOL_OUTPUT_CHARS {
        return text;
    }
    let mut out: String = text.chars().take(MAX_TOOL_OUTPUT_CHARS).collect();
    out.push_str("\n…[truncated]");
    out
}

/// Registry of invocable tools, keyed by name
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    observer: Arc<Observer>,
}

impl ToolRegistry {
    /// Create a registry holding the built-in tools.
    ///
    /// `rpc_call` is registered only when `tools.rpcEndpoint` is set.
    pub fn with_builtins(config: &ToolsConfig, observer: Arc<Observer>) -> Self {
        let mut registry = Self {
            tools: HashMap::new(),
            observer,
        };
        registry.register(Arc::new(WebSearchTool::new()));
        registry.register(Arc::new(ScrapeTool::new()));
        registry.register(Arc::new(ListDirTool));
        registry.register(Arc::new(ReadFileTool));
        if let Some(endpoint) = &config.rpc_endpoint {
            registry.register(Arc::new(JsonRpcTool::new(endpoint)));
        }
        registry
    }

    /// Register a tool under its own name, replacing any previous holder.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        debug!("Registering tool '{}'", tool.name());
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Resolve a tool by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>, EngineError> {
        self.tools
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| EngineError::UnknownTool(name.to_string()))
    }

    /// Names of all registered tools, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolve and register the caller-supplied custom tools.
    ///
    /// Module paths are taken relative to `base_dir`; resolution goes
    /// through the injected loader. Each tool is registered under its
    /// declared name, regardless of what the loaded instance reports.
    pub fn load_custom_tools(
        &mut self,
        declarations: &[CustomToolDecl],
        base_dir: &Path,
        loader: &dyn ModuleLoader,
    ) -> Result<(), EngineError> {
        for decl in declarations {
            let module = base_dir.join(&decl.module);
            let tool = loader.load(&module, &decl.export)?;
            info!("Loaded custom tool '{}' from {}", decl.name, module.display());
            self.tools.insert(decl.name.clone(), tool);
        }
        Ok(())
    }

    /// Wrap a tool so every invocation emits tool_call/tool_result events
    /// attributed to `caller`. Name, description, results, and failures all
    /// pass through unchanged.
    pub fn wrap(&self, tool: Arc<dyn Tool>, caller: &str) -> Arc<dyn Tool> {
        Arc::new(ObservedTool {
            inner: tool,
            caller: caller.to_string(),
            observer: Arc::clone(&self.observer),
        })
    }
}

/// Observability wrapper around a tool capability
struct ObservedTool {
    inner: Arc<dyn Tool>,
    caller: String,
    observer: Arc<Observer>,
}

#[async_trait]
impl Tool for ObservedTool {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    async fn invoke(&self, args: &serde_json::Value) -> Result<String, EngineError> {
        self.observer.record(EventKind::ToolCall {
            caller: self.caller.clone(),
            tool: self.inner.name().to_string(),
            arguments: args.clone(),
        });

        let result = self.inner.invoke(args).await;

        self.observer.record(EventKind::ToolResult {
            caller: self.caller.clone(),
            tool: self.inner.name().to_string(),
            output: result.as_ref().ok().cloned(),
            error: result.as_ref().err().map(ToString::to_string),
        });

        result
    }
}
