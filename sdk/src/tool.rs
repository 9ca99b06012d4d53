//! Tool capability traits
//!
//! This module defines the `Tool` trait that every capability dispatched by
//! the engine must implement, and the `ModuleLoader` trait through which
//! externally built tools are resolved. The engine never imports a concrete
//! loader: custom-tool resolution goes through this abstraction so that
//! tests (and embedders) can substitute their own.

use crate::errors::EngineError;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// An invocable capability with a stable name and a human-readable
/// description.
///
/// Tools fail by returning `Err`; the engine decides per call site whether a
/// failure is surfaced to the model or propagated as fatal.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the name the tool is registered and dispatched under
    fn name(&self) -> &str;

    /// Returns a one-line description advertised to members
    fn description(&self) -> &str;

    /// Handle a tool invocation with JSON arguments
    async fn invoke(&self, args: &serde_json::Value) -> Result<String, EngineError>;
}

/// Resolves a `(module path, export name)` pair to a tool instance.
///
/// The engine resolves custom tools exclusively through this trait. The
/// production implementation loads native shared libraries; test doubles
/// hand back in-process tools.
pub trait ModuleLoader: Send + Sync {
    /// Load the tool constructed by `export` inside `module`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::LibraryLoadFailed` if the module cannot be
    /// opened and `EngineError::CustomToolExportNotFound` if the named
    /// export is missing.
    fn load(&self, module: &Path, export: &str) -> Result<Arc<dyn Tool>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input back"
        }

        async fn invoke(&self, args: &serde_json::Value) -> Result<String, EngineError> {
            Ok(args.to_string())
        }
    }

    #[tokio::test]
    async fn test_tool_object_safety() {
        let tool: Arc<dyn Tool> = Arc::new(Echo);
        assert_eq!(tool.name(), "echo");
        let out = tool.invoke(&serde_json::json!({"x": 1})).await.unwrap();
        assert_eq!(out, r#"{"x":1}"#);
    }
}
