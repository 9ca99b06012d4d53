//! Filesystem tools
//!
//! Read-only built-ins: directory listing and file reading. Paths are taken
//! as given; confining them to a workspace is the embedder's concern, not
//! the engine's.

use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::tool::Tool;

use super::truncate_output;

/// List files and directories at a path
pub struct ListDirTool;

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List files and directories at a path. Arguments: {\"path\": \"directory/path\"}"
    }

    async fn invoke(&self, args: &serde_json::Value) -> Result<String, EngineError> {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");

        let mut entries = tokio::fs::read_dir(path)
            .await
            .map_err(|e| EngineError::tool(self.name(), format!("{path}: {e}")))?;

        let mut lines = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| EngineError::tool(self.name(), e))?
        {
            let meta = entry
                .metadata()
                .await
                .map_err(|e| EngineError::tool(self.name(), e))?;
            let kind = if meta.is_dir() { "dir " } else { "file" };
            lines.push(format!(
                "{kind} {:>10}  {}",
                meta.len(),
                entry.file_name().to_string_lossy()
            ));
        }
        lines.sort();

        Ok(truncate_output(lines.join("\n")))
    }
}

/// Read the contents of a file
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Arguments: {\"path\": \"file/path\"}"
    }

    async fn invoke(&self, args: &serde_json::Value) -> Result<String, EngineError> {
        let path = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| EngineError::tool(self.name(), "missing 'path' argument"))?;

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| EngineError::tool(self.name(), format!("{path}: {e}")))?;

        Ok(truncate_output(content))
    }
}
