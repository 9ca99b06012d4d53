//! JSON-RPC call tool
//!
//! Registered only when the workflow configures `tools.rpcEndpoint`. Sends
//! a JSON-RPC 2.0 request and returns the serialized `result`; a response
//! carrying an `error` member fails the invocation.

use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::tool::Tool;
use serde_json::json;
use tracing::debug;

/// Remote JSON-RPC 2.0 call against a configured endpoint
pub struct JsonRpcTool {
    client: reqwest::Client,
    endpoint: String,
}

impl JsonRpcTool {
    /// Create a tool bound to an endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Tool for JsonRpcTool {
    fn name(&self) -> &str {
        "rpc_call"
    }

    fn description(&self) -> &str {
        "Call a remote JSON-RPC method. Arguments: {\"method\": \"name\", \"params\": ...}"
    }

    async fn invoke(&self, args: &serde_json::Value) -> Result<String, EngineError> {
        let method = args
            .get("method")
            .and_then(|v| v.as_str())
            .ok_or_else(|| EngineError::tool(self.name(), "missing 'method' argument"))?;
        let params = args.get("params").cloned().unwrap_or(json!([]));

        debug!("rpc_call: {} -> {}", method, self.endpoint);

        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| EngineError::tool(self.name(), e))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EngineError::tool(self.name(), format!("invalid response: {e}")))?;

        if let Some(error) = body.get("error") {
            return Err(EngineError::tool(self.name(), error.to_string()));
        }

        let result = body
            .get("result")
            .ok_or_else(|| EngineError::tool(self.name(), "response has no result"))?;

        Ok(result.to_string())
    }
}
