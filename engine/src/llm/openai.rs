//! OpenAI-compatible chat-completions backend
//!
//! Default production implementation of [`LanguageModel`]. Works against
//! any endpoint speaking the OpenAI chat-completions dialect (OpenAI,
//! compatible proxies, local servers). Endpoint and credentials come from
//! the environment so configurations stay free of secrets:
//!
//! - `TROUPE_LLM_BASE_URL` — default `https://api.openai.com/v1`
//! - `TROUPE_LLM_API_KEY` — optional; sent as a bearer token when present

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use sdk::errors::EngineError;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use super::{ChunkStream, Completion, LanguageModel, Message, ModelFactory};
use crate::config::LlmOptions;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat-completions client for OpenAI-compatible endpoints
pub struct OpenAiCompatibleModel {
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: Option<f64>,
    client: reqwest::Client,
}

impl OpenAiCompatibleModel {
    /// Create a client against an explicit endpoint
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, options: &LlmOptions) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            model: options.model.clone(),
            temperature: options.temperature,
            client: reqwest::Client::new(),
        }
    }

    /// Create a client from the `TROUPE_LLM_*` environment variables
    pub fn from_env(options: &LlmOptions) -> Self {
        let base_url =
            std::env::var("TROUPE_LLM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let api_key = std::env::var("TROUPE_LLM_API_KEY").ok();
        Self::new(base_url, api_key, options)
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleModel {
    fn name(&self) -> &str {
        "openai"
    }

    async fn invoke(&self, messages: &[Message]) -> Result<Completion, EngineError> {
        let url = format!("{}/chat/completions", self.base_url);

        let api_messages: Vec<_> = messages
            .iter()
            .map(|msg| {
                json!({
                    "role": msg.role.to_string(),
                    "content": msg.content,
                })
            })
            .collect();

        let mut payload = json!({
            "model": self.model,
            "messages": api_messages,
        });
        if let Some(temperature) = self.temperature {
            payload["temperature"] = json!(temperature);
        }

        debug!("Calling {} with {} messages", url, messages.len());

        let mut request = self.client.post(&url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EngineError::Llm(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Llm(format!("backend returned {status}: {body}")));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EngineError::Llm(format!("invalid response body: {e}")))?;

        let content = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| EngineError::Llm("no message content in response".to_string()))?;

        Ok(Completion::new(content))
    }

    async fn stream(&self, messages: &[Message]) -> Result<ChunkStream, EngineError> {
        // Single-chunk stream over the complete response. Honors the lazy,
        // finite, non-restartable contract without incremental transport.
        let completion = self.invoke(messages).await?;
        Ok(stream::once(async move { Ok(completion) }).boxed())
    }
}

/// Factory building [`OpenAiCompatibleModel`] instances from the
/// environment. This is what the `troupe` binary injects.
#[derive(Debug, Default)]
pub struct DefaultModelFactory;

impl ModelFactory for DefaultModelFactory {
    fn build(&self, options: &LlmOptions) -> Result<Arc<dyn LanguageModel>, EngineError> {
        Ok(Arc::new(OpenAiCompatibleModel::from_env(options)))
    }
}
