//! Web tools
//!
//! Built-in web search and page scraping over plain HTTP. Both hand the raw
//! page text to the model, truncated to the registry-wide output cap; the
//! model does its own extraction.

use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::tool::Tool;
use tracing::debug;

use super::truncate_output;

const SEARCH_ENDPOINT: &str = "https://duckduckgo.com/html/";

/// Search the web and return the result page text
pub struct WebSearchTool {
    client: reqwest::Client,
    endpoint: String,
}

impl WebSearchTool {
    /// Create a search tool against the default endpoint
    pub fn new() -> Self {
        Self::with_endpoint(SEARCH_ENDPOINT)
    }

    /// Create a search tool against an explicit endpoint
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web. Arguments: {\"query\": \"search terms\"}"
    }

    async fn invoke(&self, args: &serde_json::Value) -> Result<String, EngineError> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| EngineError::tool(self.name(), "missing 'query' argument"))?;

        debug!("web_search: {}", query);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| EngineError::tool(self.name(), e))?;

        let body = response
            .text()
            .await
            .map_err(|e| EngineError::tool(self.name(), e))?;

        Ok(truncate_output(body))
    }
}

/// Fetch a page and return its body text
pub struct ScrapeTool {
    client: reqwest::Client,
}

impl ScrapeTool {
    /// Create a scrape tool
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ScrapeTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ScrapeTool {
    fn name(&self) -> &str {
        "scrape"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its text. Arguments: {\"url\": \"https://...\"}"
    }

    async fn invoke(&self, args: &serde_json::Value) -> Result<String, EngineError> {
        let url = args
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| EngineError::tool(self.name(), "missing 'url' argument"))?;

        debug!("scrape: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| EngineError::tool(self.name(), format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(EngineError::tool(
                self.name(),
                format!("{url}: status {}", response.status()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| EngineError::tool(self.name(), e))?;

        Ok(truncate_output(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_web_search_requires_query() {
        let err = WebSearchTool::new()
            .invoke(&serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("query"));
    }

    #[tokio::test]
    async fn test_scrape_requires_url() {
        let err = ScrapeTool::new()
            .invoke(&serde_json::json!({"link": "x"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("url"));
    }

    #[tokio::test]
    async fn test_scrape_fetches_body() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("<h1>hi</h1>"))
            .mount(&server)
            .await;

        let out = ScrapeTool::new()
            .invoke(&serde_json::json!({"url": server.uri()}))
            .await
            .unwrap();
        assert_eq!(out, "<h1>hi</h1>");
    }

    #[tokio::test]
    async fn test_scrape_propagates_http_errors() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = ScrapeTool::new()
            .invoke(&serde_json::json!({"url": server.uri()}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_web_search_hits_endpoint() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::query_param("q", "rust workflow"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("results!"))
            .mount(&server)
            .await;

        let out = WebSearchTool::with_endpoint(server.uri())
            .invoke(&serde_json::json!({"query": "rust workflow"}))
            .await
            .unwrap();
        assert_eq!(out, "results!");
    }
}
