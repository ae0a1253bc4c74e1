use crate::client::{http_client, REQUEST_TIMEOUT};
use crate::error::{LlmError, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

const TAVILY_BASE_URL: &str = "https://api.tavily.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

/// Tavily web search.
#[derive(Debug, Clone)]
pub struct TavilyClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl TavilyClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: TAVILY_BASE_URL.to_string(),
            http: http_client(REQUEST_TIMEOUT),
        }
    }

    /// Override the per-request timeout (60 s by default).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = http_client(timeout);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub async fn search(&self, query: &str, max_results: usize) -> Result<SearchResponse> {
        if self.api_key.is_empty() {
            return Err(LlmError::NotConfigured("tavily".to_string()));
        }
        let body = json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results.clamp(1, 20),
            "include_answer": true,
        });
        let resp = self
            .http
            .post(format!("{}/search", self.base_url))
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                provider: "tavily".to_string(),
                status: status.as_u16(),
                body,
            });
        }
        let mut parsed: SearchResponse = resp.json().await?;
        parsed.results.truncate(max_results.max(1));
        Ok(parsed)
    }
}
