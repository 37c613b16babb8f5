//! Web search capability backed by the Tavily search API.
//!
//! Output is a JSON list of `{url, content}` objects. When the API also
//! returns a synthesized answer, it is placed on a leading `Answer:` line.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use toolchat_config::WebSearchConfig;
use toolchat_core::error::ToolError;
use toolchat_core::tool::Capability;
use tracing::debug;

use crate::{DEFAULT_REQUEST_TIMEOUT, http_client, request_error, status_error};

pub const IDENTIFIER: &str = "tavily_search_results_json";

const API_URL: &str = "https://api.tavily.com/search";

pub struct TavilySearchCapability {
    api_key: Option<String>,
    config: WebSearchConfig,
    client: reqwest::Client,
    timeout: Duration,
}

impl TavilySearchCapability {
    pub fn new(api_key: Option<String>, config: WebSearchConfig) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            config,
            client: http_client(DEFAULT_REQUEST_TIMEOUT),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Bound each HTTP request by `timeout` instead of the default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Capability for TavilySearchCapability {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn description(&self) -> &str {
        "A search engine optimized for comprehensive, accurate, and trusted results. \
         Useful for when you need to answer questions about current events. \
         Input should be a search query."
    }

    async fn invoke(&self, query: &str) -> Result<String, ToolError> {
        let query = crate::require_query(query)?;
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ToolError::NotConfigured("set TAVILY_API_KEY or tools.tavily_api_key".into())
        })?;

        debug!(query = %query, "Searching the web via Tavily");

        let request = SearchRequest {
            api_key,
            query,
            max_results: self.config.max_results,
            include_answer: self.config.include_answer,
        };

        let response = self
            .client
            .post(API_URL)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(IDENTIFIER, e, self.timeout))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ToolError::NotConfigured("Tavily rejected the API key".into()));
        }
        if !status.is_success() {
            return Err(status_error(IDENTIFIER, status));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| request_error(IDENTIFIER, e, self.timeout))?;

        render(body, self.config.max_results)
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    include_answer: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SearchHit {
    url: String,
    content: String,
}

fn render(response: SearchResponse, max_results: usize) -> Result<String, ToolError> {
    let hits: Vec<SearchHit> = response.results.into_iter().take(max_results).collect();
    let list = serde_json::to_string(&hits).map_err(|e| ToolError::ExecutionFailed {
        tool_name: IDENTIFIER.into(),
        reason: e.to_string(),
    })?;

    Ok(match response.answer.filter(|a| !a.trim().is_empty()) {
        Some(answer) => format!("Answer: {}\n{list}", answer.trim()),
        None => list,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> SearchResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn renders_url_content_list() {
        let response = parse(
            r#"{
                "query": "rust 2024 edition",
                "answer": null,
                "results": [
                    {"title": "Rust 2024", "url": "https://blog.rust-lang.org/", "content": "The 2024 edition is stable.", "score": 0.98},
                    {"title": "Edition guide", "url": "https://doc.rust-lang.org/edition-guide/", "content": "Editions explained.", "score": 0.91}
                ]
            }"#,
        );
        let out = render(response, 5).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert_eq!(parsed[0]["url"], "https://blog.rust-lang.org/");
        assert!(parsed[0].get("score").is_none());
    }

    #[test]
    fn answer_leads_the_output() {
        let response = parse(
            r#"{"answer": "It shipped in Rust 1.85.", "results": [{"url": "u", "content": "c"}]}"#,
        );
        let out = render(response, 5).unwrap();
        assert!(out.starts_with("Answer: It shipped in Rust 1.85.\n["));
    }

    #[test]
    fn results_are_capped() {
        let response = parse(
            r#"{"results": [{"url": "a", "content": "1"}, {"url": "b", "content": "2"}, {"url": "c", "content": "3"}]}"#,
        );
        let out = render(response, 2).unwrap();
        assert!(!out.contains("\"c\""));
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let cap = TavilySearchCapability::new(Some("  ".into()), WebSearchConfig::default());
        assert!(matches!(
            cap.invoke("latest news").await,
            Err(ToolError::NotConfigured(_))
        ));
    }
}
