//! Wikipedia capability — MediaWiki search followed by intro extracts.

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use toolchat_config::WikipediaConfig;
use toolchat_core::error::ToolError;
use toolchat_core::tool::Capability;
use tracing::{debug, warn};

use crate::{DEFAULT_REQUEST_TIMEOUT, http_client, request_error, status_error};

pub const IDENTIFIER: &str = "wikipedia";

pub struct WikipediaCapability {
    config: WikipediaConfig,
    client: reqwest::Client,
    timeout: Duration,
}

impl WikipediaCapability {
    pub fn new(config: WikipediaConfig) -> Self {
        Self {
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

    fn api_url(&self) -> String {
        format!("https://{}.wikipedia.org/w/api.php", self.config.language)
    }

    async fn get_json(&self, params: &[(&str, &str)]) -> Result<Value, ToolError> {
        let response = self
            .client
            .get(self.api_url())
            .query(params)
            .send()
            .await
            .map_err(|e| request_error(IDENTIFIER, e, self.timeout))?;

        if !response.status().is_success() {
            return Err(status_error(IDENTIFIER, response.status()));
        }

        response
            .json()
            .await
            .map_err(|e| request_error(IDENTIFIER, e, self.timeout))
    }
}

#[async_trait]
impl Capability for WikipediaCapability {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn description(&self) -> &str {
        "A wrapper around Wikipedia. Useful for when you need to answer general questions \
         about people, places, companies, facts, historical events, or other subjects. \
         Input should be a search query."
    }

    async fn invoke(&self, query: &str) -> Result<String, ToolError> {
        let query = crate::require_query(query)?;
        let limit = self.config.top_k_results.to_string();

        debug!(query = %query, language = %self.config.language, "Searching Wikipedia");

        let search = self
            .get_json(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", limit.as_str()),
                ("format", "json"),
            ])
            .await?;

        let mut titles = search_titles(&search);
        titles.truncate(self.config.top_k_results);

        let pages = collect_pages(titles, |title| async move {
            self.get_json(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title.as_str()),
                ("format", "json"),
            ])
            .await
        })
        .await?;

        if pages.is_empty() {
            return Ok("No good Wikipedia Search Result was found".into());
        }

        Ok(crate::truncate_chars(
            pages.join("\n\n"),
            self.config.max_chars,
        ))
    }
}

/// Fetch each title's extract and render it as a `Page/Summary` block.
///
/// A failed fetch is skipped while other pages still come back. When no
/// page came back and at least one fetch failed, the last error wins so a
/// transport failure is never reported as "no results".
async fn collect_pages<F, Fut>(titles: Vec<String>, mut fetch: F) -> Result<Vec<String>, ToolError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Value, ToolError>>,
{
    let mut pages = Vec::new();
    let mut last_error = None;

    for title in titles {
        match fetch(title.clone()).await {
            Ok(page) => {
                if let Some(extract) = page_extract(&page) {
                    pages.push(format!("Page: {title}\nSummary: {extract}"));
                }
            }
            Err(e) => {
                warn!(title = %title, error = %e, "Skipping Wikipedia page");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if pages.is_empty() => Err(e),
        _ => Ok(pages),
    }
}

/// Titles from a `list=search` response, in rank order.
fn search_titles(response: &Value) -> Vec<String> {
    response["query"]["search"]
        .as_array()
        .map(|hits| {
            hits.iter()
                .filter_map(|hit| hit["title"].as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// The intro extract from a `prop=extracts` response, if the page exists.
fn page_extract(response: &Value) -> Option<String> {
    response["query"]["pages"]
        .as_object()?
        .values()
        .filter_map(|page| page["extract"].as_str())
        .map(str::trim)
        .find(|extract| !extract.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_titles_keep_rank_order() {
        let response = json!({
            "batchcomplete": "",
            "query": {
                "searchinfo": {"totalhits": 2},
                "search": [
                    {"ns": 0, "title": "Quantum computing", "pageid": 25220},
                    {"ns": 0, "title": "Qubit", "pageid": 25284}
                ]
            }
        });
        assert_eq!(search_titles(&response), vec!["Quantum computing", "Qubit"]);
    }

    #[test]
    fn search_without_hits_is_empty() {
        assert!(search_titles(&json!({"query": {"search": []}})).is_empty());
        assert!(search_titles(&json!({"error": {"code": "badvalue"}})).is_empty());
    }

    #[test]
    fn extract_is_read_from_page_map() {
        let response = json!({
            "query": {
                "pages": {
                    "25220": {
                        "pageid": 25220,
                        "title": "Quantum computing",
                        "extract": "A quantum computer is a computer that exploits quantum mechanical phenomena.\n"
                    }
                }
            }
        });
        assert_eq!(
            page_extract(&response).unwrap(),
            "A quantum computer is a computer that exploits quantum mechanical phenomena."
        );
    }

    #[test]
    fn missing_page_has_no_extract() {
        let response = json!({
            "query": {"pages": {"-1": {"ns": 0, "title": "Nope", "missing": ""}}}
        });
        assert!(page_extract(&response).is_none());
    }

    fn extract_page(text: &str) -> Value {
        json!({"query": {"pages": {"1": {"extract": text}}}})
    }

    #[tokio::test]
    async fn one_failed_page_is_skipped() {
        let titles = vec!["Qubit".to_string(), "Quantum computing".to_string()];
        let pages = collect_pages(titles, |title| async move {
            if title == "Qubit" {
                Err(ToolError::RateLimited {
                    tool_name: IDENTIFIER.into(),
                })
            } else {
                Ok(extract_page("A quantum computer exploits superposition."))
            }
        })
        .await
        .unwrap();

        assert_eq!(
            pages,
            vec!["Page: Quantum computing\nSummary: A quantum computer exploits superposition."]
        );
    }

    #[tokio::test]
    async fn every_page_failing_is_an_error() {
        let titles = vec!["Qubit".to_string(), "Quantum computing".to_string()];
        let result = collect_pages(titles, |_title| async move {
            Err(ToolError::RateLimited {
                tool_name: IDENTIFIER.into(),
            })
        })
        .await;

        assert!(matches!(result, Err(ToolError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn pages_without_extracts_are_not_an_error() {
        let titles = vec!["Nope".to_string()];
        let pages = collect_pages(titles, |_title| async move {
            Ok(json!({"query": {"pages": {"-1": {"title": "Nope", "missing": ""}}}}))
        })
        .await
        .unwrap();

        assert!(pages.is_empty());
    }

    #[test]
    fn api_url_uses_configured_language() {
        let cap = WikipediaCapability::new(WikipediaConfig {
            language: "de".into(),
            ..WikipediaConfig::default()
        });
        assert_eq!(cap.api_url(), "https://de.wikipedia.org/w/api.php");
    }
}
