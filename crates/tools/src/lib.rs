//! Built-in research capabilities for toolchat.
//!
//! Each capability takes the user's question as a free-text query, calls a
//! public search service, and returns a compact plain-text digest the model
//! can ground its answer in:
//!
//! - `arxiv` — academic papers from arXiv
//! - `wikipedia` — encyclopedia summaries
//! - `tavily_search_results_json` — current web results via Tavily

pub mod arxiv;
pub mod web_search;
pub mod wikipedia;

use std::sync::Arc;
use std::time::Duration;
use toolchat_config::ToolsConfig;
use toolchat_core::error::ToolError;
use toolchat_core::tool::CapabilityRegistry;
use tracing::{debug, warn};

pub use arxiv::ArxivCapability;
pub use web_search::TavilySearchCapability;
pub use wikipedia::WikipediaCapability;

const USER_AGENT: &str = concat!("toolchat/", env!("CARGO_PKG_VERSION"));

/// Per-request bound for capabilities built without [`default_registry`].
pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Create the capability registry from the `[tools]` config section.
///
/// Capabilities are registered in the order they are listed in
/// `tools.enabled`. Unknown names are skipped with a warning. Each HTTP
/// request is bounded by `request_timeout`, normally the agent's tool
/// timeout.
pub fn default_registry(
    config: &ToolsConfig,
    request_timeout: Duration,
) -> Result<CapabilityRegistry, ToolError> {
    let mut registry = CapabilityRegistry::new();

    for name in &config.enabled {
        match name.as_str() {
            arxiv::IDENTIFIER => registry.register(Arc::new(
                ArxivCapability::new(config.arxiv.clone()).with_timeout(request_timeout),
            ))?,
            wikipedia::IDENTIFIER => registry.register(Arc::new(
                WikipediaCapability::new(config.wikipedia.clone()).with_timeout(request_timeout),
            ))?,
            web_search::IDENTIFIER => registry.register(Arc::new(
                TavilySearchCapability::new(
                    config.tavily_api_key.clone(),
                    config.web_search.clone(),
                )
                .with_timeout(request_timeout),
            ))?,
            other => {
                warn!(tool = %other, "Ignoring unknown tool in config");
                continue;
            }
        }
        debug!(tool = %name, "Registered capability");
    }

    Ok(registry)
}

/// Shared HTTP client for capabilities.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Map a transport error onto the capability error taxonomy.
pub(crate) fn request_error(tool_name: &str, err: reqwest::Error, timeout: Duration) -> ToolError {
    if err.is_timeout() {
        ToolError::Timeout {
            tool_name: tool_name.into(),
            timeout_secs: timeout.as_secs(),
        }
    } else {
        ToolError::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: err.to_string(),
        }
    }
}

/// Map a non-success HTTP status onto the capability error taxonomy.
pub(crate) fn status_error(tool_name: &str, status: reqwest::StatusCode) -> ToolError {
    if status.as_u16() == 429 {
        ToolError::RateLimited {
            tool_name: tool_name.into(),
        }
    } else {
        ToolError::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: format!("HTTP {status}"),
        }
    }
}

/// Reject blank queries before hitting the network.
pub(crate) fn require_query(query: &str) -> Result<&str, ToolError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        Err(ToolError::InvalidQuery("query is empty".into()))
    } else {
        Ok(trimmed)
    }
}

/// Cap a digest at `max_chars` characters, on a char boundary.
pub(crate) fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text,
    }
}

/// Collapse runs of whitespace (arXiv wraps titles and abstracts).
pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Basic XML/HTML entity decoding.
pub(crate) fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
