//! arXiv capability — searches the arXiv export API and summarizes papers.

use async_trait::async_trait;
use std::time::Duration;
use toolchat_config::ArxivConfig;
use toolchat_core::error::ToolError;
use toolchat_core::tool::Capability;
use tracing::debug;

use crate::{
    DEFAULT_REQUEST_TIMEOUT, collapse_whitespace, decode_entities, http_client, request_error,
    status_error,
};

pub const IDENTIFIER: &str = "arxiv";

const API_URL: &str = "https://export.arxiv.org/api/query";

pub struct ArxivCapability {
    config: ArxivConfig,
    client: reqwest::Client,
    timeout: Duration,
}

impl ArxivCapability {
    pub fn new(config: ArxivConfig) -> Self {
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
}

#[async_trait]
impl Capability for ArxivCapability {
    fn identifier(&self) -> &str {
        IDENTIFIER
    }

    fn description(&self) -> &str {
        "A wrapper around arXiv.org. Useful for questions about physics, mathematics, \
         computer science, quantitative biology, statistics and related fields, \
         from scientific articles on arxiv.org. Input should be a search query."
    }

    async fn invoke(&self, query: &str) -> Result<String, ToolError> {
        let query = crate::require_query(query)?;
        let max_results = self.config.top_k_results.to_string();

        debug!(query = %query, "Querying arXiv");

        let response = self
            .client
            .get(API_URL)
            .query(&[
                ("search_query", format!("all:{query}")),
                ("start", "0".to_string()),
                ("max_results", max_results),
            ])
            .send()
            .await
            .map_err(|e| request_error(IDENTIFIER, e, self.timeout))?;

        if !response.status().is_success() {
            return Err(status_error(IDENTIFIER, response.status()));
        }

        let feed = response
            .text()
            .await
            .map_err(|e| request_error(IDENTIFIER, e, self.timeout))?;

        let papers = parse_feed(&feed);
        if papers.is_empty() {
            return Ok("No good Arxiv Result was found".into());
        }

        let digest = papers
            .iter()
            .take(self.config.top_k_results)
            .map(Paper::render)
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(crate::truncate_chars(digest, self.config.max_chars))
    }
}

/// One `<entry>` of an arXiv Atom feed.
#[derive(Debug, Clone, PartialEq)]
struct Paper {
    published: String,
    title: String,
    authors: Vec<String>,
    summary: String,
}

impl Paper {
    fn render(&self) -> String {
        format!(
            "Published: {}\nTitle: {}\nAuthors: {}\nSummary: {}",
            self.published,
            self.title,
            self.authors.join(", "),
            self.summary
        )
    }
}

/// Extract papers from an Atom feed (simple, regex-free extraction).
fn parse_feed(feed: &str) -> Vec<Paper> {
    feed.split("<entry>")
        .skip(1)
        .filter_map(|chunk| {
            let entry = chunk.split("</entry>").next().unwrap_or(chunk);
            let title = tag_text(entry, "title")?;
            let published = tag_text(entry, "published")
                .map(|p| p.chars().take(10).collect())
                .unwrap_or_default();
            let summary = tag_text(entry, "summary").unwrap_or_default();
            let authors = entry
                .split("<author>")
                .skip(1)
                .filter_map(|a| tag_text(a, "name"))
                .collect();

            Some(Paper {
                published,
                title,
                authors,
                summary,
            })
        })
        .collect()
}

/// Text between the first `<tag ...>` and `</tag>`, decoded and collapsed.
fn tag_text(chunk: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    let start = chunk.find(&open)?;
    let after_open = &chunk[start..];
    let body_start = after_open.find('>')? + 1;
    let body = &after_open[body_start..];
    let end = body.find(&close)?;

    let text = collapse_whitespace(&decode_entities(&body[..end]));
    if text.is_empty() { None } else { Some(text) }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: search_query=all:attention</title>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <updated>2023-08-02T00:41:18Z</updated>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All
      You Need</title>
    <summary>  The dominant sequence transduction models are based on complex
recurrent or convolutional neural networks &amp; attention.
    </summary>
    <author>
      <name>Ashish Vaswani</name>
    </author>
    <author>
      <name>Noam Shazeer</name>
    </author>
  </entry>
  <entry>
    <published>2018-10-11T00:50:01Z</published>
    <title>BERT: Pre-training of Deep Bidirectional Transformers</title>
    <summary>We introduce a new language representation model.</summary>
    <author><name>Jacob Devlin</name></author>
  </entry>
</feed>"#;

    #[test]
    fn parses_entries_and_ignores_feed_title() {
        let papers = parse_feed(FEED);
        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0].title, "Attention Is All You Need");
        assert_eq!(papers[0].published, "2017-06-12");
        assert_eq!(papers[0].authors, vec!["Ashish Vaswani", "Noam Shazeer"]);
        assert!(papers[0].summary.ends_with("neural networks & attention."));
        assert_eq!(papers[1].authors, vec!["Jacob Devlin"]);
    }

    #[test]
    fn renders_digest_block() {
        let papers = parse_feed(FEED);
        let block = papers[1].render();
        assert_eq!(
            block,
            "Published: 2018-10-11\n\
             Title: BERT: Pre-training of Deep Bidirectional Transformers\n\
             Authors: Jacob Devlin\n\
             Summary: We introduce a new language representation model."
        );
    }

    #[test]
    fn empty_feed_has_no_papers() {
        let feed = r#"<feed><title>ArXiv Query</title><opensearch:totalResults>0</opensearch:totalResults></feed>"#;
        assert!(parse_feed(feed).is_empty());
    }

    #[tokio::test]
    async fn blank_query_fails_without_network() {
        let cap = ArxivCapability::new(ArxivConfig::default());
        assert!(matches!(
            cap.invoke("  ").await,
            Err(ToolError::InvalidQuery(_))
        ));
    }
}
