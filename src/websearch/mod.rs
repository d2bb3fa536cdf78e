//! Web search collaborator used when the knowledge store has nothing to offer
//!
//! Uses the DuckDuckGo HTML endpoint (no API key required). Failures are
//! logged and reported as an empty result list.

use crate::config::{parse_duration, WebSearchConfig};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WebSearchError {
    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Search failed: {0}")]
    Request(String),

    #[error("Search returned status {0}")]
    Status(u16),
}

/// One search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub body: String,
}

/// Web search backend; never fails, an outage is an empty list
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Vec<WebResult>;
}

/// Always-empty search, used when the fallback is disabled
pub struct DisabledWebSearch;

#[async_trait]
impl WebSearch for DisabledWebSearch {
    async fn search(&self, _query: &str, _max_results: usize) -> Vec<WebResult> {
        Vec::new()
    }
}

/// DuckDuckGo HTML search
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGoSearch {
    pub fn new(config: &WebSearchConfig) -> Result<Self, WebSearchError> {
        let timeout = parse_duration(&config.timeout).unwrap_or(Duration::from_secs(10));
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(timeout)
            .build()
            .map_err(|e| WebSearchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    async fn try_search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<WebResult>, WebSearchError> {
        let url = format!("{}?q={}", self.endpoint, urlencoding::encode(query));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WebSearchError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(WebSearchError::Status(response.status().as_u16()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| WebSearchError::Request(format!("Read failed: {e}")))?;

        Ok(parse_results(&html, max_results))
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str, max_results: usize) -> Vec<WebResult> {
        match self.try_search(query, max_results).await {
            Ok(results) => {
                tracing::debug!(results = results.len(), "Web search completed");
                results
            }
            Err(e) => {
                tracing::error!("Web search error: {}", e);
                Vec::new()
            }
        }
    }
}

/// Build the configured web search backend
pub fn build_web_search(config: &WebSearchConfig) -> Result<std::sync::Arc<dyn WebSearch>, WebSearchError> {
    if config.enabled {
        Ok(std::sync::Arc::new(DuckDuckGoSearch::new(config)?))
    } else {
        Ok(std::sync::Arc::new(DisabledWebSearch))
    }
}

fn tag_regex() -> &'static Regex {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"))
}

/// Strip markup and decode the handful of entities DuckDuckGo emits
fn clean_html(fragment: &str) -> String {
    let text = tag_regex().replace_all(fragment, "");
    text.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .trim()
        .to_string()
}

fn parse_results(html: &str, max: usize) -> Vec<WebResult> {
    let mut results = Vec::new();

    for segment in html.split("class=\"result__a\"").skip(1) {
        if results.len() >= max {
            break;
        }

        let title = extract_between(segment, ">", "</a>")
            .map(|t| clean_html(&t))
            .unwrap_or_default();

        let body = segment
            .split("class=\"result__snippet\"")
            .nth(1)
            .and_then(|snip| extract_between(snip, ">", "</a>"))
            .map(|s| clean_html(&s))
            .unwrap_or_default();

        if !title.is_empty() {
            results.push(WebResult { title, body });
        }
    }

    results
}

fn extract_between(text: &str, start: &str, end: &str) -> Option<String> {
    let start_idx = text.find(start)? + start.len();
    let remaining = &text[start_idx..];
    let end_idx = remaining.find(end)?;
    Some(remaining[..end_idx].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
<div class="result">
  <a rel="nofollow" class="result__a" href="https://example.com/paris">Paris &amp; <b>France</b></a>
  <a class="result__snippet" href="https://example.com/paris">Paris is the <b>capital</b> of France.</a>
</div>
<div class="result">
  <a rel="nofollow" class="result__a" href="https://example.com/2">Second hit</a>
  <a class="result__snippet" href="https://example.com/2">Another &quot;snippet&quot;</a>
</div>
<div class="result">
  <a rel="nofollow" class="result__a" href="https://example.com/3">Third hit</a>
</div>
"#;

    #[test]
    fn test_parse_results() {
        let results = parse_results(SAMPLE, 5);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].title, "Paris & France");
        assert_eq!(results[0].body, "Paris is the capital of France.");
        assert_eq!(results[1].body, "Another \"snippet\"");
        assert_eq!(results[2].body, "");
    }

    #[test]
    fn test_parse_results_respects_max() {
        assert_eq!(parse_results(SAMPLE, 2).len(), 2);
        assert!(parse_results(SAMPLE, 0).is_empty());
    }

    #[test]
    fn test_parse_results_no_hits() {
        assert!(parse_results("<html><body>No results.</body></html>", 3).is_empty());
    }

    #[tokio::test]
    async fn test_disabled_search_is_empty() {
        assert!(DisabledWebSearch.search("anything", 3).await.is_empty());
    }
}
