use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Feed};
use feed_rs::parser;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Google News RSS search endpoint.
pub const DEFAULT_GOOGLE_NEWS_URL: &str = "https://news.google.com/rss/search";

/// One hit returned by a news search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub title: String,
    pub source_name: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub byline: Option<String>,
}

/// News search collaborator. May return zero results; order is not meaningful.
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    async fn fetch(
        &self,
        query: &str,
        language: &str,
        staleness: chrono::Duration,
    ) -> Result<Vec<SearchResult>>;
}

/// Searches Google News through its RSS endpoint.
pub struct GoogleNewsSearch {
    base_url: String,
    client: Client,
}

impl GoogleNewsSearch {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("newsbot/0.1.0")
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    /// `q=<query> when:<N>h&hl=<language>`; the `when:` operator bounds result age.
    pub fn search_url(&self, query: &str, language: &str, staleness: chrono::Duration) -> Result<Url> {
        let hours = staleness.num_hours().max(1);
        Url::parse_with_params(
            &self.base_url,
            &[
                ("q", format!("{} when:{}h", query, hours)),
                ("hl", language.to_string()),
            ],
        )
        .with_context(|| format!("invalid search base URL: {}", self.base_url))
    }

    /// Fetch and parse the feed, retrying server errors, rate limits and
    /// network failures up to three attempts in total.
    async fn fetch_feed(&self, url: &Url) -> Result<Feed> {
        let max_retries = 3;
        let mut last_error = None;

        for attempt in 1..=max_retries {
            if attempt > 1 {
                let backoff = Duration::from_secs(2u64.pow(attempt - 2)); // 1s, 2s
                tracing::info!(
                    "Retrying search fetch (attempt {}/{}) after {:?}...",
                    attempt,
                    max_retries,
                    backoff
                );
                tokio::time::sleep(backoff).await;
            }

            match self.client.get(url.clone()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let bytes = response.bytes().await.context("failed to read response body")?;
                        let feed = parser::parse(bytes.as_ref()).context("failed to parse feed")?;
                        return Ok(feed);
                    } else if status.is_server_error()
                        || status == reqwest::StatusCode::TOO_MANY_REQUESTS
                    {
                        last_error = Some(anyhow::anyhow!("search fetch failed: {}", status));
                        continue;
                    } else {
                        // Client error (4xx) - likely permanent, don't retry
                        return Err(anyhow::anyhow!("search fetch failed with status: {}", status));
                    }
                }
                Err(e) => {
                    last_error = Some(anyhow::Error::new(e).context("network error during search"));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("unknown error after retries")))
    }
}

#[async_trait::async_trait]
impl SearchProvider for GoogleNewsSearch {
    async fn fetch(
        &self,
        query: &str,
        language: &str,
        staleness: chrono::Duration,
    ) -> Result<Vec<SearchResult>> {
        let url = self.search_url(query, language, staleness)?;
        let feed = self.fetch_feed(&url).await?;
        let results: Vec<SearchResult> = feed.entries.iter().filter_map(entry_to_result).collect();
        debug!(
            "search '{}' returned {} entries, {} usable",
            query,
            feed.entries.len(),
            results.len()
        );
        Ok(results)
    }
}

/// Convert a feed entry; entries without a link are dropped.
pub fn entry_to_result(entry: &Entry) -> Option<SearchResult> {
    let url = entry.links.first().map(|l| l.href.trim().to_string())?;
    if url.is_empty() {
        return None;
    }
    let raw_title = entry
        .title
        .as_ref()
        .map(|t| t.content.clone())
        .unwrap_or_default();
    let (title, source_name) = split_source(&raw_title);

    Some(SearchResult {
        title,
        source_name,
        url,
        published_at: entry.published.or(entry.updated),
        byline: entry
            .authors
            .first()
            .map(|p| p.name.trim().to_string())
            .filter(|n| !n.is_empty()),
    })
}

/// Google News titles read "Headline - Source"; split off the source.
pub fn split_source(raw_title: &str) -> (String, String) {
    match raw_title.rsplit_once(" - ") {
        Some((title, source)) if !title.trim().is_empty() && !source.trim().is_empty() => {
            (title.trim().to_string(), source.trim().to_string())
        }
        _ => (raw_title.trim().to_string(), String::new()),
    }
}
