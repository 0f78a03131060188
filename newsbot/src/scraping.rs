use anyhow::{Context, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("article fetch for {url} failed with status {status}")]
    Status { url: String, status: u16 },
    #[error("article fetch for {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Retrieves the readable body text of an article page.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_body(&self, url: &str) -> Result<String, FetchError>;
}

/// Fetches pages over HTTP and keeps the text of every `<p>` element.
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("newsbot/0.1.0")
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_body(&self, url: &str) -> Result<String, FetchError> {
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let html = response.text().await.map_err(transport)?;
        let text = extract_paragraphs(&html);
        info!("scraping: extracted {} chars from {}", text.len(), url);
        Ok(text)
    }
}

/// Join the text of all paragraphs in the document with single spaces.
pub fn extract_paragraphs(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(paragraphs) = Selector::parse("p") else {
        return String::new();
    };
    document
        .select(&paragraphs)
        .map(|p| p.text().collect::<String>())
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
