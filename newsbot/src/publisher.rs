use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default X (Twitter) API v2 endpoint for creating posts.
pub const DEFAULT_X_API_URL: &str = "https://api.twitter.com/2/tweets";

/// Post length limit enforced by X.
pub const MAX_POST_CHARS: usize = 280;

/// Every link counts as this many chars once X shortens it.
pub const SHORTENED_LINK_CHARS: usize = 23;

/// Why a publish attempt failed. The selector branches on the variant.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The text does not fit the channel; the story needs a shorter summary.
    #[error("message too long")]
    TooLong,
    #[error("publish rejected: {0}")]
    Rejected(String),
}

/// Outbound channel for selected stories.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, text: &str, url: &str) -> Result<(), PublishError>;
}

/// Publisher for the X API v2 using an OAuth 2.0 user-context bearer token.
pub struct XPublisher {
    api_url: String,
    token: String,
    client: reqwest::Client,
}

impl XPublisher {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self {
            api_url: api_url.into(),
            token: token.into(),
            client,
        })
    }
}

#[derive(Debug, Serialize)]
struct CreatePost<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct ApiProblem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    errors: Vec<ApiProblemItem>,
}

#[derive(Debug, Deserialize)]
struct ApiProblemItem {
    #[serde(default)]
    message: Option<String>,
}

impl ApiProblem {
    fn reason(&self) -> Option<String> {
        self.detail
            .clone()
            .or_else(|| self.errors.iter().find_map(|e| e.message.clone()))
            .or_else(|| self.title.clone())
    }
}

/// Would `text` plus a shortened link exceed the post limit?
pub fn exceeds_post_limit(text: &str) -> bool {
    text.chars().count() + 1 + SHORTENED_LINK_CHARS > MAX_POST_CHARS
}

/// Map a rejection body to a typed reason.
fn classify_rejection(status: reqwest::StatusCode, body: &str) -> PublishError {
    let problem: ApiProblem = serde_json::from_str(body).unwrap_or_default();
    let reason = problem.reason().unwrap_or_else(|| body.to_string());
    if reason.to_lowercase().contains("too long") {
        PublishError::TooLong
    } else {
        PublishError::Rejected(format!("{}: {}", status, reason))
    }
}

#[async_trait::async_trait]
impl Publisher for XPublisher {
    async fn publish(&self, text: &str, url: &str) -> Result<(), PublishError> {
        if exceeds_post_limit(text) {
            return Err(PublishError::TooLong);
        }
        let post = format!("{} {}", text, url);

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.token)
            .json(&CreatePost { text: &post })
            .send()
            .await
            .map_err(|e| PublishError::Rejected(format!("network error: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            debug!("post accepted with status {}", status);
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_rejection(status, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_limit_accounts_for_shortened_link() {
        assert!(!exceeds_post_limit(&"a".repeat(256)));
        assert!(exceeds_post_limit(&"a".repeat(257)));
    }

    #[test]
    fn too_long_detail_maps_to_typed_reason() {
        let body = r#"{"title":"Forbidden","detail":"Your Tweet text is too long.","type":"about:blank","status":403}"#;
        assert!(matches!(
            classify_rejection(reqwest::StatusCode::FORBIDDEN, body),
            PublishError::TooLong
        ));
    }

    #[test]
    fn other_rejections_keep_their_reason() {
        let body = r#"{"detail":"You are not allowed to create a Tweet with duplicate content."}"#;
        match classify_rejection(reqwest::StatusCode::FORBIDDEN, body) {
            PublishError::Rejected(reason) => assert!(reason.contains("duplicate content")),
            other => panic!("unexpected {:?}", other),
        }

        match classify_rejection(reqwest::StatusCode::BAD_GATEWAY, "upstream down") {
            PublishError::Rejected(reason) => assert!(reason.contains("upstream down")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
