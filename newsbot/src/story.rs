use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::ingestion::SearchResult;

/// Stable identity of a story: hex SHA-256 of its source URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryId(String);

impl StoryId {
    pub fn from_url(url: &str) -> Self {
        let digest = Sha256::digest(url.as_bytes());
        Self(format!("{:x}", digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One news item tracked from discovery until it ages out of the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: StoryId,
    pub topic: String,
    pub title: String,
    pub source_name: String,
    pub url: String,
    #[serde(default)]
    pub byline: Option<String>,
    #[serde(with = "timestamp")]
    pub discovered_at: DateTime<Utc>,
    pub body_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub summary: Option<String>,
    pub is_verified_source: bool,
    pub is_summarized: bool,
    pub is_publishable: bool,
    pub is_published: bool,
}

impl Story {
    /// Build a freshly discovered story. `discovered_at` is the provider's
    /// publication time when known, otherwise `now`.
    pub fn discover(
        topic: &str,
        result: &SearchResult,
        body_text: String,
        embedding: Option<Vec<f32>>,
        is_verified_source: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: StoryId::from_url(&result.url),
            topic: topic.to_string(),
            title: result.title.clone(),
            source_name: result.source_name.clone(),
            url: result.url.clone(),
            byline: result.byline.clone(),
            discovered_at: result.published_at.unwrap_or(now),
            body_text,
            embedding,
            summary: None,
            is_verified_source,
            is_summarized: false,
            is_publishable: true,
            is_published: false,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.discovered_at
    }

    /// Attach a generated summary and mark the story summarized.
    pub fn attach_summary(&mut self, summary: String) {
        self.summary = Some(summary);
        self.is_summarized = true;
    }

    /// Case-insensitive check for the topic name inside the summary.
    pub fn summary_mentions(&self, topic_name: &str) -> bool {
        let needle = topic_name.to_lowercase();
        self.summary
            .as_deref()
            .is_some_and(|s| s.to_lowercase().contains(&needle))
    }

    /// A story may be published when it comes from a verified source or its
    /// summary names the topic.
    pub fn passes_verification(&self, topic_name: &str) -> bool {
        self.is_verified_source || self.summary_mentions(topic_name)
    }

    pub fn is_eligible(&self, topic_name: &str) -> bool {
        self.is_publishable
            && !self.is_published
            && self.is_summarized
            && self.passes_verification(topic_name)
    }
}

/// Fixed-format timestamp used in partition files: `%Y-%m-%d %H:%M:%S` (UTC).
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let naive = NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)?;
        Ok(Utc.from_utc_datetime(&naive))
    }
}
