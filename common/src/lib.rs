/*!
common/src/lib.rs

Shared configuration types for newsbot.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader that merges a default file with an optional override file
- Helpers to interpret per-topic settings (staleness windows)
*/

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Staleness window used when a topic does not set one.
pub const DEFAULT_STALENESS: &str = "24h";

/// Minutes between two runs of the same topic when the scheduler section is silent.
pub const DEFAULT_INTERVAL_MINUTES: u64 = 5;

/// Where topic windows are persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for partitions (one sub-directory per topic)
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "news".to_string()
}

/// Run cadence configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub interval_minutes: Option<u64>,
}

impl SchedulerConfig {
    pub fn interval_minutes(&self) -> u64 {
        self.interval_minutes
            .filter(|m| *m > 0)
            .unwrap_or(DEFAULT_INTERVAL_MINUTES)
    }
}

/// Remote LLM endpoint (OpenAI-compatible HTTP API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
}

/// LLM top-level config, one endpoint per task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    pub summarization: Option<RemoteLlmConfig>,
    /// Required as soon as one topic declares a similarity threshold
    pub embedding: Option<RemoteLlmConfig>,
}

/// News search provider settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    pub base_url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Publishing channel credentials for one topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    pub api_url: Option<String>,
    /// Name of the environment variable holding the bearer token
    pub token_env: String,
}

/// Per-topic settings. The topic name is the key of the `[topics.<name>]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    pub search_query: String,
    #[serde(default = "default_language")]
    pub language: String,
    /// Window such as "24h" or "2d"; also passed to the search provider
    pub staleness: Option<String>,
    #[serde(default)]
    pub acceptable_sources: BTreeSet<String>,
    #[serde(default)]
    pub verified_sources: BTreeSet<String>,
    /// Enables embedding-based near-duplicate suppression when present
    pub similarity_threshold: Option<f32>,
    pub publisher: Option<PublisherConfig>,
}

fn default_language() -> String {
    "en".to_string()
}

impl TopicConfig {
    /// Parsed staleness window, falling back to [`DEFAULT_STALENESS`].
    pub fn staleness_window(&self) -> Result<chrono::Duration> {
        parse_staleness(self.staleness.as_deref().unwrap_or(DEFAULT_STALENESS))
    }
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    pub llm: Option<LlmConfig>,
    pub search: Option<SearchConfig>,
    #[serde(default)]
    pub topics: BTreeMap<String, TopicConfig>,
}

impl Config {
    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(
        default_path: Option<&Path>,
        override_path: Option<&Path>,
    ) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value
            .try_into()
            .context("Failed to parse merged configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings that would only fail later, in the middle of a run.
    pub fn validate(&self) -> Result<()> {
        for (name, topic) in &self.topics {
            topic
                .staleness_window()
                .with_context(|| format!("topic '{}' has an invalid staleness window", name))?;
            if let Some(threshold) = topic.similarity_threshold {
                if !(-1.0..=1.0).contains(&threshold) {
                    bail!(
                        "topic '{}': similarity_threshold {} is outside [-1, 1]",
                        name,
                        threshold
                    );
                }
            }
        }
        Ok(())
    }

    /// True when at least one topic needs embeddings.
    pub fn needs_embeddings(&self) -> bool {
        self.topics
            .values()
            .any(|t| t.similarity_threshold.is_some())
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// Parse a staleness window written as `<n>h` (hours) or `<n>d` (days).
pub fn parse_staleness(raw: &str) -> Result<chrono::Duration> {
    let raw = raw.trim();
    let Some(unit) = raw.chars().last() else {
        bail!("staleness window is empty");
    };
    let digits = &raw[..raw.len() - unit.len_utf8()];
    let amount: i64 = digits
        .parse()
        .with_context(|| format!("invalid staleness window '{}'", raw))?;
    if amount <= 0 {
        bail!("staleness window must be positive, got '{}'", raw);
    }
    let window = match unit {
        'h' => chrono::Duration::try_hours(amount),
        'd' => chrono::Duration::try_days(amount),
        _ => bail!("staleness window '{}' must end in 'h' or 'd'", raw),
    };
    window.with_context(|| format!("staleness window '{}' is out of range", raw))
}
