use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use common::TopicConfig;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::dedup::{self, MergeOutcome};
use crate::embedding::Embedder;
use crate::ingestion::SearchProvider;
use crate::llm::summarizer::Summarizer;
use crate::publisher::Publisher;
use crate::scraping::PageFetcher;
use crate::selector::{self, Selection};
use crate::similarity;
use crate::staleness;
use crate::storage::{self, StoryStore};
use crate::story::{Story, StoryId};
use crate::summary_gate::{self, SummaryReport};
use crate::window::Window;

/// Per-topic settings as the stages consume them.
#[derive(Debug, Clone)]
pub struct TopicSettings {
    pub name: String,
    pub search_query: String,
    pub language: String,
    pub staleness: chrono::Duration,
    /// Empty means every source is accepted
    pub acceptable_sources: BTreeSet<String>,
    pub verified_sources: BTreeSet<String>,
    pub similarity_threshold: Option<f32>,
}

impl TopicSettings {
    pub fn from_config(name: &str, config: &TopicConfig) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            search_query: config.search_query.clone(),
            language: config.language.clone(),
            staleness: config.staleness_window()?,
            acceptable_sources: config.acceptable_sources.clone(),
            verified_sources: config.verified_sources.clone(),
            similarity_threshold: config.similarity_threshold,
        })
    }

    fn accepts_source(&self, source: &str) -> bool {
        self.acceptable_sources.is_empty() || self.acceptable_sources.contains(source)
    }
}

/// External services a topic run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub search: Arc<dyn SearchProvider>,
    pub pages: Arc<dyn PageFetcher>,
    pub summarizer: Arc<dyn Summarizer>,
    pub embedder: Option<Arc<dyn Embedder>>,
    pub publisher: Arc<dyn Publisher>,
}

/// What one run did, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub found: usize,
    pub rejected_sources: usize,
    pub added: usize,
    pub duplicates: usize,
    pub ingest_failures: usize,
    pub stale: usize,
    pub summaries: SummaryReport,
    pub suppressed: usize,
    pub published: Option<StoryId>,
    pub window_size: usize,
}

/// Runs the story lifecycle for one topic:
/// load → dedup → staleness → summarize → suppress → select → persist.
///
/// Nothing is written until the last stage, so a run that is dropped midway
/// leaves the previous partition untouched. Callers must not run the same
/// topic twice concurrently.
pub struct TopicRunner {
    settings: TopicSettings,
    store: StoryStore,
    collaborators: Collaborators,
}

impl TopicRunner {
    pub fn new(settings: TopicSettings, store: StoryStore, collaborators: Collaborators) -> Result<Self> {
        if settings.similarity_threshold.is_some() && collaborators.embedder.is_none() {
            bail!(
                "topic '{}' sets a similarity threshold but no embedder is configured",
                settings.name
            );
        }
        Ok(Self {
            settings,
            store,
            collaborators,
        })
    }

    pub fn topic(&self) -> &str {
        &self.settings.name
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunReport> {
        let topic = self.settings.name.as_str();
        let mut report = RunReport::default();

        let mut window = self.store.load(topic, now).await?;
        debug!(topic, stories = window.len(), "window loaded");

        self.ingest(&mut window, now, &mut report).await;
        info!(topic, new = report.added, total = window.len(), "ingestion done");

        report.stale = staleness::mark_stale(&mut window, self.settings.staleness, now);

        report.summaries =
            summary_gate::fill_missing_summaries(&mut window, self.collaborators.summarizer.as_ref()).await;

        if let (Some(threshold), Some(embedder)) = (
            self.settings.similarity_threshold,
            self.collaborators.embedder.as_ref(),
        ) {
            report.suppressed =
                similarity::suppress_near_duplicates(&mut window, threshold, |a, b| embedder.similarity(a, b));
        }

        let selection =
            selector::publish_one(&mut window, topic, self.collaborators.publisher.as_ref()).await;
        if let Selection::Published(id) = selection {
            report.published = Some(id);
        }

        report.window_size = window.len();
        self.store.persist(topic, now, &window).await?;
        Ok(report)
    }

    /// Search, filter by source, and merge unseen stories into the window.
    /// Failures here only skip the affected item; it is retried next run.
    async fn ingest(&self, window: &mut Window, now: DateTime<Utc>, report: &mut RunReport) {
        let settings = &self.settings;
        let results = match self
            .collaborators
            .search
            .fetch(&settings.search_query, &settings.language, settings.staleness)
            .await
        {
            Ok(results) => results,
            Err(e) => {
                warn!(topic = %settings.name, "search failed, continuing with stored stories: {:#}", e);
                return;
            }
        };
        report.found = results.len();
        let horizon = storage::retention_horizon();

        for result in results {
            if !settings.accepts_source(&result.source_name) {
                info!("unacceptable result: '{}' from '{}'", result.title, result.source_name);
                report.rejected_sources += 1;
                continue;
            }
            if dedup::is_known(window, &result.url) {
                debug!("story '{}' already exists, skipping", result.title);
                report.duplicates += 1;
                continue;
            }
            if result.published_at.is_some_and(|p| now - p > horizon) {
                debug!("story '{}' is older than the retention horizon, skipping", result.title);
                continue;
            }

            let body = match self.collaborators.pages.fetch_body(&result.url).await {
                Ok(body) if !body.trim().is_empty() => body,
                Ok(_) => {
                    warn!("no article text found for '{}'", result.url);
                    report.ingest_failures += 1;
                    continue;
                }
                Err(e) => {
                    warn!("{}", e);
                    report.ingest_failures += 1;
                    continue;
                }
            };

            let embedding = match (settings.similarity_threshold, &self.collaborators.embedder) {
                (Some(_), Some(embedder)) => match embedder.embed(&body).await {
                    Ok(vector) => Some(vector),
                    Err(e) => {
                        warn!("failed to embed '{}': {:#}", result.url, e);
                        report.ingest_failures += 1;
                        continue;
                    }
                },
                _ => None,
            };

            let verified = settings.verified_sources.contains(&result.source_name);
            let story = Story::discover(&settings.name, &result, body, embedding, verified, now);
            match dedup::merge(window, story) {
                MergeOutcome::Added => report.added += 1,
                MergeOutcome::Duplicate => report.duplicates += 1,
            }
        }
    }
}
