use anyhow::{Context, Result};
use chrono::{DateTime, Days, NaiveDate, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::story::Story;
use crate::window::Window;

/// Stories older than this, relative to load time, are dropped from the window.
pub const RETENTION_HORIZON_HOURS: i64 = 25;

pub fn retention_horizon() -> chrono::Duration {
    chrono::Duration::hours(RETENTION_HORIZON_HOURS)
}

/// File-backed store of topic windows, partitioned by UTC calendar day:
/// `<root>/<topic>/news_YYYYMMDD.json`.
#[derive(Debug, Clone)]
pub struct StoryStore {
    root: PathBuf,
}

impl StoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn topic_dir(&self, topic: &str) -> PathBuf {
        self.root.join(topic)
    }

    pub fn partition_path(&self, topic: &str, day: NaiveDate) -> PathBuf {
        self.topic_dir(topic)
            .join(format!("news_{}.json", day.format("%Y%m%d")))
    }

    /// Load the window for `topic`: today's partition merged with yesterday's
    /// (today wins on id conflicts), minus stories past the retention horizon.
    /// The partition from two days back is deleted.
    pub async fn load(&self, topic: &str, now: DateTime<Utc>) -> Result<Window> {
        let dir = self.topic_dir(topic);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create partition directory: {}", dir.display()))?;

        let today = now.date_naive();
        let current = self.read_partition(&self.partition_path(topic, today)).await?;
        let previous = match today.pred_opt() {
            Some(yesterday) => self.read_partition(&self.partition_path(topic, yesterday)).await?,
            None => Vec::new(),
        };

        let mut window = Window::from_stories(current.into_iter().chain(previous));
        let merged = window.len();
        let horizon = retention_horizon();
        window.retain(|s| s.age(now) <= horizon);
        debug!(
            topic,
            merged,
            expired = merged - window.len(),
            "loaded story window"
        );

        if let Some(old_day) = today.checked_sub_days(Days::new(2)) {
            self.remove_partition(&self.partition_path(topic, old_day)).await;
        }

        Ok(window)
    }

    /// Atomically replace today's partition with the given window.
    pub async fn persist(&self, topic: &str, now: DateTime<Utc>, window: &Window) -> Result<PathBuf> {
        let dir = self.topic_dir(topic);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create partition directory: {}", dir.display()))?;

        let path = self.partition_path(topic, now.date_naive());
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(window.stories())
            .context("Failed to serialize story window")?;

        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write partition: {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to replace partition: {}", path.display()))?;

        info!(topic, stories = window.len(), path = %path.display(), "persisted story window");
        Ok(path)
    }

    /// Missing partitions are empty; unparseable ones are logged and treated as empty.
    async fn read_partition(&self, path: &Path) -> Result<Vec<Story>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read partition: {}", path.display()))
            }
        };

        match serde_json::from_slice::<Vec<Story>>(&bytes) {
            Ok(stories) => Ok(stories),
            Err(e) => {
                warn!(path = %path.display(), "corrupt partition treated as empty: {}", e);
                Ok(Vec::new())
            }
        }
    }

    async fn remove_partition(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => info!(path = %path.display(), "removed expired partition"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), "failed to remove expired partition: {}", e),
        }
    }
}
