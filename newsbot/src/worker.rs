use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::select;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Duration;
use tracing::{error, info};

use crate::pipeline::{RunReport, TopicRunner};

/// Run one topic once and log the outcome. A failed run has persisted nothing.
pub async fn run_once(runner: &TopicRunner) -> Option<RunReport> {
    let topic = runner.topic();
    match runner.run(Utc::now()).await {
        Ok(report) => {
            info!(
                topic,
                found = report.found,
                new = report.added,
                stale = report.stale,
                summarized = report.summaries.generated,
                suppressed = report.suppressed,
                published = ?report.published,
                window = report.window_size,
                "run complete"
            );
            Some(report)
        }
        Err(e) => {
            error!(topic, "run failed: {:#}", e);
            None
        }
    }
}

/// Run every topic once, concurrently, and return how many runs failed.
pub async fn run_all_once(runners: Vec<Arc<TopicRunner>>) -> usize {
    let mut tasks = JoinSet::new();
    for runner in runners {
        tasks.spawn(async move { run_once(&runner).await.is_some() });
    }

    let mut failures = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(true) => {}
            Ok(false) => failures += 1,
            Err(e) => {
                error!(%e, "topic task panicked");
                failures += 1;
            }
        }
    }
    failures
}

/// Top-level worker: one loop per topic, each running every `interval` until
/// `shutdown` flips to true. Topics never share a run, so a topic is never
/// processed twice at once. Shutdown is only observed between runs.
pub async fn run_worker(
    runners: Vec<Arc<TopicRunner>>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    info!(topics = runners.len(), ?interval, "worker: starting topic loops");

    let mut tasks = JoinSet::new();
    for runner in runners {
        tasks.spawn(topic_loop(runner, interval, shutdown.clone()));
    }
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!(%e, "topic loop panicked");
        }
    }

    info!("worker: cleanup complete");
    Ok(())
}

async fn topic_loop(runner: Arc<TopicRunner>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    let topic = runner.topic().to_string();
    loop {
        if *shutdown.borrow() {
            break;
        }

        // Never cancelled mid-run: a publish must be followed by its persist.
        run_once(&runner).await;

        select! {
            _ = tokio::time::sleep(interval) => {},
            _ = shutdown.changed() => {
                info!(topic = %topic, "shutdown requested, exiting loop");
                break;
            }
        }
    }
}
