/*
newsbot - single-binary main.rs
Loads the topic configuration, wires the collaborators and runs one loop per topic.
*/

use anyhow::{bail, Context, Result};
use clap::Parser;
use common::{Config, RemoteLlmConfig, TopicConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use newsbot::embedding::{Embedder, LlmEmbedder};
use newsbot::ingestion::{GoogleNewsSearch, DEFAULT_GOOGLE_NEWS_URL};
use newsbot::llm::remote::RemoteLlmProvider;
use newsbot::llm::summarizer::LlmSummarizer;
use newsbot::llm::LlmProvider;
use newsbot::pipeline::{Collaborators, TopicRunner, TopicSettings};
use newsbot::publisher::{Publisher, XPublisher, DEFAULT_X_API_URL};
use newsbot::scraping::HttpPageFetcher;
use newsbot::storage::StoryStore;
use newsbot::worker::{run_all_once, run_worker};

#[derive(Parser, Debug)]
#[command(name = "newsbot", about = "Topic news bot: search, summarize and publish")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Run every topic once and exit
    #[arg(long)]
    once: bool,

    /// Only run the named topic (repeatable)
    #[arg(long, value_name = "NAME")]
    topic: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let default_path = PathBuf::from("config.default.toml");
    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            bail!("Config file not found: {}", p.display());
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(default_path.as_path()) } else { None },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("failed to load configuration: {:#}", e);
            return Err(e);
        }
    };
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    for name in &args.topic {
        if !config.topics.contains_key(name) {
            bail!("unknown topic '{}'", name);
        }
    }

    let runners = build_runners(&config, &args.topic)?;
    if runners.is_empty() {
        bail!("no topics configured");
    }

    if args.once {
        let failures = run_all_once(runners).await;
        if failures > 0 {
            bail!("{} topic run(s) failed", failures);
        }
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let interval = Duration::from_secs(config.scheduler.interval_minutes() * 60);
    let worker = run_worker(runners, interval, shutdown_rx);
    tokio::pin!(worker);

    let interrupted = tokio::select! {
        _ = tokio::signal::ctrl_c() => true,
        res = &mut worker => {
            if let Err(e) = res {
                error!("worker encountered an error: {:#}", e);
            }
            false
        }
    };

    if interrupted {
        info!("ctrl-c received, notifying worker to shutdown");
        let _ = shutdown_tx.send(true);
        match tokio::time::timeout(Duration::from_secs(20), &mut worker).await {
            Ok(Err(e)) => error!("worker returned an error: {:#}", e),
            Ok(Ok(())) => info!("worker exited cleanly"),
            Err(_) => info!("timed out waiting for worker to exit"),
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Wire shared collaborators once and build one runner per selected topic.
fn build_runners(config: &Config, only: &[String]) -> Result<Vec<Arc<TopicRunner>>> {
    let llm = config.llm.clone().unwrap_or_default();

    let summarization = llm
        .summarization
        .as_ref()
        .context("missing [llm.summarization] section")?;
    let summarizer = Arc::new(LlmSummarizer::new(create_llm_provider(summarization)?));
    info!(model = ?summarization.model, "summarization provider initialized");

    let embedder: Option<Arc<dyn Embedder>> = if config.needs_embeddings() {
        let embedding = llm
            .embedding
            .as_ref()
            .context("a topic sets similarity_threshold but [llm.embedding] is missing")?;
        let embedder: Arc<dyn Embedder> = Arc::new(LlmEmbedder::new(create_llm_provider(embedding)?));
        info!(model = ?embedding.model, "embedding provider initialized");
        Some(embedder)
    } else {
        None
    };

    let search = config.search.clone().unwrap_or_default();
    let search_timeout = search.timeout_seconds.unwrap_or(10);
    let search = Arc::new(GoogleNewsSearch::new(
        search.base_url.as_deref().unwrap_or(DEFAULT_GOOGLE_NEWS_URL),
        search_timeout,
    )?);
    let pages = Arc::new(HttpPageFetcher::new(search_timeout)?);
    let store = StoryStore::new(&config.storage.data_dir);

    let mut runners = Vec::new();
    for (name, topic) in &config.topics {
        if !only.is_empty() && !only.contains(name) {
            continue;
        }
        let settings = TopicSettings::from_config(name, topic)?;
        let collaborators = Collaborators {
            search: search.clone(),
            pages: pages.clone(),
            summarizer: summarizer.clone(),
            embedder: embedder.clone(),
            publisher: create_publisher(name, topic)?,
        };
        let runner = TopicRunner::new(settings, store.clone(), collaborators)?;
        info!(topic = %name, "topic runner ready");
        runners.push(Arc::new(runner));
    }
    Ok(runners)
}

/// Create an LLM provider for one remote endpoint, reading the key from the environment.
fn create_llm_provider(remote: &RemoteLlmConfig) -> Result<Arc<dyn LlmProvider>> {
    let api_key_env = remote
        .api_key_env
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("Missing api_key_env in remote config"))?;
    let api_key = std::env::var(api_key_env)
        .with_context(|| format!("LLM API key env var '{}' not set", api_key_env))?;

    let model = remote.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string());
    let api_url = remote
        .api_url
        .clone()
        .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string());
    let timeout_secs = remote.timeout_seconds.unwrap_or(30);
    let max_tokens = remote.max_tokens.unwrap_or(200);

    let provider = RemoteLlmProvider::new(api_url, api_key, model).with_defaults(timeout_secs, max_tokens, 0.7);
    Ok(Arc::new(provider))
}

fn create_publisher(name: &str, topic: &TopicConfig) -> Result<Arc<dyn Publisher>> {
    let publisher = topic
        .publisher
        .as_ref()
        .with_context(|| format!("topic '{}' has no [topics.{}.publisher] section", name, name))?;
    let token = std::env::var(&publisher.token_env)
        .with_context(|| format!("publisher token env var '{}' not set", publisher.token_env))?;
    let api_url = publisher.api_url.as_deref().unwrap_or(DEFAULT_X_API_URL);
    Ok(Arc::new(XPublisher::new(api_url, token)?))
}
