use anyhow::{Context, Result};
use std::sync::Arc;

use crate::llm::LlmProvider;

/// Text over this many chars is cut before embedding.
pub const MAX_EMBED_CHARS: usize = 8_000;

/// Semantic vectors for story bodies.
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Score in [-1, 1]; cosine similarity unless overridden.
    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        cosine_similarity(a, b)
    }
}

/// Cosine similarity of two vectors. Zero-length or mismatched vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Embedder that delegates to an LLM provider's embedding endpoint.
pub struct LlmEmbedder {
    provider: Arc<dyn LlmProvider>,
}

impl LlmEmbedder {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl Embedder for LlmEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let input = match text.char_indices().nth(MAX_EMBED_CHARS) {
            Some((end, _)) => &text[..end],
            None => text,
        };
        let vector = self.provider.embed(input).await.context("embedding request failed")?;
        if vector.is_empty() {
            anyhow::bail!("embedding provider returned an empty vector");
        }
        Ok(vector)
    }
}
