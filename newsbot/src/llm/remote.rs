use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ChatMessage, LlmProvider, LlmRequest, LlmResponse, UsageMetadata};

/// Remote LLM provider using OpenAI-compatible HTTP API
pub struct RemoteLlmProvider {
    base_url: String,
    api_key: String,
    model: String,
    default_timeout: Duration,
    default_max_tokens: usize,
    default_temperature: f32,
    client: reqwest::Client,
}

impl RemoteLlmProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            default_timeout: Duration::from_secs(30),
            default_max_tokens: 200,
            default_temperature: 0.7,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_defaults(mut self, timeout_secs: u64, max_tokens: usize, temperature: f32) -> Self {
        self.default_timeout = Duration::from_secs(timeout_secs);
        self.default_max_tokens = max_tokens;
        self.default_temperature = temperature;
        self
    }

    /// Embeddings live next to the chat endpoint on OpenAI-compatible servers,
    /// e.g. `/v1/chat/completions` -> `/v1/embeddings`.
    fn embedding_url(&self) -> String {
        if self.base_url.ends_with("/embeddings") {
            self.base_url.clone()
        } else if self.base_url.ends_with("/chat/completions") {
            self.base_url.replace("/chat/completions", "/embeddings")
        } else if self.base_url.ends_with("/completions") {
            self.base_url.replace("/completions", "/embeddings")
        } else {
            format!("{}/embeddings", self.base_url.trim_end_matches('/'))
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for RemoteLlmProvider {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
        let timeout = request
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let req_body = OpenAiRequest {
            model: self.model.clone(),
            messages: request.messages,
            max_tokens: Some(request.max_tokens.unwrap_or(self.default_max_tokens)),
            temperature: Some(request.temperature.unwrap_or(self.default_temperature)),
        };

        let response = tokio::time::timeout(
            timeout,
            self.client
                .post(&self.base_url)
                .bearer_auth(&self.api_key)
                .json(&req_body)
                .send(),
        )
        .await
        .context("LLM request timed out")?
        .context("LLM HTTP request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM API error {}: {}", status, body);
        }

        let resp_body: OpenAiResponse = response
            .json()
            .await
            .context("Failed to parse LLM response")?;

        let choice = resp_body
            .choices
            .into_iter()
            .next()
            .context("LLM response has no choices")?;

        let usage = resp_body
            .usage
            .map(|u| UsageMetadata {
                prompt_tokens: u.prompt_tokens.unwrap_or(0),
                completion_tokens: u.completion_tokens.unwrap_or(0),
                total_tokens: u.total_tokens.unwrap_or(0),
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content: choice.message.content,
            usage,
            model: resp_body.model.unwrap_or_else(|| self.model.clone()),
        })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding_url = self.embedding_url();
        let req_body = EmbeddingRequest {
            model: self.model.clone(),
            input: text.to_string(),
        };

        let response = tokio::time::timeout(
            self.default_timeout,
            self.client
                .post(&embedding_url)
                .bearer_auth(&self.api_key)
                .json(&req_body)
                .send(),
        )
        .await
        .context("Embedding request timed out")?
        .context("Embedding HTTP request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Embedding API error {}: {} (URL: {})", status, body, embedding_url);
        }

        let body_text = response
            .text()
            .await
            .context("Failed to read embedding response body")?;

        // Standard OpenAI shape first, then the bare-vector shape some local servers return
        if let Ok(resp_body) = serde_json::from_str::<EmbeddingResponse>(&body_text) {
            return resp_body
                .data
                .into_iter()
                .next()
                .map(|d| d.embedding)
                .with_context(|| format!("Embedding response has no data: {}", body_text));
        }
        if let Ok(raw_vec) = serde_json::from_str::<Vec<f32>>(&body_text) {
            return Ok(raw_vec);
        }
        anyhow::bail!("Failed to parse embedding response: {}", body_text)
    }
}

// OpenAI API request/response structures
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: Option<String>,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<usize>,
    #[serde(default)]
    completion_tokens: Option<usize>,
    #[serde(default)]
    total_tokens: Option<usize>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_url_follows_chat_endpoint() {
        let p = RemoteLlmProvider::new("http://localhost:11434/v1/chat/completions", "k", "m");
        assert_eq!(p.embedding_url(), "http://localhost:11434/v1/embeddings");

        let p = RemoteLlmProvider::new("https://api.openai.com/v1/embeddings", "k", "m");
        assert_eq!(p.embedding_url(), "https://api.openai.com/v1/embeddings");

        let p = RemoteLlmProvider::new("http://127.0.0.1:1234/", "k", "m");
        assert_eq!(p.embedding_url(), "http://127.0.0.1:1234/embeddings");
    }
}
