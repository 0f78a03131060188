// Summarizer module
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

use super::{ChatMessage, LlmProvider, LlmRequest};

/// Upper bound the summarizer asks the model to respect.
pub const MAX_SUMMARY_CHARS: usize = 240;

/// Article text beyond this many chars is not sent to the model.
pub const MAX_INPUT_CHARS: usize = 10_000;

const URL_PLACEHOLDER: &str = "[URL]";

const SUMMARY_PROMPT: &str = "Create a tweet summarising the following article. \
Make the summary be no more than 240 characters. Do not include any @ usernames, \
but do include hashtags. Use plain text only. Don't include any metadata such as \
'Details: [URL]': ";

/// Turns article text into a short publishable summary.
#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, body_text: &str, byline: Option<&str>) -> Result<String>;
}

/// Summarizer backed by a chat-completion model. Asks once more when the first
/// draft is over [`MAX_SUMMARY_CHARS`], then shapes the text with [`shape_summary`].
pub struct LlmSummarizer {
    provider: Arc<dyn LlmProvider>,
    max_input_chars: usize,
}

impl LlmSummarizer {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            max_input_chars: MAX_INPUT_CHARS,
        }
    }

    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let response = self
            .provider
            .generate(LlmRequest::conversation(messages))
            .await
            .context("summary generation failed")?;
        debug!(
            model = %response.model,
            tokens = response.usage.total_tokens,
            "summary draft received"
        );
        Ok(response.content)
    }
}

#[async_trait::async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, body_text: &str, byline: Option<&str>) -> Result<String> {
        let article = truncate_chars(body_text, self.max_input_chars);
        let mut messages = vec![
            ChatMessage::system("You are a helpful assistant."),
            ChatMessage::user(format!("{}{}", SUMMARY_PROMPT, article)),
        ];

        let mut draft = self.complete(messages.clone()).await?;
        if draft.chars().count() > MAX_SUMMARY_CHARS {
            info!(
                "summary draft has {} chars, asking for a shorter one",
                draft.chars().count()
            );
            messages.push(ChatMessage::assistant(draft));
            messages.push(ChatMessage::user("The summary is too long. Please try again."));
            draft = self.complete(messages).await?;
        }

        let summary = shape_summary(&draft, byline);
        if summary.is_empty() {
            bail!("model returned an empty summary");
        }
        let chars = summary.chars().count();
        if chars > MAX_SUMMARY_CHARS {
            bail!("summary still has {} chars after retry (limit {})", chars, MAX_SUMMARY_CHARS);
        }
        Ok(summary)
    }
}

/// Post-process a model draft: drop any sentence carrying a `[URL]`
/// placeholder, unwrap surrounding quotes, then place the byline before the
/// first hashtag (or in front of the text when there is none).
pub fn shape_summary(draft: &str, byline: Option<&str>) -> String {
    let text = strip_url_placeholders(draft);
    let text = strip_wrapping_quotes(&text);
    insert_byline(text, byline)
}

fn strip_url_placeholders(text: &str) -> String {
    let mut out = text.to_string();
    while let Some(idx) = out.find(URL_PLACEHOLDER) {
        let start = out[..idx]
            .rfind(['.', '!', '?'])
            .map(|i| i + 1)
            .unwrap_or(0);
        let mut end = idx + URL_PLACEHOLDER.len();
        if out[end..].starts_with('.') {
            end += 1;
        }
        out.replace_range(start..end, "");
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_wrapping_quotes(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// Byte offset of the first `#tag` token.
fn first_hashtag(text: &str) -> Option<usize> {
    let mut prev: Option<char> = None;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        let at_token_start = prev.map_or(true, char::is_whitespace);
        let tag_follows = chars.peek().is_some_and(|(_, next)| next.is_alphanumeric());
        if c == '#' && at_token_start && tag_follows {
            return Some(idx);
        }
        prev = Some(c);
    }
    None
}

fn insert_byline(summary: &str, byline: Option<&str>) -> String {
    let Some(byline) = byline.map(str::trim).filter(|b| !b.is_empty()) else {
        return summary.to_string();
    };
    match first_hashtag(summary) {
        Some(idx) => format!("{}by {}. {}", &summary[..idx], byline, &summary[idx..]),
        None => format!("By {}. {}", byline, summary),
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, UsageMetadata};
    use std::sync::Mutex;

    struct ScriptedLlm {
        replies: Mutex<Vec<String>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedLlm {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
            self.seen.lock().unwrap().push(request.messages);
            let content = self.replies.lock().unwrap().pop().context("no scripted reply")?;
            Ok(LlmResponse {
                content,
                usage: UsageMetadata::default(),
                model: "scripted".into(),
            })
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            bail!("not used")
        }
    }

    #[test]
    fn byline_goes_before_first_hashtag() {
        let out = shape_summary("Falcons sign a new QB. #NFL #Falcons", Some("J. Doe"));
        assert_eq!(out, "Falcons sign a new QB. by J. Doe. #NFL #Falcons");
    }

    #[test]
    fn byline_prefixes_text_without_hashtag() {
        let out = shape_summary("Falcons sign a new QB.", Some("J. Doe"));
        assert_eq!(out, "By J. Doe. Falcons sign a new QB.");
    }

    #[test]
    fn blank_byline_is_ignored() {
        assert_eq!(shape_summary("Falcons win #NFL", Some("  ")), "Falcons win #NFL");
        assert_eq!(shape_summary("Falcons win #NFL", None), "Falcons win #NFL");
    }

    #[test]
    fn number_sign_inside_word_is_not_a_hashtag() {
        assert_eq!(first_hashtag("Pick C# now"), None);
        assert_eq!(first_hashtag("No. # 1"), None);
        assert_eq!(first_hashtag("#1 pick"), Some(0));
    }

    #[test]
    fn url_placeholder_sentence_is_removed() {
        let out = shape_summary("Falcons win big. Details: [URL]. #NFL", None);
        assert_eq!(out, "Falcons win big. #NFL");

        let out = shape_summary("Read more at [URL] #NFL", None);
        assert_eq!(out, "#NFL");
    }

    #[test]
    fn wrapping_quotes_are_removed() {
        assert_eq!(shape_summary("\"Falcons win #NFL\"", None), "Falcons win #NFL");
        assert_eq!(shape_summary("Coach says \"wow\"", None), "Coach says \"wow\"");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[tokio::test]
    async fn retries_once_when_first_draft_is_too_long() {
        let long = "x".repeat(MAX_SUMMARY_CHARS + 1);
        let llm = Arc::new(ScriptedLlm::new(&[long.as_str(), "Falcons win #NFL"]));
        let summarizer = LlmSummarizer::new(llm.clone());

        let summary = summarizer.summarize("article", Some("J. Doe")).await.unwrap();

        assert_eq!(summary, "Falcons win by J. Doe. #NFL");
        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].len(), 4);
        assert_eq!(seen[1][2], ChatMessage::assistant(long));
    }

    #[tokio::test]
    async fn short_first_draft_is_used_directly() {
        let llm = Arc::new(ScriptedLlm::new(&["Falcons win #NFL"]));
        let summarizer = LlmSummarizer::new(llm.clone());

        let summary = summarizer.summarize("article", None).await.unwrap();

        assert_eq!(summary, "Falcons win #NFL");
        assert_eq!(llm.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn summary_over_limit_after_retry_is_an_error() {
        let long = "x".repeat(MAX_SUMMARY_CHARS + 1);
        let llm = Arc::new(ScriptedLlm::new(&[long.as_str(), long.as_str()]));
        let summarizer = LlmSummarizer::new(llm.clone());

        assert!(summarizer.summarize("article", None).await.is_err());
        assert_eq!(llm.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn byline_pushing_summary_over_limit_is_an_error() {
        let draft = format!("{} #NFL", "x".repeat(MAX_SUMMARY_CHARS - 6));
        let llm = Arc::new(ScriptedLlm::new(&[draft.as_str()]));
        let summarizer = LlmSummarizer::new(llm);

        assert!(summarizer.summarize("article", Some("Jane Doe")).await.is_err());
    }

    #[tokio::test]
    async fn empty_draft_is_an_error() {
        let llm = Arc::new(ScriptedLlm::new(&["Details: [URL]"]));
        let summarizer = LlmSummarizer::new(llm);

        assert!(summarizer.summarize("article", None).await.is_err());
    }
}
