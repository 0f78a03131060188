use tracing::{error, info, warn};

use crate::publisher::{PublishError, Publisher};
use crate::story::StoryId;
use crate::window::Window;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Published(StoryId),
    NothingPublished,
}

/// Publish at most one eligible story, walking the window oldest-added first.
///
/// The summary is used when it names the topic; a verified story whose summary
/// does not is published with its title instead, an unverified one is skipped.
/// A "too long" rejection of a summary clears `is_summarized` so the next run
/// regenerates it; a rejected title and any other failure just move on to the
/// next candidate.
pub async fn publish_one(window: &mut Window, topic_name: &str, publisher: &dyn Publisher) -> Selection {
    for story in window.iter_mut() {
        if !story.is_eligible(topic_name) {
            continue;
        }

        let (text, uses_title) = match story.summary.as_deref() {
            Some(summary) if story.summary_mentions(topic_name) => (summary.to_string(), false),
            _ if story.is_verified_source => {
                info!("summary of '{}' does not name the topic, using the title", story.title);
                (story.title.clone(), true)
            }
            _ => {
                info!("story '{}' not published because topic name not in summary", story.title);
                continue;
            }
        };

        info!("publishing story '{}': {} {}", story.title, text, story.url);
        match publisher.publish(&text, &story.url).await {
            Ok(()) => {
                story.is_published = true;
                info!("published story '{}'", story.title);
                return Selection::Published(story.id.clone());
            }
            Err(PublishError::TooLong) if uses_title => {
                warn!("title of '{}' is too long to publish, skipping", story.title);
            }
            Err(PublishError::TooLong) => {
                warn!("story '{}' is too long to publish, summary will be regenerated", story.title);
                story.is_summarized = false;
            }
            Err(e) => {
                error!("error publishing story '{}': {}", story.title, e);
            }
        }
    }

    Selection::NothingPublished
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::tests::{at, story};
    use crate::story::Story;
    use std::sync::Mutex;

    /// Replays scripted outcomes and records what it was asked to publish.
    struct ScriptedPublisher {
        outcomes: Mutex<Vec<Result<(), PublishError>>>,
        sent: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedPublisher {
        fn new(mut outcomes: Vec<Result<(), PublishError>>) -> Self {
            outcomes.reverse();
            Self {
                outcomes: Mutex::new(outcomes),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Publisher for ScriptedPublisher {
        async fn publish(&self, text: &str, url: &str) -> Result<(), PublishError> {
            self.sent.lock().unwrap().push((text.to_string(), url.to_string()));
            self.outcomes.lock().unwrap().pop().unwrap_or(Ok(()))
        }
    }

    fn summarized(url: &str, summary: &str, verified: bool) -> Story {
        let mut s = story(url, at(9, 0));
        s.attach_summary(summary.to_string());
        s.is_verified_source = verified;
        s
    }

    #[tokio::test]
    async fn publishes_first_eligible_story_only() {
        let mut window = Window::from_stories(vec![
            summarized("https://example.com/a", "Falcons win #NFL", false),
            summarized("https://example.com/b", "Falcons lose #NFL", false),
        ]);
        let publisher = ScriptedPublisher::new(vec![]);

        let selection = publish_one(&mut window, "falcons", &publisher).await;

        assert_eq!(selection, Selection::Published(window.stories()[0].id.clone()));
        assert_eq!(window.iter().filter(|s| s.is_published).count(), 1);
        assert_eq!(
            publisher.sent(),
            vec![("Falcons win #NFL".to_string(), "https://example.com/a".to_string())]
        );
    }

    #[tokio::test]
    async fn skips_ineligible_stories() {
        let mut stale = summarized("https://example.com/stale", "Falcons old news", true);
        stale.is_publishable = false;
        let mut done = summarized("https://example.com/done", "Falcons done", true);
        done.is_published = true;
        let unsummarized = story("https://example.com/raw", at(9, 0));
        let unverified = summarized("https://example.com/offtopic", "Braves win", false);
        let mut window = Window::from_stories(vec![stale, done, unsummarized, unverified]);
        let publisher = ScriptedPublisher::new(vec![]);

        let selection = publish_one(&mut window, "falcons", &publisher).await;

        assert_eq!(selection, Selection::NothingPublished);
        assert!(publisher.sent().is_empty());
        assert!(window.stories()[1].is_published, "published flag is never reset");
    }

    #[tokio::test]
    async fn verified_story_without_topic_falls_back_to_title() {
        let mut window = Window::from_stories(vec![summarized(
            "https://example.com/a",
            "Atlanta signs a quarterback",
            true,
        )]);
        let publisher = ScriptedPublisher::new(vec![]);

        publish_one(&mut window, "falcons", &publisher).await;

        let stored = &window.stories()[0];
        assert_eq!(publisher.sent()[0].0, stored.title);
        assert_eq!(stored.summary.as_deref(), Some("Atlanta signs a quarterback"));
        assert!(stored.is_published);
    }

    #[tokio::test]
    async fn too_long_resets_summary_flag_and_moves_on() {
        let mut window = Window::from_stories(vec![
            summarized("https://example.com/long", "Falcons long story", false),
            summarized("https://example.com/short", "Falcons short", false),
        ]);
        let publisher = ScriptedPublisher::new(vec![Err(PublishError::TooLong), Ok(())]);

        let selection = publish_one(&mut window, "falcons", &publisher).await;

        let long = &window.stories()[0];
        assert!(!long.is_summarized);
        assert!(!long.is_published);
        assert!(long.is_publishable);
        assert_eq!(selection, Selection::Published(window.stories()[1].id.clone()));
    }

    #[tokio::test]
    async fn too_long_title_fallback_keeps_summary() {
        let mut window = Window::from_stories(vec![
            summarized("https://example.com/a", "Atlanta signs a quarterback", true),
            summarized("https://example.com/b", "Falcons b", false),
        ]);
        let publisher = ScriptedPublisher::new(vec![Err(PublishError::TooLong), Ok(())]);

        let selection = publish_one(&mut window, "falcons", &publisher).await;

        let verified = &window.stories()[0];
        assert!(verified.is_summarized);
        assert!(!verified.is_published);
        assert_eq!(publisher.sent()[0].0, verified.title);
        assert_eq!(selection, Selection::Published(window.stories()[1].id.clone()));
    }

    #[tokio::test]
    async fn other_failures_leave_story_eligible() {
        let mut window = Window::from_stories(vec![
            summarized("https://example.com/a", "Falcons a", false),
            summarized("https://example.com/b", "Falcons b", false),
        ]);
        let publisher = ScriptedPublisher::new(vec![
            Err(PublishError::Rejected("503".into())),
            Err(PublishError::Rejected("503".into())),
        ]);

        let selection = publish_one(&mut window, "falcons", &publisher).await;

        assert_eq!(selection, Selection::NothingPublished);
        assert_eq!(publisher.sent().len(), 2);
        assert!(window.iter().all(|s| s.is_eligible("falcons")));
    }
}
