use chrono::{DateTime, Utc};
use tracing::info;

use crate::window::Window;

/// Clear `is_publishable` on every story older than `threshold`. Never sets it
/// back to true. Returns how many stories were newly marked stale.
pub fn mark_stale(window: &mut Window, threshold: chrono::Duration, now: DateTime<Utc>) -> usize {
    let mut marked = 0;
    for story in window.iter_mut() {
        if story.age(now) > threshold && story.is_publishable {
            story.is_publishable = false;
            marked += 1;
            info!("story '{}' is stale, no longer publishable", story.title);
        }
    }
    marked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::story::tests::{at, story};

    #[test]
    fn marks_only_stories_past_threshold() {
        let now = at(23, 0);
        let old = story("https://example.com/old", now - chrono::Duration::hours(25));
        let fresh = story("https://example.com/fresh", now - chrono::Duration::hours(2));
        let edge = story("https://example.com/edge", now - chrono::Duration::hours(24));
        let mut window = Window::from_stories(vec![old, fresh, edge]);

        let marked = mark_stale(&mut window, chrono::Duration::hours(24), now);

        assert_eq!(marked, 1);
        let flags: Vec<_> = window.iter().map(|s| s.is_publishable).collect();
        assert_eq!(flags, [false, true, true]);
    }

    #[test]
    fn never_restores_publishable() {
        let now = at(12, 0);
        let mut suppressed = story("https://example.com/a", now - chrono::Duration::hours(1));
        suppressed.is_publishable = false;
        let mut window = Window::from_stories(vec![suppressed]);

        assert_eq!(mark_stale(&mut window, chrono::Duration::hours(24), now), 0);
        assert!(!window.stories()[0].is_publishable);
    }

    #[test]
    fn catches_stories_that_aged_between_runs() {
        let first_run = at(1, 0);
        let mut window = Window::from_stories(vec![story("https://example.com/a", first_run)]);

        mark_stale(&mut window, chrono::Duration::hours(6), first_run);
        assert!(window.stories()[0].is_publishable);

        mark_stale(&mut window, chrono::Duration::hours(6), at(8, 0));
        assert!(!window.stories()[0].is_publishable);
    }
}
