use tracing::debug;

use crate::story::{Story, StoryId};
use crate::window::Window;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Added,
    Duplicate,
}

/// True when a story with this URL's identity is already in the window.
pub fn is_known(window: &Window, url: &str) -> bool {
    window.contains(&StoryId::from_url(url))
}

/// Append a newly discovered story unless its id is already present.
/// Duplicates are logged and dropped without touching the window.
pub fn merge(window: &mut Window, story: Story) -> MergeOutcome {
    let title = story.title.clone();
    if window.insert(story) {
        MergeOutcome::Added
    } else {
        debug!("story '{}' already exists, skipping", title);
        MergeOutcome::Duplicate
    }
}
