use crate::story::{Story, StoryId};

/// Ordered set of stories for one topic, unique by id. Insertion order is
/// preserved so the oldest-added story comes first.
#[derive(Debug, Clone, Default)]
pub struct Window {
    stories: Vec<Story>,
}

impl Window {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a window from a sequence that may contain repeated ids; the first
    /// occurrence wins.
    pub fn from_stories(stories: impl IntoIterator<Item = Story>) -> Self {
        let mut window = Self::new();
        for story in stories {
            window.insert(story);
        }
        window
    }

    /// Append a story unless its id is already present. Returns whether it was added.
    pub fn insert(&mut self, story: Story) -> bool {
        if self.contains(&story.id) {
            return false;
        }
        self.stories.push(story);
        true
    }

    pub fn contains(&self, id: &StoryId) -> bool {
        self.stories.iter().any(|s| &s.id == id)
    }

    pub fn get(&self, id: &StoryId) -> Option<&Story> {
        self.stories.iter().find(|s| &s.id == id)
    }

    pub fn retain(&mut self, keep: impl FnMut(&Story) -> bool) {
        self.stories.retain(keep);
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }

    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Story> {
        self.stories.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Story> {
        self.stories.iter_mut()
    }
}
