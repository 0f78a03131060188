use tracing::info;

use crate::window::Window;

/// Suppress stories that are near-duplicates of an already published one.
///
/// Every ordered pair `(s1, s2)` of distinct stories carrying embeddings is
/// scored; when `score > threshold` and `s2` is published, `s1` loses
/// `is_publishable`. Two eligible look-alikes never suppress each other, only
/// a published story can suppress. Decisions are taken on a snapshot of the
/// window and applied afterwards, so pair order does not matter.
///
/// Returns how many stories went from publishable to suppressed.
pub fn suppress_near_duplicates<F>(window: &mut Window, threshold: f32, similarity: F) -> usize
where
    F: Fn(&[f32], &[f32]) -> f32,
{
    let stories = window.stories();
    let mut suppressed = vec![false; stories.len()];

    for (i, s1) in stories.iter().enumerate() {
        let Some(v1) = s1.embedding.as_deref() else {
            continue;
        };
        for (j, s2) in stories.iter().enumerate() {
            if i == j || !s2.is_published {
                continue;
            }
            let Some(v2) = s2.embedding.as_deref() else {
                continue;
            };
            let score = similarity(v1, v2);
            if score > threshold {
                info!(
                    "story '{}' is similar to published '{}' (score {:.3}), suppressing",
                    s1.title, s2.title, score
                );
                suppressed[i] = true;
            }
        }
    }

    let mut newly = 0;
    for (story, suppress) in window.iter_mut().zip(suppressed) {
        if suppress && story.is_publishable {
            story.is_publishable = false;
            newly += 1;
        }
    }
    newly
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;
    use crate::story::tests::{at, story};
    use crate::story::Story;

    fn with_vec(url: &str, v: &[f32], published: bool) -> Story {
        let mut s = story(url, at(9, 0));
        s.embedding = Some(v.to_vec());
        s.is_published = published;
        s
    }

    #[test]
    fn eligible_story_similar_to_published_one_is_suppressed() {
        let a = with_vec("https://example.com/a", &[1.0, 0.0], true);
        let b = with_vec("https://example.com/b", &[0.99, 0.05], false);
        let mut window = Window::from_stories(vec![a, b]);

        let n = suppress_near_duplicates(&mut window, 0.9, cosine_similarity);

        assert_eq!(n, 1);
        assert!(window.stories()[0].is_publishable, "published story is unaffected");
        assert!(!window.stories()[1].is_publishable);
    }

    #[test]
    fn two_unpublished_look_alikes_do_not_suppress_each_other() {
        let a = with_vec("https://example.com/a", &[1.0, 0.0], false);
        let b = with_vec("https://example.com/b", &[1.0, 0.0], false);
        let mut window = Window::from_stories(vec![a, b]);

        assert_eq!(suppress_near_duplicates(&mut window, 0.5, cosine_similarity), 0);
        assert!(window.iter().all(|s| s.is_publishable));
    }

    #[test]
    fn dissimilar_and_unembedded_stories_are_left_alone() {
        let published = with_vec("https://example.com/a", &[1.0, 0.0], true);
        let different = with_vec("https://example.com/b", &[0.0, 1.0], false);
        let no_vector = story("https://example.com/c", at(9, 0));
        let mut window = Window::from_stories(vec![published, different, no_vector]);

        assert_eq!(suppress_near_duplicates(&mut window, 0.5, cosine_similarity), 0);
        assert!(window.iter().all(|s| s.is_publishable));
    }

    #[test]
    fn result_does_not_depend_on_window_order() {
        let a = with_vec("https://example.com/a", &[1.0, 0.0], true);
        let b = with_vec("https://example.com/b", &[1.0, 0.1], false);
        let c = with_vec("https://example.com/c", &[0.0, 1.0], false);

        let mut forward = Window::from_stories(vec![a.clone(), b.clone(), c.clone()]);
        let mut backward = Window::from_stories(vec![c, b, a]);
        suppress_near_duplicates(&mut forward, 0.9, cosine_similarity);
        suppress_near_duplicates(&mut backward, 0.9, cosine_similarity);

        for s in forward.iter() {
            let other = backward.get(&s.id).unwrap();
            assert_eq!(s.is_publishable, other.is_publishable, "{}", s.url);
        }
    }

    #[test]
    fn threshold_is_strict() {
        let a = with_vec("https://example.com/a", &[1.0, 0.0], true);
        let b = with_vec("https://example.com/b", &[1.0, 0.0], false);
        let mut window = Window::from_stories(vec![a, b]);

        assert_eq!(suppress_near_duplicates(&mut window, 1.0, |_, _| 1.0), 0);
    }
}
