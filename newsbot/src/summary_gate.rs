use tracing::{info, warn};

use crate::llm::summarizer::Summarizer;
use crate::window::Window;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryReport {
    pub generated: usize,
    pub failed: usize,
}

/// Generate a summary for every story still lacking one. One attempt per
/// story per run; a failure leaves the story unsummarized for the next run.
pub async fn fill_missing_summaries(window: &mut Window, summarizer: &dyn Summarizer) -> SummaryReport {
    let mut report = SummaryReport::default();

    for story in window.iter_mut().filter(|s| !s.is_summarized) {
        info!("summarizing story '{}'", story.title);
        match summarizer
            .summarize(&story.body_text, story.byline.as_deref())
            .await
        {
            Ok(summary) => {
                story.attach_summary(summary);
                report.generated += 1;
            }
            Err(e) => {
                warn!("failed to summarize '{}', will retry next run: {:#}", story.title, e);
                report.failed += 1;
            }
        }
    }

    report
}
