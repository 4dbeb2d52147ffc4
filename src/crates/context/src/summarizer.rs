//! The external summarizer seam. The context manager formats its archive
//! zone as a "trajectory" and hands it to a [`Summarizer`]; a Markdown
//! response's `## Summary` (and optional `## Decision Path`) body is
//! extracted and trimmed to [`SUMMARY_MAX_CHARS`].

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

pub const SUMMARY_MAX_CHARS: usize = 2_000;

/// One entry of the trajectory handed to the summarizer: either a user goal
/// or a recorded agent decision.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrajectoryEntry {
    Goal {
        content: String,
    },
    Decision {
        title: String,
        context: String,
        choice: String,
        rationale: String,
        alternatives: Vec<String>,
    },
}

/// Anything that can turn a trajectory into a Markdown summary document.
/// The production implementation calls out to an LLM; tests and the
/// degraded-mode default use [`ExtractiveFallbackSummarizer`].
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, trajectory: &[TrajectoryEntry]) -> Result<String>;
}

/// Extracts the body of a `## Summary` section (up to the next `##` heading
/// or end of document), trimmed to [`SUMMARY_MAX_CHARS`].
pub fn extract_summary_body(document: &str) -> String {
    let Some(start) = document.find("## Summary") else {
        return trim_chars(document.trim(), SUMMARY_MAX_CHARS);
    };
    let after = &document[start + "## Summary".len()..];
    let body = match after.find("\n## ") {
        Some(next_heading) => &after[..next_heading],
        None => after,
    };
    trim_chars(body.trim(), SUMMARY_MAX_CHARS)
}

fn trim_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

/// A summarizer that never calls out to an LLM: it formats the trajectory as
/// plain bullet text under a synthetic `## Summary` heading. Used as the
/// default when no external summarizer is configured, and by tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractiveFallbackSummarizer;

#[async_trait]
impl Summarizer for ExtractiveFallbackSummarizer {
    async fn summarize(&self, trajectory: &[TrajectoryEntry]) -> Result<String> {
        let mut lines = Vec::new();
        for entry in trajectory {
            match entry {
                TrajectoryEntry::Goal { content } => lines.push(format!("- Goal: {content}")),
                TrajectoryEntry::Decision { title, choice, rationale, .. } => {
                    lines.push(format!("- Decision \"{title}\": chose {choice} ({rationale})"));
                }
            }
        }
        Ok(format!("## Summary\n{}", lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_summary_section_stopping_at_next_heading() {
        let doc = "## Summary\nThe agent did X.\n## Decision Path\nirrelevant";
        assert_eq!(extract_summary_body(doc), "The agent did X.");
    }

    #[test]
    fn falls_back_to_whole_document_when_no_heading_present() {
        let doc = "plain text with no heading";
        assert_eq!(extract_summary_body(doc), doc);
    }

    #[test]
    fn trims_to_max_chars() {
        let doc = format!("## Summary\n{}", "x".repeat(SUMMARY_MAX_CHARS + 500));
        assert_eq!(extract_summary_body(&doc).chars().count(), SUMMARY_MAX_CHARS);
    }

    #[tokio::test]
    async fn extractive_fallback_formats_goals_and_decisions() {
        let summarizer = ExtractiveFallbackSummarizer;
        let trajectory = vec![
            TrajectoryEntry::Goal { content: "find the bug".to_string() },
            TrajectoryEntry::Decision {
                title: "approach".to_string(),
                context: "ctx".to_string(),
                choice: "binary search".to_string(),
                rationale: "fastest".to_string(),
                alternatives: vec!["linear scan".to_string()],
            },
        ];
        let summary = summarizer.summarize(&trajectory).await.unwrap();
        assert!(summary.contains("find the bug"));
        assert!(summary.contains("binary search"));
    }
}
