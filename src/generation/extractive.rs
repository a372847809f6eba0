//! Offline extractive summary generator
//!
//! Builds a digest of the folded lines without calling a model: message
//! counts, the first and last message excerpts, and a truncated copy of the
//! previous summary. Useful as a default and in environments with no model.

use crate::context::summarizer::{
    NEW_LINES_HEADER, NO_SUMMARY_PLACEHOLDER, PREVIOUS_SUMMARY_HEADER,
};
use crate::error::Result;
use crate::generation::TextGenerator;
use async_trait::async_trait;

/// Maximum characters of a single message excerpt
const EXCERPT_LEN: usize = 100;

/// Maximum characters of the previous summary carried forward
const PRIOR_LEN: usize = 400;

/// Generator that summarizes by extraction instead of generation
#[derive(Debug, Clone, Default)]
pub struct ExtractiveGenerator;

impl ExtractiveGenerator {
    /// Creates a new extractive generator
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextGenerator for ExtractiveGenerator {
    async fn generate(&self, _prompt: &str, context: &str) -> Result<String> {
        Ok(digest(context))
    }

    fn name(&self) -> &str {
        "extractive"
    }
}

/// Splits a summary context into its previous summary and new lines
fn split_context(context: &str) -> (Option<&str>, Vec<&str>) {
    let (head, body) = match context.split_once(NEW_LINES_HEADER) {
        Some((head, body)) => (head, body),
        None => ("", context),
    };

    let prior = head
        .trim()
        .strip_prefix(PREVIOUS_SUMMARY_HEADER)
        .map(str::trim)
        .filter(|p| !p.is_empty() && *p != NO_SUMMARY_PLACEHOLDER);

    let lines = body
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    (prior, lines)
}

fn digest(context: &str) -> String {
    let (prior, lines) = split_context(context);

    if prior.is_none() && lines.is_empty() {
        return String::from("Previous conversation context (no messages)");
    }

    let mut summary = String::new();

    if let Some(prior) = prior {
        summary.push_str(&format!("Earlier: {}\n", truncate_string(prior, PRIOR_LEN)));
    }

    let user_messages = lines.iter().filter(|l| l.starts_with("User:")).count();
    let assistant_messages = lines.iter().filter(|l| l.starts_with("Assistant:")).count();

    if user_messages + assistant_messages > 0 {
        summary.push_str(&format!(
            "Then: {} user messages, {} assistant responses\n",
            user_messages, assistant_messages
        ));
    }

    if let Some(first) = lines.first() {
        summary.push_str(&format!(
            "First message: {}\n",
            truncate_string(first, EXCERPT_LEN)
        ));
    }

    if lines.len() > 1 {
        if let Some(last) = lines.last() {
            summary.push_str(&format!(
                "Last message: {}\n",
                truncate_string(last, EXCERPT_LEN)
            ));
        }
    }

    summary.trim_end().to_string()
}

/// Truncates to at most `max_len` characters, marking the cut with "..."
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let mut truncated = s.chars().take(max_len - 3).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}
