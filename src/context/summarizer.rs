//! Summarizer: folds old turns into a running summary
//!
//! The summarizer owns the boundary to the external text generator. It builds
//! the generation context from the previous summary and the turns being
//! folded, bounds the call with a timeout, and reports every failure as a
//! [`SummarizationError`] for the caller to log and discard.

use crate::config::GeneratorConfig;
use crate::context::session::Turn;
use crate::error::SummarizationError;
use crate::generation::TextGenerator;
use std::sync::Arc;
use std::time::Duration;

/// Instruction sent to the generator when no override is configured
pub const DEFAULT_SUMMARY_PROMPT: &str = "Summarize the following conversation concisely, \
focusing on key information. Merge the previous summary and the new lines into a single, \
evolving paragraph that represents the entire conversation so far.";

/// Heading of the previous-summary section in the generation context
pub const PREVIOUS_SUMMARY_HEADER: &str = "PREVIOUS SUMMARY:";

/// Heading of the new-lines section in the generation context
pub const NEW_LINES_HEADER: &str = "NEW LINES:";

/// Placeholder used when there is no previous summary
pub const NO_SUMMARY_PLACEHOLDER: &str = "(none)";

/// Builds the generation context for a summarization pass
///
/// # Examples
///
/// ```
/// use convokeep::context::summarizer::build_summary_context;
///
/// let context = build_summary_context(Some("Alice introduced herself."), &[]);
/// assert!(context.starts_with("PREVIOUS SUMMARY:\nAlice introduced herself."));
/// ```
pub fn build_summary_context(prior: Option<&str>, turns: &[Turn]) -> String {
    let prior = prior
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(NO_SUMMARY_PLACEHOLDER);
    let lines: Vec<String> = turns
        .iter()
        .map(|turn| format!("{}: {}", turn.role.label(), turn.text))
        .collect();

    format!(
        "{}\n{}\n\n{}\n{}",
        PREVIOUS_SUMMARY_HEADER,
        prior,
        NEW_LINES_HEADER,
        lines.join("\n")
    )
}

/// Folds turns into a new summary through a [`TextGenerator`]
#[derive(Clone)]
pub struct Summarizer {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
    prompt: String,
}

impl Summarizer {
    /// Creates a summarizer with the default prompt and a 30 second timeout
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            timeout: Duration::from_secs(30),
            prompt: DEFAULT_SUMMARY_PROMPT.to_string(),
        }
    }

    /// Creates a summarizer using the timeout and prompt from configuration
    pub fn from_config(generator: Arc<dyn TextGenerator>, config: &GeneratorConfig) -> Self {
        let summarizer =
            Self::new(generator).with_timeout(Duration::from_secs(config.timeout_seconds));
        match &config.prompt {
            Some(prompt) => summarizer.with_prompt(prompt.clone()),
            None => summarizer,
        }
    }

    /// Sets the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the summary instruction
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Name of the underlying generator
    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    /// Per-call timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Produces the summary that replaces `prior` once `turns` are folded
    ///
    /// # Errors
    ///
    /// Returns `SummarizationError` if the generator fails, times out, or
    /// answers with blank text
    pub async fn summarize(
        &self,
        prior: Option<&str>,
        turns: &[Turn],
    ) -> std::result::Result<String, SummarizationError> {
        let context = build_summary_context(prior, turns);

        tracing::debug!(
            generator = self.generator.name(),
            turns = turns.len(),
            "Requesting summary"
        );

        let generated = tokio::time::timeout(
            self.timeout,
            self.generator.generate(&self.prompt, &context),
        )
        .await
        .map_err(|_| SummarizationError::Timeout(self.timeout.as_secs()))?
        .map_err(|e| SummarizationError::Generation(e.to_string()))?;

        let summary = generated.trim();
        if summary.is_empty() {
            return Err(SummarizationError::EmptyResponse);
        }
        Ok(summary.to_string())
    }
}

impl std::fmt::Debug for Summarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Summarizer")
            .field("generator", &self.generator.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}
