//! Test utilities for Convokeep
//!
//! Scripted text generators for exercising the summarizer and context store
//! without a model, plus temporary directory helpers.

use crate::error::{ConvokeepError, Result};
use crate::generation::TextGenerator;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

/// Create a temporary directory for testing
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Generator that answers from a fixed script and records every call
///
/// Once the script runs out the last response is repeated.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<String>>,
    last: Mutex<String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedGenerator {
    /// Creates a generator that returns `responses` in order
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            last: Mutex::new(String::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every `(prompt, context)` pair received so far
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, context: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), context.to_string()));

        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.responses.lock().unwrap().pop_front() {
            *last = next;
        }
        Ok(last.clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Generator that always fails
#[derive(Debug, Default)]
pub struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str, _context: &str) -> Result<String> {
        Err(ConvokeepError::Generator("model unavailable".to_string()).into())
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Generator that sleeps before answering and counts its calls
#[derive(Debug)]
pub struct SlowGenerator {
    delay: Duration,
    calls: AtomicUsize,
}

impl SlowGenerator {
    /// Creates a generator that answers after `delay`
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of calls started
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for SlowGenerator {
    async fn generate(&self, _prompt: &str, _context: &str) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        Ok(format!("slow summary {}", n))
    }

    fn name(&self) -> &str {
        "slow"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_dir_creation() {
        let dir = temp_dir();
        assert!(dir.path().exists());
    }

    #[tokio::test]
    async fn test_scripted_generator_repeats_last() {
        let generator = ScriptedGenerator::new(vec!["one", "two"]);
        assert_eq!(generator.generate("p", "c").await.unwrap(), "one");
        assert_eq!(generator.generate("p", "c").await.unwrap(), "two");
        assert_eq!(generator.generate("p", "c").await.unwrap(), "two");
        assert_eq!(generator.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_failing_generator() {
        assert!(FailingGenerator.generate("p", "c").await.is_err());
    }
}
