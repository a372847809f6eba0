//! Text generation backends for Convokeep
//!
//! The summarizer talks to a [`TextGenerator`]: anything that turns an
//! instruction plus a context block into text. Two backends ship with the
//! crate: an offline extractive digest and an Ollama chat model.

pub mod extractive;
pub mod ollama;

pub use extractive::ExtractiveGenerator;
pub use ollama::OllamaGenerator;

use crate::config::GeneratorConfig;
use crate::error::{ConvokeepError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Abstract text-generation capability
///
/// Implementations must be safe to share between the store and the
/// background summarization tasks it spawns.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates text for `prompt` (the instruction) over `context`
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot produce a response
    async fn generate(&self, prompt: &str, context: &str) -> Result<String>;

    /// Short backend name used in logs
    fn name(&self) -> &str;
}

/// Create a generator instance based on configuration
///
/// # Errors
///
/// Returns `ConvokeepError::Generator` if the generator type is unknown or
/// the backend cannot be initialized
///
/// # Examples
///
/// ```
/// use convokeep::config::GeneratorConfig;
/// use convokeep::generation::create_generator;
///
/// let generator = create_generator(&GeneratorConfig::default()).unwrap();
/// assert_eq!(generator.name(), "extractive");
/// ```
pub fn create_generator(config: &GeneratorConfig) -> Result<Arc<dyn TextGenerator>> {
    match config.generator_type.as_str() {
        "extractive" => Ok(Arc::new(ExtractiveGenerator::new())),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config.ollama.clone())?)),
        other => Err(ConvokeepError::Generator(format!(
            "Unknown generator type: {}",
            other
        ))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_generator_extractive() {
        let generator = create_generator(&GeneratorConfig::default()).unwrap();
        assert_eq!(generator.name(), "extractive");
    }

    #[test]
    fn test_create_generator_ollama() {
        let config = GeneratorConfig {
            generator_type: "ollama".to_string(),
            ..GeneratorConfig::default()
        };
        let generator = create_generator(&config).unwrap();
        assert_eq!(generator.name(), "ollama");
    }

    #[test]
    fn test_create_generator_unknown() {
        let config = GeneratorConfig {
            generator_type: "copilot".to_string(),
            ..GeneratorConfig::default()
        };
        let err = create_generator(&config).err().unwrap();
        assert!(err.to_string().contains("Unknown generator type"));
    }
}
