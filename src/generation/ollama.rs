//! Ollama summary generator
//!
//! Sends the summary instruction as a system message and the generation
//! context as a user message to Ollama's `/api/chat` endpoint, with
//! streaming disabled, and returns the assistant's reply.

use crate::config::OllamaConfig;
use crate::error::{ConvokeepError, Result};
use crate::generation::TextGenerator;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ollama-backed text generator
///
/// # Examples
///
/// ```
/// use convokeep::config::OllamaConfig;
/// use convokeep::generation::OllamaGenerator;
///
/// let config = OllamaConfig {
///     host: "http://localhost:11434".to_string(),
///     model: "llama3.2:latest".to_string(),
/// };
/// let generator = OllamaGenerator::new(config).unwrap();
/// assert_eq!(generator.model(), "llama3.2:latest");
/// ```
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: Client,
    config: OllamaConfig,
}

/// Request structure for Ollama's chat API
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Response structure from Ollama's chat API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaResponseMessage,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    eval_count: usize,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
}

impl OllamaGenerator {
    /// Create a new Ollama generator
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent(concat!("convokeep/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ConvokeepError::Generator(format!("Failed to create HTTP client: {}", e))
            })?;

        tracing::info!(
            "Initialized Ollama generator: host={}, model={}",
            config.host,
            config.model
        );

        Ok(Self { client, config })
    }

    /// Configured Ollama host
    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Configured model name
    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    async fn generate(&self, prompt: &str, context: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.config.host.trim_end_matches('/'));
        let request = OllamaRequest {
            model: &self.config.model,
            messages: vec![
                OllamaMessage {
                    role: "system",
                    content: prompt,
                },
                OllamaMessage {
                    role: "user",
                    content: context,
                },
            ],
            stream: false,
        };

        tracing::debug!(
            model = %self.config.model,
            context_len = context.len(),
            "Sending Ollama summary request"
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Ollama request failed: {}", e);
                ConvokeepError::Generator(format!("Ollama request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Ollama returned error {}: {}", status, error_text);
            return Err(ConvokeepError::Generator(format!(
                "Ollama returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let ollama_response: OllamaResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Ollama response: {}", e);
            ConvokeepError::Generator(format!("Failed to parse Ollama response: {}", e))
        })?;

        tracing::debug!(
            "Ollama response: done={}, completion_tokens={}",
            ollama_response.done,
            ollama_response.eval_count
        );

        Ok(ollama_response.message.content)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OllamaConfig {
        OllamaConfig {
            host: "http://localhost:11434".to_string(),
            model: "llama3.2:latest".to_string(),
        }
    }

    #[test]
    fn test_ollama_generator_creation() {
        let generator = OllamaGenerator::new(config()).unwrap();
        assert_eq!(generator.host(), "http://localhost:11434");
        assert_eq!(generator.model(), "llama3.2:latest");
        assert_eq!(generator.name(), "ollama");
    }

    #[test]
    fn test_request_serialization() {
        let request = OllamaRequest {
            model: "m",
            messages: vec![OllamaMessage {
                role: "system",
                content: "Summarize",
            }],
            stream: false,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["stream"], false);
        assert_eq!(value["messages"][0]["role"], "system");
    }

    #[test]
    fn test_response_parsing_tolerates_missing_fields() {
        let response: OllamaResponse =
            serde_json::from_str(r#"{"message":{"role":"assistant","content":"ok"}}"#).unwrap();
        assert_eq!(response.message.content, "ok");
        assert!(!response.done);
    }
}
