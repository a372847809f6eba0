//! Configuration management for Convokeep
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{ConvokeepError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Main configuration structure for Convokeep
///
/// Holds the summary generator settings, the context store tuning knobs, and
/// the snapshot storage location used by the binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Summary generator configuration
    #[serde(default)]
    pub generator: GeneratorConfig,
    /// Context store behavior
    #[serde(default)]
    pub context: ContextConfig,
    /// Snapshot persistence
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Summary generator configuration
///
/// Specifies which text generator folds old turns into the running summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Generator to use: "extractive" (offline) or "ollama"
    #[serde(rename = "type", default = "default_generator_type")]
    pub generator_type: String,

    /// Upper bound on a single summary generation call (seconds)
    #[serde(default = "default_generator_timeout")]
    pub timeout_seconds: u64,

    /// Optional override of the summary instruction sent to the generator
    #[serde(default)]
    pub prompt: Option<String>,

    /// Ollama configuration
    #[serde(default)]
    pub ollama: OllamaConfig,
}

fn default_generator_type() -> String {
    "extractive".to_string()
}

fn default_generator_timeout() -> u64 {
    30
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            generator_type: default_generator_type(),
            timeout_seconds: default_generator_timeout(),
            prompt: None,
            ollama: OllamaConfig::default(),
        }
    }
}

/// Ollama generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Ollama server host
    #[serde(default = "default_ollama_host")]
    pub host: String,

    /// Model to use for summaries
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:latest".to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            model: default_ollama_model(),
        }
    }
}

/// Context store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Number of recent turns returned in the prompt window
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Unfolded turn count above which summarization is triggered
    #[serde(default = "default_summarize_threshold")]
    pub summarize_threshold: usize,

    /// Most recent turns that are never folded into the summary
    #[serde(default = "default_retain_recent")]
    pub retain_recent: usize,

    /// What happens to turns once they are folded
    #[serde(default)]
    pub fold_mode: FoldMode,

    /// Trigger summarization automatically after appends
    #[serde(default = "default_auto_summarize")]
    pub auto_summarize: bool,

    /// Maximum accepted session id length (bytes)
    #[serde(default = "default_max_session_id_len")]
    pub max_session_id_len: usize,
}

fn default_window_size() -> usize {
    10
}

fn default_summarize_threshold() -> usize {
    4
}

fn default_retain_recent() -> usize {
    2
}

fn default_auto_summarize() -> bool {
    true
}

fn default_max_session_id_len() -> usize {
    256
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            summarize_threshold: default_summarize_threshold(),
            retain_recent: default_retain_recent(),
            fold_mode: FoldMode::default(),
            auto_summarize: default_auto_summarize(),
            max_session_id_len: default_max_session_id_len(),
        }
    }
}

/// Fold mode
///
/// Controls whether turns folded into the summary stay retrievable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FoldMode {
    /// Folded turns are removed from the turn log
    #[default]
    Compact,
    /// The full log is kept; folded turns only leave the prompt window
    Retain,
}

impl FromStr for FoldMode {
    type Err = ConvokeepError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "retain" => Ok(Self::Retain),
            other => Err(ConvokeepError::Config(format!(
                "Invalid fold mode: {}",
                other
            ))),
        }
    }
}

/// Snapshot storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage backend
    #[serde(default)]
    pub backend: StorageBackend,

    /// Database file (sqlite) or directory (file); platform data dir when unset
    #[serde(default)]
    pub path: Option<String>,
}

/// Snapshot storage backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Single SQLite database with one row per session
    #[default]
    Sqlite,
    /// Directory with one JSON file per session
    File,
}

impl FromStr for StorageBackend {
    type Err = ConvokeepError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "file" => Ok(Self::File),
            other => Err(ConvokeepError::Config(format!(
                "Invalid storage backend: {}",
                other
            ))),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConvokeepError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ConvokeepError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(generator) = std::env::var("CONVOKEEP_GENERATOR") {
            self.generator.generator_type = generator;
        }

        if let Some(timeout) = parse_env("CONVOKEEP_GENERATOR_TIMEOUT_SECONDS") {
            self.generator.timeout_seconds = timeout;
        }

        if let Ok(host) = std::env::var("CONVOKEEP_OLLAMA_HOST") {
            self.generator.ollama.host = host;
        }

        if let Ok(model) = std::env::var("CONVOKEEP_OLLAMA_MODEL") {
            self.generator.ollama.model = model;
        }

        if let Some(window) = parse_env("CONVOKEEP_WINDOW_SIZE") {
            self.context.window_size = window;
        }

        if let Some(threshold) = parse_env("CONVOKEEP_SUMMARIZE_THRESHOLD") {
            self.context.summarize_threshold = threshold;
        }

        if let Some(retain) = parse_env("CONVOKEEP_RETAIN_RECENT") {
            self.context.retain_recent = retain;
        }

        if let Some(mode) = parse_env("CONVOKEEP_FOLD_MODE") {
            self.context.fold_mode = mode;
        }

        if let Some(auto) = parse_env("CONVOKEEP_AUTO_SUMMARIZE") {
            self.context.auto_summarize = auto;
        }

        if let Some(backend) = parse_env("CONVOKEEP_STORAGE_BACKEND") {
            self.storage.backend = backend;
        }

        if let Ok(path) = std::env::var("CONVOKEEP_STORAGE_PATH") {
            tracing::debug!(path = %path, "Env override: CONVOKEEP_STORAGE_PATH");
            self.storage.path = Some(path);
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(generator) = &cli.generator {
            self.generator.generator_type = generator.clone();
        }

        if let Some(path) = &cli.storage_path {
            self.storage.path = Some(path.clone());
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConvokeepError::Config` describing the first invalid setting
    pub fn validate(&self) -> Result<()> {
        match self.generator.generator_type.as_str() {
            "extractive" => {}
            "ollama" => {
                if self.generator.ollama.host.trim().is_empty() {
                    return Err(
                        ConvokeepError::Config("Ollama host cannot be empty".to_string()).into(),
                    );
                }
                if self.generator.ollama.model.trim().is_empty() {
                    return Err(
                        ConvokeepError::Config("Ollama model cannot be empty".to_string()).into(),
                    );
                }
            }
            other => {
                return Err(
                    ConvokeepError::Config(format!("Invalid generator type: {}", other)).into(),
                );
            }
        }

        if self.generator.timeout_seconds == 0 {
            return Err(ConvokeepError::Config(
                "generator.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.context.window_size == 0 {
            return Err(ConvokeepError::Config(
                "context.window_size must be greater than 0".to_string(),
            )
            .into());
        }

        if self.context.retain_recent >= self.context.summarize_threshold {
            return Err(ConvokeepError::Config(format!(
                "context.retain_recent ({}) must be less than context.summarize_threshold ({})",
                self.context.retain_recent, self.context.summarize_threshold
            ))
            .into());
        }

        if self.context.max_session_id_len == 0 {
            return Err(ConvokeepError::Config(
                "context.max_session_id_len must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

/// Reads and parses an environment variable, warning when it does not parse
fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => {
            tracing::debug!(name, value = %raw, "Applied environment override");
            Some(value)
        }
        Err(_) => {
            tracing::warn!("Invalid {}: {}", name, raw);
            None
        }
    }
}
