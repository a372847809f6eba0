//! Error types for Convokeep
//!
//! This module defines the error types used throughout the crate,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Convokeep operations
///
/// Malformed session identifiers and corrupt snapshots are the only failures
/// callers of the context store see. The remaining variants cover the
/// configuration, storage, and generator layers used by the binary.
#[derive(Error, Debug)]
pub enum ConvokeepError {
    /// Session identifier is empty, too long, or contains control characters
    #[error("Invalid session id: {0}")]
    InvalidSession(String),

    /// Persisted snapshot could not be restored
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Text generator errors (HTTP failures, bad responses)
    #[error("Generator error: {0}")]
    Generator(String),

    /// Snapshot storage errors (database or file operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failure inside the summarizer boundary
///
/// These never leave the summarizer: the store logs them and leaves the
/// existing summary in place.
#[derive(Error, Debug)]
pub enum SummarizationError {
    /// The text generator returned an error
    #[error("Summary generation failed: {0}")]
    Generation(String),

    /// The text generator did not answer in time
    #[error("Summary generation timed out after {0}s")]
    Timeout(u64),

    /// The text generator answered with blank text
    #[error("Summary generation returned an empty response")]
    EmptyResponse,
}

/// Result type alias for Convokeep operations
///
/// Uses `anyhow::Error`; callers that need to branch on the failure kind can
/// `downcast_ref::<ConvokeepError>()`.
pub type Result<T> = anyhow::Result<T>;
