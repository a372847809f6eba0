//! Convokeep - conversation context store
//!
//! Keeps per-session conversation context for assistants: an append-only
//! turn log with a verbatim recent window, a running summary that older
//! turns are folded into through an external text generator, and durable
//! key/value preferences. Sessions serialize to self-describing JSON
//! snapshots for persistence.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `context`: Sessions, preferences, summarization, and the context store
//! - `generation`: Text generator abstraction and implementations (Extractive, Ollama)
//! - `storage`: Snapshot persistence (SQLite, files)
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`, `commands`, `logging`: The maintenance binary
//!
//! # Example
//!
//! ```
//! use convokeep::config::ContextConfig;
//! use convokeep::context::{ContextStore, Role};
//! use serde_json::json;
//!
//! let store = ContextStore::new(ContextConfig::default());
//! store.append_message("s1", Role::Human, "My name is Alice.").unwrap();
//! store.append_message("s1", Role::Assistant, "Hi Alice!").unwrap();
//! store.set_preference("s1", "weather_unit", json!("celsius")).unwrap();
//!
//! let context = store.get_relevant_context("s1", "What's the weather?");
//! assert_eq!(context.recent_context.len(), 2);
//! assert_eq!(context.user_preferences["weather_unit"], "celsius");
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod generation;
pub mod logging;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use context::{ContextStore, Role, Session, SessionKey, SummaryOutcome};
pub use error::{ConvokeepError, Result};
pub use generation::TextGenerator;

#[cfg(test)]
pub mod test_utils;
