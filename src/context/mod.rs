//! Conversation context store
//!
//! Per-session turn logs with a verbatim recent window, a running summary of
//! folded turns, key/value preferences, and JSON snapshots for persistence.
//!
//! - `session`: session keys, turns, and the per-session state machine
//! - `preferences`: preference map with change history
//! - `summarizer`: generator boundary that folds turns into the summary
//! - `assembly`: prompt context composition
//! - `snapshot`: session serialization
//! - `store`: the shared, session-routing [`ContextStore`]

pub mod assembly;
pub mod metrics;
pub mod preferences;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod summarizer;

pub use crate::config::FoldMode;
pub use assembly::RelevantContext;
pub use preferences::{PreferenceChange, PreferenceStore};
pub use session::{Exchange, FoldPlan, Persona, Role, Session, SessionKey, Turn};
pub use store::{ContextStore, SummaryOutcome};
pub use summarizer::Summarizer;
