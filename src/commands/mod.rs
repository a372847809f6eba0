/*!
Command handlers for the CLI

Each handler opens the configured snapshot store, loads the session it works
on into a [`ContextStore`], applies the command, and saves the session back.

- `sessions`: list and delete persisted sessions
- `turns`: show context, append turns, summarize
- `prefs`: preference management
- `transfer`: snapshot export and import
*/

use crate::config::{Config, ContextConfig};
use crate::context::{ContextStore, Summarizer};
use crate::error::{ConvokeepError, Result};
use crate::generation::create_generator;
use crate::storage::{open_store, SnapshotStore};

pub mod prefs;
pub mod sessions;
pub mod transfer;
pub mod turns;

/// A context store bound to the persistent snapshot store
pub struct Workspace {
    /// In-memory store the command operates on
    pub store: ContextStore,
    /// Persistent snapshots
    pub snapshots: Box<dyn SnapshotStore>,
    /// Threshold used to decide whether an append should summarize
    pub summarize_threshold: usize,
    /// Whether appends may summarize
    pub auto_summarize: bool,
}

impl Workspace {
    /// Builds the context store and opens snapshot storage for `config`
    ///
    /// Background summarization is turned off in the store: a CLI process
    /// exits before a spawned fold could finish, so handlers summarize
    /// inline instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the generator or snapshot store cannot be created
    pub fn open(config: &Config) -> Result<Self> {
        let generator = create_generator(&config.generator)?;
        let summarizer = Summarizer::from_config(generator, &config.generator);
        let context = ContextConfig {
            auto_summarize: false,
            ..config.context.clone()
        };

        Ok(Self {
            store: ContextStore::with_summarizer(context, summarizer),
            snapshots: open_store(&config.storage)?,
            summarize_threshold: config.context.summarize_threshold,
            auto_summarize: config.context.auto_summarize,
        })
    }

    /// Loads a session from storage, returning whether it existed
    pub fn load(&self, id: &str) -> Result<bool> {
        self.store.load_from(self.snapshots.as_ref(), id)
    }

    /// Loads a session from storage, failing if it does not exist
    pub fn require(&self, id: &str) -> Result<()> {
        if self.load(id)? {
            Ok(())
        } else {
            Err(ConvokeepError::Storage(format!("Session not found: {}", id)).into())
        }
    }

    /// Writes a session back to storage
    pub fn save(&self, id: &str) -> Result<()> {
        self.store.save_to(self.snapshots.as_ref(), id)?;
        Ok(())
    }
}
