//! Per-process conversation context store
//!
//! [`ContextStore`] routes session keys to [`Session`]s, creating a session
//! on its first write. Reads of unknown sessions return empty values and do
//! not create anything. The store is cheap to clone; clones share the same
//! session map.
//!
//! Automatic summarization runs on a spawned tokio task so appends never wait
//! on the generator. At most one summarization runs per session; duplicate
//! triggers are coalesced.

use crate::config::ContextConfig;
use crate::context::assembly::RelevantContext;
use crate::context::metrics;
use crate::context::preferences::PreferenceChange;
use crate::context::session::{Exchange, Persona, Role, Session, SessionKey, Turn};
use crate::context::summarizer::Summarizer;
use crate::error::{ConvokeepError, Result};
use crate::storage::SnapshotStore;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Result of a summarization pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryOutcome {
    /// The summary was replaced and `folded` turns were folded into it
    Updated {
        /// Number of turns folded by this pass
        folded: usize,
    },
    /// Not enough unfolded turns, or no such session
    NothingToFold,
    /// Another summarization for the session is in flight
    AlreadyRunning,
    /// The generator failed; the summary is unchanged
    Failed,
    /// The store has no summarizer
    Disabled,
    /// The session changed while the generator ran; the result was dropped
    Stale,
}

impl SummaryOutcome {
    /// Label used in logs and metrics
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Updated { .. } => "updated",
            Self::NothingToFold => "nothing_to_fold",
            Self::AlreadyRunning => "already_running",
            Self::Failed => "failed",
            Self::Disabled => "disabled",
            Self::Stale => "stale",
        }
    }
}

impl fmt::Display for SummaryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Updated { folded } => write!(f, "updated ({} turns folded)", folded),
            other => f.write_str(other.as_label()),
        }
    }
}

struct StoreInner {
    config: ContextConfig,
    sessions: Mutex<HashMap<SessionKey, Session>>,
    in_flight: Mutex<HashSet<SessionKey>>,
    next_instance: AtomicU64,
    summarizer: Option<Summarizer>,
}

/// Removes its key from the in-flight set when dropped
struct InFlightGuard<'a> {
    inner: &'a StoreInner,
    key: SessionKey,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(inner: &'a StoreInner, key: &SessionKey) -> Option<Self> {
        let mut in_flight = inner.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !in_flight.insert(key.clone()) {
            return None;
        }
        Some(Self {
            inner,
            key: key.clone(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}

/// Conversation context store shared across a process
///
/// # Examples
///
/// ```
/// use convokeep::config::ContextConfig;
/// use convokeep::context::{ContextStore, Role};
///
/// let store = ContextStore::new(ContextConfig::default());
/// store.append_message("s1", Role::Human, "My name is Alice.").unwrap();
/// store.append_message("s1", Role::Assistant, "Hi Alice!").unwrap();
///
/// let recent = store.get_recent("s1", 10);
/// assert_eq!(recent.len(), 2);
/// assert_eq!(recent[1].text, "Hi Alice!");
///
/// let blob = store.serialize("s1").unwrap();
/// let restored = ContextStore::new(ContextConfig::default());
/// restored.restore(&blob).unwrap();
/// assert_eq!(restored.get_recent("s1", 10), recent);
/// ```
#[derive(Clone)]
pub struct ContextStore {
    inner: Arc<StoreInner>,
}

impl ContextStore {
    /// Creates a store without a summarizer
    ///
    /// Turns are never folded; `maybe_summarize` reports `Disabled`.
    pub fn new(config: ContextConfig) -> Self {
        Self::build(config, None)
    }

    /// Creates a store that folds old turns through `summarizer`
    pub fn with_summarizer(config: ContextConfig, summarizer: Summarizer) -> Self {
        Self::build(config, Some(summarizer))
    }

    fn build(config: ContextConfig, summarizer: Option<Summarizer>) -> Self {
        tracing::info!(
            window_size = config.window_size,
            summarize_threshold = config.summarize_threshold,
            retain_recent = config.retain_recent,
            fold_mode = ?config.fold_mode,
            generator = summarizer.as_ref().map(|s| s.generator_name()),
            "Initialized context store"
        );

        Self {
            inner: Arc::new(StoreInner {
                config,
                sessions: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashSet::new()),
                next_instance: AtomicU64::new(1),
                summarizer,
            }),
        }
    }

    /// Store configuration
    pub fn config(&self) -> &ContextConfig {
        &self.inner.config
    }

    /// Validates a session id against the configured limits
    ///
    /// # Errors
    ///
    /// Returns `ConvokeepError::InvalidSession` for malformed ids
    pub fn key(&self, session_id: &str) -> Result<SessionKey> {
        SessionKey::with_max_len(session_id, self.inner.config.max_session_id_len)
    }

    fn next_instance(&self) -> u64 {
        self.inner.next_instance.fetch_add(1, Ordering::Relaxed)
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionKey, Session>> {
        self.inner
            .sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn read<T>(&self, session_id: &str, f: impl FnOnce(&Session) -> T) -> Option<T> {
        let key = self.key(session_id).ok()?;
        self.sessions().get(&key).map(f)
    }

    fn write<T>(&self, session_id: &str, f: impl FnOnce(&mut Session) -> T) -> Result<T> {
        let key = self.key(session_id)?;
        let mut sessions = self.sessions();
        let session = sessions.entry(key).or_insert_with_key(|key| {
            tracing::info!(session = %key, "Created session");
            let mut session = Session::new(key.clone());
            session.instance = self.next_instance();
            session
        });
        Ok(f(session))
    }

    /// Appends a turn to a session, creating the session if needed
    ///
    /// When automatic summarization is enabled and the unfolded part of the
    /// log exceeds the threshold, a background fold is started. This call
    /// never waits for it and never sees its errors.
    ///
    /// # Errors
    ///
    /// Returns `ConvokeepError::InvalidSession` if the id is malformed
    pub fn append_message(
        &self,
        session_id: &str,
        role: Role,
        text: impl Into<String>,
    ) -> Result<()> {
        let text = text.into();
        let (key, seq, unfolded) = self.write(session_id, |session| {
            let seq = session.append(role, text).seq;
            (session.key().clone(), seq, session.unfolded().len())
        })?;

        metrics::record_turn_appended(role);
        tracing::debug!(session = %key, seq, %role, unfolded, "Appended turn");

        if self.should_auto_summarize(unfolded) {
            self.spawn_summarize(key);
        }
        Ok(())
    }

    fn should_auto_summarize(&self, unfolded: usize) -> bool {
        self.inner.config.auto_summarize
            && self.inner.summarizer.is_some()
            && unfolded > self.inner.config.summarize_threshold
    }

    fn spawn_summarize(&self, key: SessionKey) {
        if self.is_key_summarizing(&key) {
            tracing::debug!(session = %key, "Summarization already in flight");
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let store = self.clone();
                handle.spawn(async move {
                    store.summarize_key(&key).await;
                });
            }
            Err(_) => {
                tracing::debug!(
                    session = %key,
                    "No async runtime available, skipping automatic summarization"
                );
            }
        }
    }

    /// Most recent retrievable turns, oldest first
    ///
    /// Unknown or malformed sessions yield an empty list.
    pub fn get_recent(&self, session_id: &str, window_size: usize) -> Vec<Turn> {
        self.read(session_id, |s| s.recent(window_size))
            .unwrap_or_default()
    }

    /// Every retrievable turn of a session
    pub fn turns(&self, session_id: &str) -> Vec<Turn> {
        self.read(session_id, |s| s.turns().to_vec())
            .unwrap_or_default()
    }

    /// Current running summary
    pub fn summary(&self, session_id: &str) -> Option<String> {
        self.read(session_id, |s| s.summary().map(String::from))
            .flatten()
    }

    /// Runs one summarization pass for a session
    ///
    /// Never fails: generator errors are logged and reported as
    /// [`SummaryOutcome::Failed`], leaving the previous summary in place.
    pub async fn maybe_summarize(&self, session_id: &str) -> SummaryOutcome {
        match self.key(session_id) {
            Ok(key) => self.summarize_key(&key).await,
            Err(_) => SummaryOutcome::NothingToFold,
        }
    }

    async fn summarize_key(&self, key: &SessionKey) -> SummaryOutcome {
        let Some(summarizer) = &self.inner.summarizer else {
            metrics::record_summarization(SummaryOutcome::Disabled.as_label(), None);
            return SummaryOutcome::Disabled;
        };

        let Some(_guard) = InFlightGuard::acquire(&self.inner, key) else {
            tracing::debug!(session = %key, "Summarization already in flight");
            metrics::record_summarization(SummaryOutcome::AlreadyRunning.as_label(), None);
            return SummaryOutcome::AlreadyRunning;
        };

        let plan = {
            let sessions = self.sessions();
            sessions
                .get(key)
                .and_then(|s| s.fold_plan(self.inner.config.retain_recent))
        };
        let Some(plan) = plan else {
            metrics::record_summarization(SummaryOutcome::NothingToFold.as_label(), None);
            return SummaryOutcome::NothingToFold;
        };

        let started = Instant::now();
        let result = summarizer
            .summarize(plan.prior_summary(), plan.turns())
            .await;
        let elapsed = started.elapsed();

        let outcome = match result {
            Ok(summary) => {
                let applied = {
                    let mut sessions = self.sessions();
                    sessions.get_mut(key).is_some_and(|session| {
                        session.apply_fold(&plan, summary, self.inner.config.fold_mode)
                    })
                };
                if applied {
                    tracing::info!(
                        session = %key,
                        folded = plan.turns().len(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Updated conversation summary"
                    );
                    SummaryOutcome::Updated {
                        folded: plan.turns().len(),
                    }
                } else {
                    tracing::debug!(
                        session = %key,
                        "Session changed during summarization, dropping result"
                    );
                    SummaryOutcome::Stale
                }
            }
            Err(e) => {
                tracing::warn!(
                    session = %key,
                    error = %e,
                    "Summarization failed, keeping previous summary"
                );
                SummaryOutcome::Failed
            }
        };

        metrics::record_summarization(outcome.as_label(), Some(elapsed));
        outcome
    }

    /// True while a summarization for the session is running
    pub fn is_summarizing(&self, session_id: &str) -> bool {
        self.key(session_id)
            .map(|key| self.is_key_summarizing(&key))
            .unwrap_or(false)
    }

    fn is_key_summarizing(&self, key: &SessionKey) -> bool {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }

    /// Sets a preference, returning the value it replaced
    ///
    /// # Errors
    ///
    /// Returns `ConvokeepError::InvalidSession` if the id is malformed
    pub fn set_preference(
        &self,
        session_id: &str,
        key: impl Into<String>,
        value: Value,
    ) -> Result<Option<Value>> {
        self.write(session_id, |s| s.preferences_mut().set(key, value))
    }

    /// Looks up a preference
    pub fn get_preference(&self, session_id: &str, key: &str) -> Option<Value> {
        self.read(session_id, |s| s.preferences().get(key).cloned())
            .flatten()
    }

    /// Removes a preference; absent keys and unknown sessions are a no-op
    pub fn remove_preference(&self, session_id: &str, key: &str) -> Option<Value> {
        let session_key = self.key(session_id).ok()?;
        let mut sessions = self.sessions();
        let session = sessions.get_mut(&session_key)?;
        if !session.preferences().contains(key) {
            return None;
        }
        session.preferences_mut().remove(key)
    }

    /// All current preferences of a session
    pub fn preferences(&self, session_id: &str) -> BTreeMap<String, Value> {
        self.read(session_id, |s| s.preferences().all().clone())
            .unwrap_or_default()
    }

    /// Preference change history of a session
    pub fn preference_history(&self, session_id: &str) -> Vec<PreferenceChange> {
        self.read(session_id, |s| s.preferences().history().to_vec())
            .unwrap_or_default()
    }

    /// Binds a persona to a session
    ///
    /// # Errors
    ///
    /// Returns `ConvokeepError::InvalidSession` if the id is malformed
    pub fn set_persona(&self, session_id: &str, persona: Persona) -> Result<()> {
        self.write(session_id, |s| s.set_persona(persona))
    }

    /// Assembles prompt context for a session
    ///
    /// `query_text` is accepted for interface compatibility; the recent
    /// window is returned as is, without relevance ranking.
    pub fn get_relevant_context(&self, session_id: &str, query_text: &str) -> RelevantContext {
        tracing::debug!(
            session = session_id,
            query_len = query_text.len(),
            "Assembling context"
        );
        self.read(session_id, |s| s.relevant_context(self.inner.config.window_size))
            .unwrap_or_default()
    }

    /// Human turns paired with the assistant answers that followed them
    pub fn exchanges(&self, session_id: &str) -> Vec<Exchange> {
        self.read(session_id, Session::exchanges)
            .unwrap_or_default()
    }

    /// The user's name, remembered as the `user_name` preference once found
    pub fn user_name(&self, session_id: &str) -> Option<String> {
        let key = self.key(session_id).ok()?;
        let mut sessions = self.sessions();
        let session = sessions.get_mut(&key)?;
        let name = session.user_name()?;
        if !session.preferences().contains("user_name") {
            tracing::debug!(session = %key, "Remembering user name");
            session
                .preferences_mut()
                .set("user_name", Value::String(name.clone()));
        }
        Some(name)
    }

    /// Drops the turn log and summary of a session, keeping persona and
    /// preferences
    ///
    /// Returns false for unknown sessions.
    pub fn clear_turns(&self, session_id: &str) -> bool {
        let Ok(key) = self.key(session_id) else {
            return false;
        };
        match self.sessions().get_mut(&key) {
            Some(session) => {
                session.clear_turns();
                tracing::info!(session = %key, "Cleared turn log");
                true
            }
            None => false,
        }
    }

    /// Serializes a session to a self-describing JSON snapshot
    ///
    /// Unknown sessions serialize as empty sessions.
    ///
    /// # Errors
    ///
    /// Returns `ConvokeepError::InvalidSession` if the id is malformed
    pub fn serialize(&self, session_id: &str) -> Result<String> {
        let key = self.key(session_id)?;
        let sessions = self.sessions();
        match sessions.get(&key) {
            Some(session) => session.serialize(),
            None => Session::new(key).serialize(),
        }
    }

    /// Restores a session from a snapshot, replacing any session with the
    /// same key, and returns its key
    ///
    /// # Errors
    ///
    /// Returns `ConvokeepError::Deserialization` if the snapshot is corrupt
    pub fn restore(&self, blob: &str) -> Result<SessionKey> {
        let session =
            Session::deserialize_with_max_len(blob, self.inner.config.max_session_id_len)?;
        let key = session.key().clone();
        self.insert_session(session)?;
        metrics::record_session_restored();
        tracing::info!(session = %key, "Restored session from snapshot");
        Ok(key)
    }

    /// Installs a session under its own key, returning the one it replaced
    ///
    /// The session gets a fresh store identity, so a summarization still
    /// running for any earlier session under the same key is discarded when
    /// it completes.
    ///
    /// # Errors
    ///
    /// Returns `ConvokeepError::InvalidSession` if the key exceeds the
    /// configured length limit
    pub fn insert_session(&self, mut session: Session) -> Result<Option<Session>> {
        let key = self.key(session.key().as_str())?;
        session.instance = self.next_instance();
        let mut sessions = self.sessions();
        if let Some(existing) = sessions.get(&key) {
            session.epoch = existing.epoch + 1;
        }
        Ok(sessions.insert(key, session))
    }

    /// A copy of a session's full state
    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.read(session_id, Session::clone)
    }

    /// Removes a session from the store
    pub fn evict(&self, session_id: &str) -> Option<Session> {
        let key = self.key(session_id).ok()?;
        let removed = self.sessions().remove(&key);
        if removed.is_some() {
            tracing::info!(session = %key, "Evicted session");
        }
        removed
    }

    /// True if the store holds the session
    pub fn contains(&self, session_id: &str) -> bool {
        self.read(session_id, |_| ()).is_some()
    }

    /// Keys of all sessions held, sorted
    pub fn session_ids(&self) -> Vec<SessionKey> {
        let mut ids: Vec<SessionKey> = self.sessions().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of sessions held
    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    /// True if no sessions are held
    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }

    /// Persists a session to `store`
    ///
    /// Returns false if the session does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is malformed or the store fails
    pub fn save_to(&self, store: &dyn SnapshotStore, session_id: &str) -> Result<bool> {
        let key = self.key(session_id)?;
        let Some(session) = self.sessions().get(&key).cloned() else {
            return Ok(false);
        };
        store.save(&session)?;
        Ok(true)
    }

    /// Loads a session from `store`, replacing any in-memory copy
    ///
    /// Returns false if the store has no snapshot for the id.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is malformed, the store fails, or the
    /// snapshot is corrupt
    pub fn load_from(&self, store: &dyn SnapshotStore, session_id: &str) -> Result<bool> {
        let key = self.key(session_id)?;
        let Some(blob) = store.load(&key)? else {
            return Ok(false);
        };

        let session =
            Session::deserialize_with_max_len(&blob, self.inner.config.max_session_id_len)?;
        if session.key() != &key {
            return Err(ConvokeepError::Deserialization(format!(
                "snapshot stored under '{}' belongs to session '{}'",
                key,
                session.key()
            ))
            .into());
        }

        self.insert_session(session)?;
        metrics::record_session_restored();
        tracing::info!(session = %key, "Loaded session from storage");
        Ok(true)
    }
}

impl fmt::Debug for ContextStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextStore")
            .field("config", &self.inner.config)
            .field("sessions", &self.len())
            .field("summarizer", &self.inner.summarizer)
            .finish()
    }
}
