//! Session state: turn log, fold cursor, summary, and preferences
//!
//! A [`Session`] owns everything remembered about one conversation thread.
//! Turns are append-only and ordered by a per-session sequence number. Once
//! turns are folded into the summary the fold cursor records the last folded
//! sequence number; whether the folded turns stay in the log depends on the
//! [`FoldMode`].

use crate::config::FoldMode;
use crate::context::assembly::RelevantContext;
use crate::context::preferences::PreferenceStore;
use crate::error::{ConvokeepError, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque, validated session identifier
///
/// Any non-blank string without control characters is accepted, up to a
/// maximum length. Keys are compared byte-for-byte.
///
/// # Examples
///
/// ```
/// use convokeep::context::SessionKey;
///
/// let key = SessionKey::new("thread-42").unwrap();
/// assert_eq!(key.as_str(), "thread-42");
///
/// let scoped = SessionKey::scoped("tech-guru", "drafts").unwrap();
/// assert_eq!(scoped.as_str(), "tech-guru:drafts");
///
/// assert!(SessionKey::new("   ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionKey(String);

impl SessionKey {
    /// Default maximum key length in bytes
    pub const DEFAULT_MAX_LEN: usize = 256;

    /// Validates `id` against the default maximum length
    ///
    /// # Errors
    ///
    /// Returns `ConvokeepError::InvalidSession` for blank, over-long, or
    /// control-character ids
    pub fn new(id: impl Into<String>) -> Result<Self> {
        Self::with_max_len(id, Self::DEFAULT_MAX_LEN)
    }

    /// Validates `id` against an explicit maximum length
    pub fn with_max_len(id: impl Into<String>, max_len: usize) -> Result<Self> {
        Ok(Self(validate_id(id.into(), max_len)?))
    }

    /// Creates a fresh random key (one per run, as chat front-ends do)
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Derives a key for a persona within a conversation scope
    pub fn scoped(persona: &str, scope: &str) -> Result<Self> {
        Self::new(format!("{}:{}", persona, scope))
    }

    /// Returns the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate_id(id: String, max_len: usize) -> std::result::Result<String, ConvokeepError> {
    if id.trim().is_empty() {
        return Err(ConvokeepError::InvalidSession(
            "session id cannot be empty".to_string(),
        ));
    }
    if id.len() > max_len {
        return Err(ConvokeepError::InvalidSession(format!(
            "session id is {} bytes, limit is {}",
            id.len(),
            max_len
        )));
    }
    if id.chars().any(char::is_control) {
        return Err(ConvokeepError::InvalidSession(
            "session id contains control characters".to_string(),
        ));
    }
    Ok(id)
}

impl TryFrom<String> for SessionKey {
    type Error = ConvokeepError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        validate_id(value, Self::DEFAULT_MAX_LEN).map(Self)
    }
}

impl From<SessionKey> for String {
    fn from(key: SessionKey) -> Self {
        key.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person talking to the assistant
    Human,
    /// The assistant
    Assistant,
}

impl Role {
    /// Speaker label used when rendering transcripts
    pub fn label(&self) -> &'static str {
        match self {
            Self::Human => "User",
            Self::Assistant => "Assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Human => write!(f, "human"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for Role {
    type Err = ConvokeepError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "user" => Ok(Self::Human),
            "assistant" | "ai" => Ok(Self::Assistant),
            other => Err(ConvokeepError::Config(format!("Unknown role: {}", other))),
        }
    }
}

/// One message within a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Per-session sequence number, strictly increasing
    pub seq: u64,
    /// Speaker
    pub role: Role,
    /// Message text, stored untruncated
    pub text: String,
    /// When the turn was appended
    pub timestamp: DateTime<Utc>,
}

/// Persona a session speaks as
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    /// Persona identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Background text injected into the assembled context
    #[serde(default)]
    pub context: Option<String>,
}

/// A human turn paired with the assistant turn that answered it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    /// What the human said
    pub query: String,
    /// What the assistant answered
    pub response: String,
}

/// Work captured for one summarization pass
///
/// Produced under the store lock, consumed after the generator call returns.
/// The instance, epoch, and base cursor detect sessions that were replaced or
/// changed in between.
#[derive(Debug, Clone)]
pub struct FoldPlan {
    pub(crate) instance: u64,
    pub(crate) epoch: u64,
    pub(crate) base: Option<u64>,
    pub(crate) through: u64,
    pub(crate) prior_summary: Option<String>,
    pub(crate) turns: Vec<Turn>,
}

impl FoldPlan {
    /// Turns that will be folded
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Summary the new one will replace
    pub fn prior_summary(&self) -> Option<&str> {
        self.prior_summary.as_deref()
    }
}

/// All state remembered for one conversation thread
#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) key: SessionKey,
    pub(crate) turns: Vec<Turn>,
    pub(crate) next_seq: u64,
    pub(crate) summary: Option<String>,
    pub(crate) folded_through: Option<u64>,
    pub(crate) preferences: PreferenceStore,
    pub(crate) persona: Option<Persona>,
    pub(crate) instance: u64,
    pub(crate) epoch: u64,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Session {
    /// Creates an empty session
    ///
    /// # Examples
    ///
    /// ```
    /// use convokeep::context::{Role, Session, SessionKey};
    ///
    /// let mut session = Session::new(SessionKey::new("s1").unwrap());
    /// session.append(Role::Human, "My name is Alice.");
    /// session.append(Role::Assistant, "Hi Alice!");
    ///
    /// let recent = session.recent(10);
    /// assert_eq!(recent.len(), 2);
    /// assert_eq!(recent[0].text, "My name is Alice.");
    /// ```
    pub fn new(key: SessionKey) -> Self {
        let now = Utc::now();
        Self {
            key,
            turns: Vec::new(),
            next_seq: 0,
            summary: None,
            folded_through: None,
            preferences: PreferenceStore::new(),
            persona: None,
            instance: 0,
            epoch: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Session key
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Appends a turn and returns it
    pub fn append(&mut self, role: Role, text: impl Into<String>) -> &Turn {
        let now = Utc::now();
        self.turns.push(Turn {
            seq: self.next_seq,
            role,
            text: text.into(),
            timestamp: now,
        });
        self.next_seq += 1;
        self.updated_at = now;
        &self.turns[self.turns.len() - 1]
    }

    /// All retrievable turns in chronological order
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Up to `window` most recent retrievable turns, oldest first
    pub fn recent(&self, window: usize) -> Vec<Turn> {
        tail(&self.turns, window).to_vec()
    }

    /// Turns not yet folded into the summary
    pub fn unfolded(&self) -> &[Turn] {
        match self.folded_through {
            None => &self.turns,
            Some(cursor) => {
                let start = self.turns.partition_point(|t| t.seq <= cursor);
                &self.turns[start..]
            }
        }
    }

    /// Up to `window` most recent unfolded turns: what a prompt should see
    pub fn prompt_window(&self, window: usize) -> Vec<Turn> {
        tail(self.unfolded(), window).to_vec()
    }

    /// Current running summary
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Sequence number of the last turn folded into the summary
    pub fn folded_through(&self) -> Option<u64> {
        self.folded_through
    }

    /// Counter bumped whenever the turn log is reset or replaced
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Identity assigned by the store holding this session, 0 when detached
    pub fn instance(&self) -> u64 {
        self.instance
    }

    /// Preferences
    pub fn preferences(&self) -> &PreferenceStore {
        &self.preferences
    }

    /// Mutable preferences
    pub fn preferences_mut(&mut self) -> &mut PreferenceStore {
        self.updated_at = Utc::now();
        &mut self.preferences
    }

    /// Persona bound to this session
    pub fn persona(&self) -> Option<&Persona> {
        self.persona.as_ref()
    }

    /// Binds a persona to this session
    pub fn set_persona(&mut self, persona: Persona) {
        self.persona = Some(persona);
        self.updated_at = Utc::now();
    }

    /// When the session was created
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the session last changed
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Number of retrievable turns
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns true if the turn log is empty
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Drops the turn log and summary, keeping persona and preferences
    pub fn clear_turns(&mut self) {
        self.turns.clear();
        self.summary = None;
        self.folded_through = None;
        self.epoch += 1;
        self.updated_at = Utc::now();
    }

    /// Captures the turns a summarization pass would fold
    ///
    /// Every unfolded turn except the newest `retain_recent` is folded.
    /// Returns `None` when there is nothing to fold, which makes repeated
    /// passes without new turns a no-op.
    pub fn fold_plan(&self, retain_recent: usize) -> Option<FoldPlan> {
        let unfolded = self.unfolded();
        if unfolded.len() <= retain_recent {
            return None;
        }
        let to_fold = &unfolded[..unfolded.len() - retain_recent];
        let through = to_fold.last()?.seq;

        Some(FoldPlan {
            instance: self.instance,
            epoch: self.epoch,
            base: self.folded_through,
            through,
            prior_summary: self.summary.clone(),
            turns: to_fold.to_vec(),
        })
    }

    /// Installs a new summary for a previously captured plan
    ///
    /// Returns false, leaving the session untouched, when the session was
    /// cleared, replaced, or folded by someone else since the plan was taken.
    pub fn apply_fold(&mut self, plan: &FoldPlan, summary: String, mode: FoldMode) -> bool {
        if plan.instance != self.instance
            || plan.epoch != self.epoch
            || plan.base != self.folded_through
        {
            return false;
        }

        self.summary = Some(summary);
        self.folded_through = Some(plan.through);
        if mode == FoldMode::Compact {
            self.turns.retain(|t| t.seq > plan.through);
        }
        self.updated_at = Utc::now();
        true
    }

    /// Human turns paired with the assistant turn directly after them
    pub fn exchanges(&self) -> Vec<Exchange> {
        self.turns
            .windows(2)
            .filter(|pair| pair[0].role == Role::Human && pair[1].role == Role::Assistant)
            .map(|pair| Exchange {
                query: pair[0].text.clone(),
                response: pair[1].text.clone(),
            })
            .collect()
    }

    /// The user's name, from the `user_name` preference or the turn log
    ///
    /// Falls back to the most recent human turn containing "my name is ...".
    pub fn user_name(&self) -> Option<String> {
        if let Some(name) = self.preferences.get("user_name").and_then(|v| v.as_str()) {
            return Some(name.to_string());
        }

        let re = Regex::new(r"(?i)\bmy name is\s+([^.!?,;\n]+)").ok()?;
        self.turns
            .iter()
            .rev()
            .filter(|t| t.role == Role::Human)
            .find_map(|t| re.captures(&t.text))
            .and_then(|caps| caps.get(1))
            .map(|m| capitalize_words(m.as_str()))
            .filter(|name| !name.is_empty())
    }

    /// Assembles the context a prompt needs for this session
    pub fn relevant_context(&self, window: usize) -> RelevantContext {
        RelevantContext {
            recent_context: self.prompt_window(window),
            conversation_summary: self.summary.clone(),
            user_preferences: self.preferences.all().clone(),
            persona_context: self.persona.as_ref().and_then(|p| p.context.clone()),
        }
    }
}

fn tail(turns: &[Turn], window: usize) -> &[Turn] {
    &turns[turns.len().saturating_sub(window)..]
}

fn capitalize_words(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
