//! Session snapshots
//!
//! A snapshot is a single self-describing JSON document holding the complete
//! state of one session: turn log, fold cursor, summary, preferences with
//! their history, and persona. Restoring validates structure as well as
//! syntax, so a truncated or hand-edited blob fails instead of producing an
//! empty session.

use crate::context::preferences::PreferenceStore;
use crate::context::session::{Persona, Session, SessionKey, Turn};
use crate::error::{ConvokeepError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Format tag written into every snapshot
pub const SNAPSHOT_FORMAT: &str = "convokeep.session";

/// Current snapshot layout version
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SessionSnapshot {
    format: String,
    version: u32,
    session_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    next_seq: u64,
    summary: Option<String>,
    folded_through: Option<u64>,
    turns: Vec<Turn>,
    preferences: PreferenceStore,
    persona: Option<Persona>,
}

impl SessionSnapshot {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.format != SNAPSHOT_FORMAT {
            return Err(format!("unexpected snapshot format '{}'", self.format));
        }
        if self.version == 0 || self.version > SNAPSHOT_VERSION {
            return Err(format!("unsupported snapshot version {}", self.version));
        }

        let mut previous: Option<u64> = None;
        for turn in &self.turns {
            if previous.is_some_and(|p| turn.seq <= p) {
                return Err(format!("turn sequence is not increasing at seq {}", turn.seq));
            }
            if turn.seq >= self.next_seq {
                return Err(format!(
                    "turn seq {} is not below next_seq {}",
                    turn.seq, self.next_seq
                ));
            }
            previous = Some(turn.seq);
        }

        match (&self.summary, self.folded_through) {
            (Some(_), Some(cursor)) if cursor >= self.next_seq => Err(format!(
                "fold cursor {} is beyond the turn log",
                cursor
            )),
            (Some(_), Some(_)) | (None, None) => Ok(()),
            (Some(_), None) => Err("summary present without a fold cursor".to_string()),
            (None, Some(_)) => Err("fold cursor present without a summary".to_string()),
        }
    }
}

impl Session {
    /// Serializes the complete session state to a JSON string
    ///
    /// # Errors
    ///
    /// Returns `ConvokeepError::Serialization` if encoding fails
    pub fn serialize(&self) -> Result<String> {
        let snapshot = SessionSnapshot {
            format: SNAPSHOT_FORMAT.to_string(),
            version: SNAPSHOT_VERSION,
            session_id: self.key.to_string(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            next_seq: self.next_seq,
            summary: self.summary.clone(),
            folded_through: self.folded_through,
            turns: self.turns.clone(),
            preferences: self.preferences.clone(),
            persona: self.persona.clone(),
        };
        Ok(serde_json::to_string(&snapshot).map_err(ConvokeepError::from)?)
    }

    /// Rebuilds a session from a snapshot produced by [`Session::serialize`]
    ///
    /// # Errors
    ///
    /// Returns `ConvokeepError::Deserialization` for malformed JSON, missing
    /// fields, an unknown format or version, or inconsistent turn ordering
    ///
    /// # Examples
    ///
    /// ```
    /// use convokeep::context::{Role, Session, SessionKey};
    ///
    /// let mut session = Session::new(SessionKey::new("s1").unwrap());
    /// session.append(Role::Human, "My name is Alice.");
    /// let blob = session.serialize().unwrap();
    ///
    /// let restored = Session::deserialize(&blob).unwrap();
    /// assert_eq!(restored.recent(10), session.recent(10));
    ///
    /// assert!(Session::deserialize(&blob[..blob.len() / 2]).is_err());
    /// ```
    pub fn deserialize(blob: &str) -> Result<Session> {
        Self::deserialize_with_max_len(blob, SessionKey::DEFAULT_MAX_LEN)
    }

    /// Like [`Session::deserialize`], accepting session ids up to `max_len`
    /// bytes
    ///
    /// # Errors
    ///
    /// Returns `ConvokeepError::Deserialization` for corrupt snapshots and
    /// for session ids the limit rejects
    pub fn deserialize_with_max_len(blob: &str, max_len: usize) -> Result<Session> {
        let snapshot: SessionSnapshot = serde_json::from_str(blob).map_err(|e| {
            ConvokeepError::Deserialization(format!("Failed to parse session snapshot: {}", e))
        })?;

        let key = SessionKey::with_max_len(snapshot.session_id.clone(), max_len).map_err(|e| {
            ConvokeepError::Deserialization(format!("Invalid snapshot session id: {}", e))
        })?;

        snapshot.validate().map_err(|reason| {
            ConvokeepError::Deserialization(format!(
                "Invalid snapshot for session '{}': {}",
                snapshot.session_id, reason
            ))
        })?;

        Ok(Session {
            key,
            turns: snapshot.turns,
            next_seq: snapshot.next_seq,
            summary: snapshot.summary,
            folded_through: snapshot.folded_through,
            preferences: snapshot.preferences,
            persona: snapshot.persona,
            instance: 0,
            epoch: 0,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FoldMode;
    use crate::context::session::Role;
    use serde_json::json;

    fn sample_session() -> Session {
        let mut session = Session::new(SessionKey::new("s1").unwrap());
        session.append(Role::Human, "My name is Alice.");
        session.append(Role::Assistant, "Hi Alice!");
        session
            .preferences_mut()
            .set("news_topics", json!(["tech", "science"]));
        session
    }

    fn deserialization_error(blob: &str) -> String {
        let err = Session::deserialize(blob).unwrap_err();
        match err.downcast_ref::<ConvokeepError>() {
            Some(ConvokeepError::Deserialization(msg)) => msg.clone(),
            other => panic!("expected deserialization error, got {:?}", other),
        }
    }

    #[test]
    fn test_round_trip_preserves_state() {
        let mut session = sample_session();
        for i in 0..3 {
            session.append(Role::Human, format!("more {}", i));
        }
        let plan = session.fold_plan(2).unwrap();
        assert!(session.apply_fold(&plan, "Alice said hello".to_string(), FoldMode::Retain));

        let restored = Session::deserialize(&session.serialize().unwrap()).unwrap();
        assert_eq!(restored.key(), session.key());
        assert_eq!(restored.turns(), session.turns());
        assert_eq!(restored.summary(), Some("Alice said hello"));
        assert_eq!(restored.folded_through(), session.folded_through());
        assert_eq!(restored.preferences(), session.preferences());
        assert_eq!(restored.prompt_window(10), session.prompt_window(10));
    }

    #[test]
    fn test_restored_session_continues_sequence() {
        let session = sample_session();
        let mut restored = Session::deserialize(&session.serialize().unwrap()).unwrap();
        let seq = restored.append(Role::Human, "next").seq;
        assert_eq!(seq, 2);
    }

    #[test]
    fn test_empty_input_fails() {
        let msg = deserialization_error("");
        assert!(msg.contains("Failed to parse"));
    }

    #[test]
    fn test_truncated_input_fails() {
        let blob = sample_session().serialize().unwrap();
        for cut in [1, blob.len() / 3, blob.len() - 1] {
            assert!(Session::deserialize(&blob[..cut]).is_err(), "cut at {}", cut);
        }
    }

    #[test]
    fn test_empty_object_fails() {
        deserialization_error("{}");
    }

    #[test]
    fn test_unknown_format_fails() {
        let blob = sample_session().serialize().unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&blob).unwrap();
        value["format"] = json!("something.else");
        let msg = deserialization_error(&value.to_string());
        assert!(msg.contains("unexpected snapshot format"));
    }

    #[test]
    fn test_future_version_fails() {
        let blob = sample_session().serialize().unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&blob).unwrap();
        value["version"] = json!(SNAPSHOT_VERSION + 1);
        let msg = deserialization_error(&value.to_string());
        assert!(msg.contains("unsupported snapshot version"));
    }

    #[test]
    fn test_out_of_order_turns_fail() {
        let blob = sample_session().serialize().unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&blob).unwrap();
        value["turns"][1]["seq"] = json!(0);
        let msg = deserialization_error(&value.to_string());
        assert!(msg.contains("not increasing"));
    }

    #[test]
    fn test_cursor_without_summary_fails() {
        let blob = sample_session().serialize().unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&blob).unwrap();
        value["folded_through"] = json!(0);
        let msg = deserialization_error(&value.to_string());
        assert!(msg.contains("without a summary"));
    }

    #[test]
    fn test_invalid_session_id_fails() {
        let blob = sample_session().serialize().unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&blob).unwrap();
        value["session_id"] = json!("   ");
        deserialization_error(&value.to_string());
    }

    #[test]
    fn test_snapshot_is_self_describing() {
        let blob = sample_session().serialize().unwrap();
        let value: serde_json::Value = serde_json::from_str(&blob).unwrap();
        assert_eq!(value["format"], SNAPSHOT_FORMAT);
        assert_eq!(value["version"], SNAPSHOT_VERSION);
        assert_eq!(value["session_id"], "s1");
        assert_eq!(value["turns"][0]["role"], "human");
    }
}
