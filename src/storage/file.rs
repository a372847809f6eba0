//! Directory-backed snapshot store
//!
//! Each session lives in `<encoded-key>.json`. Keys are opaque, so every byte
//! outside `[A-Za-z0-9._-]` is percent-encoded to keep file names portable.
//! Keys whose encoding would be too long for a file name are stored under
//! `~sha256-<digest>.json` instead; `~` never survives encoding, so the two
//! naming schemes cannot collide. Writes go to a temporary file that is
//! renamed over the target.

use crate::context::{Session, SessionKey};
use crate::error::{ConvokeepError, Result};
use crate::storage::{SnapshotStore, StoredSession};
use anyhow::Context;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

const EXTENSION: &str = "json";

/// Longest encoded key used verbatim as a file stem
const MAX_ENCODED_STEM: usize = 200;

/// Snapshot store keeping one JSON file per session
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Opens (and creates if needed) a snapshot directory
    ///
    /// # Errors
    ///
    /// Returns `ConvokeepError::Storage` if the directory cannot be created
    pub fn new<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .context("Failed to create snapshot directory")
            .map_err(|e| ConvokeepError::Storage(e.to_string()))?;
        tracing::debug!(dir = %dir.display(), "Opened file snapshot store");
        Ok(Self { dir })
    }

    /// Snapshot directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &SessionKey) -> PathBuf {
        self.dir
            .join(format!("{}.{}", file_stem(key.as_str()), EXTENSION))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&self, session: &Session) -> Result<()> {
        let snapshot = session.serialize()?;
        let path = self.path_for(session.key());
        let tmp = path.with_extension("json.tmp");

        std::fs::write(&tmp, snapshot)
            .context("Failed to write snapshot")
            .map_err(|e| ConvokeepError::Storage(e.to_string()))?;
        std::fs::rename(&tmp, &path)
            .context("Failed to move snapshot into place")
            .map_err(|e| ConvokeepError::Storage(e.to_string()))?;

        tracing::debug!(
            session = %session.key(),
            path = %path.display(),
            "Saved session snapshot"
        );
        Ok(())
    }

    fn load(&self, key: &SessionKey) -> Result<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConvokeepError::Storage(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))
            .into()),
        }
    }

    fn delete(&self, key: &SessionKey) -> Result<bool> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => {
                Err(ConvokeepError::Storage(format!("Failed to delete snapshot: {}", e)).into())
            }
        }
    }

    fn list(&self) -> Result<Vec<StoredSession>> {
        let entries = std::fs::read_dir(&self.dir)
            .context("Failed to read snapshot directory")
            .map_err(|e| ConvokeepError::Storage(e.to_string()))?;

        let mut sessions = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }

            let parsed = std::fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|blob| Session::deserialize_with_max_len(&blob, usize::MAX));
            match parsed {
                Ok(session) => sessions.push(StoredSession {
                    id: session.key().to_string(),
                    created_at: session.created_at(),
                    updated_at: session.updated_at(),
                    turn_count: session.len(),
                }),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Skipping unreadable snapshot"
                    );
                }
            }
        }

        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }
}

fn file_stem(key: &str) -> String {
    let encoded = encode_key(key);
    if encoded.len() <= MAX_ENCODED_STEM {
        return encoded;
    }
    format!("~sha256-{:x}", Sha256::digest(key.as_bytes()))
}

/// Percent-encodes every byte outside `[A-Za-z0-9._-]`
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Role;
    use tempfile::tempdir;

    fn session(id: &str) -> Session {
        let mut session = Session::new(SessionKey::new(id).unwrap());
        session.append(Role::Human, "hello");
        session
    }

    #[test]
    fn test_encode_key() {
        assert_eq!(encode_key("thread-42"), "thread-42");
        assert_eq!(encode_key("tech-guru:drafts"), "tech-guru%3Adrafts");
        assert_eq!(encode_key("../etc"), "..%2Fetc");
        assert_eq!(encode_key("ü"), "%C3%BC");
    }

    #[test]
    fn test_save_load_delete() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path()).unwrap();
        let s = session("persona:scope");

        store.save(&s).unwrap();
        assert!(dir.path().join("persona%3Ascope.json").exists());
        assert!(!dir.path().join("persona%3Ascope.json.tmp").exists());

        let blob = store.load(s.key()).unwrap().unwrap();
        assert_eq!(Session::deserialize(&blob).unwrap().turns(), s.turns());

        assert!(store.delete(s.key()).unwrap());
        assert!(!store.delete(s.key()).unwrap());
        assert!(store.load(s.key()).unwrap().is_none());
    }

    #[test]
    fn test_file_stem_hashes_long_keys() {
        assert_eq!(file_stem("thread-42"), "thread-42");

        let stem = file_stem(&"k".repeat(256));
        assert!(stem.starts_with("~sha256-"));
        assert_eq!(stem.len(), "~sha256-".len() + 64);
        assert_ne!(stem, file_stem(&"k".repeat(255)));
        assert!(file_stem(&"ü".repeat(100)).starts_with("~sha256-"));
    }

    #[test]
    fn test_max_length_key_round_trips() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path()).unwrap();
        let s = session(&"k".repeat(SessionKey::DEFAULT_MAX_LEN));

        store.save(&s).unwrap();
        let blob = store.load(s.key()).unwrap().unwrap();
        assert_eq!(Session::deserialize(&blob).unwrap().key(), s.key());

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, s.key().as_str());

        assert!(store.delete(s.key()).unwrap());
        assert!(store.load(s.key()).unwrap().is_none());
    }

    #[test]
    fn test_list_skips_corrupt_files() {
        let dir = tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path()).unwrap();
        store.save(&session("good")).unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let sessions = store.list().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, "good");
        assert_eq!(sessions[0].turn_count, 1);
    }
}
