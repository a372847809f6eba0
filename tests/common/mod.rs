use async_trait::async_trait;
use convokeep::error::{ConvokeepError, Result};
use convokeep::generation::TextGenerator;
use convokeep::storage::{FileSnapshotStore, SqliteStorage};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

#[allow(dead_code)]
pub fn create_temp_storage() -> (SqliteStorage, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("sessions.db");
    let storage =
        SqliteStorage::new_with_path(db_path).expect("failed to create sqlite storage with path");
    (storage, tmp)
}

#[allow(dead_code)]
pub fn create_temp_file_store() -> (FileSnapshotStore, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let store = FileSnapshotStore::new(tmp.path().join("snapshots"))
        .expect("failed to create file snapshot store");
    (store, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Generator answering "summary N" for its N-th call, optionally after a delay
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct CountingGenerator {
    pub calls: AtomicUsize,
    pub delay: Option<Duration>,
}

#[allow(dead_code)]
impl CountingGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Some(delay),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for CountingGenerator {
    async fn generate(&self, _prompt: &str, _context: &str) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(format!("summary {}", n))
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Generator that always errors
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct BrokenGenerator;

#[async_trait]
impl TextGenerator for BrokenGenerator {
    async fn generate(&self, _prompt: &str, _context: &str) -> Result<String> {
        Err(ConvokeepError::Generator("connection refused".to_string()).into())
    }

    fn name(&self) -> &str {
        "broken"
    }
}
