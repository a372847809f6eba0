//! Context store persistence through the snapshot backends

use convokeep::config::{ContextConfig, StorageBackend, StorageConfig};
use convokeep::context::{ContextStore, Persona, Role};
use convokeep::error::ConvokeepError;
use convokeep::storage::{open_store, SnapshotStore};
use serde_json::json;

mod common;

fn populated_store() -> ContextStore {
    let store = ContextStore::new(ContextConfig::default());
    store
        .append_message("tech-guru:chat", Role::Human, "My name is Alice.")
        .unwrap();
    store
        .append_message("tech-guru:chat", Role::Assistant, "Hi Alice!")
        .unwrap();
    store
        .set_preference("tech-guru:chat", "news_topics", json!(["tech", "science"]))
        .unwrap();
    store
        .set_persona(
            "tech-guru:chat",
            Persona {
                id: "tech-guru".to_string(),
                name: "Tech Guru".to_string(),
                context: Some("Fifteen years in Silicon Valley".to_string()),
            },
        )
        .unwrap();
    store
}

fn assert_restores_through(snapshots: &dyn SnapshotStore) {
    let original = populated_store();
    assert!(original.save_to(snapshots, "tech-guru:chat").unwrap());
    assert!(!original.save_to(snapshots, "never-written").unwrap());

    let restored = ContextStore::new(ContextConfig::default());
    assert!(restored.load_from(snapshots, "tech-guru:chat").unwrap());
    assert!(!restored.load_from(snapshots, "never-written").unwrap());

    assert_eq!(
        restored.get_recent("tech-guru:chat", 10),
        original.get_recent("tech-guru:chat", 10)
    );
    assert_eq!(
        restored.preferences("tech-guru:chat"),
        original.preferences("tech-guru:chat")
    );
    assert_eq!(
        restored
            .get_relevant_context("tech-guru:chat", "")
            .persona_context
            .as_deref(),
        Some("Fifteen years in Silicon Valley")
    );

    let listed = snapshots.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "tech-guru:chat");
    assert_eq!(listed[0].turn_count, 2);
}

#[test]
fn test_sqlite_round_trip() {
    let (storage, _dir) = common::create_temp_storage();
    assert_restores_through(&storage);
}

#[test]
fn test_file_round_trip() {
    let (storage, _dir) = common::create_temp_file_store();
    assert_restores_through(&storage);
}

#[test]
fn test_last_save_wins() {
    let (storage, _dir) = common::create_temp_storage();
    let store = populated_store();
    store.save_to(&storage, "tech-guru:chat").unwrap();
    store
        .append_message("tech-guru:chat", Role::Human, "One more thing")
        .unwrap();
    store.save_to(&storage, "tech-guru:chat").unwrap();

    let restored = ContextStore::new(ContextConfig::default());
    restored.load_from(&storage, "tech-guru:chat").unwrap();
    assert_eq!(restored.get_recent("tech-guru:chat", 10).len(), 3);
    assert_eq!(storage.list().unwrap().len(), 1);
}

#[test]
fn test_load_rejects_corrupt_snapshot_file() {
    let (storage, dir) = common::create_temp_file_store();
    std::fs::write(dir.path().join("snapshots").join("broken.json"), "{\"format\":").unwrap();

    let store = ContextStore::new(ContextConfig::default());
    let err = store.load_from(&storage, "broken").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConvokeepError>(),
        Some(ConvokeepError::Deserialization(_))
    ));
    assert!(!store.contains("broken"));
}

#[test]
fn test_load_rejects_snapshot_under_wrong_key() {
    let (storage, dir) = common::create_temp_file_store();
    let store = populated_store();
    let blob = store.serialize("tech-guru:chat").unwrap();
    std::fs::write(dir.path().join("snapshots").join("impostor.json"), blob).unwrap();

    let other = ContextStore::new(ContextConfig::default());
    assert!(other.load_from(&storage, "impostor").is_err());
    assert!(other.is_empty());
}

#[test]
fn test_open_store_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        backend: StorageBackend::Sqlite,
        path: Some(dir.path().join("db").join("sessions.db").to_string_lossy().to_string()),
    };
    let snapshots = open_store(&config).unwrap();
    assert_restores_through(snapshots.as_ref());
}
