//! Per-session preference store
//!
//! A flat key → JSON value map mutated explicitly by callers. Values are not
//! validated against any schema, so the same store holds weather units,
//! writing tone, shopping budgets, or nested objects. Every mutation is
//! recorded in a change history kept beside the map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A single recorded preference mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceChange {
    /// Preference key
    pub key: String,
    /// Value before the change, `None` if the key was absent
    pub old_value: Option<Value>,
    /// Value after the change, `None` if the key was removed
    pub new_value: Option<Value>,
    /// When the change happened
    pub changed_at: DateTime<Utc>,
}

/// Key/value preferences with last-write-wins semantics
///
/// # Examples
///
/// ```
/// use convokeep::context::PreferenceStore;
/// use serde_json::json;
///
/// let mut prefs = PreferenceStore::new();
/// prefs.set("weather_unit", json!("celsius"));
/// prefs.set("weather_unit", json!("fahrenheit"));
/// assert_eq!(prefs.get("weather_unit"), Some(&json!("fahrenheit")));
/// assert_eq!(prefs.history().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreferenceStore {
    entries: BTreeMap<String, Value>,
    #[serde(default)]
    history: Vec<PreferenceChange>,
}

impl PreferenceStore {
    /// Creates an empty preference store
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a preference, returning the previous value
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        let old_value = self.entries.insert(key.clone(), value.clone());
        self.history.push(PreferenceChange {
            key,
            old_value: old_value.clone(),
            new_value: Some(value),
            changed_at: Utc::now(),
        });
        old_value
    }

    /// Returns the value stored under `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Removes a preference
    ///
    /// Absent keys are a no-op and leave the history untouched.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let old_value = self.entries.remove(key)?;
        self.history.push(PreferenceChange {
            key: key.to_string(),
            old_value: Some(old_value.clone()),
            new_value: None,
            changed_at: Utc::now(),
        });
        Some(old_value)
    }

    /// Returns true if `key` is set
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns all current preferences, without the change history
    pub fn all(&self) -> &BTreeMap<String, Value> {
        &self.entries
    }

    /// Returns the change history in mutation order
    pub fn history(&self) -> &[PreferenceChange] {
        &self.history
    }

    /// Returns the number of preferences set
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no preferences are set
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_and_get() {
        let mut prefs = PreferenceStore::new();
        assert!(prefs.set("user_location", json!("San Francisco")).is_none());
        assert_eq!(prefs.get("user_location"), Some(&json!("San Francisco")));
        assert_eq!(prefs.len(), 1);
    }

    #[test]
    fn test_overwrite_is_last_write_wins() {
        let mut prefs = PreferenceStore::new();
        prefs.set("k", json!("a"));
        let old = prefs.set("k", json!("b"));
        assert_eq!(old, Some(json!("a")));
        assert_eq!(prefs.get("k"), Some(&json!("b")));
        assert_eq!(prefs.len(), 1);
    }

    #[test]
    fn test_nested_values_are_accepted() {
        let mut prefs = PreferenceStore::new();
        prefs.set(
            "user_preferences",
            json!({"weather_unit": "celsius", "news_topics": ["tech", "science"]}),
        );
        let value = prefs.get("user_preferences").unwrap();
        assert_eq!(value["weather_unit"], "celsius");
        assert_eq!(value["news_topics"][1], "science");
    }

    #[test]
    fn test_remove_absent_key_is_noop() {
        let mut prefs = PreferenceStore::new();
        assert!(prefs.remove("missing").is_none());
        assert!(prefs.history().is_empty());
    }

    #[test]
    fn test_history_tracks_changes() {
        let mut prefs = PreferenceStore::new();
        prefs.set("budget", json!(100));
        prefs.set("budget", json!(250));
        prefs.remove("budget");

        let history = prefs.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].old_value, None);
        assert_eq!(history[1].old_value, Some(json!(100)));
        assert_eq!(history[1].new_value, Some(json!(250)));
        assert_eq!(history[2].new_value, None);
        assert!(prefs.is_empty());
    }

    #[test]
    fn test_all_excludes_history() {
        let mut prefs = PreferenceStore::new();
        prefs.set("tone", json!("formal"));
        prefs.set("tone", json!("casual"));
        assert_eq!(prefs.all().len(), 1);
        assert!(!prefs.contains("history"));
    }
}
