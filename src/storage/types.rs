use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Listing metadata for a persisted session snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    /// Session key
    pub id: String,
    /// When the session was first persisted
    pub created_at: DateTime<Utc>,
    /// When the snapshot was last written
    pub updated_at: DateTime<Utc>,
    /// Retrievable turns in the snapshot
    pub turn_count: usize,
}
