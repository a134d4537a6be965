use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat message as persisted by the store. `id` and `created_at` are
/// assigned by the store and never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub content: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// An emoji reaction attached to an existing message.
/// Duplicate (message, emoji, username) rows are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub id: i64,
    pub message_id: i64,
    pub emoji: String,
    pub username: String,
}
