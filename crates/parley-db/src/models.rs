//! Database row types. These map directly to SQLite rows and stay
//! independent of the wire models in parley-types.

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub content: String,
    pub username: String,
    /// `YYYY-MM-DD HH:MM:SS`, UTC, as written by `CURRENT_TIMESTAMP`.
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ReactionRow {
    pub id: i64,
    pub message_id: i64,
    pub emoji: String,
    pub username: String,
}
