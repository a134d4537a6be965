use crate::models::{MessageRow, ReactionRow};
use crate::{Database, DbError, Result};
use rusqlite::{Connection, Row};

impl Database {
    // -- Messages --

    /// Insert a message and return the stored row, including the
    /// store-assigned id and timestamp.
    pub fn insert_message(&self, content: &str, username: &str) -> Result<MessageRow> {
        require("content", content)?;
        require("username", username)?;

        self.with_conn(|conn| {
            let row = conn.query_row(
                "INSERT INTO messages (content, username) VALUES (?1, ?2)
                 RETURNING id, content, username, created_at",
                (content, username),
                message_from_row,
            )?;
            Ok(row)
        })
    }

    /// The newest `limit` messages, oldest first.
    pub fn list_recent_messages(&self, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_recent_messages(conn, limit))
    }

    // -- Reactions --

    /// Insert a reaction. Fails with `NotFound` if `message_id` does not
    /// reference a stored message; nothing is written in that case.
    pub fn insert_reaction(
        &self,
        message_id: i64,
        emoji: &str,
        username: &str,
    ) -> Result<ReactionRow> {
        require("emoji", emoji)?;
        require("username", username)?;

        self.with_conn(|conn| {
            if !message_exists(conn, message_id)? {
                return Err(DbError::NotFound(message_id));
            }

            let row = conn.query_row(
                "INSERT INTO reactions (message_id, emoji, username) VALUES (?1, ?2, ?3)
                 RETURNING id, message_id, emoji, username",
                rusqlite::params![message_id, emoji, username],
                reaction_from_row,
            )?;
            Ok(row)
        })
    }

    /// Batch-fetch reactions for a set of message IDs, in insertion order.
    pub fn reactions_for_messages(&self, message_ids: &[i64]) -> Result<Vec<ReactionRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=message_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT id, message_id, emoji, username FROM reactions
                 WHERE message_id IN ({}) ORDER BY id",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(message_ids), reaction_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DbError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn message_exists(conn: &Connection, id: i64) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM messages WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn query_recent_messages(conn: &Connection, limit: u32) -> Result<Vec<MessageRow>> {
    // Newest `limit` by id, flipped back to ascending
    let mut stmt = conn.prepare(
        "SELECT id, content, username, created_at FROM (
             SELECT id, content, username, created_at
             FROM messages
             ORDER BY id DESC
             LIMIT ?1
         )
         ORDER BY id ASC",
    )?;

    let rows = stmt
        .query_map([limit], message_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        content: row.get(1)?,
        username: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn reaction_from_row(row: &Row<'_>) -> rusqlite::Result<ReactionRow> {
    Ok(ReactionRow {
        id: row.get(0)?,
        message_id: row.get(1)?,
        emoji: row.get(2)?,
        username: row.get(3)?,
    })
}
