use std::collections::HashMap;

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, error};

use parley_db::models::{MessageRow, ReactionRow};
use parley_types::api::{HistoryQuery, HistoryResponse, MessageWithReactions};
use parley_types::events::ChatEvent;
use parley_types::models::{Message, Reaction};

use crate::error::{ApiError, required};
use crate::state::AppState;

/// Upper bound on `?limit=` for the history loader.
const MAX_HISTORY: u32 = 200;

/// Store a message, then publish it. Nothing is published unless the
/// insert succeeded.
pub async fn create_message(
    state: &AppState,
    content: Option<String>,
    username: Option<String>,
) -> Result<Message, ApiError> {
    let content = required("content", content)?;
    let username = required("username", username)?;

    // Run blocking DB insert off the async runtime
    let db = state.clone();
    let row = tokio::task::spawn_blocking(move || db.db.insert_message(&content, &username))
        .await??;

    let message = message_from_row(row)?;
    let delivered = state.relay.publish(ChatEvent::message(message.clone()));
    debug!(id = message.id, delivered, "Message created");

    Ok(message)
}

/// `GET /chat`: the most recent messages, oldest first, each with its
/// reactions attached.
pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = query.limit.unwrap_or(state.history_limit).min(MAX_HISTORY);

    let db = state.clone();
    let (rows, reaction_rows) = tokio::task::spawn_blocking(move || {
        let rows = db.db.list_recent_messages(limit)?;
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let reaction_rows = db.db.reactions_for_messages(&ids)?;
        Ok::<_, ApiError>((rows, reaction_rows))
    })
    .await??;

    let mut by_message: HashMap<i64, Vec<Reaction>> = HashMap::new();
    for r in reaction_rows {
        by_message
            .entry(r.message_id)
            .or_default()
            .push(reaction_from_row(r));
    }

    let messages = rows
        .into_iter()
        .map(|row| {
            let reactions = by_message.remove(&row.id).unwrap_or_default();
            Ok(MessageWithReactions {
                message: message_from_row(row)?,
                reactions,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(Json(HistoryResponse { messages }))
}

/// A row whose `created_at` does not parse is a storage fault, not a 1970
/// message.
pub(crate) fn message_from_row(row: MessageRow) -> Result<Message, ApiError> {
    let Some(created_at) = parse_timestamp(&row.created_at) else {
        error!("Corrupt created_at '{}' on message {}", row.created_at, row.id);
        return Err(ApiError::Storage);
    };

    Ok(Message {
        id: row.id,
        content: row.content,
        username: row.username,
        created_at,
    })
}

pub(crate) fn reaction_from_row(row: ReactionRow) -> Reaction {
    Reaction {
        id: row.id,
        message_id: row.message_id,
        emoji: row.emoji,
        username: row.username,
    }
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone;
/// those are UTC. RFC 3339 is accepted too.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .ok()
}
