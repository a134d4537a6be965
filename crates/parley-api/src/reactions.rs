use tracing::debug;

use parley_types::events::ChatEvent;
use parley_types::models::Reaction;

use crate::error::{ApiError, required};
use crate::messages::reaction_from_row;
use crate::state::AppState;

/// Store a reaction against an existing message, then publish it.
/// Duplicate reactions from the same user are stored as separate rows.
pub async fn create_reaction(
    state: &AppState,
    message_id: Option<String>,
    emoji: Option<String>,
    username: Option<String>,
) -> Result<Reaction, ApiError> {
    let message_id = required("messageId", message_id)?;
    let emoji = required("emoji", emoji)?;
    let username = required("username", username)?;

    let message_id: i64 = message_id
        .trim()
        .parse()
        .map_err(|_| ApiError::Validation("messageId must be an integer".into()))?;

    let db = state.clone();
    let row = tokio::task::spawn_blocking(move || {
        db.db.insert_reaction(message_id, &emoji, &username)
    })
    .await??;

    let reaction = reaction_from_row(row);
    let delivered = state.relay.publish(ChatEvent::reaction(reaction.clone()));
    debug!(id = reaction.id, message_id, delivered, "Reaction created");

    Ok(reaction)
}
