use serde::{Deserialize, Serialize};

use crate::models::{Message, Reaction};

// -- Mutations --

/// Form body accepted by `POST /chat`. Every field is optional at the
/// wire level; which ones are required depends on `intent`.
#[derive(Debug, Default, Deserialize)]
pub struct ChatForm {
    pub intent: Option<String>,
    pub content: Option<String>,
    pub username: Option<String>,
    #[serde(rename = "messageId")]
    pub message_id: Option<String>,
    pub emoji: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// -- History --

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageWithReactions {
    #[serde(flatten)]
    pub message: Message,
    pub reactions: Vec<Reaction>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub messages: Vec<MessageWithReactions>,
}
