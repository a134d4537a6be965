use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, Reaction};

/// Events pushed to stream clients. Serializes to the exact body of an
/// SSE `data:` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatEvent {
    /// A new message was stored
    Message { message: Message },

    /// A reaction was stored against `message_id`
    Reaction {
        reaction: Reaction,
        #[serde(rename = "messageId")]
        message_id: i64,
    },
}

impl ChatEvent {
    pub fn message(message: Message) -> Self {
        Self::Message { message }
    }

    pub fn reaction(reaction: Reaction) -> Self {
        let message_id = reaction.message_id;
        Self::Reaction {
            reaction,
            message_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Reaction { .. } => "reaction",
        }
    }
}

/// An event tagged with the instance that first published it.
/// This is both the in-process relay item and the bridge frame body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub origin: Uuid,
    pub event: ChatEvent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn sample_message() -> Message {
        Message {
            id: 7,
            content: "hi".into(),
            username: "alice".into(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn message_event_wire_shape() {
        let value = serde_json::to_value(ChatEvent::message(sample_message())).unwrap();
        assert_eq!(value["type"], "message");
        assert_eq!(value["message"]["id"], 7);
        assert_eq!(value["message"]["content"], "hi");
        assert_eq!(value["message"]["username"], "alice");
        assert!(value["message"]["created_at"].is_string());
    }

    #[test]
    fn reaction_event_carries_message_id() {
        let event = ChatEvent::reaction(Reaction {
            id: 3,
            message_id: 1,
            emoji: "👍".into(),
            username: "bob".into(),
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "reaction",
                "reaction": { "id": 3, "message_id": 1, "emoji": "👍", "username": "bob" },
                "messageId": 1
            })
        );
        assert_eq!(event.kind(), "reaction");
    }

    #[test]
    fn envelope_from_bridge_frame() {
        let origin = Uuid::new_v4();
        let raw = json!({
            "origin": origin,
            "event": { "type": "message", "message": sample_message() }
        })
        .to_string();
        let envelope: Envelope = serde_json::from_str(&raw).unwrap();
        assert_eq!(envelope.origin, origin);
        assert_eq!(envelope.event, ChatEvent::message(sample_message()));
    }
}
