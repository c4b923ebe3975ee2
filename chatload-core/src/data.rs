use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Identity obtained from a successful registration. Each one drives exactly one session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserCredential {
    pub username: String,
    pub auth_token: String,
    pub user_id: String,
}

/// Frames the harness sends over the realtime connection.
///
/// Serializes to `{"type": "CHAT" | "TYPING" | "HEARTBEAT", ...}` with camelCase field names as
/// the target service expects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundMessage {
    Chat {
        content: String,
        #[serde(rename = "conversationId")]
        conversation_id: i64,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    Typing {
        #[serde(rename = "conversationId")]
        conversation_id: i64,
        #[serde(rename = "typing")]
        is_typing: bool,
    },
    Heartbeat {
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
}

impl OutboundMessage {
    pub fn chat(sequence: usize, username: &str, conversation_id: i64) -> Self {
        let timestamp = OffsetDateTime::now_utc();
        Self::Chat {
            content: format!("Load test message {sequence} from {username} at {timestamp}"),
            conversation_id,
            timestamp,
        }
    }

    pub fn typing(conversation_id: i64, is_typing: bool) -> Self {
        Self::Typing {
            conversation_id,
            is_typing,
        }
    }

    pub fn heartbeat() -> Self {
        Self::Heartbeat {
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Chat { .. } => "CHAT",
            Self::Typing { .. } => "TYPING",
            Self::Heartbeat { .. } => "HEARTBEAT",
        }
    }
}
