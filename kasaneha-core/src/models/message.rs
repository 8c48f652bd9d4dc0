//! Chat messages and their identity.
//!
//! A message is either confirmed by the server (it carries the server id) or
//! pending: an optimistic local placeholder shown before the server answers.
//! Pending ids never leave the process, so serializing one is an error.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageId {
    Confirmed(String),
    Pending(Uuid),
}

impl MessageId {
    pub fn new_pending() -> Self {
        Self::Pending(Uuid::new_v4())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Server id, if the message has been confirmed.
    pub fn as_confirmed(&self) -> Option<&str> {
        match self {
            Self::Confirmed(id) => Some(id),
            Self::Pending(_) => None,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed(id) => f.write_str(id),
            Self::Pending(local) => write!(f, "pending:{}", local),
        }
    }
}

impl Serialize for MessageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Confirmed(id) => serializer.serialize_str(id),
            Self::Pending(local) => Err(serde::ser::Error::custom(format!(
                "pending message {} has no server id",
                local
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::Confirmed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub session_id: String,
    pub sender: Sender,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub sequence_number: i64,
}

impl Message {
    /// Local placeholder for a message the server has not acknowledged yet.
    pub fn pending(session_id: impl Into<String>, sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new_pending(),
            session_id: session_id.into(),
            sender,
            content: content.into(),
            created_at: Utc::now(),
            metadata: None,
            sequence_number: 0,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.id.is_pending()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// `POST /sessions/:id/messages`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub user_message: Message,
    pub ai_response: Message,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_ids_deserialize_as_confirmed() {
        let msg: Message = serde_json::from_value(serde_json::json!({
            "id": "m-42",
            "session_id": "s1",
            "sender": "ai",
            "content": "How was your day?",
            "created_at": "2025-06-01T08:00:00Z",
            "sequence_number": 1
        }))
        .unwrap();

        assert_eq!(msg.id, MessageId::Confirmed("m-42".to_string()));
        assert_eq!(msg.sender, Sender::Ai);
        assert!(msg.metadata.is_none());
        assert!(!msg.is_pending());
    }

    #[test]
    fn server_id_with_temp_prefix_is_still_confirmed() {
        let id: MessageId = serde_json::from_value(serde_json::json!("temp-123")).unwrap();
        assert!(!id.is_pending());
    }

    #[test]
    fn pending_message_refuses_to_serialize() {
        let msg = Message::pending("s1", Sender::User, "draft");
        assert!(msg.is_pending());
        assert!(msg.id.as_confirmed().is_none());
        assert!(serde_json::to_string(&msg).is_err());
    }

    #[test]
    fn pending_ids_are_unique() {
        assert_ne!(MessageId::new_pending(), MessageId::new_pending());
    }
}
