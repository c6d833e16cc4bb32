//! Direct-message payloads and destinations used by the portal.
//!
//! The server pushes every stored message to both participants on their
//! personal queue, and notifies the original sender on a second queue when
//! the receiver reads it.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Identifier of a stored message.
pub type MessageId = i64;

/// Identifier of a portal user.
pub type UserId = i64;

/// A stored direct message as pushed on `/user/{id}/queue/messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub sender_email: String,
    pub receiver_id: UserId,
    pub receiver_name: String,
    pub receiver_email: String,
    pub subject: String,
    pub content: String,
    #[serde(default)]
    pub is_read: bool,
    pub sent_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<NaiveDateTime>,
}

/// Request published to `/app/chat.send`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub receiver_id: UserId,
    pub subject: String,
    pub content: String,
}

/// Reasons a [`SendMessageRequest`] is refused before publishing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("subject is required")]
    BlankSubject,

    #[error("content is required")]
    BlankContent,
}

impl SendMessageRequest {
    /// Applies the same checks the server enforces on this payload.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.subject.trim().is_empty() {
            return Err(ValidationError::BlankSubject);
        }
        if self.content.trim().is_empty() {
            return Err(ValidationError::BlankContent);
        }
        Ok(())
    }
}

/// Broker destinations.
pub mod destinations {
    use super::UserId;

    /// Application destination handling [`SendMessageRequest`](super::SendMessageRequest).
    pub const CHAT_SEND: &str = "/app/chat.send";

    /// Personal queue receiving [`ChatMessage`](super::ChatMessage)s.
    pub fn user_messages(user_id: UserId) -> String {
        format!("/user/{user_id}/queue/messages")
    }

    /// Personal queue receiving the id of each sent message once it is read.
    pub fn user_message_read(user_id: UserId) -> String {
        format!("/user/{user_id}/queue/message-read")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "id": 11,
            "senderId": 3,
            "senderName": "Ada Teacher",
            "senderEmail": "ada@school.test",
            "receiverId": 42,
            "receiverName": "Sam Student",
            "receiverEmail": "sam@school.test",
            "subject": "Homework",
            "content": "Chapter 4 due Friday",
            "isRead": false,
            "sentAt": "2024-03-05T09:30:00.123456",
            "readAt": null
        }"#
    }

    #[test]
    fn chat_message_deserializes_server_payload() {
        let msg: ChatMessage = serde_json::from_str(sample_json()).unwrap();
        assert_eq!(msg.id, 11);
        assert_eq!(msg.sender_id, 3);
        assert_eq!(msg.receiver_name, "Sam Student");
        assert!(!msg.is_read);
        assert!(msg.read_at.is_none());
        assert_eq!(msg.sent_at.date().to_string(), "2024-03-05");
    }

    #[test]
    fn chat_message_serializes_camel_case() {
        let msg: ChatMessage = serde_json::from_str(sample_json()).unwrap();
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["senderEmail"], "ada@school.test");
        assert_eq!(json["isRead"], false);
        assert!(json.get("readAt").is_none());
    }

    #[test]
    fn send_request_wire_shape() {
        let req = SendMessageRequest {
            receiver_id: 42,
            subject: "Hi".into(),
            content: "Hello".into(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"receiverId":42,"subject":"Hi","content":"Hello"}"#);
    }

    #[test]
    fn send_request_validation() {
        let mut req = SendMessageRequest {
            receiver_id: 1,
            subject: "s".into(),
            content: "c".into(),
        };
        assert!(req.validate().is_ok());

        req.subject = "   ".into();
        assert_eq!(req.validate(), Err(ValidationError::BlankSubject));

        req.subject = "s".into();
        req.content = String::new();
        assert_eq!(req.validate(), Err(ValidationError::BlankContent));
    }

    #[test]
    fn read_receipt_payload_is_bare_id() {
        let id: MessageId = serde_json::from_str("17").unwrap();
        assert_eq!(id, 17);
    }

    #[test]
    fn destinations_for_user() {
        assert_eq!(destinations::user_messages(7), "/user/7/queue/messages");
        assert_eq!(
            destinations::user_message_read(7),
            "/user/7/queue/message-read"
        );
        assert_eq!(destinations::CHAT_SEND, "/app/chat.send");
    }
}
