/**
 * Server Event Vocabulary
 *
 * Every event the server pushes to connected clients, with the exact JSON
 * shape the client depends on. Events serialize as tagged JSON objects,
 * e.g. `{"event":"message-received","messageId":...,...}`.
 *
 * The `error` event is special: it is only ever delivered to the caller
 * whose action was rejected, never to a conversation group.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sender identity attached to message and membership events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderInfo {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
}

/// One reaction kind on a message, aggregated across users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionGroup {
    pub kind: String,
    pub count: i64,
    pub user_ids: Vec<Uuid>,
}

/// Events pushed from the server to connected clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// A new message was committed to the conversation
    MessageReceived {
        message_id: Uuid,
        conversation_id: Uuid,
        text: String,
        sent_at: DateTime<Utc>,
        sender: SenderInfo,
        reactions: Vec<ReactionGroup>,
    },
    /// An existing message's text was overwritten by its sender
    MessageEdited {
        message_id: Uuid,
        conversation_id: Uuid,
        new_text: String,
        edited_at: DateTime<Utc>,
    },
    /// A message was soft-deleted by its sender
    MessageDeleted {
        message_id: Uuid,
        conversation_id: Uuid,
    },
    /// The full post-toggle reaction state for a message
    ReactionsUpdated {
        message_id: Uuid,
        conversation_id: Uuid,
        reactions: Vec<ReactionGroup>,
    },
    /// A message was pinned or unpinned
    MessagePinned {
        message_id: Uuid,
        conversation_id: Uuid,
        pinned: bool,
    },
    /// Delivered to everyone in the conversation except the typist
    TypingStarted {
        user_id: Uuid,
        conversation_id: Uuid,
        display_name: String,
    },
    TypingStopped {
        user_id: Uuid,
        conversation_id: Uuid,
    },
    /// A member advanced their last-read marker
    ReadReceipt {
        conversation_id: Uuid,
        user_id: Uuid,
        last_read_at: DateTime<Utc>,
    },
    /// A user's first connection opened or last connection closed
    PresenceChanged {
        user_id: Uuid,
        is_online: bool,
        last_seen: DateTime<Utc>,
    },
    /// Group membership changes
    MemberAdded {
        conversation_id: Uuid,
        user: SenderInfo,
    },
    MemberRemoved {
        conversation_id: Uuid,
        user_id: Uuid,
    },
    GroupRenamed {
        conversation_id: Uuid,
        name: String,
    },
    AdminChanged {
        conversation_id: Uuid,
        user_id: Uuid,
        is_admin: bool,
    },
    /// Caller-only rejection notice; never broadcast
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_received_shape() {
        let event = ServerEvent::MessageReceived {
            message_id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            text: "hello".to_string(),
            sent_at: Utc::now(),
            sender: SenderInfo {
                user_id: Uuid::new_v4(),
                username: "alice".to_string(),
                display_name: Some("Alice".to_string()),
                avatar: None,
            },
            reactions: vec![],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "message-received");
        assert!(json["messageId"].is_string());
        assert!(json["conversationId"].is_string());
        assert_eq!(json["sender"]["username"], "alice");
        assert!(json["reactions"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_presence_changed_shape() {
        let event = ServerEvent::PresenceChanged {
            user_id: Uuid::new_v4(),
            is_online: false,
            last_seen: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "presence-changed");
        assert_eq!(json["isOnline"], false);
        assert!(json["lastSeen"].is_string());
    }

    #[test]
    fn test_reactions_updated_shape() {
        let user = Uuid::new_v4();
        let event = ServerEvent::ReactionsUpdated {
            message_id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            reactions: vec![ReactionGroup {
                kind: "heart".to_string(),
                count: 1,
                user_ids: vec![user],
            }],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "reactions-updated");
        assert_eq!(json["reactions"][0]["kind"], "heart");
        assert_eq!(json["reactions"][0]["count"], 1);
        assert_eq!(json["reactions"][0]["userIds"][0], user.to_string());
    }

    #[test]
    fn test_error_event_shape() {
        let event = ServerEvent::Error {
            message: "not authorized".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["message"], "not authorized");
    }

    #[test]
    fn test_event_round_trip() {
        let event = ServerEvent::TypingStarted {
            user_id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            display_name: "Bob".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: ServerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
