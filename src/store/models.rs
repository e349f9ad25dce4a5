//! Row types for the durable store.
//!
//! Soft-deleted rows are retained everywhere; `deleted_at` timestamps
//! mark them. The view-model types at the bottom (`ConversationSummary`,
//! `MessagePreview`) are assembled by the summary step rather than read
//! from a single table.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::realtime::event::SenderInfo;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    /// Derived state owned exclusively by the connection lifecycle;
    /// the event dispatcher never writes it.
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// The identity fields attached to wire events.
    pub fn sender_info(&self) -> SenderInfo {
        SenderInfo {
            user_id: self.user_id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            avatar: self.avatar.clone(),
        }
    }

    /// Name shown in typing indicators and member lists.
    pub fn visible_name(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| self.username.clone())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub conversation_id: Uuid,
    pub name: Option<String>,
    pub is_group: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub member_id: Uuid,
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub joined_at: DateTime<Utc>,
    pub last_read_at: Option<DateTime<Utc>>,
    pub is_admin: bool,
    pub is_pinned: bool,
    pub is_archived: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub message_text: String,
    pub message_type: String,
    pub file_url: Option<String>,
    pub is_pinned: bool,
    pub is_edited: bool,
    pub is_deleted: bool,
    pub sent_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
    pub pinned_at: Option<DateTime<Utc>>,
    pub pinned_by: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
}

impl FriendRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FriendRequest {
    pub request_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub status: FriendRequestStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub notification_id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub content: String,
    pub is_read: bool,
    pub message_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Last-message preview carried by a conversation summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePreview {
    pub message_id: Uuid,
    pub sender_id: Uuid,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// One entry in a user's conversation list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub conversation_id: Uuid,
    pub name: Option<String>,
    pub is_group: bool,
    pub is_pinned: bool,
    pub is_archived: bool,
    pub last_message: Option<MessagePreview>,
    pub unread_count: i64,
    pub members: Vec<SenderInfo>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_name_prefers_display_name() {
        let user = User {
            user_id: Uuid::new_v4(),
            username: "alice".to_string(),
            display_name: Some("Alice L.".to_string()),
            avatar: None,
            is_online: false,
            last_seen: None,
            created_at: Utc::now(),
        };
        assert_eq!(user.visible_name(), "Alice L.");
    }

    #[test]
    fn test_visible_name_falls_back_to_username() {
        let user = User {
            user_id: Uuid::new_v4(),
            username: "bob".to_string(),
            display_name: None,
            avatar: None,
            is_online: false,
            last_seen: None,
            created_at: Utc::now(),
        };
        assert_eq!(user.visible_name(), "bob");
    }

    #[test]
    fn test_friend_request_status_round_trip() {
        for status in [FriendRequestStatus::Pending, FriendRequestStatus::Accepted] {
            assert_eq!(FriendRequestStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(FriendRequestStatus::from_str("rejected"), None);
    }
}
