//! Event Dispatcher
//!
//! Every mutating action follows the same fixed protocol:
//!
//! 1. **Authorize** - the actor must hold an active (non-deleted)
//!    membership in the target conversation, and the admin flag for
//!    admin-only operations.
//! 2. **Validate** - empty text, nonsensical self-targeting, and actions
//!    on already-terminal state are rejected before any mutation.
//! 3. **Mutate** - the durable store changes inside a single logical
//!    transaction per action.
//! 4. **Broadcast** - the event is built from post-mutation state and
//!    handed to the group router. Rejections at any earlier step reach
//!    the caller only and are never broadcast.

use uuid::Uuid;

use crate::error::ChatError;
use crate::state::AppState;
use crate::store::memberships;
use crate::store::models::Membership;

/// Message actions (send, edit, delete, react, pin, read, typing)
pub mod messages;

/// Group management actions (create, rename, membership, admin flags)
pub mod groups;

/// Friendships and friend requests
pub mod friends;

/// Conversation-list summary assembly
pub mod summaries;

/// Authorization step shared by every action: the actor must be an
/// active member of the conversation.
pub(crate) async fn require_active_member(
    state: &AppState,
    conversation_id: Uuid,
    user_id: Uuid,
) -> Result<Membership, ChatError> {
    memberships::get_active(&state.pool, conversation_id, user_id)
        .await?
        .ok_or(ChatError::Unauthorized)
}

/// Authorization step for admin-only actions.
pub(crate) async fn require_admin(
    state: &AppState,
    conversation_id: Uuid,
    user_id: Uuid,
) -> Result<Membership, ChatError> {
    let membership = require_active_member(state, conversation_id, user_id).await?;
    if !membership.is_admin {
        return Err(ChatError::Unauthorized);
    }
    Ok(membership)
}

/// Input validation for free text: rejected when empty after trimming.
pub(crate) fn require_text(text: &str) -> Result<&str, ChatError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ChatError::InvalidInput("text must not be empty".to_string()));
    }
    Ok(trimmed)
}
