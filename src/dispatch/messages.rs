/**
 * Message Actions
 *
 * The real-time actions a connected client can trigger: send, edit,
 * delete, react, pin, mark-read, and typing indicators. Each follows the
 * dispatcher protocol (authorize, validate, mutate, broadcast); broadcast
 * happens strictly after commit, so within one conversation event order
 * matches commit order.
 */

use uuid::Uuid;

use crate::dispatch::{require_active_member, require_text};
use crate::error::ChatError;
use crate::realtime::event::ServerEvent;
use crate::realtime::presence::ConnectionId;
use crate::state::AppState;
use crate::store::models::Message;
use crate::store::{memberships, messages, reactions, users};

/// Load a message that is still live (not soft-deleted).
async fn require_live_message(state: &AppState, message_id: Uuid) -> Result<Message, ChatError> {
    let message = messages::get(&state.pool, message_id)
        .await?
        .ok_or_else(|| ChatError::NotFound("message does not exist".to_string()))?;
    if message.is_deleted {
        return Err(ChatError::NotFound("message was deleted".to_string()));
    }
    Ok(message)
}

/// Send a message to a conversation.
pub async fn send_message(
    state: &AppState,
    actor: Uuid,
    conversation_id: Uuid,
    text: &str,
) -> Result<Message, ChatError> {
    require_active_member(state, conversation_id, actor).await?;
    let text = require_text(text)?;

    let message = messages::insert(&state.pool, conversation_id, actor, text).await?;

    let sender = users::get_user(&state.pool, actor)
        .await?
        .ok_or(ChatError::Unauthorized)?;

    tracing::debug!(
        message_id = %message.message_id,
        conversation_id = %conversation_id,
        "message committed, broadcasting"
    );

    state.router.broadcast(
        conversation_id,
        &ServerEvent::MessageReceived {
            message_id: message.message_id,
            conversation_id,
            text: message.message_text.clone(),
            sent_at: message.sent_at,
            sender: sender.sender_info(),
            reactions: Vec::new(),
        },
    );

    Ok(message)
}

/// Edit a message's text. Only the original sender may edit; the prior
/// text is appended to the edit history before the overwrite.
pub async fn edit_message(
    state: &AppState,
    actor: Uuid,
    message_id: Uuid,
    new_text: &str,
) -> Result<(), ChatError> {
    let message = require_live_message(state, message_id).await?;
    if message.sender_id != actor {
        return Err(ChatError::Unauthorized);
    }
    require_active_member(state, message.conversation_id, actor).await?;
    let new_text = require_text(new_text)?;

    let edited_at =
        messages::update_text(&state.pool, message_id, &message.message_text, new_text).await?;

    state.router.broadcast(
        message.conversation_id,
        &ServerEvent::MessageEdited {
            message_id,
            conversation_id: message.conversation_id,
            new_text: new_text.to_string(),
            edited_at,
        },
    );

    Ok(())
}

/// Soft-delete a message. Replaying the action against an already-deleted
/// message is NotFound and produces no second broadcast.
pub async fn delete_message(
    state: &AppState,
    actor: Uuid,
    message_id: Uuid,
) -> Result<(), ChatError> {
    let message = require_live_message(state, message_id).await?;
    if message.sender_id != actor {
        return Err(ChatError::Unauthorized);
    }
    require_active_member(state, message.conversation_id, actor).await?;

    messages::soft_delete(&state.pool, message_id, actor).await?;

    state.router.broadcast(
        message.conversation_id,
        &ServerEvent::MessageDeleted {
            message_id,
            conversation_id: message.conversation_id,
        },
    );

    Ok(())
}

/// Toggle the actor's reaction on a message, then broadcast the full
/// post-mutation reaction state.
pub async fn react(
    state: &AppState,
    actor: Uuid,
    message_id: Uuid,
    kind: &str,
) -> Result<(), ChatError> {
    let message = require_live_message(state, message_id).await?;
    require_active_member(state, message.conversation_id, actor).await?;
    let kind = require_text(kind)?;

    reactions::toggle(&state.pool, message_id, actor, kind).await?;
    let grouped = reactions::grouped(&state.pool, message_id).await?;

    state.router.broadcast(
        message.conversation_id,
        &ServerEvent::ReactionsUpdated {
            message_id,
            conversation_id: message.conversation_id,
            reactions: grouped,
        },
    );

    Ok(())
}

/// Pin or unpin a message (any active member may).
pub async fn pin_message(state: &AppState, actor: Uuid, message_id: Uuid) -> Result<(), ChatError> {
    let message = require_live_message(state, message_id).await?;
    require_active_member(state, message.conversation_id, actor).await?;

    let pinned = !message.is_pinned;
    messages::set_pinned(&state.pool, message_id, actor, pinned).await?;

    state.router.broadcast(
        message.conversation_id,
        &ServerEvent::MessagePinned {
            message_id,
            conversation_id: message.conversation_id,
            pinned,
        },
    );

    Ok(())
}

/// Search the messages visible to the actor in one conversation.
/// Matching is case-insensitive substring, newest first, capped at 50.
pub async fn search_messages(
    state: &AppState,
    actor: Uuid,
    conversation_id: Uuid,
    query: &str,
) -> Result<Vec<Message>, ChatError> {
    let membership = require_active_member(state, conversation_id, actor).await?;
    let query = require_text(query)?;

    Ok(messages::search_visible(
        &state.pool,
        conversation_id,
        membership.joined_at,
        query,
        50,
    )
    .await?)
}

/// Advance the actor's read marker and broadcast the receipt.
pub async fn mark_read(
    state: &AppState,
    actor: Uuid,
    conversation_id: Uuid,
) -> Result<(), ChatError> {
    require_active_member(state, conversation_id, actor).await?;

    let last_read_at = memberships::mark_read(&state.pool, conversation_id, actor).await?;

    state.router.broadcast(
        conversation_id,
        &ServerEvent::ReadReceipt {
            conversation_id,
            user_id: actor,
            last_read_at,
        },
    );

    Ok(())
}

/// Typing indicator: delivered to everyone in the group except the
/// typist's own connection. No store mutation.
pub async fn typing_start(
    state: &AppState,
    actor: Uuid,
    conn_id: ConnectionId,
    conversation_id: Uuid,
) -> Result<(), ChatError> {
    require_active_member(state, conversation_id, actor).await?;

    let user = users::get_user(&state.pool, actor)
        .await?
        .ok_or(ChatError::Unauthorized)?;

    state.router.broadcast_except(
        conversation_id,
        conn_id,
        &ServerEvent::TypingStarted {
            user_id: actor,
            conversation_id,
            display_name: user.visible_name(),
        },
    );

    Ok(())
}

pub async fn typing_stop(
    state: &AppState,
    actor: Uuid,
    conn_id: ConnectionId,
    conversation_id: Uuid,
) -> Result<(), ChatError> {
    require_active_member(state, conversation_id, actor).await?;

    state.router.broadcast_except(
        conversation_id,
        conn_id,
        &ServerEvent::TypingStopped {
            user_id: actor,
            conversation_id,
        },
    );

    Ok(())
}
