/**
 * Group Management Actions
 *
 * Creating groups, renaming them, adding/removing members, leaving, and
 * the admin flag. These arrive over the request/response surface but
 * follow the same dispatcher protocol, and each membership change also
 * updates the broadcast router for every live connection of the affected
 * user, so the in-memory groups stay a faithful cache of durable
 * membership.
 */

use std::collections::HashSet;

use uuid::Uuid;

use crate::dispatch::{require_active_member, require_admin, require_text};
use crate::error::ChatError;
use crate::realtime::event::ServerEvent;
use crate::state::AppState;
use crate::store::models::Conversation;
use crate::store::{conversations, memberships, users};

/// Normalize a requested group member list: drop the creator and
/// duplicates, preserving first-seen order.
pub fn normalize_member_list(creator: Uuid, member_ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    member_ids
        .iter()
        .copied()
        .filter(|id| *id != creator && seen.insert(*id))
        .collect()
}

/// Create a group conversation. The creator is always the sole initial
/// admin; after normalization the member list must still hold at least
/// two other distinct users (minimum group size of three).
pub async fn create_group(
    state: &AppState,
    creator: Uuid,
    name: &str,
    member_ids: &[Uuid],
) -> Result<Conversation, ChatError> {
    let name = require_text(name)?;
    let members = normalize_member_list(creator, member_ids);
    if members.len() < 2 {
        return Err(ChatError::InvalidInput(
            "a group needs at least two members besides the creator".to_string(),
        ));
    }

    for &member_id in &members {
        users::get_user(&state.pool, member_id)
            .await?
            .ok_or_else(|| ChatError::NotFound("member user does not exist".to_string()))?;
    }

    let conversation =
        conversations::create_with_members(&state.pool, creator, Some(name), true, &members)
            .await?;

    // Join every live connection of every initial member to the new
    // group, then announce the roster to those connections.
    let mut everyone = members.clone();
    everyone.push(creator);
    for &member_id in &everyone {
        join_live_connections(state, conversation.conversation_id, member_id);
    }
    for &member_id in &everyone {
        if let Some(user) = users::get_user(&state.pool, member_id).await? {
            state.router.broadcast(
                conversation.conversation_id,
                &ServerEvent::MemberAdded {
                    conversation_id: conversation.conversation_id,
                    user: user.sender_info(),
                },
            );
        }
    }

    Ok(conversation)
}

/// Rename a group (admin only).
pub async fn rename_group(
    state: &AppState,
    actor: Uuid,
    conversation_id: Uuid,
    new_name: &str,
) -> Result<(), ChatError> {
    require_admin(state, conversation_id, actor).await?;
    let new_name = require_text(new_name)?;

    let conversation = conversations::get(&state.pool, conversation_id)
        .await?
        .ok_or_else(|| ChatError::NotFound("conversation does not exist".to_string()))?;
    if !conversation.is_group {
        return Err(ChatError::InvalidInput(
            "direct conversations cannot be renamed".to_string(),
        ));
    }

    conversations::rename(&state.pool, conversation_id, new_name).await?;

    state.router.broadcast(
        conversation_id,
        &ServerEvent::GroupRenamed {
            conversation_id,
            name: new_name.to_string(),
        },
    );

    Ok(())
}

/// Add a member to a group (admin only). A soft-deleted prior membership
/// is revived with a fresh join time instead of inserting a duplicate.
pub async fn add_member(
    state: &AppState,
    actor: Uuid,
    conversation_id: Uuid,
    user_id: Uuid,
) -> Result<(), ChatError> {
    require_admin(state, conversation_id, actor).await?;

    let user = users::get_user(&state.pool, user_id)
        .await?
        .ok_or_else(|| ChatError::NotFound("user does not exist".to_string()))?;

    if memberships::get_active(&state.pool, conversation_id, user_id)
        .await?
        .is_some()
    {
        return Err(ChatError::Conflict("user is already a member".to_string()));
    }

    let mut tx = state.pool.begin().await?;
    let revived = memberships::revive(&mut *tx, conversation_id, user_id).await?;
    if !revived {
        memberships::insert(&mut *tx, conversation_id, user_id, false).await?;
    }
    tx.commit().await?;

    join_live_connections(state, conversation_id, user_id);

    state.router.broadcast(
        conversation_id,
        &ServerEvent::MemberAdded {
            conversation_id,
            user: user.sender_info(),
        },
    );

    Ok(())
}

/// Remove a member from a group (admin only). Removing oneself goes
/// through `leave_group` instead.
pub async fn remove_member(
    state: &AppState,
    actor: Uuid,
    conversation_id: Uuid,
    user_id: Uuid,
) -> Result<(), ChatError> {
    require_admin(state, conversation_id, actor).await?;
    if user_id == actor {
        return Err(ChatError::InvalidInput(
            "use leave to remove yourself".to_string(),
        ));
    }
    require_active_member(state, conversation_id, user_id)
        .await
        .map_err(|_| ChatError::NotFound("user is not a member".to_string()))?;

    let mut tx = state.pool.begin().await?;
    memberships::soft_delete(&mut *tx, conversation_id, user_id).await?;
    tx.commit().await?;

    // Broadcast before detaching the target's connections so the removed
    // user's clients also learn about the removal.
    state.router.broadcast(
        conversation_id,
        &ServerEvent::MemberRemoved {
            conversation_id,
            user_id,
        },
    );

    leave_live_connections(state, conversation_id, user_id);

    Ok(())
}

/// Whether a member is blocked from leaving: the last remaining admin
/// of a group cannot go while other active members remain.
fn leave_blocked(is_group: bool, is_admin: bool, admins: i64, members: i64) -> bool {
    is_group && is_admin && admins == 1 && members > 1
}

/// Leave a conversation. The last remaining admin of a group cannot
/// leave while other active members remain; another admin must be
/// promoted first.
pub async fn leave_group(
    state: &AppState,
    actor: Uuid,
    conversation_id: Uuid,
) -> Result<(), ChatError> {
    let membership = require_active_member(state, conversation_id, actor).await?;

    let conversation = conversations::get(&state.pool, conversation_id)
        .await?
        .ok_or_else(|| ChatError::NotFound("conversation does not exist".to_string()))?;

    if conversation.is_group && membership.is_admin {
        let admins = memberships::count_active_admins(&state.pool, conversation_id).await?;
        let members = memberships::count_active_members(&state.pool, conversation_id).await?;
        if leave_blocked(conversation.is_group, membership.is_admin, admins, members) {
            return Err(ChatError::Conflict(
                "promote another admin before leaving".to_string(),
            ));
        }
    }

    let mut tx = state.pool.begin().await?;
    memberships::soft_delete(&mut *tx, conversation_id, actor).await?;
    tx.commit().await?;

    state.router.broadcast(
        conversation_id,
        &ServerEvent::MemberRemoved {
            conversation_id,
            user_id: actor,
        },
    );

    leave_live_connections(state, conversation_id, actor);

    Ok(())
}

/// Grant the admin flag (admin only).
pub async fn promote_admin(
    state: &AppState,
    actor: Uuid,
    conversation_id: Uuid,
    user_id: Uuid,
) -> Result<(), ChatError> {
    require_admin(state, conversation_id, actor).await?;
    let target = require_active_member(state, conversation_id, user_id)
        .await
        .map_err(|_| ChatError::NotFound("user is not a member".to_string()))?;
    if target.is_admin {
        return Err(ChatError::Conflict("user is already an admin".to_string()));
    }

    memberships::set_admin(&state.pool, conversation_id, user_id, true).await?;

    state.router.broadcast(
        conversation_id,
        &ServerEvent::AdminChanged {
            conversation_id,
            user_id,
            is_admin: true,
        },
    );

    Ok(())
}

/// Revoke the admin flag (admin only). Demoting oneself is rejected.
pub async fn demote_admin(
    state: &AppState,
    actor: Uuid,
    conversation_id: Uuid,
    user_id: Uuid,
) -> Result<(), ChatError> {
    require_admin(state, conversation_id, actor).await?;
    if user_id == actor {
        return Err(ChatError::InvalidInput(
            "cannot demote yourself".to_string(),
        ));
    }
    let target = require_active_member(state, conversation_id, user_id)
        .await
        .map_err(|_| ChatError::NotFound("user is not a member".to_string()))?;
    if !target.is_admin {
        return Err(ChatError::Conflict("user is not an admin".to_string()));
    }

    memberships::set_admin(&state.pool, conversation_id, user_id, false).await?;

    state.router.broadcast(
        conversation_id,
        &ServerEvent::AdminChanged {
            conversation_id,
            user_id,
            is_admin: false,
        },
    );

    Ok(())
}

/// Per-user view state: pin a conversation in the actor's list.
pub async fn pin_conversation(
    state: &AppState,
    actor: Uuid,
    conversation_id: Uuid,
    pinned: bool,
) -> Result<(), ChatError> {
    require_active_member(state, conversation_id, actor).await?;
    memberships::set_pinned(&state.pool, conversation_id, actor, pinned).await?;
    Ok(())
}

/// Per-user view state: archive a conversation in the actor's list.
pub async fn archive_conversation(
    state: &AppState,
    actor: Uuid,
    conversation_id: Uuid,
    archived: bool,
) -> Result<(), ChatError> {
    require_active_member(state, conversation_id, actor).await?;
    memberships::set_archived(&state.pool, conversation_id, actor, archived).await?;
    Ok(())
}

/// Join every live connection of a user to a conversation's group.
/// A user may have zero, one, or many live connections.
fn join_live_connections(state: &AppState, conversation_id: Uuid, user_id: Uuid) {
    for (conn_id, sender) in state.presence.connections_for(user_id) {
        state.router.join(conversation_id, conn_id, sender);
    }
}

/// Detach every live connection of a user from a conversation's group.
fn leave_live_connections(state: &AppState, conversation_id: Uuid, user_id: Uuid) {
    for (conn_id, _) in state.presence.connections_for(user_id) {
        state.router.leave(conversation_id, conn_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_drops_creator_and_duplicates() {
        let creator = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let normalized = normalize_member_list(creator, &[creator, a, b, a, creator]);
        assert_eq!(normalized, vec![a, b]);
    }

    #[test]
    fn test_normalize_empty_list() {
        let creator = Uuid::new_v4();
        assert!(normalize_member_list(creator, &[creator]).is_empty());
        assert!(normalize_member_list(creator, &[]).is_empty());
    }

    #[test]
    fn test_single_member_fails_minimum_size() {
        // Creator plus one other is below the minimum group size of three.
        let creator = Uuid::new_v4();
        let a = Uuid::new_v4();
        assert!(normalize_member_list(creator, &[a]).len() < 2);
    }

    #[test]
    fn test_last_admin_cannot_leave_populated_group() {
        assert!(leave_blocked(true, true, 1, 3));
    }

    #[test]
    fn test_admin_leaves_freely_with_another_admin() {
        assert!(!leave_blocked(true, true, 2, 3));
    }

    #[test]
    fn test_last_admin_alone_can_leave() {
        assert!(!leave_blocked(true, true, 1, 1));
    }

    #[test]
    fn test_non_admin_leave_is_never_blocked() {
        assert!(!leave_blocked(true, false, 1, 5));
    }

    #[test]
    fn test_direct_conversation_leave_is_never_blocked() {
        assert!(!leave_blocked(false, true, 1, 2));
    }
}
