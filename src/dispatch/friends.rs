/**
 * Friendship Actions
 *
 * Friend requests and their resolution. Acceptance is a single logical
 * transaction producing the symmetric edge pair, a fresh 1:1
 * conversation with both memberships, and the accepted status on the
 * request row. A crossed mutual request (A→B pending while B→A arrives)
 * is detected at send time and resolved as an atomic double-accept
 * rather than two independent pending rows.
 */

use uuid::Uuid;

use crate::error::{is_unique_violation, ChatError};
use crate::state::AppState;
use crate::store::models::{Conversation, FriendRequest, User};
use crate::store::{friends, notifications, users};

/// Outcome of sending a friend request.
#[derive(Debug)]
pub enum RequestOutcome {
    /// The request is now pending with the receiver.
    Pending(FriendRequest),
    /// A crossed mutual request was resolved into a friendship.
    BecameFriends(Conversation),
}

/// Send a friend request from `actor` to `receiver`.
pub async fn send_request(
    state: &AppState,
    actor: Uuid,
    receiver: Uuid,
) -> Result<RequestOutcome, ChatError> {
    if receiver == actor {
        return Err(ChatError::InvalidInput(
            "cannot send a friend request to yourself".to_string(),
        ));
    }

    users::get_user(&state.pool, receiver)
        .await?
        .ok_or_else(|| ChatError::NotFound("user does not exist".to_string()))?;
    let actor_user = users::get_user(&state.pool, actor)
        .await?
        .ok_or(ChatError::Unauthorized)?;

    if friends::are_friends(&state.pool, actor, receiver).await? {
        return Err(ChatError::Conflict("already friends".to_string()));
    }
    if friends::find_pending(&state.pool, actor, receiver).await?.is_some() {
        return Err(ChatError::Conflict(
            "a request to this user is already pending".to_string(),
        ));
    }

    // Crossed mutual request: the receiver already asked us. Resolve as
    // one atomic double-accept instead of stacking a second pending row.
    if friends::find_pending(&state.pool, receiver, actor).await?.is_some() {
        let conversation = friends::accept_pair(&state.pool, actor, receiver).await?;
        notify_accepted(state, &actor_user, receiver).await;
        return Ok(RequestOutcome::BecameFriends(conversation));
    }

    // The pending pre-check above can lose a race; the partial unique
    // index catches the second insert and that reads as a conflict.
    let request = match friends::create_pending(&state.pool, actor, receiver).await {
        Ok(request) => request,
        Err(e) if is_unique_violation(&e) => {
            return Err(ChatError::Conflict(
                "a request to this user is already pending".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    if let Err(e) = notifications::insert(
        &state.pool,
        receiver,
        "friend_request",
        &format!("{} sent you a friend request", actor_user.visible_name()),
        None,
    )
    .await
    {
        tracing::warn!("failed to write friend-request notification: {:?}", e);
    }

    Ok(RequestOutcome::Pending(request))
}

/// Withdraw a pending request previously sent by `actor`.
pub async fn cancel_request(
    state: &AppState,
    actor: Uuid,
    receiver: Uuid,
) -> Result<(), ChatError> {
    let deleted = friends::delete_pending(&state.pool, actor, receiver).await?;
    if !deleted {
        return Err(ChatError::NotFound("no pending request".to_string()));
    }
    Ok(())
}

/// Accept a pending request sent to `actor` by `sender`.
pub async fn accept_request(
    state: &AppState,
    actor: Uuid,
    sender: Uuid,
) -> Result<Conversation, ChatError> {
    friends::find_pending(&state.pool, sender, actor)
        .await?
        .ok_or_else(|| ChatError::NotFound("no pending request from this user".to_string()))?;

    let actor_user = users::get_user(&state.pool, actor)
        .await?
        .ok_or(ChatError::Unauthorized)?;

    let conversation = friends::accept_pair(&state.pool, actor, sender).await?;
    notify_accepted(state, &actor_user, sender).await;

    Ok(conversation)
}

/// List the actor's friends.
pub async fn list_friends(state: &AppState, actor: Uuid) -> Result<Vec<User>, ChatError> {
    Ok(friends::list_friends(&state.pool, actor).await?)
}

async fn notify_accepted(state: &AppState, accepter: &User, other: Uuid) {
    if let Err(e) = notifications::insert(
        &state.pool,
        other,
        "friend_accepted",
        &format!("{} accepted your friend request", accepter.visible_name()),
        None,
    )
    .await
    {
        tracing::warn!("failed to write friend-accepted notification: {:?}", e);
    }
}
