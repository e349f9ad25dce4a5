/**
 * HTTP Route Configuration
 *
 * Assembles the REST surface and the WebSocket endpoint into one Axum
 * router. The WebSocket handshake authenticates itself (the token rides
 * in the query string), so only the `/api` tree sits behind the bearer
 * token middleware.
 *
 * # Routes
 *
 * - `GET  /ws` - WebSocket upgrade (token in query string)
 * - `GET  /api/conversations` - conversation list with previews
 * - `GET  /api/conversations/{id}/messages` - visible history
 * - `GET  /api/conversations/{id}/messages/search?q=` - substring search
 * - `PUT  /api/conversations/{id}/pin` - pin/unpin for the caller
 * - `PUT  /api/conversations/{id}/archive` - archive/unarchive
 * - `POST /api/groups` - create a group conversation
 * - `PUT  /api/groups/{id}/name` - rename (admin)
 * - `POST /api/groups/{id}/members` - add a member (admin)
 * - `DELETE /api/groups/{id}/members/{user_id}` - remove (admin)
 * - `POST /api/groups/{id}/leave` - leave the group
 * - `POST /api/groups/{id}/admins/{user_id}` - promote (admin)
 * - `DELETE /api/groups/{id}/admins/{user_id}` - demote (admin)
 * - `GET  /api/friends` - friend list
 * - `POST /api/friends/requests` - send a friend request
 * - `DELETE /api/friends/requests/{user_id}` - cancel an outgoing request
 * - `POST /api/friends/requests/{user_id}/accept` - accept an incoming one
 * - `GET  /api/notifications` - notification feed
 * - `POST /api/notifications/{id}/read` - mark one read
 *
 * Handlers here are thin: they deserialize, hand off to the dispatch
 * layer, and serialize the result. All authorization decisions live in
 * dispatch.
 */

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::middleware::{auth_middleware, AuthUser};
use crate::dispatch::{self, friends::RequestOutcome};
use crate::error::ChatError;
use crate::state::AppState;
use crate::store;
use crate::ws::ws_handler;

pub fn create_router(state: AppState) -> Router<()> {
    let api = Router::new()
        .route("/conversations", get(list_conversations))
        .route("/conversations/{id}/messages", get(list_messages))
        .route("/conversations/{id}/messages/search", get(search_messages))
        .route("/conversations/{id}/pin", put(pin_conversation))
        .route("/conversations/{id}/archive", put(archive_conversation))
        .route("/groups", post(create_group))
        .route("/groups/{id}/name", put(rename_group))
        .route("/groups/{id}/members", post(add_member))
        .route("/groups/{id}/members/{user_id}", delete(remove_member))
        .route("/groups/{id}/leave", post(leave_group))
        .route(
            "/groups/{id}/admins/{user_id}",
            post(promote_admin).delete(demote_admin),
        )
        .route("/friends", get(list_friends))
        .route("/friends/requests", post(send_friend_request))
        .route("/friends/requests/{user_id}", delete(cancel_friend_request))
        .route("/friends/requests/{user_id}/accept", post(accept_friend_request))
        .route("/notifications", get(list_notifications))
        .route("/notifications/{id}/read", post(mark_notification_read))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/ws", get(ws_handler))
        .nest("/api", api)
        .with_state(state)
}

// ---- conversations ----

async fn list_conversations(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, ChatError> {
    let summaries = dispatch::summaries::list_conversations(&state, user.user_id).await?;
    Ok(Json(summaries))
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    limit: Option<i64>,
}

async fn list_messages(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(conversation_id): Path<Uuid>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, ChatError> {
    let membership =
        dispatch::require_active_member(&state, conversation_id, user.user_id).await?;
    let limit = params.limit.unwrap_or(100).clamp(1, 500);
    let messages =
        store::messages::list_visible(&state.pool, conversation_id, membership.joined_at, limit)
            .await?;
    Ok(Json(messages))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: String,
}

async fn search_messages(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(conversation_id): Path<Uuid>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ChatError> {
    let messages =
        dispatch::messages::search_messages(&state, user.user_id, conversation_id, &params.q)
            .await?;
    Ok(Json(messages))
}

#[derive(Debug, Deserialize)]
struct PinBody {
    pinned: bool,
}

async fn pin_conversation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(conversation_id): Path<Uuid>,
    Json(body): Json<PinBody>,
) -> Result<impl IntoResponse, ChatError> {
    dispatch::groups::pin_conversation(&state, user.user_id, conversation_id, body.pinned).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct ArchiveBody {
    archived: bool,
}

async fn archive_conversation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(conversation_id): Path<Uuid>,
    Json(body): Json<ArchiveBody>,
) -> Result<impl IntoResponse, ChatError> {
    dispatch::groups::archive_conversation(&state, user.user_id, conversation_id, body.archived)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- groups ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateGroupBody {
    name: String,
    member_ids: Vec<Uuid>,
}

async fn create_group(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<CreateGroupBody>,
) -> Result<impl IntoResponse, ChatError> {
    let conversation =
        dispatch::groups::create_group(&state, user.user_id, &body.name, &body.member_ids).await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

#[derive(Debug, Deserialize)]
struct RenameBody {
    name: String,
}

async fn rename_group(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(conversation_id): Path<Uuid>,
    Json(body): Json<RenameBody>,
) -> Result<impl IntoResponse, ChatError> {
    dispatch::groups::rename_group(&state, user.user_id, conversation_id, &body.name).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddMemberBody {
    user_id: Uuid,
}

async fn add_member(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(conversation_id): Path<Uuid>,
    Json(body): Json<AddMemberBody>,
) -> Result<impl IntoResponse, ChatError> {
    dispatch::groups::add_member(&state, user.user_id, conversation_id, body.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_member(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((conversation_id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ChatError> {
    dispatch::groups::remove_member(&state, user.user_id, conversation_id, member_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn leave_group(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(conversation_id): Path<Uuid>,
) -> Result<impl IntoResponse, ChatError> {
    dispatch::groups::leave_group(&state, user.user_id, conversation_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn promote_admin(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((conversation_id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ChatError> {
    dispatch::groups::promote_admin(&state, user.user_id, conversation_id, member_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn demote_admin(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((conversation_id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ChatError> {
    dispatch::groups::demote_admin(&state, user.user_id, conversation_id, member_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- friends ----

async fn list_friends(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, ChatError> {
    let friends = dispatch::friends::list_friends(&state, user.user_id).await?;
    Ok(Json(friends))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FriendRequestBody {
    user_id: Uuid,
}

async fn send_friend_request(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<FriendRequestBody>,
) -> Result<impl IntoResponse, ChatError> {
    match dispatch::friends::send_request(&state, user.user_id, body.user_id).await? {
        RequestOutcome::Pending(request) => Ok((
            StatusCode::CREATED,
            Json(json!({
                "status": "pending",
                "requestId": request.request_id,
                "receiverId": request.receiver_id,
                "createdAt": request.created_at,
            })),
        )),
        RequestOutcome::BecameFriends(conversation) => Ok((
            StatusCode::CREATED,
            Json(json!({
                "status": "friends",
                "conversation": conversation,
            })),
        )),
    }
}

async fn cancel_friend_request(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(receiver_id): Path<Uuid>,
) -> Result<impl IntoResponse, ChatError> {
    dispatch::friends::cancel_request(&state, user.user_id, receiver_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn accept_friend_request(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(sender_id): Path<Uuid>,
) -> Result<impl IntoResponse, ChatError> {
    let conversation = dispatch::friends::accept_request(&state, user.user_id, sender_id).await?;
    Ok(Json(conversation))
}

// ---- notifications ----

async fn list_notifications(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, ChatError> {
    let notifications = store::notifications::list_for_user(&state.pool, user.user_id).await?;
    Ok(Json(notifications))
}

async fn mark_notification_read(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(notification_id): Path<Uuid>,
) -> Result<impl IntoResponse, ChatError> {
    store::notifications::mark_read(&state.pool, user.user_id, notification_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
