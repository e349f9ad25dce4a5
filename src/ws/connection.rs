/**
 * WebSocket Connection Lifecycle
 *
 * One task per connection. The socket is split: a writer task drains an
 * unbounded channel of server events and serializes them onto the wire,
 * while this task reads client frames until the peer goes away. The
 * channel sender is what the presence registry and group router hold,
 * so fan-out never touches the socket directly.
 *
 * Connect order matters: presence registration happens before group
 * joins, so the `presence-changed` broadcast for a user's first
 * connection reaches their conversations before that connection starts
 * receiving traffic. Teardown runs the mirror image and never fails;
 * errors during cleanup are logged and swallowed so a flaky database
 * cannot leak registry entries.
 */

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::realtime::event::ServerEvent;
use crate::realtime::presence::ConnectionId;
use crate::state::AppState;
use crate::store;
use crate::ws::protocol;

pub async fn run(state: AppState, user_id: Uuid, socket: WebSocket) {
    let conn_id: ConnectionId = Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    // Writer task: owns the sink, serializes events until the channel closes.
    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("failed to serialize server event: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let conversation_ids = match connect(&state, user_id, conn_id, &tx).await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!(user_id = %user_id, "connection setup failed: {}", e);
            state.presence.deregister(user_id, conn_id);
            drop(tx);
            let _ = writer.await;
            return;
        }
    };

    tracing::info!(
        user_id = %user_id,
        conn_id = %conn_id,
        conversations = conversation_ids.len(),
        "websocket connected"
    );

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                protocol::handle_text(&state, user_id, conn_id, &tx, &text).await;
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {} // pings are answered by axum, binary frames ignored
        }
    }

    disconnect(&state, user_id, conn_id, &conversation_ids).await;
    drop(tx);
    let _ = writer.await;

    tracing::info!(user_id = %user_id, conn_id = %conn_id, "websocket disconnected");
}

/// Register presence, flip online status on the first connection, and
/// subscribe this connection to every conversation the user belongs to.
pub async fn connect(
    state: &AppState,
    user_id: Uuid,
    conn_id: ConnectionId,
    tx: &mpsc::UnboundedSender<ServerEvent>,
) -> Result<Vec<Uuid>, sqlx::Error> {
    let first = state.presence.register(user_id, conn_id, tx.clone());
    let conversation_ids = store::memberships::active_conversation_ids(&state.pool, user_id).await?;

    if first {
        store::users::set_online(&state.pool, user_id, true).await?;
        let event = ServerEvent::PresenceChanged {
            user_id,
            is_online: true,
            last_seen: chrono::Utc::now(),
        };
        for &conversation_id in &conversation_ids {
            state.router.broadcast(conversation_id, &event);
        }
    }

    for &conversation_id in &conversation_ids {
        state.router.join(conversation_id, conn_id, tx.clone());
    }

    Ok(conversation_ids)
}

/// Tear down routing and presence for one connection. On the last
/// connection the user goes offline and their conversations hear about
/// it. Never propagates errors; a failed status write must not keep the
/// registry entry alive.
///
/// Membership may have changed since connect, so the offline broadcast
/// targets a fresh fetch of the user's active conversations, not the
/// connect-time snapshot. The snapshot is only the fallback when that
/// fetch fails, so cleanup always completes.
pub async fn disconnect(
    state: &AppState,
    user_id: Uuid,
    conn_id: ConnectionId,
    snapshot: &[Uuid],
) {
    state.router.drop_connection(conn_id);
    let last = state.presence.deregister(user_id, conn_id);

    if last {
        if let Err(e) = store::users::set_online(&state.pool, user_id, false).await {
            tracing::warn!(user_id = %user_id, "failed to record offline status: {}", e);
        }
        let conversations =
            match store::memberships::active_conversation_ids(&state.pool, user_id).await {
                Ok(ids) => ids,
                Err(e) => {
                    tracing::warn!(
                        user_id = %user_id,
                        "failed to refetch memberships on disconnect, using connect-time set: {}",
                        e
                    );
                    snapshot.to_vec()
                }
            };
        let event = ServerEvent::PresenceChanged {
            user_id,
            is_online: false,
            last_seen: chrono::Utc::now(),
        };
        for conversation_id in conversations {
            state.router.broadcast(conversation_id, &event);
        }
    }
}
