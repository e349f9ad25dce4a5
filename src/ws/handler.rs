/**
 * WebSocket Handshake
 *
 * Entry point for `GET /ws?token=<jwt>`. Browsers cannot set headers on
 * a WebSocket upgrade, so the token rides in the query string. Identity
 * is resolved before the connection task spawns; a bad token still gets
 * an upgrade so the client can read a meaningful close code instead of
 * a bare HTTP error.
 */

use axum::extract::ws::{CloseFrame, Message, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use jsonwebtoken::errors::ErrorKind;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::sessions;
use crate::state::AppState;
use crate::ws::connection;

/// Close codes in the application range, mirrored by the client.
const CLOSE_TOKEN_EXPIRED: u16 = 4001;
const CLOSE_TOKEN_INVALID: u16 = 4002;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    token: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
) -> impl IntoResponse {
    let token = params.token.unwrap_or_default();

    match authenticate(&state.config.jwt_secret, &token) {
        Ok(user_id) => ws.on_upgrade(move |socket| connection::run(state, user_id, socket)),
        Err((code, reason)) => {
            tracing::debug!(code, "websocket handshake refused: {}", reason);
            ws.on_upgrade(move |mut socket| async move {
                let _ = socket
                    .send(Message::Close(Some(CloseFrame {
                        code,
                        reason: reason.into(),
                    })))
                    .await;
            })
        }
    }
}

fn authenticate(secret: &str, token: &str) -> Result<Uuid, (u16, &'static str)> {
    if token.is_empty() {
        return Err((CLOSE_TOKEN_INVALID, "missing token"));
    }

    let claims = sessions::verify_token(secret, token).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => (CLOSE_TOKEN_EXPIRED, "token expired"),
        _ => (CLOSE_TOKEN_INVALID, "token invalid"),
    })?;

    Uuid::parse_str(&claims.sub).map_err(|_| (CLOSE_TOKEN_INVALID, "token invalid"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "handshake-secret";

    #[test]
    fn test_valid_token_authenticates() {
        let user_id = Uuid::new_v4();
        let token = sessions::create_token(SECRET, user_id, "alice").unwrap();
        assert_eq!(authenticate(SECRET, &token).unwrap(), user_id);
    }

    #[test]
    fn test_missing_token_is_invalid() {
        let (code, _) = authenticate(SECRET, "").unwrap_err();
        assert_eq!(code, CLOSE_TOKEN_INVALID);
    }

    #[test]
    fn test_garbage_token_is_invalid() {
        let (code, _) = authenticate(SECRET, "not.a.jwt").unwrap_err();
        assert_eq!(code, CLOSE_TOKEN_INVALID);
    }
}
