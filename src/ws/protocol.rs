/**
 * Client Action Protocol
 *
 * The actions a connected client can send over the WebSocket, as tagged
 * JSON objects, e.g. `{"action":"send-message","conversationId":...,
 * "text":"hi"}`. Parsing failures and every dispatcher rejection turn
 * into a caller-only `error` event on the same connection; nothing is
 * ever silently dropped, and rejections are never broadcast.
 */

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dispatch::messages as actions;
use crate::realtime::event::ServerEvent;
use crate::realtime::presence::{ConnectionId, EventSender};
use crate::state::AppState;

/// Client-to-server actions carried over the WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientAction {
    SendMessage { conversation_id: Uuid, text: String },
    EditMessage { message_id: Uuid, text: String },
    DeleteMessage { message_id: Uuid },
    React { message_id: Uuid, kind: String },
    PinMessage { message_id: Uuid },
    TypingStart { conversation_id: Uuid },
    TypingStop { conversation_id: Uuid },
    MarkRead { conversation_id: Uuid },
}

/// Parse and run one inbound frame. All rejection paths answer the
/// caller on `tx` only.
pub async fn handle_text(
    state: &AppState,
    user_id: Uuid,
    conn_id: ConnectionId,
    tx: &EventSender,
    text: &str,
) {
    let action: ClientAction = match serde_json::from_str(text) {
        Ok(action) => action,
        Err(e) => {
            tracing::debug!(user_id = %user_id, "unparseable client frame: {}", e);
            let _ = tx.send(ServerEvent::Error {
                message: format!("malformed action: {}", e),
            });
            return;
        }
    };

    let result = match action {
        ClientAction::SendMessage {
            conversation_id,
            text,
        } => actions::send_message(state, user_id, conversation_id, &text)
            .await
            .map(|_| ()),
        ClientAction::EditMessage { message_id, text } => {
            actions::edit_message(state, user_id, message_id, &text).await
        }
        ClientAction::DeleteMessage { message_id } => {
            actions::delete_message(state, user_id, message_id).await
        }
        ClientAction::React { message_id, kind } => {
            actions::react(state, user_id, message_id, &kind).await
        }
        ClientAction::PinMessage { message_id } => {
            actions::pin_message(state, user_id, message_id).await
        }
        ClientAction::TypingStart { conversation_id } => {
            actions::typing_start(state, user_id, conn_id, conversation_id).await
        }
        ClientAction::TypingStop { conversation_id } => {
            actions::typing_stop(state, user_id, conn_id, conversation_id).await
        }
        ClientAction::MarkRead { conversation_id } => {
            actions::mark_read(state, user_id, conversation_id).await
        }
    };

    if let Err(e) = result {
        let _ = tx.send(e.to_event());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_message_parses() {
        let conv = Uuid::new_v4();
        let json = format!(r#"{{"action":"send-message","conversationId":"{conv}","text":"hi"}}"#);
        let action: ClientAction = serde_json::from_str(&json).unwrap();
        assert_eq!(
            action,
            ClientAction::SendMessage {
                conversation_id: conv,
                text: "hi".to_string()
            }
        );
    }

    #[test]
    fn test_react_parses() {
        let msg = Uuid::new_v4();
        let json = format!(r#"{{"action":"react","messageId":"{msg}","kind":"heart"}}"#);
        let action: ClientAction = serde_json::from_str(&json).unwrap();
        assert_eq!(
            action,
            ClientAction::React {
                message_id: msg,
                kind: "heart".to_string()
            }
        );
    }

    #[test]
    fn test_typing_actions_parse() {
        let conv = Uuid::new_v4();
        for (name, expected) in [
            ("typing-start", ClientAction::TypingStart { conversation_id: conv }),
            ("typing-stop", ClientAction::TypingStop { conversation_id: conv }),
            ("mark-read", ClientAction::MarkRead { conversation_id: conv }),
        ] {
            let json = format!(r#"{{"action":"{name}","conversationId":"{conv}"}}"#);
            let action: ClientAction = serde_json::from_str(&json).unwrap();
            assert_eq!(action, expected);
        }
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let json = r#"{"action":"self-destruct"}"#;
        assert!(serde_json::from_str::<ClientAction>(json).is_err());
    }

    #[test]
    fn test_action_round_trip() {
        let action = ClientAction::EditMessage {
            message_id: Uuid::new_v4(),
            text: "fixed".to_string(),
        };
        let json = serde_json::to_string(&action).unwrap();
        let back: ClientAction = serde_json::from_str(&json).unwrap();
        assert_eq!(action, back);
    }
}
