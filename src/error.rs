/**
 * Error Types
 *
 * One error enum covers every rejected action in the system. The REST
 * surface converts it into an HTTP status plus a JSON body; the real-time
 * surface converts it into a caller-only `error` event. Validation and
 * authorization failures are always reported to the initiating caller
 * only, never broadcast to a conversation group.
 */

use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::realtime::event::ServerEvent;

/// Everything a mutating action can be rejected with.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Actor lacks membership or admin rights for the target
    #[error("not authorized")]
    Unauthorized,

    /// Malformed or nonsensical input, rejected before any mutation
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Referenced entity absent or already soft-deleted
    #[error("not found: {0}")]
    NotFound(String),

    /// The action conflicts with current state (e.g. last admin leaving)
    #[error("conflict: {0}")]
    Conflict(String),

    /// The persistence operation itself failed; the action is aborted
    /// before any broadcast is issued
    #[error("storage error")]
    Store(#[from] sqlx::Error),
}

/// True when a store error is a unique-constraint violation. Dispatch
/// paths that pre-check for duplicates still lose races; the database
/// index is the authority, and its rejection reads as a conflict, not a
/// storage failure.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl ChatError {
    /// HTTP status code for the REST surface.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Caller-facing message. Store failures are reported generically;
    /// the underlying cause goes to the log, not to the client.
    pub fn message(&self) -> String {
        match self {
            Self::Store(e) => {
                tracing::error!("store failure: {:?}", e);
                "internal storage error".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Convert into the caller-only `error` wire event.
    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::Error {
            message: self.message(),
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "error": self.message(),
            "status": status.as_u16(),
        });

        Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(ChatError::Unauthorized.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ChatError::InvalidInput("empty".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ChatError::NotFound("message".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ChatError::Conflict("last admin".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ChatError::Store(sqlx::Error::RowNotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
        assert!(!is_unique_violation(&sqlx::Error::PoolClosed));
    }

    #[test]
    fn test_store_failure_message_is_generic() {
        let err = ChatError::Store(sqlx::Error::RowNotFound);
        assert_eq!(err.message(), "internal storage error");
    }

    #[test]
    fn test_to_event_carries_message() {
        let err = ChatError::Conflict("duplicate pending request".into());
        match err.to_event() {
            ServerEvent::Error { message } => {
                assert!(message.contains("duplicate pending request"));
            }
            other => panic!("expected error event, got {:?}", other),
        }
    }
}
