/**
 * Authentication Middleware
 *
 * Protects the REST surface: extracts the bearer token from the
 * Authorization header, verifies it, and attaches the resolved identity
 * to request extensions for handlers to pick up via the `AuthUser`
 * extractor.
 */

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::auth::sessions::resolve_user_id;
use crate::state::AppState;

/// Identity resolved from the bearer token.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

/// Reject requests without a valid bearer token; attach the identity
/// otherwise.
pub async fn auth_middleware(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("missing Authorization header");
            StatusCode::UNAUTHORIZED
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::warn!("invalid Authorization header format");
        StatusCode::UNAUTHORIZED
    })?;

    let user_id = resolve_user_id(&app_state.config.jwt_secret, token).map_err(|e| {
        tracing::warn!("token rejected: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    request.extensions_mut().insert(AuthenticatedUser { user_id });

    Ok(next.run(request).await)
}

/// Axum extractor for the authenticated identity set by the middleware.
#[derive(Clone, Debug)]
pub struct AuthUser(pub AuthenticatedUser);

impl axum::extract::FromRequestParts<AppState> for AuthUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| {
                tracing::warn!("AuthenticatedUser not found in request extensions");
                StatusCode::UNAUTHORIZED
            })?;

        Ok(AuthUser(user))
    }
}
