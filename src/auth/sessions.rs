/**
 * Identity Tokens
 *
 * Token mint/verify is the defined interface to the authentication
 * collaborator: session issuance lives elsewhere, but every surface of
 * this server resolves "who is calling" through `verify_token`. The REST
 * middleware and the WebSocket handshake both depend on this one path.
 */

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Username
    pub username: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at time (Unix timestamp)
    pub iat: u64,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Create a token for a user.
pub fn create_token(
    secret: &str,
    user_id: Uuid,
    username: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = unix_now();

    // Token expires in 30 days
    let exp = now + (30 * 24 * 60 * 60);

    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        exp,
        iat: now,
    };

    let key = EncodingKey::from_secret(secret.as_ref());
    encode(&Header::default(), &claims, &key)
}

/// Verify and decode a token.
pub fn verify_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let key = DecodingKey::from_secret(secret.as_ref());
    let validation = Validation::default();

    let token_data = decode::<Claims>(token, &key, &validation)?;
    Ok(token_data.claims)
}

/// Resolve a token straight to a user id. This is the identity resolver
/// both transports share; anything without a resolvable identity is
/// refused before it touches state.
pub fn resolve_user_id(secret: &str, token: &str) -> Result<Uuid, String> {
    let claims =
        verify_token(secret, token).map_err(|e| format!("token verification failed: {}", e))?;
    Uuid::parse_str(&claims.sub).map_err(|e| format!("invalid user id in token: {}", e))
}
