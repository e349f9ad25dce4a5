//! Identity Resolution
//!
//! Session issuance is an external concern; this module is the single
//! capability both the request-handling layer and the connection
//! lifecycle depend on to answer "who is calling". Tokens in, user ids
//! out.

/// REST-surface authentication middleware and extractor
pub mod middleware;

/// Token mint/verify (the defined interface to the auth collaborator)
pub mod sessions;

pub use middleware::{auth_middleware, AuthUser, AuthenticatedUser};
pub use sessions::{create_token, resolve_user_id, verify_token};
