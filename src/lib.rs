//! Parley - Group Chat Server
//!
//! Parley is a group chat backend built on Axum and PostgreSQL. Users
//! authenticate with bearer tokens, form friendships, create direct and
//! group conversations, and exchange messages over a persistent WebSocket
//! connection. Every state-changing action is persisted first and then
//! fanned out in real time to exactly the connections that should see it.
//!
//! # Module Structure
//!
//! - **`realtime`** - The in-memory presence registry and per-conversation
//!   broadcast router, plus the server event vocabulary.
//! - **`ws`** - WebSocket transport: handshake, per-connection lifecycle,
//!   and the client action protocol.
//! - **`dispatch`** - The event dispatcher: authorize, validate, mutate,
//!   broadcast, for every mutating action.
//! - **`store`** - sqlx/PostgreSQL persistence for users, conversations,
//!   memberships, messages, reactions, friendships, and notifications.
//! - **`auth`** - Token-based identity resolution shared by the REST
//!   surface and the WebSocket handshake.
//! - **`routes`** - HTTP route assembly.
//!
//! # Delivery Semantics
//!
//! Broadcasts are issued only after the corresponding store mutation
//! commits, so within one conversation the commit order determines the
//! event order. Delivery to an individual connection is fire-and-forget:
//! a dead connection never stalls the rest of its group.

/// Identity resolution and request authentication
pub mod auth;

/// Server configuration loaded from the environment
pub mod config;

/// Event dispatcher: the mutating actions and their broadcast protocol
pub mod dispatch;

/// Error taxonomy shared by the REST and real-time surfaces
pub mod error;

/// Presence registry, group router, and server events
pub mod realtime;

/// HTTP route configuration
pub mod routes;

/// Server initialization
pub mod server;

/// Shared application state
pub mod state;

/// Durable store operations (PostgreSQL via sqlx)
pub mod store;

/// WebSocket transport and connection lifecycle
pub mod ws;

pub use config::ServerConfig;
pub use error::ChatError;
pub use realtime::event::ServerEvent;
pub use realtime::presence::PresenceRegistry;
pub use realtime::router::GroupRouter;
pub use state::AppState;
