//! Durable Store
//!
//! All PostgreSQL access lives here, split by entity. Multi-statement
//! mutations (message insert + conversation bump, reaction toggles,
//! friendship acceptance, conversation creation) run inside sqlx
//! transactions; the dispatcher broadcasts only after commit.

pub mod conversations;
pub mod friends;
pub mod memberships;
pub mod messages;
pub mod models;
pub mod notifications;
pub mod reactions;
pub mod users;
