//! Real-time Core
//!
//! The in-memory half of the fan-out engine: who is connected
//! ([`presence::PresenceRegistry`]), which connections receive which
//! conversation's events ([`router::GroupRouter`]), and the wire
//! vocabulary those events use ([`event::ServerEvent`]).
//!
//! Both shared structures live behind plain mutexes with never-awaiting
//! critical sections. They are created once per server process inside
//! [`crate::state::AppState`] and torn down with it; nothing here is a
//! process-wide static.

/// Server-to-client event types
pub mod event;

/// Live-connection tracking per user
pub mod presence;

/// Per-conversation broadcast groups
pub mod router;

pub use event::{ReactionGroup, SenderInfo, ServerEvent};
pub use presence::{ConnectionId, EventSender, PresenceRegistry};
pub use router::GroupRouter;
