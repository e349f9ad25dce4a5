/**
 * WebSocket Transport
 *
 * The real-time surface of the server: handshake authentication,
 * per-connection lifecycle, and the inbound action protocol. Everything
 * here is transport plumbing; the actual chat semantics live in the
 * dispatch layer.
 */

pub mod connection;
pub mod handler;
pub mod protocol;

pub use handler::ws_handler;
pub use protocol::ClientAction;
