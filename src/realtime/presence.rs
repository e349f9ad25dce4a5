/**
 * Presence Registry
 *
 * Concurrency-safe mapping from user identity to that user's set of live
 * connection handles. A user may hold several simultaneous connections
 * (multiple tabs or devices); presence is derived from whether the set is
 * non-empty, and the transition signals are produced atomically here so
 * two racing connects or disconnects can never both observe the same
 * transition.
 *
 * The registry owns nothing: handles are cloneable senders into each
 * connection's writer task. The transport layer remains the authority for
 * connection lifetime.
 */

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::realtime::event::ServerEvent;

/// Opaque identifier for one live connection.
pub type ConnectionId = Uuid;

/// Non-owning handle for pushing events to one connection.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// In-memory map of user id to live connection handles.
///
/// A single mutex guards the whole map; critical sections only touch the
/// map and never await, so contention stays negligible at this scale and
/// the check-and-remove on disconnect is trivially atomic.
#[derive(Default)]
pub struct PresenceRegistry {
    inner: Mutex<HashMap<Uuid, HashMap<ConnectionId, EventSender>>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection handle to the user's set, creating the set on
    /// first connection. Idempotent per connection id.
    ///
    /// Returns `true` when this was the user's first live connection,
    /// which is the sole trigger for flipping the user online.
    pub fn register(&self, user_id: Uuid, conn_id: ConnectionId, sender: EventSender) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let connections = inner.entry(user_id).or_default();
        let was_empty = connections.is_empty();
        connections.insert(conn_id, sender);
        was_empty
    }

    /// Remove a connection handle from the user's set.
    ///
    /// Returns `true` when the set became empty (this was the last
    /// connection), which is the sole trigger for flipping the user
    /// offline. The emptiness check and entry removal happen in one
    /// atomic step under the registry lock.
    pub fn deregister(&self, user_id: Uuid, conn_id: ConnectionId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.get_mut(&user_id) {
            Some(connections) => {
                connections.remove(&conn_id);
                if connections.is_empty() {
                    inner.remove(&user_id);
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    /// True iff the user currently has at least one live connection.
    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.inner
            .lock()
            .unwrap()
            .get(&user_id)
            .is_some_and(|connections| !connections.is_empty())
    }

    /// Snapshot of the user's live connection handles. Used when group
    /// membership changes and every live connection of the affected user
    /// must be joined to or removed from a broadcast group.
    pub fn connections_for(&self, user_id: Uuid) -> Vec<(ConnectionId, EventSender)> {
        self.inner
            .lock()
            .unwrap()
            .get(&user_id)
            .map(|connections| {
                connections
                    .iter()
                    .map(|(id, tx)| (*id, tx.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> EventSender {
        mpsc::unbounded_channel().0
    }

    #[test]
    fn test_first_connection_reports_online_transition() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        assert!(registry.register(user, Uuid::new_v4(), sender()));
        assert!(registry.is_online(user));
    }

    #[test]
    fn test_second_connection_is_not_a_transition() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        assert!(registry.register(user, Uuid::new_v4(), sender()));
        assert!(!registry.register(user, Uuid::new_v4(), sender()));
    }

    #[test]
    fn test_register_is_idempotent_per_handle() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let conn = Uuid::new_v4();
        assert!(registry.register(user, conn, sender()));
        assert!(!registry.register(user, conn, sender()));
        // Still a single connection: removing it is the last one.
        assert!(registry.deregister(user, conn));
    }

    #[test]
    fn test_offline_only_on_last_disconnect() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let conns: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        for &conn in &conns {
            registry.register(user, conn, sender());
        }

        // Closing all but the last never reports the offline transition.
        assert!(!registry.deregister(user, conns[0]));
        assert!(registry.is_online(user));
        assert!(!registry.deregister(user, conns[1]));
        assert!(registry.is_online(user));

        // Exactly one transition, on the final close.
        assert!(registry.deregister(user, conns[2]));
        assert!(!registry.is_online(user));
    }

    #[test]
    fn test_deregister_unknown_user_is_harmless() {
        let registry = PresenceRegistry::new();
        assert!(!registry.deregister(Uuid::new_v4(), Uuid::new_v4()));
    }

    #[test]
    fn test_empty_entry_is_removed() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        let conn = Uuid::new_v4();
        registry.register(user, conn, sender());
        registry.deregister(user, conn);
        // Re-registering is a fresh first connection again.
        assert!(registry.register(user, Uuid::new_v4(), sender()));
    }

    #[test]
    fn test_connections_for_snapshots_all_handles() {
        let registry = PresenceRegistry::new();
        let user = Uuid::new_v4();
        registry.register(user, Uuid::new_v4(), sender());
        registry.register(user, Uuid::new_v4(), sender());
        assert_eq!(registry.connections_for(user).len(), 2);
        assert!(registry.connections_for(Uuid::new_v4()).is_empty());
    }

    #[tokio::test]
    async fn test_racing_disconnects_yield_exactly_one_transition() {
        use std::sync::Arc;

        let registry = Arc::new(PresenceRegistry::new());
        let user = Uuid::new_v4();
        let conns: Vec<Uuid> = (0..8).map(|_| Uuid::new_v4()).collect();
        for &conn in &conns {
            registry.register(user, conn, sender());
        }

        let mut handles = Vec::new();
        for &conn in &conns {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.deregister(user, conn)
            }));
        }

        let mut transitions = 0;
        for handle in handles {
            if handle.await.unwrap() {
                transitions += 1;
            }
        }
        assert_eq!(transitions, 1);
        assert!(!registry.is_online(user));
    }
}
