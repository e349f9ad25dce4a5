/**
 * Group Membership Router
 *
 * Per-conversation broadcast groups: a mapping from conversation id to
 * the set of live connection handles that should receive that
 * conversation's events. The groups are a cache of durable membership for
 * currently connected users, populated at connect time and adjusted when
 * membership-changing operations run.
 *
 * Delivery is fire-and-forget. Senders are snapshotted under the lock and
 * the actual sends happen outside it, so a concurrent join or leave never
 * corrupts an in-flight broadcast, and one dead connection never blocks
 * delivery to the rest of the group.
 */

use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

use crate::realtime::event::ServerEvent;
use crate::realtime::presence::{ConnectionId, EventSender};

/// In-memory map of conversation id to joined connection handles.
#[derive(Default)]
pub struct GroupRouter {
    groups: Mutex<HashMap<Uuid, HashMap<ConnectionId, EventSender>>>,
}

impl GroupRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a connection to a conversation's broadcast group.
    pub fn join(&self, conversation_id: Uuid, conn_id: ConnectionId, sender: EventSender) {
        let mut groups = self.groups.lock().unwrap();
        groups
            .entry(conversation_id)
            .or_default()
            .insert(conn_id, sender);
    }

    /// Remove a connection from one conversation's group.
    pub fn leave(&self, conversation_id: Uuid, conn_id: ConnectionId) {
        let mut groups = self.groups.lock().unwrap();
        if let Some(group) = groups.get_mut(&conversation_id) {
            group.remove(&conn_id);
            if group.is_empty() {
                groups.remove(&conversation_id);
            }
        }
    }

    /// Remove a connection from every group it joined. Called once on
    /// disconnect, before presence deregistration.
    pub fn drop_connection(&self, conn_id: ConnectionId) {
        let mut groups = self.groups.lock().unwrap();
        groups.retain(|_, group| {
            group.remove(&conn_id);
            !group.is_empty()
        });
    }

    /// Deliver an event to every connection joined to the conversation.
    pub fn broadcast(&self, conversation_id: Uuid, event: &ServerEvent) {
        self.broadcast_filtered(conversation_id, event, None);
    }

    /// Deliver an event to every connection in the group except one.
    /// Typing indicators use this to skip the typist's own connection.
    pub fn broadcast_except(
        &self,
        conversation_id: Uuid,
        skip: ConnectionId,
        event: &ServerEvent,
    ) {
        self.broadcast_filtered(conversation_id, event, Some(skip));
    }

    fn broadcast_filtered(
        &self,
        conversation_id: Uuid,
        event: &ServerEvent,
        skip: Option<ConnectionId>,
    ) {
        // Snapshot the senders under the lock, send outside it.
        let senders: Vec<EventSender> = {
            let groups = self.groups.lock().unwrap();
            match groups.get(&conversation_id) {
                Some(group) => group
                    .iter()
                    .filter(|(id, _)| Some(**id) != skip)
                    .map(|(_, tx)| tx.clone())
                    .collect(),
                None => return,
            }
        };

        for tx in senders {
            // A closed receiver means that connection is already on its
            // way out; its own lifecycle cleanup removes it from groups.
            let _ = tx.send(event.clone());
        }
    }

    /// Number of connections currently joined to a conversation.
    pub fn group_size(&self, conversation_id: Uuid) -> usize {
        self.groups
            .lock()
            .unwrap()
            .get(&conversation_id)
            .map_or(0, HashMap::len)
    }
}
