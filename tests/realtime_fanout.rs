//! Fan-out integration tests for the presence registry and group router.
//!
//! These cover the in-memory real-time path end to end: connections
//! register, join conversation groups, receive broadcasts as serialized
//! events, and tear down without affecting their peers. No database is
//! involved.

use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use uuid::Uuid;

use parley::realtime::event::ServerEvent;
use parley::{GroupRouter, PresenceRegistry};

fn channel() -> (
    mpsc::UnboundedSender<ServerEvent>,
    mpsc::UnboundedReceiver<ServerEvent>,
) {
    mpsc::unbounded_channel()
}

fn presence_event(user_id: Uuid, is_online: bool) -> ServerEvent {
    ServerEvent::PresenceChanged {
        user_id,
        is_online,
        last_seen: chrono::Utc::now(),
    }
}

async fn recv(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> ServerEvent {
    timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("channel closed")
}

#[tokio::test]
async fn test_two_connections_one_presence_transition() {
    let presence = PresenceRegistry::new();
    let user = Uuid::new_v4();
    let (tx_a, _rx_a) = channel();
    let (tx_b, _rx_b) = channel();
    let conn_a = Uuid::new_v4();
    let conn_b = Uuid::new_v4();

    assert!(presence.register(user, conn_a, tx_a));
    assert!(!presence.register(user, conn_b, tx_b));
    assert!(presence.is_online(user));

    assert!(!presence.deregister(user, conn_a));
    assert!(presence.is_online(user));
    assert!(presence.deregister(user, conn_b));
    assert!(!presence.is_online(user));
}

#[tokio::test]
async fn test_broadcast_reaches_every_group_member_once() {
    let router = GroupRouter::new();
    let conversation = Uuid::new_v4();
    let user = Uuid::new_v4();

    let (tx_a, mut rx_a) = channel();
    let (tx_b, mut rx_b) = channel();
    router.join(conversation, Uuid::new_v4(), tx_a);
    router.join(conversation, Uuid::new_v4(), tx_b);

    router.broadcast(conversation, &presence_event(user, true));

    for rx in [&mut rx_a, &mut rx_b] {
        match recv(rx).await {
            ServerEvent::PresenceChanged {
                user_id, is_online, ..
            } => {
                assert_eq!(user_id, user);
                assert!(is_online);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(rx.try_recv().is_err(), "member received a duplicate");
    }
}

#[tokio::test]
async fn test_broadcast_does_not_cross_conversations() {
    let router = GroupRouter::new();
    let conv_a = Uuid::new_v4();
    let conv_b = Uuid::new_v4();

    let (tx_a, mut rx_a) = channel();
    let (tx_b, mut rx_b) = channel();
    router.join(conv_a, Uuid::new_v4(), tx_a);
    router.join(conv_b, Uuid::new_v4(), tx_b);

    router.broadcast(conv_a, &presence_event(Uuid::new_v4(), true));

    recv(&mut rx_a).await;
    assert!(rx_b.try_recv().is_err());
}

#[tokio::test]
async fn test_dropped_connection_stops_receiving() {
    let router = GroupRouter::new();
    let conversation = Uuid::new_v4();
    let conn_gone = Uuid::new_v4();

    let (tx_gone, rx_gone) = channel();
    let (tx_live, mut rx_live) = channel();
    router.join(conversation, conn_gone, tx_gone);
    router.join(conversation, Uuid::new_v4(), tx_live);

    router.drop_connection(conn_gone);
    drop(rx_gone);

    router.broadcast(conversation, &presence_event(Uuid::new_v4(), false));
    recv(&mut rx_live).await;
}

#[tokio::test]
async fn test_dead_receiver_does_not_stall_peers() {
    let router = GroupRouter::new();
    let conversation = Uuid::new_v4();

    // Receiver dropped but connection never deregistered, as after a crash.
    let (tx_dead, rx_dead) = channel();
    drop(rx_dead);
    let (tx_live, mut rx_live) = channel();
    router.join(conversation, Uuid::new_v4(), tx_dead);
    router.join(conversation, Uuid::new_v4(), tx_live);

    router.broadcast(conversation, &presence_event(Uuid::new_v4(), true));
    recv(&mut rx_live).await;
}

#[tokio::test]
async fn test_events_arrive_in_broadcast_order() {
    let router = GroupRouter::new();
    let conversation = Uuid::new_v4();
    let (tx, mut rx) = channel();
    router.join(conversation, Uuid::new_v4(), tx);

    let users: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
    for &user in &users {
        router.broadcast(conversation, &presence_event(user, true));
    }

    for &expected in &users {
        match recv(&mut rx).await {
            ServerEvent::PresenceChanged { user_id, .. } => assert_eq!(user_id, expected),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_broadcast_events_serialize_for_the_wire() {
    let event = presence_event(Uuid::new_v4(), true);
    let json = serde_json::to_value(&event).unwrap();

    assert_eq!(json["event"], "presence-changed");
    assert_eq!(json["isOnline"], true);
    assert!(json["userId"].is_string());
}

#[tokio::test]
async fn test_presence_connections_feed_router_joins() {
    // A user online through two connections joins a new conversation on
    // both of them, the way group membership changes are applied live.
    let presence = PresenceRegistry::new();
    let router = GroupRouter::new();
    let user = Uuid::new_v4();
    let conversation = Uuid::new_v4();

    let (tx_a, mut rx_a) = channel();
    let (tx_b, mut rx_b) = channel();
    presence.register(user, Uuid::new_v4(), tx_a);
    presence.register(user, Uuid::new_v4(), tx_b);

    for (conn_id, sender) in presence.connections_for(user) {
        router.join(conversation, conn_id, sender);
    }

    router.broadcast(conversation, &presence_event(Uuid::new_v4(), true));
    recv(&mut rx_a).await;
    recv(&mut rx_b).await;
}
