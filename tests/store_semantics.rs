//! Store-backed dispatch semantics, run against a real PostgreSQL.
//!
//! The pool comes from `DATABASE_URL` the same way the server's does;
//! when the variable is unset or the database is unreachable each test
//! returns early, so the suite only exercises these paths where a
//! database is actually provisioned. Every test seeds its own users
//! with fresh ids, so tests stay isolated without truncation.

use sqlx::PgPool;
use tokio::sync::mpsc;
use uuid::Uuid;

use parley::dispatch::{friends, groups, messages};
use parley::dispatch::friends::RequestOutcome;
use parley::error::is_unique_violation;
use parley::realtime::event::ServerEvent;
use parley::store;
use parley::ws::connection;
use parley::{AppState, ChatError, ServerConfig};

async fn test_state() -> Option<AppState> {
    let database_url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPool::connect(&database_url).await.ok()?;
    sqlx::migrate!().run(&pool).await.ok()?;

    let config = ServerConfig {
        database_url,
        jwt_secret: "store-semantics-secret".to_string(),
        port: 0,
    };
    Some(AppState::new(pool, config))
}

async fn seed_user(pool: &PgPool, name: &str) -> Uuid {
    let user_id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (user_id, username) VALUES ($1, $2)")
        .bind(user_id)
        .bind(format!("{name}-{user_id}"))
        .execute(pool)
        .await
        .expect("seed user");
    user_id
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_reaction_toggle_removes_and_replaces() {
    let Some(state) = test_state().await else { return };
    let u = seed_user(&state.pool, "reactor").await;
    let a = seed_user(&state.pool, "member").await;
    let b = seed_user(&state.pool, "member").await;

    let conv = groups::create_group(&state, u, "reactions", &[a, b])
        .await
        .unwrap();
    let message = messages::send_message(&state, u, conv.conversation_id, "hello")
        .await
        .unwrap();

    // First reaction lands.
    messages::react(&state, a, message.message_id, "heart")
        .await
        .unwrap();
    let grouped = store::reactions::grouped(&state.pool, message.message_id)
        .await
        .unwrap();
    assert_eq!(grouped.len(), 1);
    assert_eq!(grouped[0].kind, "heart");
    assert_eq!(grouped[0].count, 1);

    // Same kind again removes it entirely.
    messages::react(&state, a, message.message_id, "heart")
        .await
        .unwrap();
    let grouped = store::reactions::grouped(&state.pool, message.message_id)
        .await
        .unwrap();
    assert!(grouped.is_empty());

    // A different kind overwrites rather than stacking.
    messages::react(&state, a, message.message_id, "heart")
        .await
        .unwrap();
    messages::react(&state, a, message.message_id, "laugh")
        .await
        .unwrap();
    let grouped = store::reactions::grouped(&state.pool, message.message_id)
        .await
        .unwrap();
    assert_eq!(grouped.len(), 1);
    assert_eq!(grouped[0].kind, "laugh");
    assert_eq!(grouped[0].count, 1);
}

#[tokio::test]
async fn test_last_admin_must_promote_before_leaving() {
    let Some(state) = test_state().await else { return };
    let creator = seed_user(&state.pool, "admin").await;
    let a = seed_user(&state.pool, "member").await;
    let b = seed_user(&state.pool, "member").await;

    let conv = groups::create_group(&state, creator, "handover", &[a, b])
        .await
        .unwrap();

    let err = groups::leave_group(&state, creator, conv.conversation_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Conflict(_)));

    groups::promote_admin(&state, creator, conv.conversation_id, a)
        .await
        .unwrap();
    groups::leave_group(&state, creator, conv.conversation_id)
        .await
        .unwrap();

    let remaining = store::memberships::count_active_members(&state.pool, conv.conversation_id)
        .await
        .unwrap();
    assert_eq!(remaining, 2);
}

#[tokio::test]
async fn test_mutual_requests_resolve_to_one_friendship() {
    let Some(state) = test_state().await else { return };
    let a = seed_user(&state.pool, "alice").await;
    let b = seed_user(&state.pool, "bob").await;

    let first = friends::send_request(&state, a, b).await.unwrap();
    assert!(matches!(first, RequestOutcome::Pending(_)));

    // The crossed request back resolves instead of stacking a second
    // pending row.
    let second = friends::send_request(&state, b, a).await.unwrap();
    let conv = match second {
        RequestOutcome::BecameFriends(conv) => conv,
        other => panic!("expected friendship, got {:?}", other),
    };

    assert!(store::friends::are_friends(&state.pool, a, b).await.unwrap());
    assert!(store::friends::are_friends(&state.pool, b, a).await.unwrap());
    assert!(store::friends::find_pending(&state.pool, a, b)
        .await
        .unwrap()
        .is_none());
    assert!(store::friends::find_pending(&state.pool, b, a)
        .await
        .unwrap()
        .is_none());

    assert!(!conv.is_group);
    let members = store::memberships::count_active_members(&state.pool, conv.conversation_id)
        .await
        .unwrap();
    assert_eq!(members, 2);
}

#[tokio::test]
async fn test_duplicate_pending_insert_is_a_unique_violation() {
    let Some(state) = test_state().await else { return };
    let a = seed_user(&state.pool, "racer").await;
    let b = seed_user(&state.pool, "target").await;

    store::friends::create_pending(&state.pool, a, b).await.unwrap();
    let err = store::friends::create_pending(&state.pool, a, b)
        .await
        .unwrap_err();
    assert!(is_unique_violation(&err));

    // The dispatch path reports the same state as a conflict.
    let err = friends::send_request(&state, a, b).await.unwrap_err();
    assert!(matches!(err, ChatError::Conflict(_)));
}

#[tokio::test]
async fn test_offline_event_follows_current_memberships() {
    let Some(state) = test_state().await else { return };
    let u = seed_user(&state.pool, "roamer").await;
    let o1 = seed_user(&state.pool, "observer").await;
    let o2 = seed_user(&state.pool, "observer").await;
    let x = seed_user(&state.pool, "filler").await;
    let y = seed_user(&state.pool, "filler").await;

    // u starts out in conv1 only; conv2 belongs to o2.
    let conv1 = groups::create_group(&state, u, "origin", &[o1, x]).await.unwrap();
    let conv2 = groups::create_group(&state, o2, "destination", &[x, y])
        .await
        .unwrap();

    let conn_u = Uuid::new_v4();
    let (tx_u, _rx_u) = mpsc::unbounded_channel();
    let snapshot = connection::connect(&state, u, conn_u, &tx_u).await.unwrap();
    assert_eq!(snapshot, vec![conv1.conversation_id]);

    let (tx_o1, mut rx_o1) = mpsc::unbounded_channel();
    connection::connect(&state, o1, Uuid::new_v4(), &tx_o1)
        .await
        .unwrap();
    let (tx_o2, mut rx_o2) = mpsc::unbounded_channel();
    connection::connect(&state, o2, Uuid::new_v4(), &tx_o2)
        .await
        .unwrap();

    // Mid-session, u moves: added to conv2, gone from conv1.
    groups::add_member(&state, o2, conv2.conversation_id, u)
        .await
        .unwrap();
    groups::leave_group(&state, u, conv1.conversation_id)
        .await
        .unwrap();

    drain(&mut rx_o1);
    drain(&mut rx_o2);

    connection::disconnect(&state, u, conn_u, &snapshot).await;

    let offline_for_u = |events: &[ServerEvent]| {
        events.iter().any(|e| {
            matches!(e, ServerEvent::PresenceChanged { user_id, is_online, .. }
                if *user_id == u && !*is_online)
        })
    };

    // The conversation joined mid-session hears about the disconnect;
    // the one left mid-session does not.
    assert!(offline_for_u(&drain(&mut rx_o2)));
    assert!(!offline_for_u(&drain(&mut rx_o1)));
}

#[tokio::test]
async fn test_search_finds_only_visible_matches() {
    let Some(state) = test_state().await else { return };
    let u = seed_user(&state.pool, "searcher").await;
    let a = seed_user(&state.pool, "member").await;
    let b = seed_user(&state.pool, "member").await;

    let conv = groups::create_group(&state, u, "archive", &[a, b])
        .await
        .unwrap();
    let kept = messages::send_message(&state, u, conv.conversation_id, "project alpha kickoff")
        .await
        .unwrap();
    let removed = messages::send_message(&state, u, conv.conversation_id, "alpha draft, ignore")
        .await
        .unwrap();
    messages::send_message(&state, u, conv.conversation_id, "unrelated")
        .await
        .unwrap();
    messages::delete_message(&state, u, removed.message_id)
        .await
        .unwrap();

    // Case-insensitive, deleted messages excluded.
    let found = messages::search_messages(&state, u, conv.conversation_id, "ALPHA")
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].message_id, kept.message_id);

    // Non-members get nothing, not an empty result.
    let outsider = seed_user(&state.pool, "outsider").await;
    let err = messages::search_messages(&state, outsider, conv.conversation_id, "alpha")
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Unauthorized));
}
