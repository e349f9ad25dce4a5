//! Database operations for friendships and friend requests.
//!
//! A friendship is stored as two directed edges created atomically, so
//! the relation is symmetric in storage. Accepting a request (or a
//! crossed mutual request) produces, in one transaction: both edges, a
//! new 1:1 conversation with two memberships, and the accepted status on
//! the request row.

use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::store::memberships;
use crate::store::models::{Conversation, FriendRequest, FriendRequestStatus, User};

fn row_to_request(row: &sqlx::postgres::PgRow) -> FriendRequest {
    FriendRequest {
        request_id: row.get("request_id"),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        status: FriendRequestStatus::from_str(row.get::<String, _>("status").as_str())
            .unwrap_or(FriendRequestStatus::Pending),
        created_at: row.get("created_at"),
        responded_at: row.get("responded_at"),
    }
}

/// True when either directed edge exists (edges are always paired).
pub async fn are_friends(pool: &PgPool, a: Uuid, b: Uuid) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM friends WHERE user_id = $1 AND friend_id = $2
        ) AS present
        "#,
    )
    .bind(a)
    .bind(b)
    .fetch_one(pool)
    .await?;

    Ok(row.get("present"))
}

/// Find a pending request in the given direction.
pub async fn find_pending(
    pool: &PgPool,
    sender_id: Uuid,
    receiver_id: Uuid,
) -> Result<Option<FriendRequest>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT request_id, sender_id, receiver_id, status, created_at, responded_at
        FROM friend_requests
        WHERE sender_id = $1 AND receiver_id = $2 AND status = 'pending'
        "#,
    )
    .bind(sender_id)
    .bind(receiver_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| row_to_request(&r)))
}

/// Insert a pending request. The partial unique index rejects duplicates
/// while one is already pending.
pub async fn create_pending(
    pool: &PgPool,
    sender_id: Uuid,
    receiver_id: Uuid,
) -> Result<FriendRequest, sqlx::Error> {
    let request_id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO friend_requests (request_id, sender_id, receiver_id, status, created_at)
        VALUES ($1, $2, $3, 'pending', $4)
        "#,
    )
    .bind(request_id)
    .bind(sender_id)
    .bind(receiver_id)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(FriendRequest {
        request_id,
        sender_id,
        receiver_id,
        status: FriendRequestStatus::Pending,
        created_at: now,
        responded_at: None,
    })
}

/// Withdraw a pending request. Returns whether a row was deleted.
pub async fn delete_pending(
    pool: &PgPool,
    sender_id: Uuid,
    receiver_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM friend_requests
        WHERE sender_id = $1 AND receiver_id = $2 AND status = 'pending'
        "#,
    )
    .bind(sender_id)
    .bind(receiver_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Accept one or two pending requests between `a` and `b` as a single
/// logical transaction: mark them accepted, create the symmetric edges,
/// and create the 1:1 conversation with both memberships.
///
/// A crossed mutual request resolves here too; both pending rows flip to
/// accepted so zero remain pending between the pair.
pub async fn accept_pair(pool: &PgPool, a: Uuid, b: Uuid) -> Result<Conversation, sqlx::Error> {
    let now = Utc::now();
    let conversation_id = Uuid::new_v4();

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE friend_requests
        SET status = 'accepted', responded_at = $1
        WHERE status = 'pending'
          AND ((sender_id = $2 AND receiver_id = $3) OR (sender_id = $3 AND receiver_id = $2))
        "#,
    )
    .bind(now)
    .bind(a)
    .bind(b)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO friends (user_id, friend_id, created_at)
        VALUES ($1, $2, $3), ($2, $1, $3)
        "#,
    )
    .bind(a)
    .bind(b)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO conversations (conversation_id, name, is_group, created_by, created_at, updated_at)
        VALUES ($1, NULL, FALSE, $2, $3, $3)
        "#,
    )
    .bind(conversation_id)
    .bind(a)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    memberships::insert(&mut *tx, conversation_id, a, false).await?;
    memberships::insert(&mut *tx, conversation_id, b, false).await?;

    tx.commit().await?;

    Ok(Conversation {
        conversation_id,
        name: None,
        is_group: false,
        created_by: a,
        created_at: now,
        updated_at: now,
    })
}

/// All users the given user holds a friend edge to.
pub async fn list_friends(pool: &PgPool, user_id: Uuid) -> Result<Vec<User>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT u.user_id, u.username, u.display_name, u.avatar, u.is_online, u.last_seen, u.created_at
        FROM friends f
        JOIN users u ON u.user_id = f.friend_id
        WHERE f.user_id = $1
        ORDER BY u.username ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|r| User {
            user_id: r.get("user_id"),
            username: r.get("username"),
            display_name: r.get("display_name"),
            avatar: r.get("avatar"),
            is_online: r.get("is_online"),
            last_seen: r.get("last_seen"),
            created_at: r.get("created_at"),
        })
        .collect())
}
