//! Database operations for conversation membership.
//!
//! Membership rows are never physically deleted: leaving or being removed
//! stamps `deleted_at`, and rejoining revives the row with a fresh
//! `joined_at`. "Active" always means `deleted_at IS NULL`.
//!
//! Reads take the pool; mutations take a connection so the dispatcher can
//! run them inside a transaction.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::realtime::event::SenderInfo;
use crate::store::models::Membership;

fn row_to_membership(row: &sqlx::postgres::PgRow) -> Membership {
    Membership {
        member_id: row.get("member_id"),
        conversation_id: row.get("conversation_id"),
        user_id: row.get("user_id"),
        joined_at: row.get("joined_at"),
        last_read_at: row.get("last_read_at"),
        is_admin: row.get("is_admin"),
        is_pinned: row.get("is_pinned"),
        is_archived: row.get("is_archived"),
        deleted_at: row.get("deleted_at"),
    }
}

/// Fetch the active (non-deleted) membership for a user in a conversation.
pub async fn get_active(
    pool: &PgPool,
    conversation_id: Uuid,
    user_id: Uuid,
) -> Result<Option<Membership>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT member_id, conversation_id, user_id, joined_at, last_read_at,
               is_admin, is_pinned, is_archived, deleted_at
        FROM conversation_members
        WHERE conversation_id = $1 AND user_id = $2 AND deleted_at IS NULL
        "#,
    )
    .bind(conversation_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| row_to_membership(&r)))
}

/// Conversation ids for every active membership of a user. Used at
/// connect time to join broadcast groups and for presence fan-out.
pub async fn active_conversation_ids(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT conversation_id
        FROM conversation_members
        WHERE user_id = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(|r| r.get("conversation_id")).collect())
}

/// Identity info for every active member of a conversation.
pub async fn active_members(
    pool: &PgPool,
    conversation_id: Uuid,
) -> Result<Vec<SenderInfo>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT u.user_id, u.username, u.display_name, u.avatar
        FROM conversation_members cm
        JOIN users u ON u.user_id = cm.user_id
        WHERE cm.conversation_id = $1 AND cm.deleted_at IS NULL
        ORDER BY u.username ASC
        "#,
    )
    .bind(conversation_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|r| SenderInfo {
            user_id: r.get("user_id"),
            username: r.get("username"),
            display_name: r.get("display_name"),
            avatar: r.get("avatar"),
        })
        .collect())
}

pub async fn count_active_members(
    pool: &PgPool,
    conversation_id: Uuid,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS n
        FROM conversation_members
        WHERE conversation_id = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(conversation_id)
    .fetch_one(pool)
    .await?;

    Ok(row.get("n"))
}

pub async fn count_active_admins(
    pool: &PgPool,
    conversation_id: Uuid,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS n
        FROM conversation_members
        WHERE conversation_id = $1 AND deleted_at IS NULL AND is_admin
        "#,
    )
    .bind(conversation_id)
    .fetch_one(pool)
    .await?;

    Ok(row.get("n"))
}

/// Insert a fresh membership row.
pub async fn insert(
    conn: &mut PgConnection,
    conversation_id: Uuid,
    user_id: Uuid,
    is_admin: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO conversation_members
            (member_id, conversation_id, user_id, joined_at, is_admin)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(conversation_id)
    .bind(user_id)
    .bind(Utc::now())
    .bind(is_admin)
    .execute(conn)
    .await?;

    Ok(())
}

/// Revive the most recent soft-deleted membership: clear `deleted_at` and
/// reset `joined_at`, so message visibility restarts at the rejoin.
///
/// Returns whether a row was revived.
pub async fn revive(
    conn: &mut PgConnection,
    conversation_id: Uuid,
    user_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE conversation_members
        SET deleted_at = NULL, joined_at = $1, last_read_at = NULL, is_admin = FALSE
        WHERE member_id = (
            SELECT member_id FROM conversation_members
            WHERE conversation_id = $2 AND user_id = $3 AND deleted_at IS NOT NULL
            ORDER BY deleted_at DESC
            LIMIT 1
        )
        "#,
    )
    .bind(Utc::now())
    .bind(conversation_id)
    .bind(user_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Soft-delete the active membership (leave or removal).
pub async fn soft_delete(
    conn: &mut PgConnection,
    conversation_id: Uuid,
    user_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE conversation_members
        SET deleted_at = $1
        WHERE conversation_id = $2 AND user_id = $3 AND deleted_at IS NULL
        "#,
    )
    .bind(Utc::now())
    .bind(conversation_id)
    .bind(user_id)
    .execute(conn)
    .await?;

    Ok(())
}

/// Advance the member's last-read marker; returns the new timestamp.
pub async fn mark_read(
    pool: &PgPool,
    conversation_id: Uuid,
    user_id: Uuid,
) -> Result<DateTime<Utc>, sqlx::Error> {
    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE conversation_members
        SET last_read_at = $1
        WHERE conversation_id = $2 AND user_id = $3 AND deleted_at IS NULL
        "#,
    )
    .bind(now)
    .bind(conversation_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(now)
}

/// Set the per-user pinned flag on a conversation.
pub async fn set_pinned(
    pool: &PgPool,
    conversation_id: Uuid,
    user_id: Uuid,
    pinned: bool,
) -> Result<(), sqlx::Error> {
    set_member_flag(pool, conversation_id, user_id, "is_pinned", pinned).await
}

/// Set the per-user archived flag on a conversation.
pub async fn set_archived(
    pool: &PgPool,
    conversation_id: Uuid,
    user_id: Uuid,
    archived: bool,
) -> Result<(), sqlx::Error> {
    set_member_flag(pool, conversation_id, user_id, "is_archived", archived).await
}

/// Grant or revoke the admin flag.
pub async fn set_admin(
    pool: &PgPool,
    conversation_id: Uuid,
    user_id: Uuid,
    is_admin: bool,
) -> Result<(), sqlx::Error> {
    set_member_flag(pool, conversation_id, user_id, "is_admin", is_admin).await
}

async fn set_member_flag(
    pool: &PgPool,
    conversation_id: Uuid,
    user_id: Uuid,
    field: &'static str,
    value: bool,
) -> Result<(), sqlx::Error> {
    // `field` is one of three compile-time column names, never user input.
    let sql = format!(
        "UPDATE conversation_members SET {field} = $1 \
         WHERE conversation_id = $2 AND user_id = $3 AND deleted_at IS NULL"
    );

    sqlx::query(&sql)
        .bind(value)
        .bind(conversation_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}
