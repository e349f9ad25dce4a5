//! Database operations for conversations.

use chrono::Utc;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::store::memberships;
use crate::store::models::Conversation;

fn row_to_conversation(row: &sqlx::postgres::PgRow) -> Conversation {
    Conversation {
        conversation_id: row.get("conversation_id"),
        name: row.get("name"),
        is_group: row.get("is_group"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub async fn get(pool: &PgPool, conversation_id: Uuid) -> Result<Option<Conversation>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT conversation_id, name, is_group, created_by, created_at, updated_at
        FROM conversations
        WHERE conversation_id = $1
        "#,
    )
    .bind(conversation_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| row_to_conversation(&r)))
}

/// Create a conversation and its initial memberships in one transaction.
///
/// The creator is always a member; for groups they are the sole initial
/// admin. `member_ids` must already be validated (deduplicated, creator
/// excluded) by the dispatcher.
pub async fn create_with_members(
    pool: &PgPool,
    creator_id: Uuid,
    name: Option<&str>,
    is_group: bool,
    member_ids: &[Uuid],
) -> Result<Conversation, sqlx::Error> {
    let conversation_id = Uuid::new_v4();
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO conversations (conversation_id, name, is_group, created_by, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        "#,
    )
    .bind(conversation_id)
    .bind(name)
    .bind(is_group)
    .bind(creator_id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    memberships::insert(&mut *tx, conversation_id, creator_id, is_group).await?;
    for &member_id in member_ids {
        memberships::insert(&mut *tx, conversation_id, member_id, false).await?;
    }

    tx.commit().await?;

    Ok(Conversation {
        conversation_id,
        name: name.map(str::to_string),
        is_group,
        created_by: creator_id,
        created_at: now,
        updated_at: now,
    })
}

/// Bump `updated_at`; runs inside the message-insert transaction so the
/// conversation-list ordering moves with every committed message.
pub async fn bump_updated_at(
    conn: &mut PgConnection,
    conversation_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE conversations SET updated_at = $1 WHERE conversation_id = $2
        "#,
    )
    .bind(Utc::now())
    .bind(conversation_id)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn rename(
    pool: &PgPool,
    conversation_id: Uuid,
    name: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE conversations SET name = $1, updated_at = $2 WHERE conversation_id = $3
        "#,
    )
    .bind(name)
    .bind(Utc::now())
    .bind(conversation_id)
    .execute(pool)
    .await?;

    Ok(())
}
