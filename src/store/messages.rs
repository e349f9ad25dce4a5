//! Database operations for messages and edit history.
//!
//! Message visibility follows one rule everywhere: a message is visible
//! to a member iff it is not soft-deleted and was sent at or after the
//! member's most recent (re)join. The same predicate drives previews,
//! unread counts, and history listings so the read paths cannot drift.

use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::store::conversations;
use crate::store::models::{Message, MessagePreview};

/// The shared visibility predicate. Expects `m` (messages) joined against
/// the member's row values bound as `$joined_at`.
const VISIBLE: &str = "m.is_deleted = FALSE AND m.sent_at >= $2";

fn row_to_message(row: &sqlx::postgres::PgRow) -> Message {
    Message {
        message_id: row.get("message_id"),
        conversation_id: row.get("conversation_id"),
        sender_id: row.get("sender_id"),
        message_text: row.get("message_text"),
        message_type: row.get("message_type"),
        file_url: row.get("file_url"),
        is_pinned: row.get("is_pinned"),
        is_edited: row.get("is_edited"),
        is_deleted: row.get("is_deleted"),
        sent_at: row.get("sent_at"),
        edited_at: row.get("edited_at"),
        deleted_at: row.get("deleted_at"),
        deleted_by: row.get("deleted_by"),
        pinned_at: row.get("pinned_at"),
        pinned_by: row.get("pinned_by"),
    }
}

/// Fetch a message by id, soft-deleted rows included; callers decide how
/// to treat terminal state.
pub async fn get(pool: &PgPool, message_id: Uuid) -> Result<Option<Message>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT message_id, conversation_id, sender_id, message_text, message_type,
               file_url, is_pinned, is_edited, is_deleted, sent_at, edited_at,
               deleted_at, deleted_by, pinned_at, pinned_by
        FROM messages
        WHERE message_id = $1
        "#,
    )
    .bind(message_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| row_to_message(&r)))
}

/// Insert a message and bump the conversation's `updated_at`, as one
/// transaction.
pub async fn insert(
    pool: &PgPool,
    conversation_id: Uuid,
    sender_id: Uuid,
    text: &str,
) -> Result<Message, sqlx::Error> {
    let message_id = Uuid::new_v4();
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO messages (message_id, conversation_id, sender_id, message_text, message_type, sent_at)
        VALUES ($1, $2, $3, $4, 'text', $5)
        "#,
    )
    .bind(message_id)
    .bind(conversation_id)
    .bind(sender_id)
    .bind(text)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    conversations::bump_updated_at(&mut *tx, conversation_id).await?;

    tx.commit().await?;

    Ok(Message {
        message_id,
        conversation_id,
        sender_id,
        message_text: text.to_string(),
        message_type: "text".to_string(),
        file_url: None,
        is_pinned: false,
        is_edited: false,
        is_deleted: false,
        sent_at: now,
        edited_at: None,
        deleted_at: None,
        deleted_by: None,
        pinned_at: None,
        pinned_by: None,
    })
}

/// Overwrite a message's text, appending the prior text to the edit
/// history first, as one transaction. Returns the edit timestamp.
pub async fn update_text(
    pool: &PgPool,
    message_id: Uuid,
    old_text: &str,
    new_text: &str,
) -> Result<chrono::DateTime<Utc>, sqlx::Error> {
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO message_edit_history (history_id, message_id, old_text, edited_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(message_id)
    .bind(old_text)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE messages
        SET message_text = $1, is_edited = TRUE, edited_at = $2
        WHERE message_id = $3
        "#,
    )
    .bind(new_text)
    .bind(now)
    .bind(message_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(now)
}

/// Soft-delete a message: the row stays, flagged and stamped.
pub async fn soft_delete(
    pool: &PgPool,
    message_id: Uuid,
    actor_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE messages
        SET is_deleted = TRUE, deleted_at = $1, deleted_by = $2
        WHERE message_id = $3
        "#,
    )
    .bind(Utc::now())
    .bind(actor_id)
    .bind(message_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Pin or unpin a message, stamping who pinned it and when.
pub async fn set_pinned(
    pool: &PgPool,
    message_id: Uuid,
    actor_id: Uuid,
    pinned: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE messages
        SET is_pinned = $1,
            pinned_at = CASE WHEN $1 THEN $2 ELSE NULL END,
            pinned_by = CASE WHEN $1 THEN $3 ELSE NULL END
        WHERE message_id = $4
        "#,
    )
    .bind(pinned)
    .bind(Utc::now())
    .bind(actor_id)
    .bind(message_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// The most recent message visible to a member who joined at `joined_at`.
pub async fn last_visible(
    pool: &PgPool,
    conversation_id: Uuid,
    joined_at: chrono::DateTime<Utc>,
) -> Result<Option<MessagePreview>, sqlx::Error> {
    let sql = format!(
        "SELECT m.message_id, m.sender_id, m.message_text, m.sent_at \
         FROM messages m \
         WHERE m.conversation_id = $1 AND {VISIBLE} \
         ORDER BY m.sent_at DESC \
         LIMIT 1"
    );

    let row = sqlx::query(&sql)
        .bind(conversation_id)
        .bind(joined_at)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| MessagePreview {
        message_id: r.get("message_id"),
        sender_id: r.get("sender_id"),
        text: r.get("message_text"),
        sent_at: r.get("sent_at"),
    }))
}

/// Count messages visible to the member and newer than their last-read
/// marker, excluding their own.
pub async fn unread_count(
    pool: &PgPool,
    conversation_id: Uuid,
    user_id: Uuid,
    joined_at: chrono::DateTime<Utc>,
    last_read_at: Option<chrono::DateTime<Utc>>,
) -> Result<i64, sqlx::Error> {
    let sql = format!(
        "SELECT COUNT(*) AS n \
         FROM messages m \
         WHERE m.conversation_id = $1 AND {VISIBLE} \
           AND m.sender_id <> $3 \
           AND ($4::timestamptz IS NULL OR m.sent_at > $4)"
    );

    let row = sqlx::query(&sql)
        .bind(conversation_id)
        .bind(joined_at)
        .bind(user_id)
        .bind(last_read_at)
        .fetch_one(pool)
        .await?;

    Ok(row.get("n"))
}

/// Turn a raw search term into an ILIKE pattern, escaping the
/// metacharacters so they match literally.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Case-insensitive substring search over the messages visible to a
/// member, newest first.
pub async fn search_visible(
    pool: &PgPool,
    conversation_id: Uuid,
    joined_at: chrono::DateTime<Utc>,
    query: &str,
    limit: i64,
) -> Result<Vec<Message>, sqlx::Error> {
    let sql = format!(
        "SELECT m.message_id, m.conversation_id, m.sender_id, m.message_text, \
                m.message_type, m.file_url, m.is_pinned, m.is_edited, m.is_deleted, \
                m.sent_at, m.edited_at, m.deleted_at, m.deleted_by, m.pinned_at, m.pinned_by \
         FROM messages m \
         WHERE m.conversation_id = $1 AND {VISIBLE} \
           AND m.message_text ILIKE $3 ESCAPE '\\' \
         ORDER BY m.sent_at DESC \
         LIMIT $4"
    );

    let rows = sqlx::query(&sql)
        .bind(conversation_id)
        .bind(joined_at)
        .bind(like_pattern(query))
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows.iter().map(row_to_message).collect())
}

/// Messages visible to a member, oldest first. Serves conversation
/// history loads.
pub async fn list_visible(
    pool: &PgPool,
    conversation_id: Uuid,
    joined_at: chrono::DateTime<Utc>,
    limit: i64,
) -> Result<Vec<Message>, sqlx::Error> {
    let sql = format!(
        "SELECT m.message_id, m.conversation_id, m.sender_id, m.message_text, \
                m.message_type, m.file_url, m.is_pinned, m.is_edited, m.is_deleted, \
                m.sent_at, m.edited_at, m.deleted_at, m.deleted_by, m.pinned_at, m.pinned_by \
         FROM messages m \
         WHERE m.conversation_id = $1 AND {VISIBLE} \
         ORDER BY m.sent_at ASC \
         LIMIT $3"
    );

    let rows = sqlx::query(&sql)
        .bind(conversation_id)
        .bind(joined_at)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows.iter().map(row_to_message).collect())
}
