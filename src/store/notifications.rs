//! Database operations for notifications.

use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::store::models::Notification;

pub async fn insert(
    pool: &PgPool,
    user_id: Uuid,
    kind: &str,
    content: &str,
    message_id: Option<Uuid>,
) -> Result<Notification, sqlx::Error> {
    let notification_id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO notifications (notification_id, user_id, kind, content, is_read, message_id, created_at)
        VALUES ($1, $2, $3, $4, FALSE, $5, $6)
        "#,
    )
    .bind(notification_id)
    .bind(user_id)
    .bind(kind)
    .bind(content)
    .bind(message_id)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Notification {
        notification_id,
        user_id,
        kind: kind.to_string(),
        content: content.to_string(),
        is_read: false,
        message_id,
        created_at: now,
    })
}

/// Newest-first notifications for a user.
pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Notification>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT notification_id, user_id, kind, content, is_read, message_id, created_at
        FROM notifications
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|r| Notification {
            notification_id: r.get("notification_id"),
            user_id: r.get("user_id"),
            kind: r.get("kind"),
            content: r.get("content"),
            is_read: r.get("is_read"),
            message_id: r.get("message_id"),
            created_at: r.get("created_at"),
        })
        .collect())
}

pub async fn mark_read(pool: &PgPool, user_id: Uuid, notification_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE notifications SET is_read = TRUE
        WHERE notification_id = $1 AND user_id = $2
        "#,
    )
    .bind(notification_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(())
}
