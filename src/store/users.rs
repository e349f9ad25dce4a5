//! Database operations for users.

use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::store::models::User;

fn row_to_user(row: &sqlx::postgres::PgRow) -> User {
    User {
        user_id: row.get("user_id"),
        username: row.get("username"),
        display_name: row.get("display_name"),
        avatar: row.get("avatar"),
        is_online: row.get("is_online"),
        last_seen: row.get("last_seen"),
        created_at: row.get("created_at"),
    }
}

/// Fetch a user by id.
pub async fn get_user(pool: &PgPool, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT user_id, username, display_name, avatar, is_online, last_seen, created_at
        FROM users
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| row_to_user(&r)))
}

/// Persist the derived online flag and touch last-seen.
///
/// Written only by the connection lifecycle, on the first-connection and
/// last-disconnection transitions.
pub async fn set_online(pool: &PgPool, user_id: Uuid, is_online: bool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE users
        SET is_online = $1, last_seen = $2
        WHERE user_id = $3
        "#,
    )
    .bind(is_online)
    .bind(Utc::now())
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(())
}
