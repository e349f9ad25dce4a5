//! Database operations for message reactions.
//!
//! Reactions are toggles: one row per (message, user). Reacting with the
//! kind already present removes the row; a different kind overwrites it
//! with a fresh timestamp.

use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::realtime::event::ReactionGroup;

/// What a toggle does to the user's existing reaction row, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToggleAction {
    /// Same kind again: the reaction comes off.
    Remove,
    /// A different kind: the row is overwritten with a fresh timestamp.
    Replace,
    /// No existing row: a new reaction.
    Insert,
}

fn toggle_action(existing: Option<&str>, kind: &str) -> ToggleAction {
    match existing {
        Some(current) if current == kind => ToggleAction::Remove,
        Some(_) => ToggleAction::Replace,
        None => ToggleAction::Insert,
    }
}

/// Apply toggle semantics for one user's reaction, in one transaction.
pub async fn toggle(
    pool: &PgPool,
    message_id: Uuid,
    user_id: Uuid,
    kind: &str,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    let existing: Option<String> = sqlx::query(
        r#"
        SELECT reaction_kind FROM message_reactions
        WHERE message_id = $1 AND user_id = $2
        FOR UPDATE
        "#,
    )
    .bind(message_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    .map(|r| r.get("reaction_kind"));

    match toggle_action(existing.as_deref(), kind) {
        ToggleAction::Remove => {
            sqlx::query(
                r#"
                DELETE FROM message_reactions WHERE message_id = $1 AND user_id = $2
                "#,
            )
            .bind(message_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }
        ToggleAction::Replace => {
            sqlx::query(
                r#"
                UPDATE message_reactions
                SET reaction_kind = $1, created_at = $2
                WHERE message_id = $3 AND user_id = $4
                "#,
            )
            .bind(kind)
            .bind(Utc::now())
            .bind(message_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }
        ToggleAction::Insert => {
            sqlx::query(
                r#"
                INSERT INTO message_reactions (message_id, user_id, reaction_kind, created_at)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(message_id)
            .bind(user_id)
            .bind(kind)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;

    Ok(())
}

/// Post-mutation reaction state for a message, grouped by kind. Kinds
/// with zero remaining reactions simply do not appear.
pub async fn grouped(pool: &PgPool, message_id: Uuid) -> Result<Vec<ReactionGroup>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT reaction_kind, COUNT(*) AS count, ARRAY_AGG(user_id) AS user_ids
        FROM message_reactions
        WHERE message_id = $1
        GROUP BY reaction_kind
        ORDER BY reaction_kind ASC
        "#,
    )
    .bind(message_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|r| ReactionGroup {
            kind: r.get("reaction_kind"),
            count: r.get("count"),
            user_ids: r.get("user_ids"),
        })
        .collect())
}
