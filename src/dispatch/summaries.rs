/**
 * Conversation Summaries
 *
 * Assembles the statically-typed conversation-list view model for a
 * user: one `ConversationSummary` per active membership, with last
 * visible message preview, unread count, and the member roster. Pinned
 * conversations sort first, then most-recent activity descending.
 */

use sqlx::Row;
use uuid::Uuid;

use crate::error::ChatError;
use crate::state::AppState;
use crate::store::models::ConversationSummary;
use crate::store::{memberships, messages};

/// Build the actor's conversation list.
pub async fn list_conversations(
    state: &AppState,
    actor: Uuid,
) -> Result<Vec<ConversationSummary>, ChatError> {
    let rows = sqlx::query(
        r#"
        SELECT c.conversation_id, c.name, c.is_group, c.updated_at,
               cm.is_pinned, cm.is_archived, cm.joined_at, cm.last_read_at
        FROM conversation_members cm
        JOIN conversations c ON c.conversation_id = cm.conversation_id
        WHERE cm.user_id = $1 AND cm.deleted_at IS NULL
        ORDER BY cm.is_pinned DESC, c.updated_at DESC
        "#,
    )
    .bind(actor)
    .fetch_all(&state.pool)
    .await
    .map_err(ChatError::Store)?;

    let mut summaries = Vec::with_capacity(rows.len());
    for row in rows {
        let conversation_id: Uuid = row.get("conversation_id");
        let joined_at = row.get("joined_at");
        let last_read_at = row.get("last_read_at");

        let last_message =
            messages::last_visible(&state.pool, conversation_id, joined_at).await?;
        let unread_count = messages::unread_count(
            &state.pool,
            conversation_id,
            actor,
            joined_at,
            last_read_at,
        )
        .await?;
        let members = memberships::active_members(&state.pool, conversation_id).await?;

        summaries.push(ConversationSummary {
            conversation_id,
            name: row.get("name"),
            is_group: row.get("is_group"),
            is_pinned: row.get("is_pinned"),
            is_archived: row.get("is_archived"),
            last_message,
            unread_count,
            members,
            updated_at: row.get("updated_at"),
        });
    }

    Ok(summaries)
}
