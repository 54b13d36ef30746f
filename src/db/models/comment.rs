//! Comment models and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::DbPool;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub item_id: i64,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub text: Option<String>,
}

/// Comment joined with its author's name, as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: i64,
    pub text: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

/// All comments on an item, oldest first.
pub async fn comments_for_item(pool: &DbPool, item_id: i64) -> sqlx::Result<Vec<CommentResponse>> {
    sqlx::query_as::<_, CommentResponse>(
        "SELECT c.id, c.text, u.name AS author_name, c.created_at \
         FROM comments c \
         JOIN users u ON u.id = c.author_id \
         WHERE c.item_id = ? ORDER BY c.created_at",
    )
    .bind(item_id)
    .fetch_all(pool)
    .await
}
