//! Item request models and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::item::Item;
use crate::DbPool;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ItemRequest {
    pub id: i64,
    pub description: String,
    pub requester_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequestRequest {
    pub description: Option<String>,
}

/// Request annotated with the items offered against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRequestResponse {
    pub id: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<Item>,
}

impl ItemRequestResponse {
    pub fn new(request: ItemRequest, items: Vec<Item>) -> Self {
        Self {
            id: request.id,
            description: request.description,
            created_at: request.created_at,
            items,
        }
    }
}

/// Items listed in response to a request, oldest first.
pub async fn items_for_request(pool: &DbPool, request_id: i64) -> sqlx::Result<Vec<Item>> {
    sqlx::query_as::<_, Item>("SELECT * FROM items WHERE request_id = ? ORDER BY id")
        .bind(request_id)
        .fetch_all(pool)
        .await
}
