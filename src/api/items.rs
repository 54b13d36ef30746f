//! Item catalog API endpoints, including the comment log.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::{
    self, Booking, CommentResponse, CreateCommentRequest, CreateItemRequest, Item,
    ItemBookingSummary, ItemDetailResponse, ItemRequest, UpdateItemRequest, User,
};
use crate::AppState;

use super::error::ApiError;
use super::identity::SharerId;
use super::validation::{
    validate_comment_text, validate_description, validate_name, PageParams,
};

fn booking_summary(booking: Booking) -> ItemBookingSummary {
    ItemBookingSummary {
        id: booking.id,
        booker_id: booking.booker_id,
        start: booking.start_date,
        end: booking.end_date,
    }
}

/// Assemble the detail view of an item: comments for everyone, booking
/// summaries only when the requester owns the item.
async fn item_detail(
    state: &AppState,
    item: Item,
    requester_id: i64,
) -> Result<ItemDetailResponse, ApiError> {
    let comments = db::comments_for_item(&state.db, item.id).await?;
    let for_owner = item.owner_id == requester_id;
    let item_id = item.id;
    let mut detail = ItemDetailResponse::new(item, comments);

    if for_owner {
        let now = state.clock.now();
        let last = db::last_booking_for_item(&state.db, item_id, now)
            .await?
            .map(booking_summary);
        let next = db::next_booking_for_item(&state.db, item_id, now)
            .await?
            .map(booking_summary);
        detail = detail.with_bookings(last, next);
    }

    Ok(detail)
}

/// List a new item for rent
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    SharerId(owner_id): SharerId,
    Json(req): Json<CreateItemRequest>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    let name = req
        .name
        .as_deref()
        .ok_or_else(|| ApiError::validation("Item name is required"))?;
    let description = req
        .description
        .as_deref()
        .ok_or_else(|| ApiError::validation("Item description is required"))?;
    let available = req
        .available
        .ok_or_else(|| ApiError::validation("Item availability is required"))?;
    validate_name(name).map_err(ApiError::validation)?;
    validate_description(description).map_err(ApiError::validation)?;

    let mut tx = state.db.begin().await?;

    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(owner_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if let Some(request_id) = req.request_id {
        sqlx::query_as::<_, ItemRequest>("SELECT * FROM requests WHERE id = ?")
            .bind(request_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::not_found("Item request not found"))?;
    }

    let id = sqlx::query(
        "INSERT INTO items (name, description, available, owner_id, request_id) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(name)
    .bind(description)
    .bind(available)
    .bind(owner_id)
    .bind(req.request_id)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(item)))
}

/// Partially update an item; only its owner may do so
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    SharerId(requester_id): SharerId,
    Path(id): Path<i64>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<Item>, ApiError> {
    if let Some(ref name) = req.name {
        validate_name(name).map_err(ApiError::validation)?;
    }
    if let Some(ref description) = req.description {
        validate_description(description).map_err(ApiError::validation)?;
    }

    let mut tx = state.db.begin().await?;

    let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Item not found"))?;

    if item.owner_id != requester_id {
        return Err(ApiError::forbidden("Only the owner can edit an item"));
    }

    sqlx::query(
        "UPDATE items SET \
             name = COALESCE(?, name), \
             description = COALESCE(?, description), \
             available = COALESCE(?, available) \
         WHERE id = ?",
    )
    .bind(&req.name)
    .bind(&req.description)
    .bind(req.available)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Json(item))
}

/// Get an item with its comments; the owner also sees the most recent
/// and the next approved booking
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    SharerId(requester_id): SharerId,
    Path(id): Path<i64>,
) -> Result<Json<ItemDetailResponse>, ApiError> {
    let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Item not found"))?;

    let detail = item_detail(&state, item, requester_id).await?;
    Ok(Json(detail))
}

/// List the requester's own items with booking summaries and comments
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    SharerId(owner_id): SharerId,
    Query(page): Query<PageParams>,
) -> Result<Json<Vec<ItemDetailResponse>>, ApiError> {
    page.validate()?;

    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(owner_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let items = sqlx::query_as::<_, Item>(
        "SELECT * FROM items WHERE owner_id = ? ORDER BY id LIMIT ? OFFSET ?",
    )
    .bind(owner_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(&state.db)
    .await?;

    let mut result = Vec::with_capacity(items.len());
    for item in items {
        result.push(item_detail(&state, item, owner_id).await?);
    }

    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub text: Option<String>,
}

/// Search available items by name or description, case-insensitively.
/// Blank text yields an empty result set.
pub async fn search_items(
    State(state): State<Arc<AppState>>,
    SharerId(_requester_id): SharerId,
    Query(query): Query<SearchQuery>,
    Query(page): Query<PageParams>,
) -> Result<Json<Vec<Item>>, ApiError> {
    page.validate()?;

    let text = query.text.unwrap_or_default();
    if text.trim().is_empty() {
        return Ok(Json(Vec::new()));
    }

    let pattern = format!("%{}%", text.to_lowercase());
    let items = sqlx::query_as::<_, Item>(
        "SELECT * FROM items \
         WHERE available = 1 AND (LOWER(name) LIKE ? OR LOWER(description) LIKE ?) \
         ORDER BY id LIMIT ? OFFSET ?",
    )
    .bind(&pattern)
    .bind(&pattern)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(&state.db)
    .await?;

    Ok(Json(items))
}

/// Leave a comment on an item after a completed rental
pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    SharerId(author_id): SharerId,
    Path(item_id): Path<i64>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), ApiError> {
    let text = req
        .text
        .as_deref()
        .ok_or_else(|| ApiError::validation("Comment text is required"))?;
    validate_comment_text(text).map_err(ApiError::validation)?;

    let now = state.clock.now();
    let mut tx = state.db.begin().await?;

    let author = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(author_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ?")
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Item not found"))?;

    if !db::has_completed_booking(&mut *tx, author_id, item_id, now).await? {
        return Err(ApiError::validation(
            "Comments require a completed booking of the item",
        ));
    }

    let id = sqlx::query(
        "INSERT INTO comments (text, item_id, author_id, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(text)
    .bind(item_id)
    .bind(author_id)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            id,
            text: text.to_string(),
            author_name: author.name,
            created_at: now,
        }),
    ))
}
