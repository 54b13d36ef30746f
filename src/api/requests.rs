//! Item-request board API endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{
    self, CreateItemRequestRequest, ItemRequest, ItemRequestResponse, User,
};
use crate::AppState;

use super::error::ApiError;
use super::identity::SharerId;
use super::validation::{validate_description, PageParams};

async fn ensure_user(state: &AppState, user_id: i64) -> Result<(), ApiError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(())
}

async fn annotate(
    state: &AppState,
    requests: Vec<ItemRequest>,
) -> Result<Vec<ItemRequestResponse>, ApiError> {
    let mut result = Vec::with_capacity(requests.len());
    for request in requests {
        let items = db::items_for_request(&state.db, request.id).await?;
        result.push(ItemRequestResponse::new(request, items));
    }
    Ok(result)
}

/// Post a request for a desired item
pub async fn create_request(
    State(state): State<Arc<AppState>>,
    SharerId(requester_id): SharerId,
    Json(req): Json<CreateItemRequestRequest>,
) -> Result<(StatusCode, Json<ItemRequestResponse>), ApiError> {
    let description = req
        .description
        .as_deref()
        .ok_or_else(|| ApiError::validation("Request description is required"))?;
    validate_description(description).map_err(ApiError::validation)?;

    let now = state.clock.now();
    let mut tx = state.db.begin().await?;

    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(requester_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let id = sqlx::query(
        "INSERT INTO requests (description, requester_id, created_at) VALUES (?, ?, ?)",
    )
    .bind(description)
    .bind(requester_id)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    let request = sqlx::query_as::<_, ItemRequest>("SELECT * FROM requests WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(ItemRequestResponse::new(request, Vec::new())),
    ))
}

/// The requester's own requests, newest first
pub async fn list_own_requests(
    State(state): State<Arc<AppState>>,
    SharerId(requester_id): SharerId,
) -> Result<Json<Vec<ItemRequestResponse>>, ApiError> {
    ensure_user(&state, requester_id).await?;

    let requests = sqlx::query_as::<_, ItemRequest>(
        "SELECT * FROM requests WHERE requester_id = ? ORDER BY created_at DESC",
    )
    .bind(requester_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(annotate(&state, requests).await?))
}

/// Other users' requests, newest first
pub async fn list_all_requests(
    State(state): State<Arc<AppState>>,
    SharerId(requester_id): SharerId,
    Query(page): Query<PageParams>,
) -> Result<Json<Vec<ItemRequestResponse>>, ApiError> {
    page.validate()?;
    ensure_user(&state, requester_id).await?;

    let requests = sqlx::query_as::<_, ItemRequest>(
        "SELECT * FROM requests WHERE requester_id != ? \
         ORDER BY created_at DESC LIMIT ? OFFSET ?",
    )
    .bind(requester_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(&state.db)
    .await?;

    Ok(Json(annotate(&state, requests).await?))
}

/// Get a single request with the items offered against it
pub async fn get_request(
    State(state): State<Arc<AppState>>,
    SharerId(requester_id): SharerId,
    Path(id): Path<i64>,
) -> Result<Json<ItemRequestResponse>, ApiError> {
    ensure_user(&state, requester_id).await?;

    let request = sqlx::query_as::<_, ItemRequest>("SELECT * FROM requests WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Item request not found"))?;

    let items = db::items_for_request(&state.db, request.id).await?;
    Ok(Json(ItemRequestResponse::new(request, items)))
}
