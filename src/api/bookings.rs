//! Booking lifecycle API endpoints.
//!
//! The reservation state machine lives here: WAITING bookings are decided
//! by the item's owner (approve/reject) or withdrawn by the booker
//! (cancel); decided bookings are final.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::db::{
    self, Booking, BookingResponse, BookingStatus, CreateBookingRequest, Item, StateFilter, User,
};
use crate::AppState;

use super::error::ApiError;
use super::identity::SharerId;
use super::validation::{validate_booking_window, PageParams};

/// Reserve an item for a time window
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    SharerId(booker_id): SharerId,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), ApiError> {
    let item_id = req
        .item_id
        .ok_or_else(|| ApiError::validation("Booking itemId is required"))?;
    let start = req
        .start
        .ok_or_else(|| ApiError::validation("Booking start is required"))?;
    let end = req
        .end
        .ok_or_else(|| ApiError::validation("Booking end is required"))?;

    let now = state.clock.now();
    validate_booking_window(start, end, now).map_err(ApiError::validation)?;

    let mut tx = state.db.begin().await?;

    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(booker_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ?")
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Item not found"))?;

    if !item.available {
        return Err(ApiError::validation("Item is not available for booking"));
    }

    if item.owner_id == booker_id {
        return Err(ApiError::forbidden("The owner cannot book their own item"));
    }

    let id = sqlx::query(
        "INSERT INTO bookings (start_date, end_date, item_id, booker_id, status) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(start)
    .bind(end)
    .bind(item_id)
    .bind(booker_id)
    .bind(BookingStatus::Waiting.to_string())
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    tx.commit().await?;

    let booking = db::fetch_with_names(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::internal("Booking vanished after insert"))?;

    Ok((StatusCode::CREATED, Json(BookingResponse::from(booking))))
}

#[derive(Debug, Deserialize)]
pub struct ApprovedQuery {
    pub approved: Option<bool>,
}

/// Decide a waiting booking. The item's owner approves or rejects via
/// `?approved=`; the booker may withdraw with `approved=false`.
pub async fn set_booking_status(
    State(state): State<Arc<AppState>>,
    SharerId(actor_id): SharerId,
    Path(id): Path<i64>,
    Query(query): Query<ApprovedQuery>,
) -> Result<Json<BookingResponse>, ApiError> {
    let approved = query
        .approved
        .ok_or_else(|| ApiError::validation("The 'approved' query parameter is required"))?;

    let mut tx = state.db.begin().await?;

    let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Booking not found"))?;

    let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ?")
        .bind(booking.item_id)
        .fetch_one(&mut *tx)
        .await?;

    let is_owner = item.owner_id == actor_id;
    let is_booker = booking.booker_id == actor_id;

    if !is_owner && !is_booker {
        return Err(ApiError::forbidden(
            "Only the item owner or the booker may change a booking",
        ));
    }

    let status = booking.status_enum();
    if status.is_terminal() {
        return Err(ApiError::invalid_transition(format!(
            "Cannot change a booking that is already {}",
            status
        )));
    }

    let new_status = if is_owner {
        if approved {
            BookingStatus::Approved
        } else {
            BookingStatus::Rejected
        }
    } else if approved {
        return Err(ApiError::forbidden("Only the owner can approve a booking"));
    } else {
        BookingStatus::Canceled
    };

    sqlx::query("UPDATE bookings SET status = ? WHERE id = ?")
        .bind(new_status.to_string())
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let updated = db::fetch_with_names(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::internal("Booking vanished after update"))?;

    Ok(Json(BookingResponse::from(updated)))
}

/// Get a booking; visible only to the booker or the item's owner
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    SharerId(requester_id): SharerId,
    Path(id): Path<i64>,
) -> Result<Json<BookingResponse>, ApiError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(requester_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let booking = db::fetch_with_names(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Booking not found"))?;

    let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ?")
        .bind(booking.item_id)
        .fetch_one(&state.db)
        .await?;

    if booking.booker_id != requester_id && item.owner_id != requester_id {
        return Err(ApiError::forbidden(
            "A booking is only visible to the booker or the item owner",
        ));
    }

    Ok(Json(BookingResponse::from(booking)))
}

#[derive(Debug, Deserialize)]
pub struct StateQuery {
    pub state: Option<String>,
}

fn parse_state(raw: Option<&str>) -> Result<StateFilter, ApiError> {
    raw.unwrap_or("ALL").parse().map_err(ApiError::validation)
}

/// List the requester's own bookings, newest start first
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    SharerId(booker_id): SharerId,
    Query(query): Query<StateQuery>,
    Query(page): Query<PageParams>,
) -> Result<Json<Vec<BookingResponse>>, ApiError> {
    let filter = parse_state(query.state.as_deref())?;
    page.validate()?;

    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(booker_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let rows = db::list_for_booker(
        &state.db,
        booker_id,
        filter,
        state.clock.now(),
        page.limit(),
        page.offset(),
    )
    .await?;

    Ok(Json(rows.into_iter().map(BookingResponse::from).collect()))
}

/// List the bookings on all of the requester's items, newest start first
pub async fn list_owner_bookings(
    State(state): State<Arc<AppState>>,
    SharerId(owner_id): SharerId,
    Query(query): Query<StateQuery>,
    Query(page): Query<PageParams>,
) -> Result<Json<Vec<BookingResponse>>, ApiError> {
    let filter = parse_state(query.state.as_deref())?;
    page.validate()?;

    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(owner_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let rows = db::list_for_owner(
        &state.db,
        owner_id,
        filter,
        state.clock.now(),
        page.limit(),
        page.offset(),
    )
    .await?;

    Ok(Json(rows.into_iter().map(BookingResponse::from).collect()))
}
