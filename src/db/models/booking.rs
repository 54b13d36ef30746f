//! Booking models, status state machine, and the reservation queries.
//!
//! Listing queries are written out one per access pattern: each state
//! filter on each side (booker / owner) has its own parameterized query,
//! all ordered by start date descending.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::user::UserSummary;
use crate::DbPool;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    Waiting,
    Approved,
    Rejected,
    Canceled,
}

impl BookingStatus {
    /// Terminal statuses cannot be transitioned again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Waiting)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "WAITING"),
            Self::Approved => write!(f, "APPROVED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Canceled => write!(f, "CANCELED"),
        }
    }
}

impl From<String> for BookingStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "WAITING" => Self::Waiting,
            "APPROVED" => Self::Approved,
            "REJECTED" => Self::Rejected,
            "CANCELED" => Self::Canceled,
            _ => Self::Waiting,
        }
    }
}

/// State filter for booking listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateFilter {
    All,
    Current,
    Past,
    Future,
    Waiting,
    Rejected,
}

impl std::str::FromStr for StateFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ALL" => Ok(Self::All),
            "CURRENT" => Ok(Self::Current),
            "PAST" => Ok(Self::Past),
            "FUTURE" => Ok(Self::Future),
            "WAITING" => Ok(Self::Waiting),
            "REJECTED" => Ok(Self::Rejected),
            _ => Err(format!("Unknown state: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub item_id: i64,
    pub booker_id: i64,
    pub status: String,
}

impl Booking {
    pub fn status_enum(&self) -> BookingStatus {
        BookingStatus::from(self.status.clone())
    }
}

/// Booking row joined with the item and booker names for responses.
#[derive(Debug, Clone, FromRow)]
pub struct BookingWithNames {
    pub id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: String,
    pub item_id: i64,
    pub item_name: String,
    pub booker_id: i64,
    pub booker_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub item_id: Option<i64>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Short item form embedded in booking responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingResponse {
    pub id: i64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: String,
    pub item: ItemSummary,
    pub booker: UserSummary,
}

impl From<BookingWithNames> for BookingResponse {
    fn from(row: BookingWithNames) -> Self {
        Self {
            id: row.id,
            start: row.start_date,
            end: row.end_date,
            status: row.status,
            item: ItemSummary {
                id: row.item_id,
                name: row.item_name,
            },
            booker: UserSummary {
                id: row.booker_id,
                name: row.booker_name,
            },
        }
    }
}

const SELECT_WITH_NAMES: &str = "SELECT b.id, b.start_date, b.end_date, b.status, \
     b.item_id, i.name AS item_name, b.booker_id, u.name AS booker_name \
     FROM bookings b \
     JOIN items i ON i.id = b.item_id \
     JOIN users u ON u.id = b.booker_id";

/// Fetch a single booking with item/booker names resolved.
pub async fn fetch_with_names(
    pool: &DbPool,
    booking_id: i64,
) -> sqlx::Result<Option<BookingWithNames>> {
    let sql = format!("{SELECT_WITH_NAMES} WHERE b.id = ?");
    sqlx::query_as::<_, BookingWithNames>(&sql)
        .bind(booking_id)
        .fetch_optional(pool)
        .await
}

/// List a booker's reservations under the given state filter,
/// newest start first.
pub async fn list_for_booker(
    pool: &DbPool,
    booker_id: i64,
    state: StateFilter,
    now: DateTime<Utc>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<BookingWithNames>> {
    match state {
        StateFilter::All => {
            let sql = format!(
                "{SELECT_WITH_NAMES} WHERE b.booker_id = ? \
                 ORDER BY b.start_date DESC LIMIT ? OFFSET ?"
            );
            sqlx::query_as::<_, BookingWithNames>(&sql)
                .bind(booker_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
        }
        StateFilter::Current => {
            let sql = format!(
                "{SELECT_WITH_NAMES} WHERE b.booker_id = ? \
                 AND b.start_date <= ? AND b.end_date >= ? \
                 ORDER BY b.start_date DESC LIMIT ? OFFSET ?"
            );
            sqlx::query_as::<_, BookingWithNames>(&sql)
                .bind(booker_id)
                .bind(now)
                .bind(now)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
        }
        StateFilter::Past => {
            let sql = format!(
                "{SELECT_WITH_NAMES} WHERE b.booker_id = ? AND b.end_date < ? \
                 ORDER BY b.start_date DESC LIMIT ? OFFSET ?"
            );
            sqlx::query_as::<_, BookingWithNames>(&sql)
                .bind(booker_id)
                .bind(now)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
        }
        StateFilter::Future => {
            let sql = format!(
                "{SELECT_WITH_NAMES} WHERE b.booker_id = ? AND b.start_date > ? \
                 ORDER BY b.start_date DESC LIMIT ? OFFSET ?"
            );
            sqlx::query_as::<_, BookingWithNames>(&sql)
                .bind(booker_id)
                .bind(now)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
        }
        StateFilter::Waiting => {
            let sql = format!(
                "{SELECT_WITH_NAMES} WHERE b.booker_id = ? AND b.status = 'WAITING' \
                 ORDER BY b.start_date DESC LIMIT ? OFFSET ?"
            );
            sqlx::query_as::<_, BookingWithNames>(&sql)
                .bind(booker_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
        }
        StateFilter::Rejected => {
            let sql = format!(
                "{SELECT_WITH_NAMES} WHERE b.booker_id = ? AND b.status = 'REJECTED' \
                 ORDER BY b.start_date DESC LIMIT ? OFFSET ?"
            );
            sqlx::query_as::<_, BookingWithNames>(&sql)
                .bind(booker_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
        }
    }
}

/// List the reservations on all items belonging to an owner under the
/// given state filter, newest start first.
pub async fn list_for_owner(
    pool: &DbPool,
    owner_id: i64,
    state: StateFilter,
    now: DateTime<Utc>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<BookingWithNames>> {
    match state {
        StateFilter::All => {
            let sql = format!(
                "{SELECT_WITH_NAMES} WHERE i.owner_id = ? \
                 ORDER BY b.start_date DESC LIMIT ? OFFSET ?"
            );
            sqlx::query_as::<_, BookingWithNames>(&sql)
                .bind(owner_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
        }
        StateFilter::Current => {
            let sql = format!(
                "{SELECT_WITH_NAMES} WHERE i.owner_id = ? \
                 AND b.start_date <= ? AND b.end_date >= ? \
                 ORDER BY b.start_date DESC LIMIT ? OFFSET ?"
            );
            sqlx::query_as::<_, BookingWithNames>(&sql)
                .bind(owner_id)
                .bind(now)
                .bind(now)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
        }
        StateFilter::Past => {
            let sql = format!(
                "{SELECT_WITH_NAMES} WHERE i.owner_id = ? AND b.end_date < ? \
                 ORDER BY b.start_date DESC LIMIT ? OFFSET ?"
            );
            sqlx::query_as::<_, BookingWithNames>(&sql)
                .bind(owner_id)
                .bind(now)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
        }
        StateFilter::Future => {
            let sql = format!(
                "{SELECT_WITH_NAMES} WHERE i.owner_id = ? AND b.start_date > ? \
                 ORDER BY b.start_date DESC LIMIT ? OFFSET ?"
            );
            sqlx::query_as::<_, BookingWithNames>(&sql)
                .bind(owner_id)
                .bind(now)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
        }
        StateFilter::Waiting => {
            let sql = format!(
                "{SELECT_WITH_NAMES} WHERE i.owner_id = ? AND b.status = 'WAITING' \
                 ORDER BY b.start_date DESC LIMIT ? OFFSET ?"
            );
            sqlx::query_as::<_, BookingWithNames>(&sql)
                .bind(owner_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
        }
        StateFilter::Rejected => {
            let sql = format!(
                "{SELECT_WITH_NAMES} WHERE i.owner_id = ? AND b.status = 'REJECTED' \
                 ORDER BY b.start_date DESC LIMIT ? OFFSET ?"
            );
            sqlx::query_as::<_, BookingWithNames>(&sql)
                .bind(owner_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(pool)
                .await
        }
    }
}

/// Most recent approved booking that has started by `now`.
pub async fn last_booking_for_item<'e>(
    executor: impl sqlx::Executor<'e, Database = sqlx::Sqlite>,
    item_id: i64,
    now: DateTime<Utc>,
) -> sqlx::Result<Option<Booking>> {
    sqlx::query_as::<_, Booking>(
        "SELECT * FROM bookings \
         WHERE item_id = ? AND status = 'APPROVED' AND start_date <= ? \
         ORDER BY start_date DESC LIMIT 1",
    )
    .bind(item_id)
    .bind(now)
    .fetch_optional(executor)
    .await
}

/// Nearest approved booking starting after `now`.
pub async fn next_booking_for_item<'e>(
    executor: impl sqlx::Executor<'e, Database = sqlx::Sqlite>,
    item_id: i64,
    now: DateTime<Utc>,
) -> sqlx::Result<Option<Booking>> {
    sqlx::query_as::<_, Booking>(
        "SELECT * FROM bookings \
         WHERE item_id = ? AND status = 'APPROVED' AND start_date > ? \
         ORDER BY start_date ASC LIMIT 1",
    )
    .bind(item_id)
    .bind(now)
    .fetch_optional(executor)
    .await
}

/// Whether the user has completed a rental of the item: an approved
/// booking whose end lies before `now`. Gates comment creation.
pub async fn has_completed_booking<'e>(
    executor: impl sqlx::Executor<'e, Database = sqlx::Sqlite>,
    booker_id: i64,
    item_id: i64,
    now: DateTime<Utc>,
) -> sqlx::Result<bool> {
    let count: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM bookings \
         WHERE booker_id = ? AND item_id = ? AND status = 'APPROVED' AND end_date < ?",
    )
    .bind(booker_id)
    .bind(item_id)
    .bind(now)
    .fetch_one(executor)
    .await?;
    Ok(count.0 > 0)
}
