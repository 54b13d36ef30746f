//! ShareIt gateway: validates client requests and forwards them to the
//! server, relaying the upstream status and body verbatim.
//!
//! The gateway holds no store of its own. Everything that can be checked
//! from the request alone — headers, pagination, state strings, email
//! format, time windows, required fields — is rejected here so invalid
//! traffic never reaches the server.

use axum::{
    extract::{Path, Query, State},
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::error::{ApiError, ErrorResponse};
use crate::api::identity::{SharerId, SHARER_USER_HEADER};
use crate::api::validation::{
    validate_booking_window, validate_comment_text, validate_description, validate_email,
    validate_name, PageParams,
};
use crate::db::StateFilter;

pub struct GatewayState {
    client: reqwest::Client,
    server_url: String,
}

impl GatewayState {
    pub fn new(server_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            server_url: server_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
    #[error(transparent)]
    Invalid(#[from] ApiError),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::Invalid(err) => err.into_response(),
            GatewayError::Upstream(err) => {
                tracing::error!("Failed to reach the ShareIt server: {}", err);
                (
                    StatusCode::BAD_GATEWAY,
                    Json(ErrorResponse {
                        error: "ShareIt server is unreachable".to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

/// Relay a request to the server, preserving path, query, acting-user
/// header and body, and hand the upstream response back unchanged.
async fn forward(
    state: &GatewayState,
    method: Method,
    uri: &Uri,
    sharer: Option<i64>,
    body: Option<&Value>,
) -> Result<Response, GatewayError> {
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    let url = format!("{}{}", state.server_url, path_and_query);

    let mut request = state.client.request(method, &url);
    if let Some(id) = sharer {
        request = request.header(SHARER_USER_HEADER, id.to_string());
    }
    if let Some(body) = body {
        request = request.json(body);
    }

    let upstream = request.send().await?;
    let status = upstream.status();
    let content_type = upstream.headers().get(header::CONTENT_TYPE).cloned();
    let bytes = upstream.bytes().await?;

    let mut response = (status, bytes).into_response();
    if let Some(content_type) = content_type {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, content_type);
    }
    Ok(response)
}

fn require_str<'a>(body: &'a Value, field: &str, message: &str) -> Result<&'a str, ApiError> {
    body.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::validation(message))
}

fn optional_str<'a>(body: &'a Value, field: &str) -> Option<&'a str> {
    body.get(field).and_then(Value::as_str)
}

// -------------------------------------------------------------------------
// Users
// -------------------------------------------------------------------------

async fn create_user(
    State(state): State<Arc<GatewayState>>,
    uri: Uri,
    Json(body): Json<Value>,
) -> Result<Response, GatewayError> {
    let email = require_str(&body, "email", "Email is required")?;
    let name = require_str(&body, "name", "Name is required")?;
    validate_email(email).map_err(ApiError::validation)?;
    validate_name(name).map_err(ApiError::validation)?;

    forward(&state, Method::POST, &uri, None, Some(&body)).await
}

async fn update_user(
    State(state): State<Arc<GatewayState>>,
    Path(_id): Path<i64>,
    uri: Uri,
    Json(body): Json<Value>,
) -> Result<Response, GatewayError> {
    if let Some(email) = optional_str(&body, "email") {
        validate_email(email).map_err(ApiError::validation)?;
    }
    if let Some(name) = optional_str(&body, "name") {
        validate_name(name).map_err(ApiError::validation)?;
    }

    forward(&state, Method::PATCH, &uri, None, Some(&body)).await
}

async fn get_user(
    State(state): State<Arc<GatewayState>>,
    Path(_id): Path<i64>,
    uri: Uri,
) -> Result<Response, GatewayError> {
    forward(&state, Method::GET, &uri, None, None).await
}

async fn list_users(
    State(state): State<Arc<GatewayState>>,
    uri: Uri,
) -> Result<Response, GatewayError> {
    forward(&state, Method::GET, &uri, None, None).await
}

async fn delete_user(
    State(state): State<Arc<GatewayState>>,
    Path(_id): Path<i64>,
    uri: Uri,
) -> Result<Response, GatewayError> {
    forward(&state, Method::DELETE, &uri, None, None).await
}

// -------------------------------------------------------------------------
// Items
// -------------------------------------------------------------------------

async fn create_item(
    State(state): State<Arc<GatewayState>>,
    SharerId(sharer): SharerId,
    uri: Uri,
    Json(body): Json<Value>,
) -> Result<Response, GatewayError> {
    let name = require_str(&body, "name", "Item name is required")?;
    let description = require_str(&body, "description", "Item description is required")?;
    if body.get("available").and_then(Value::as_bool).is_none() {
        return Err(ApiError::validation("Item availability is required").into());
    }
    validate_name(name).map_err(ApiError::validation)?;
    validate_description(description).map_err(ApiError::validation)?;

    forward(&state, Method::POST, &uri, Some(sharer), Some(&body)).await
}

async fn update_item(
    State(state): State<Arc<GatewayState>>,
    SharerId(sharer): SharerId,
    Path(_id): Path<i64>,
    uri: Uri,
    Json(body): Json<Value>,
) -> Result<Response, GatewayError> {
    if let Some(name) = optional_str(&body, "name") {
        validate_name(name).map_err(ApiError::validation)?;
    }
    if let Some(description) = optional_str(&body, "description") {
        validate_description(description).map_err(ApiError::validation)?;
    }

    forward(&state, Method::PATCH, &uri, Some(sharer), Some(&body)).await
}

async fn get_item(
    State(state): State<Arc<GatewayState>>,
    SharerId(sharer): SharerId,
    Path(_id): Path<i64>,
    uri: Uri,
) -> Result<Response, GatewayError> {
    forward(&state, Method::GET, &uri, Some(sharer), None).await
}

async fn list_items(
    State(state): State<Arc<GatewayState>>,
    SharerId(sharer): SharerId,
    Query(page): Query<PageParams>,
    uri: Uri,
) -> Result<Response, GatewayError> {
    page.validate()?;
    forward(&state, Method::GET, &uri, Some(sharer), None).await
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    text: Option<String>,
}

async fn search_items(
    State(state): State<Arc<GatewayState>>,
    SharerId(sharer): SharerId,
    Query(query): Query<SearchQuery>,
    Query(page): Query<PageParams>,
    uri: Uri,
) -> Result<Response, GatewayError> {
    page.validate()?;

    // Blank searches never match anything; skip the round trip.
    if query.text.as_deref().unwrap_or("").trim().is_empty() {
        return Ok(Json(Vec::<Value>::new()).into_response());
    }

    forward(&state, Method::GET, &uri, Some(sharer), None).await
}

async fn add_comment(
    State(state): State<Arc<GatewayState>>,
    SharerId(sharer): SharerId,
    Path(_id): Path<i64>,
    uri: Uri,
    Json(body): Json<Value>,
) -> Result<Response, GatewayError> {
    let text = require_str(&body, "text", "Comment text is required")?;
    validate_comment_text(text).map_err(ApiError::validation)?;

    forward(&state, Method::POST, &uri, Some(sharer), Some(&body)).await
}

// -------------------------------------------------------------------------
// Bookings
// -------------------------------------------------------------------------

fn require_timestamp(body: &Value, field: &str) -> Result<DateTime<Utc>, ApiError> {
    let raw = body
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::validation(format!("Booking {field} is required")))?;
    raw.parse::<DateTime<Utc>>()
        .map_err(|_| ApiError::validation(format!("Booking {field} is not a valid timestamp")))
}

async fn create_booking(
    State(state): State<Arc<GatewayState>>,
    SharerId(sharer): SharerId,
    uri: Uri,
    Json(body): Json<Value>,
) -> Result<Response, GatewayError> {
    if body.get("itemId").and_then(Value::as_i64).is_none() {
        return Err(ApiError::validation("Booking itemId is required").into());
    }
    let start = require_timestamp(&body, "start")?;
    let end = require_timestamp(&body, "end")?;
    validate_booking_window(start, end, Utc::now()).map_err(ApiError::validation)?;

    forward(&state, Method::POST, &uri, Some(sharer), Some(&body)).await
}

#[derive(Debug, Deserialize)]
struct ApprovedQuery {
    approved: Option<bool>,
}

async fn set_booking_status(
    State(state): State<Arc<GatewayState>>,
    SharerId(sharer): SharerId,
    Path(_id): Path<i64>,
    Query(query): Query<ApprovedQuery>,
    uri: Uri,
) -> Result<Response, GatewayError> {
    if query.approved.is_none() {
        return Err(ApiError::validation("The 'approved' query parameter is required").into());
    }
    forward(&state, Method::PATCH, &uri, Some(sharer), None).await
}

async fn get_booking(
    State(state): State<Arc<GatewayState>>,
    SharerId(sharer): SharerId,
    Path(_id): Path<i64>,
    uri: Uri,
) -> Result<Response, GatewayError> {
    forward(&state, Method::GET, &uri, Some(sharer), None).await
}

#[derive(Debug, Deserialize)]
struct StateQuery {
    state: Option<String>,
}

async fn list_bookings(
    State(state): State<Arc<GatewayState>>,
    SharerId(sharer): SharerId,
    Query(query): Query<StateQuery>,
    Query(page): Query<PageParams>,
    uri: Uri,
) -> Result<Response, GatewayError> {
    query
        .state
        .as_deref()
        .unwrap_or("ALL")
        .parse::<StateFilter>()
        .map_err(ApiError::validation)?;
    page.validate()?;

    forward(&state, Method::GET, &uri, Some(sharer), None).await
}

async fn list_owner_bookings(
    State(state): State<Arc<GatewayState>>,
    SharerId(sharer): SharerId,
    Query(query): Query<StateQuery>,
    Query(page): Query<PageParams>,
    uri: Uri,
) -> Result<Response, GatewayError> {
    query
        .state
        .as_deref()
        .unwrap_or("ALL")
        .parse::<StateFilter>()
        .map_err(ApiError::validation)?;
    page.validate()?;

    forward(&state, Method::GET, &uri, Some(sharer), None).await
}

// -------------------------------------------------------------------------
// Requests
// -------------------------------------------------------------------------

async fn create_request(
    State(state): State<Arc<GatewayState>>,
    SharerId(sharer): SharerId,
    uri: Uri,
    Json(body): Json<Value>,
) -> Result<Response, GatewayError> {
    let description = require_str(&body, "description", "Request description is required")?;
    validate_description(description).map_err(ApiError::validation)?;

    forward(&state, Method::POST, &uri, Some(sharer), Some(&body)).await
}

async fn list_own_requests(
    State(state): State<Arc<GatewayState>>,
    SharerId(sharer): SharerId,
    uri: Uri,
) -> Result<Response, GatewayError> {
    forward(&state, Method::GET, &uri, Some(sharer), None).await
}

async fn list_all_requests(
    State(state): State<Arc<GatewayState>>,
    SharerId(sharer): SharerId,
    Query(page): Query<PageParams>,
    uri: Uri,
) -> Result<Response, GatewayError> {
    page.validate()?;
    forward(&state, Method::GET, &uri, Some(sharer), None).await
}

async fn get_request(
    State(state): State<Arc<GatewayState>>,
    SharerId(sharer): SharerId,
    Path(_id): Path<i64>,
    uri: Uri,
) -> Result<Response, GatewayError> {
    forward(&state, Method::GET, &uri, Some(sharer), None).await
}

pub fn create_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Users
        .route("/users", get(list_users))
        .route("/users", post(create_user))
        .route("/users/:id", get(get_user))
        .route("/users/:id", patch(update_user))
        .route("/users/:id", delete(delete_user))
        // Items
        .route("/items", post(create_item))
        .route("/items", get(list_items))
        .route("/items/search", get(search_items))
        .route("/items/:id", get(get_item))
        .route("/items/:id", patch(update_item))
        .route("/items/:id/comment", post(add_comment))
        // Bookings
        .route("/bookings", post(create_booking))
        .route("/bookings", get(list_bookings))
        .route("/bookings/owner", get(list_owner_bookings))
        .route("/bookings/:id", get(get_booking))
        .route("/bookings/:id", patch(set_booking_status))
        // Requests
        .route("/requests", post(create_request))
        .route("/requests", get(list_own_requests))
        .route("/requests/all", get(list_all_requests))
        .route("/requests/:id", get(get_request))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
