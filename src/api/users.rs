//! User directory API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{CreateUserRequest, UpdateUserRequest, User};
use crate::AppState;

use super::error::ApiError;
use super::validation::{validate_email, validate_name};

/// List all registered users
pub async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<User>>, ApiError> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id")
        .fetch_all(&state.db)
        .await?;

    Ok(Json(users))
}

/// Get a user by id
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(user))
}

/// Register a new user
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let email = req
        .email
        .as_deref()
        .ok_or_else(|| ApiError::validation("Email is required"))?;
    let name = req
        .name
        .as_deref()
        .ok_or_else(|| ApiError::validation("Name is required"))?;
    validate_email(email).map_err(ApiError::validation)?;
    validate_name(name).map_err(ApiError::validation)?;

    let mut tx = state.db.begin().await?;

    let id = sqlx::query("INSERT INTO users (email, name) VALUES (?, ?)")
        .bind(email)
        .bind(name)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint failed") {
                ApiError::already_exists("A user with this email already exists")
            } else {
                ApiError::from(e)
            }
        })?
        .last_insert_rowid();

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Partially update a user; only the fields present in the request change
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    if let Some(ref email) = req.email {
        validate_email(email).map_err(ApiError::validation)?;
    }
    if let Some(ref name) = req.name {
        validate_name(name).map_err(ApiError::validation)?;
    }

    let mut tx = state.db.begin().await?;

    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    sqlx::query(
        "UPDATE users SET \
             email = COALESCE(?, email), \
             name = COALESCE(?, name) \
         WHERE id = ?",
    )
    .bind(&req.email)
    .bind(&req.name)
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint failed") {
            ApiError::already_exists("A user with this email already exists")
        } else {
            ApiError::from(e)
        }
    })?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Json(user))
}

/// Delete a user
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}
