mod bookings;
pub mod error;
pub mod identity;
mod items;
mod requests;
mod users;
pub mod validation;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Users
        .route("/users", get(users::list_users))
        .route("/users", post(users::create_user))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id", patch(users::update_user))
        .route("/users/:id", delete(users::delete_user))
        // Items
        .route("/items", post(items::create_item))
        .route("/items", get(items::list_items))
        .route("/items/search", get(items::search_items))
        .route("/items/:id", get(items::get_item))
        .route("/items/:id", patch(items::update_item))
        .route("/items/:id/comment", post(items::add_comment))
        // Bookings
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings", get(bookings::list_bookings))
        .route("/bookings/owner", get(bookings::list_owner_bookings))
        .route("/bookings/:id", get(bookings::get_booking))
        .route("/bookings/:id", patch(bookings::set_booking_status))
        // Requests
        .route("/requests", post(requests::create_request))
        .route("/requests", get(requests::list_own_requests))
        .route("/requests/all", get(requests::list_all_requests))
        .route("/requests/:id", get(requests::get_request));

    Router::new()
        .route("/health", get(health_check))
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::identity::SHARER_USER_HEADER;

    async fn test_app() -> Router {
        let db = crate::db::init_with_url("sqlite::memory:").await.unwrap();
        create_router(Arc::new(AppState::new(Config::default(), db, Clock::system())))
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        sharer: Option<i64>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(id) = sharer {
            builder = builder.header(SHARER_USER_HEADER, id.to_string());
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn create_user(app: &Router, email: &str, name: &str) -> i64 {
        let (status, body) = send(
            app,
            "POST",
            "/users",
            None,
            Some(json!({"email": email, "name": name})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }

    async fn create_item(app: &Router, owner: i64, name: &str, available: bool) -> i64 {
        let (status, body) = send(
            app,
            "POST",
            "/items",
            Some(owner),
            Some(json!({"name": name, "description": format!("a {name}"), "available": available})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }

    async fn create_booking(app: &Router, booker: i64, item: i64, days_ahead: i64) -> (StatusCode, Value) {
        let start = Utc::now() + Duration::days(days_ahead);
        let end = start + Duration::days(2);
        send(
            app,
            "POST",
            "/bookings",
            Some(booker),
            Some(json!({
                "itemId": item,
                "start": start.to_rfc3339(),
                "end": end.to_rfc3339(),
            })),
        )
        .await
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app().await;
        let (status, _) = send(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_user_crud() {
        let app = test_app().await;

        let id = create_user(&app, "anna@example.com", "Anna").await;

        let (status, body) = send(&app, "GET", &format!("/users/{id}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "anna@example.com");

        // Duplicate email is a conflict
        let (status, _) = send(
            &app,
            "POST",
            "/users",
            None,
            Some(json!({"email": "anna@example.com", "name": "Another Anna"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        // Partial patch only touches the given fields
        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/users/{id}"),
            None,
            Some(json!({"name": "Anna B."})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Anna B.");
        assert_eq!(body["email"], "anna@example.com");

        let (status, _) = send(&app, "DELETE", &format!("/users/{id}"), None, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, "GET", &format!("/users/{id}"), None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_user_payloads() {
        let app = test_app().await;

        let (status, _) = send(&app, "POST", "/users", None, Some(json!({"name": "No Email"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            "/users",
            None,
            Some(json!({"email": "not-an-email", "name": "Bad"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_sharer_header() {
        let app = test_app().await;
        let (status, body) = send(
            &app,
            "POST",
            "/items",
            None,
            Some(json!({"name": "drill", "description": "a drill", "available": true})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("X-Sharer-User-Id"));
    }

    #[tokio::test]
    async fn test_item_create_requires_existing_owner() {
        let app = test_app().await;
        let (status, _) = send(
            &app,
            "POST",
            "/items",
            Some(999),
            Some(json!({"name": "drill", "description": "a drill", "available": true})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_item_update_is_owner_only() {
        let app = test_app().await;
        let owner = create_user(&app, "owner@example.com", "Owner").await;
        let other = create_user(&app, "other@example.com", "Other").await;
        let item = create_item(&app, owner, "drill", true).await;

        let (status, _) = send(
            &app,
            "PATCH",
            &format!("/items/{item}"),
            Some(other),
            Some(json!({"available": false})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/items/{item}"),
            Some(owner),
            Some(json!({"available": false})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["available"], false);
        assert_eq!(body["name"], "drill");
    }

    #[tokio::test]
    async fn test_search() {
        let app = test_app().await;
        let owner = create_user(&app, "owner@example.com", "Owner").await;
        create_item(&app, owner, "cordless drill", true).await;
        create_item(&app, owner, "hammer", true).await;
        let hidden = create_item(&app, owner, "drill press", true).await;
        send(
            &app,
            "PATCH",
            &format!("/items/{hidden}"),
            Some(owner),
            Some(json!({"available": false})),
        )
        .await;

        // Case-insensitive substring match over available items only
        let (status, body) = send(&app, "GET", "/items/search?text=DRILL", Some(owner), None).await;
        assert_eq!(status, StatusCode::OK);
        let found = body.as_array().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["name"], "cordless drill");

        // Blank or missing text yields an empty set, not all items
        let (status, body) = send(&app, "GET", "/items/search?text=", Some(owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 0);

        let (status, body) = send(&app, "GET", "/items/search", Some(owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_booking_lifecycle_approve_then_terminal() {
        let app = test_app().await;
        let owner = create_user(&app, "owner@example.com", "Owner").await;
        let booker = create_user(&app, "booker@example.com", "Booker").await;
        let item = create_item(&app, owner, "drill", true).await;

        let (status, body) = create_booking(&app, booker, item, 1).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "WAITING");
        assert_eq!(body["item"]["name"], "drill");
        assert_eq!(body["booker"]["id"], booker);
        let booking = body["id"].as_i64().unwrap();

        // Owner approves
        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/bookings/{booking}?approved=true"),
            Some(owner),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "APPROVED");

        // The booker can no longer cancel a decided booking
        let (status, _) = send(
            &app,
            "PATCH",
            &format!("/bookings/{booking}?approved=false"),
            Some(booker),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Nor can the owner re-decide it
        let (status, _) = send(
            &app,
            "PATCH",
            &format!("/bookings/{booking}?approved=false"),
            Some(owner),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_booker_can_cancel_waiting_booking() {
        let app = test_app().await;
        let owner = create_user(&app, "owner@example.com", "Owner").await;
        let booker = create_user(&app, "booker@example.com", "Booker").await;
        let stranger = create_user(&app, "stranger@example.com", "Stranger").await;
        let item = create_item(&app, owner, "drill", true).await;

        let (_, body) = create_booking(&app, booker, item, 1).await;
        let booking = body["id"].as_i64().unwrap();

        // A third party may not touch the booking at all
        let (status, _) = send(
            &app,
            "PATCH",
            &format!("/bookings/{booking}?approved=false"),
            Some(stranger),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // The booker cannot approve their own booking
        let (status, _) = send(
            &app,
            "PATCH",
            &format!("/bookings/{booking}?approved=true"),
            Some(booker),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // But they can withdraw it
        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/bookings/{booking}?approved=false"),
            Some(booker),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "CANCELED");
    }

    #[tokio::test]
    async fn test_booking_guards() {
        let app = test_app().await;
        let owner = create_user(&app, "owner@example.com", "Owner").await;
        let booker = create_user(&app, "booker@example.com", "Booker").await;
        let item = create_item(&app, owner, "drill", true).await;
        let unavailable = create_item(&app, owner, "saw", false).await;

        // Owners cannot book their own items
        let (status, _) = create_booking(&app, owner, item, 1).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Unavailable items cannot be booked
        let (status, _) = create_booking(&app, booker, unavailable, 1).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Unknown item
        let (status, _) = create_booking(&app, booker, 999, 1).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Unknown booker
        let (status, _) = create_booking(&app, 999, item, 1).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Window in the past
        let (status, _) = create_booking(&app, booker, item, -5).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Inverted window
        let start = Utc::now() + Duration::days(3);
        let end = start - Duration::days(1);
        let (status, _) = send(
            &app,
            "POST",
            "/bookings",
            Some(booker),
            Some(json!({"itemId": item, "start": start.to_rfc3339(), "end": end.to_rfc3339()})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_booking_visibility() {
        let app = test_app().await;
        let owner = create_user(&app, "owner@example.com", "Owner").await;
        let booker = create_user(&app, "booker@example.com", "Booker").await;
        let stranger = create_user(&app, "stranger@example.com", "Stranger").await;
        let item = create_item(&app, owner, "drill", true).await;

        let (_, body) = create_booking(&app, booker, item, 1).await;
        let booking = body["id"].as_i64().unwrap();

        for viewer in [owner, booker] {
            let (status, _) = send(&app, "GET", &format!("/bookings/{booking}"), Some(viewer), None).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, _) = send(&app, "GET", &format!("/bookings/{booking}"), Some(stranger), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_booking_listings_and_filters() {
        let app = test_app().await;
        let owner = create_user(&app, "owner@example.com", "Owner").await;
        let booker = create_user(&app, "booker@example.com", "Booker").await;
        let item = create_item(&app, owner, "drill", true).await;

        for days in [1, 4, 7] {
            let (status, _) = create_booking(&app, booker, item, days).await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = send(&app, "GET", "/bookings", Some(booker), None).await;
        assert_eq!(status, StatusCode::OK);
        let all = body.as_array().unwrap().clone();
        assert_eq!(all.len(), 3);
        // Newest reservation first
        assert!(all[0]["start"].as_str().unwrap() > all[2]["start"].as_str().unwrap());

        let (status, body) = send(&app, "GET", "/bookings?state=FUTURE", Some(booker), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 3);

        let (status, body) = send(&app, "GET", "/bookings?state=PAST", Some(booker), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 0);

        let (status, body) = send(&app, "GET", "/bookings/owner?state=WAITING", Some(owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 3);

        // The owner side sees nothing for the booker id and vice versa
        let (status, body) = send(&app, "GET", "/bookings/owner", Some(booker), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 0);

        let (status, body) = send(&app, "GET", "/bookings?state=SOMETHING", Some(booker), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Unknown state: SOMETHING");

        // Unknown listing user
        let (status, _) = send(&app, "GET", "/bookings", Some(999), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_pagination_bounds() {
        let app = test_app().await;
        let user = create_user(&app, "user@example.com", "User").await;

        for uri in [
            "/bookings?from=-1",
            "/bookings?size=0",
            "/bookings/owner?from=-1",
            "/items?size=0",
            "/items/search?text=x&from=-1",
            "/requests/all?size=0",
        ] {
            let (status, _) = send(&app, "GET", uri, Some(user), None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "expected 400 for {uri}");
        }
    }

    #[tokio::test]
    async fn test_comment_requires_completed_booking() {
        let db = crate::db::init_with_url("sqlite::memory:").await.unwrap();
        let t0 = Utc::now();

        let early = create_router(Arc::new(AppState::new(
            Config::default(),
            db.clone(),
            Clock::fixed(t0),
        )));

        let owner = create_user(&early, "owner@example.com", "Owner").await;
        let booker = create_user(&early, "booker@example.com", "Booker").await;
        let item = create_item(&early, owner, "drill", true).await;

        let start = t0 + Duration::hours(1);
        let end = t0 + Duration::hours(3);
        let (status, body) = send(
            &early,
            "POST",
            "/bookings",
            Some(booker),
            Some(json!({"itemId": item, "start": start.to_rfc3339(), "end": end.to_rfc3339()})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let booking = body["id"].as_i64().unwrap();

        let (status, _) = send(
            &early,
            "PATCH",
            &format!("/bookings/{booking}?approved=true"),
            Some(owner),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // The rental has not ended yet, so commenting is rejected
        let (status, _) = send(
            &early,
            "POST",
            &format!("/items/{item}/comment"),
            Some(booker),
            Some(json!({"text": "great drill"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Same store, clock advanced past the booking end
        let late = create_router(Arc::new(AppState::new(
            Config::default(),
            db,
            Clock::fixed(t0 + Duration::hours(4)),
        )));

        let (status, body) = send(
            &late,
            "POST",
            &format!("/items/{item}/comment"),
            Some(booker),
            Some(json!({"text": "great drill"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["authorName"], "Booker");

        // The comment shows up on the item, and the owner sees the past booking
        let (status, body) = send(&late, "GET", &format!("/items/{item}"), Some(owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["comments"].as_array().unwrap().len(), 1);
        assert_eq!(body["lastBooking"]["id"], booking);
        assert_eq!(body["nextBooking"], Value::Null);

        // A non-owner sees comments but no booking summaries
        let (status, body) = send(&late, "GET", &format!("/items/{item}"), Some(booker), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["lastBooking"], Value::Null);
        assert_eq!(body["comments"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_request_board() {
        let app = test_app().await;
        let asker = create_user(&app, "asker@example.com", "Asker").await;
        let responder = create_user(&app, "responder@example.com", "Responder").await;

        let (status, body) = send(
            &app,
            "POST",
            "/requests",
            Some(asker),
            Some(json!({"description": "looking for a ladder"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let request = body["id"].as_i64().unwrap();

        // An item listed against the request is attached to it
        let (status, _) = send(
            &app,
            "POST",
            "/items",
            Some(responder),
            Some(json!({
                "name": "ladder",
                "description": "a sturdy ladder",
                "available": true,
                "requestId": request,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        // Own requests include the offered items
        let (status, body) = send(&app, "GET", "/requests", Some(asker), None).await;
        assert_eq!(status, StatusCode::OK);
        let own = body.as_array().unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0]["items"].as_array().unwrap().len(), 1);

        // The all-listing excludes the requester's own posts
        let (status, body) = send(&app, "GET", "/requests/all", Some(asker), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 0);

        let (status, body) = send(&app, "GET", "/requests/all", Some(responder), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, body) = send(&app, "GET", &format!("/requests/{request}"), Some(responder), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["description"], "looking for a ladder");

        let (status, _) = send(&app, "GET", "/requests/999", Some(asker), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Blank description is rejected
        let (status, _) = send(
            &app,
            "POST",
            "/requests",
            Some(asker),
            Some(json!({"description": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_item_listing_for_owner() {
        let app = test_app().await;
        let owner = create_user(&app, "owner@example.com", "Owner").await;
        let other = create_user(&app, "other@example.com", "Other").await;
        create_item(&app, owner, "drill", true).await;
        create_item(&app, owner, "saw", true).await;
        create_item(&app, other, "ladder", true).await;

        let (status, body) = send(&app, "GET", "/items", Some(owner), None).await;
        assert_eq!(status, StatusCode::OK);
        let items = body.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["name"], "drill");
        assert_eq!(items[1]["name"], "saw");
    }
}
