//! # HTTP routes
//!
//! [`router`] wires every endpoint to a [`RecordStore`] held as router state.
//! Handlers only extract, call the store, and pick a status code; everything
//! else (missing rows, constraint violations, bad input) flows through
//! [`ApiError`].
//!
//! | Method | Path | Store call | Success |
//! |--------|------|------------|---------|
//! | GET | `/api/health` | `check_connectivity` | 200 / 503 |
//! | GET | `/api/test` | `list_test_items` | 200 |
//! | GET | `/api/test/{id}` | `get_test_item` | 200 |
//! | POST | `/api/test` | `insert_test_item` | 201 + `Location` |
//! | PUT | `/api/test/{id}` | `update_test_item` | 200 |
//! | DELETE | `/api/test/{id}` | `delete_test_item` | 204 |
//! | GET | `/api/users` | `list_users` | 200 |
//! | GET | `/api/users/{id}` | `get_user` | 200 |
//! | POST | `/api/users` | `insert_user` | 201 + `Location` |
//!
//! Every route sits behind a `TraceLayer` span and a `TimeoutLayer` bounded by
//! [`ServerSettings::request_timeout`]; a request that runs over gets 408.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use store::{NewTestItem, NewUser, RecordStore, TestItem, TestItemPatch, User};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::error::{ApiError, Json, Path};
use crate::settings::ServerSettings;

pub fn router<S: RecordStore>(store: S, settings: &ServerSettings) -> Router {
    Router::new()
        .route("/api/health", get(health::<S>))
        .route(
            "/api/test",
            get(list_test_items::<S>).post(create_test_item::<S>),
        )
        .route(
            "/api/test/{id}",
            get(get_test_item::<S>)
                .put(update_test_item::<S>)
                .delete(delete_test_item::<S>),
        )
        .route("/api/users", get(list_users::<S>).post(create_user::<S>))
        .route("/api/users/{id}", get(get_user::<S>))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            settings.request_timeout(),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn health<S: RecordStore>(State(store): State<S>) -> Response {
    match store.check_connectivity().await {
        Ok(()) => Json(Health {
            status: "healthy",
            database: "connected",
            error: None,
        })
        .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Health {
                    status: "unhealthy",
                    database: "unreachable",
                    error: Some(e.to_string()),
                }),
            )
                .into_response()
        }
    }
}

fn created<T: Serialize>(location: String, body: T) -> Response {
    (StatusCode::CREATED, [(header::LOCATION, location)], Json(body)).into_response()
}

async fn list_test_items<S: RecordStore>(
    State(store): State<S>,
) -> Result<Json<Vec<TestItem>>, ApiError> {
    Ok(Json(store.list_test_items().await?))
}

async fn get_test_item<S: RecordStore>(
    State(store): State<S>,
    Path(id): Path<i32>,
) -> Result<Json<TestItem>, ApiError> {
    store
        .get_test_item(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn create_test_item<S: RecordStore>(
    State(store): State<S>,
    Json(item): Json<NewTestItem>,
) -> Result<Response, ApiError> {
    let item = store.insert_test_item(item).await?;
    tracing::info!(id = item.id, "created test item");
    Ok(created(format!("/api/test/{}", item.id), item))
}

async fn update_test_item<S: RecordStore>(
    State(store): State<S>,
    Path(id): Path<i32>,
    Json(patch): Json<TestItemPatch>,
) -> Result<Json<TestItem>, ApiError> {
    store
        .update_test_item(id, patch)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn delete_test_item<S: RecordStore>(
    State(store): State<S>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    if store.delete_test_item(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

async fn list_users<S: RecordStore>(State(store): State<S>) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(store.list_users().await?))
}

async fn get_user<S: RecordStore>(
    State(store): State<S>,
    Path(id): Path<i32>,
) -> Result<Json<User>, ApiError> {
    store.get_user(id).await?.map(Json).ok_or(ApiError::NotFound)
}

async fn create_user<S: RecordStore>(
    State(store): State<S>,
    Json(user): Json<NewUser>,
) -> Result<Response, ApiError> {
    let user = store.insert_user(user).await?;
    tracing::info!(id = user.id, "created user");
    Ok(created(format!("/api/users/{}", user.id), user))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use store::{MemoryStore, StoreError};
    use tower::ServiceExt;

    use super::*;

    fn app(store: impl RecordStore) -> Router {
        router(store, &ServerSettings::default())
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        app.clone().oneshot(request.body(body).unwrap()).await.unwrap()
    }

    async fn send_raw(app: &Router, method: &str, uri: &str, body: &'static str) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(MemoryStore::new());
        let response = send(&app, "GET", "/api/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"status": "healthy", "database": "connected"})
        );
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let app = app(MemoryStore::new());
        let start = store::models::now();

        let response = send(&app, "POST", "/api/test", Some(json!({"name": "My First Item"}))).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::LOCATION], "/api/test/1");
        let created = body_json(response).await;
        assert_eq!(created["id"], 1);
        assert_eq!(created["name"], "My First Item");
        let item: TestItem = serde_json::from_value(created.clone()).unwrap();
        assert!(item.created_at >= start);

        let response = send(&app, "GET", "/api/test", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([created]));
    }

    #[tokio::test]
    async fn test_get_round_trip() {
        let app = app(MemoryStore::new());
        let response = send(
            &app,
            "POST",
            "/api/test",
            Some(json!({"name": "round trip", "createdAt": "2024-01-20T12:00:00Z"})),
        )
        .await;
        let created = body_json(response).await;
        assert_eq!(created["createdAt"], "2024-01-20T12:00:00Z");

        let response = send(&app, "GET", "/api/test/1", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, created);
    }

    #[tokio::test]
    async fn test_missing_item_is_404_with_empty_body() {
        let app = app(MemoryStore::new());
        for (method, body) in [
            ("GET", None),
            ("PUT", Some(json!({"name": "x"}))),
            ("DELETE", None),
        ] {
            let response = send(&app, method, "/api/test/999", body).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{method}");
            assert!(body_bytes(response).await.is_empty());
        }

        let response = send(&app, "GET", "/api/users/999", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_keeps_created_at() {
        let app = app(MemoryStore::new());
        let created =
            body_json(send(&app, "POST", "/api/test", Some(json!({"name": "My First Item"}))).await)
                .await;

        let response = send(
            &app,
            "PUT",
            "/api/test/1",
            Some(json!({"id": 1, "name": "Updated"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let updated = body_json(response).await;
        assert_eq!(updated["name"], "Updated");
        assert_eq!(updated["createdAt"], created["createdAt"]);
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let app = app(MemoryStore::new());
        send(&app, "POST", "/api/test", Some(json!({"name": "x"}))).await;

        let response = send(&app, "DELETE", "/api/test/1", None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(body_bytes(response).await.is_empty());

        let response = send(&app, "DELETE", "/api/test/1", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryStore::new();
        let app = app(store.clone());
        let body = json!({"email": "ada@example.com", "displayName": "Ada"});

        let response = send(&app, "POST", "/api/users", Some(body.clone())).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::LOCATION], "/api/users/1");

        let response = send(&app, "POST", "/api/users", Some(body)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let error = body_json(response).await;
        assert_eq!(error["error"], "constraint_violation");

        let response = send(&app, "GET", "/api/users", None).await;
        let users = body_json(response).await;
        assert_eq!(users.as_array().unwrap().len(), 1);
        assert_eq!(users[0]["displayName"], "Ada");
        assert!(users[0]["updatedAt"].is_null());
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_user() {
        let app = app(MemoryStore::new());
        send(&app, "POST", "/api/users", Some(json!({"email": "a@example.com"}))).await;

        let response = send(&app, "GET", "/api/users/1", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let user = body_json(response).await;
        assert_eq!(user["email"], "a@example.com");
        assert!(user["displayName"].is_null());
    }

    #[tokio::test]
    async fn test_non_integer_id_is_400() {
        let app = app(MemoryStore::new());
        for uri in ["/api/test/abc", "/api/test/1.5", "/api/users/99999999999"] {
            let response = send(&app, "GET", uri, None).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body_json(response).await["error"], "malformed_input");
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() {
        let app = app(MemoryStore::new());

        let response = send_raw(&app, "POST", "/api/test", "{not json").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send_raw(&app, "POST", "/api/test", r#"{"name": 12}"#).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send_raw(&app, "POST", "/api/users", r#"{"displayName": "no email"}"#).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let request = Request::builder()
            .method("POST")
            .uri("/api/test")
            .body(Body::from(r#"{"name": "no content type"}"#))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_too_long_name_is_400() {
        let store = MemoryStore::new();
        let app = app(store.clone());
        let response = send(&app, "POST", "/api/test", Some(json!({"name": "a".repeat(201)}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "constraint_violation");
        assert!(store.list_test_items().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_nul_in_name_is_400() {
        let store = MemoryStore::new();
        let app = app(store.clone());
        let response = send_raw(&app, "POST", "/api/test", r#"{"name": "a\u0000b"}"#).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "constraint_violation");
        assert!(store.list_test_items().await.unwrap().is_empty());
    }

    /// A store whose database is never reachable.
    #[derive(Clone)]
    struct Unreachable;

    fn down() -> StoreError {
        StoreError::Unavailable("connection refused".into())
    }

    impl RecordStore for Unreachable {
        async fn check_connectivity(&self) -> Result<(), StoreError> {
            Err(down())
        }
        async fn list_test_items(&self) -> Result<Vec<TestItem>, StoreError> {
            Err(down())
        }
        async fn get_test_item(&self, _id: i32) -> Result<Option<TestItem>, StoreError> {
            Err(down())
        }
        async fn insert_test_item(&self, _item: NewTestItem) -> Result<TestItem, StoreError> {
            Err(down())
        }
        async fn update_test_item(
            &self,
            _id: i32,
            _patch: TestItemPatch,
        ) -> Result<Option<TestItem>, StoreError> {
            Err(down())
        }
        async fn delete_test_item(&self, _id: i32) -> Result<bool, StoreError> {
            Err(down())
        }
        async fn list_users(&self) -> Result<Vec<User>, StoreError> {
            Err(down())
        }
        async fn get_user(&self, _id: i32) -> Result<Option<User>, StoreError> {
            Err(down())
        }
        async fn insert_user(&self, _user: NewUser) -> Result<User, StoreError> {
            Err(down())
        }
    }

    #[tokio::test]
    async fn test_unreachable_database() {
        let app = app(Unreachable);

        let response = send(&app, "GET", "/api/health", None).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let health = body_json(response).await;
        assert_eq!(health["status"], "unhealthy");
        assert!(health["error"]
            .as_str()
            .unwrap()
            .contains("connection refused"));

        let response = send(&app, "GET", "/api/test", None).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let error = body_json(response).await;
        assert_eq!(error["error"], "connectivity_failure");
        // Driver details stay in the log
        assert_eq!(error["message"], "database unavailable");
    }

    /// A store whose calls never complete.
    #[derive(Clone)]
    struct Stalled;

    impl RecordStore for Stalled {
        async fn check_connectivity(&self) -> Result<(), StoreError> {
            std::future::pending().await
        }
        async fn list_test_items(&self) -> Result<Vec<TestItem>, StoreError> {
            std::future::pending().await
        }
        async fn get_test_item(&self, _id: i32) -> Result<Option<TestItem>, StoreError> {
            std::future::pending().await
        }
        async fn insert_test_item(&self, _item: NewTestItem) -> Result<TestItem, StoreError> {
            std::future::pending().await
        }
        async fn update_test_item(
            &self,
            _id: i32,
            _patch: TestItemPatch,
        ) -> Result<Option<TestItem>, StoreError> {
            std::future::pending().await
        }
        async fn delete_test_item(&self, _id: i32) -> Result<bool, StoreError> {
            std::future::pending().await
        }
        async fn list_users(&self) -> Result<Vec<User>, StoreError> {
            std::future::pending().await
        }
        async fn get_user(&self, _id: i32) -> Result<Option<User>, StoreError> {
            std::future::pending().await
        }
        async fn insert_user(&self, _user: NewUser) -> Result<User, StoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_request_times_out_with_408() {
        let settings = ServerSettings {
            request_timeout_secs: 1,
            ..ServerSettings::default()
        };
        let app = router(Stalled, &settings);

        let response = send(&app, "GET", "/api/test", None).await;
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
