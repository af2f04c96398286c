//! HTTP error mapping and the extractors that feed it.
//!
//! | Error | Status | Body |
//! |-------|--------|------|
//! | [`ApiError::NotFound`] | 404 | empty |
//! | [`ApiError::MalformedInput`] | 400 | `{"error":"malformed_input",...}` |
//! | `Constraint::Unique` | 409 | `{"error":"constraint_violation",...}` |
//! | `Constraint::MaxLength` / `Required` / `NulCharacter` | 400 | `{"error":"constraint_violation",...}` |
//! | `StoreError::Unavailable` | 503 | `{"error":"connectivity_failure",...}` |
//! | `StoreError::Database` | 500 | `{"error":"database_error",...}`, details only in the log |

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use store::{Constraint, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedInput(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::MalformedInput(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound => return StatusCode::NOT_FOUND.into_response(),
            ApiError::MalformedInput(message) => {
                (StatusCode::BAD_REQUEST, "malformed_input", message)
            }
            ApiError::Store(StoreError::ConstraintViolation(constraint)) => {
                let status = match constraint {
                    Constraint::Unique { .. } => StatusCode::CONFLICT,
                    Constraint::MaxLength { .. }
                    | Constraint::Required { .. }
                    | Constraint::NulCharacter { .. } => StatusCode::BAD_REQUEST,
                };
                (status, "constraint_violation", constraint.to_string())
            }
            ApiError::Store(StoreError::Unavailable(detail)) => {
                tracing::warn!(%detail, "database unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "connectivity_failure",
                    "database unavailable".to_string(),
                )
            }
            ApiError::Store(StoreError::Database(detail)) => {
                tracing::error!(%detail, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "internal database error".to_string(),
                )
            }
        };
        (status, axum::Json(ErrorBody { error, message })).into_response()
    }
}

/// `axum::Json` whose rejections become [`ApiError::MalformedInput`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        let Self(value) = self;
        axum::Json(value).into_response()
    }
}

/// `axum::extract::Path` whose rejections become [`ApiError::MalformedInput`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct Path<T>(pub T);
