//! Error types.
//!
//! - [`RequestIdError`] covers setup-time mistakes in the middleware options.
//!   The middleware itself never fails at request time.
//! - [`AppError`] wraps [`anyhow::Error`] so demo handlers can return
//!   `Result<T, AppError>` and propagate with `?`.

use axum::{
    http::{header::InvalidHeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Invalid [`RequestIdOptions`](crate::request_id::RequestIdOptions).
#[derive(Debug, thiserror::Error)]
pub enum RequestIdError {
    #[error("`{name}` is not a valid HTTP header name")]
    InvalidHeaderName {
        name: String,
        #[source]
        source: InvalidHeaderName,
    },

    #[error("state property name must not be empty")]
    EmptyStateProperty,

    #[error("query source must not be empty")]
    EmptyQuerySource,
}

/// Wraps [`anyhow::Error`] so it can be returned from axum handlers.
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self.0, "handler error");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(e: E) -> Self {
        Self(e.into())
    }
}
