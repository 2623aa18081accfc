//! Liveness probe.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// `GET /healthz` — 200 OK with `{"status": "ok"}`.
///
/// Used by `reqid-gateway --healthcheck` and container liveness probes.
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
