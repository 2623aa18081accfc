//! HTTP surface of the demo server.

pub mod echo;
pub mod health;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use crate::request_id::{request_id_middleware, RequestIdOptions};

/// Build the app: every route sits behind the request id middleware, which in
/// turn sits inside the HTTP trace span.
pub fn router(options: Arc<RequestIdOptions>) -> Router {
    let trace_layer = tower_http::trace::TraceLayer::new_for_http()
        .make_span_with(tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO))
        .on_response(tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO));

    Router::new()
        .route("/", get(echo::echo))
        .route("/healthz", get(health::healthz))
        .layer(middleware::from_fn_with_state(options, request_id_middleware))
        .layer(trace_layer)
}
