//! Request ID middleware.
//!
//! Every inbound request is assigned a correlation id. The id is:
//!
//! - Taken from the `query_source` query parameter, if configured and non-empty
//! - Otherwise taken from the `header_source` request header, if present
//! - Otherwise freshly generated (UUID v4 by default)
//! - Stored in the [`RequestState`] bag under `state_property_name`, and as a
//!   typed [`RequestId`] extension
//! - Echoed back in the `expose_header` response header, unless disabled
//! - Wrapped in a [`tracing`] span so every downstream log line includes it
//!
//! ```rust,ignore
//! let options = Arc::new(RequestIdOptions::builder().query_source("reqId").build()?);
//! let app = Router::new()
//!     .route("/", get(handler))
//!     .layer(axum::middleware::from_fn_with_state(options, request_id_middleware));
//! ```

mod generator;
mod options;
mod state;

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use tracing::Instrument as _;

pub use generator::{uuid_simple, uuid_v4, Generator, GeneratorKind};
pub use options::{RequestIdOptions, RequestIdOptionsBuilder, DEFAULT_HEADER, DEFAULT_STATE_PROPERTY};
pub use state::RequestState;

/// Newtype wrapper carrying the assigned request ID.
///
/// Exposed as an axum [`Extension`](axum::Extension) alongside the
/// [`RequestState`] entry:
/// ```rust,ignore
/// async fn handler(Extension(req_id): Extension<RequestId>) { ... }
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a resolved id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSource {
    Query,
    Header,
    Generated,
}

impl std::fmt::Display for IdSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Query => "query",
            Self::Header => "header",
            Self::Generated => "generated",
        })
    }
}

/// Axum middleware that assigns a request id to every request.
///
/// Attach with `axum::middleware::from_fn_with_state(Arc<RequestIdOptions>, ..)`.
/// Layer order matters: apply it **inside** `tower_http::TraceLayer` so the id
/// span nests under the HTTP span.
///
/// The downstream response is returned untouched apart from the exposed
/// header, which is only inserted when the handler has not already set it.
pub async fn request_id_middleware(
    State(options): State<Arc<RequestIdOptions>>,
    mut req: Request,
    next: Next,
) -> Response {
    let (id, source) = options.resolve(req.uri(), req.headers());
    tracing::debug!(%id, %source, "request id assigned");

    RequestState::set_in(req.extensions_mut(), options.state_property_name(), id.as_str());
    req.extensions_mut().insert(RequestId(id.clone()));

    let span = tracing::debug_span!("request_id", id = %id);
    let mut response = next.run(req).instrument(span).await;

    if let Some(name) = options.expose_header() {
        match HeaderValue::from_str(&id) {
            Ok(value) => {
                response.headers_mut().entry(name.clone()).or_insert(value);
            }
            // Only reachable for query-supplied ids carrying control characters.
            Err(_) => tracing::warn!(%id, header = %name, "request id is not a valid header value, not exposed"),
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        middleware,
        routing::get,
        Extension, Json, Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;

    async fn echo(
        Extension(state): Extension<RequestState>,
        Extension(id): Extension<RequestId>,
    ) -> Json<Value> {
        Json(json!({ "id": id.as_str(), "state": state }))
    }

    fn app(options: RequestIdOptions) -> Router {
        Router::new()
            .route("/", get(echo))
            .route("/teapot", get(|| async { StatusCode::IM_A_TEAPOT }))
            .route(
                "/own-header",
                get(|| async { ([("x-request-id", "set-by-handler")], "ok") }),
            )
            .layer(middleware::from_fn_with_state(
                Arc::new(options),
                request_id_middleware,
            ))
    }

    fn counting(value: &'static str) -> (RequestIdOptionsBuilder, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let builder = RequestIdOptions::builder().generator(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            value.to_owned()
        });
        (builder, calls)
    }

    async fn body_json(resp: Response) -> Value {
        let body = to_bytes(resp.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    // -----------------------------------------------------------------------
    // Generated ids
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn defaults_generate_uuid_and_expose_it() {
        let resp = app(RequestIdOptions::default()).oneshot(get_req("/")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let header = resp.headers().get("x-request-id").unwrap().to_str().unwrap().to_owned();
        let json = body_json(resp).await;
        let id = json["state"]["reqId"].as_str().unwrap();

        let parsed = uuid::Uuid::parse_str(id).expect("default id should be a uuid");
        assert_eq!(parsed.get_version_num(), 4);
        assert_eq!(id, id.to_lowercase());
        assert_eq!(header, id);
        assert_eq!(json["id"], id);
    }

    #[tokio::test]
    async fn generator_runs_once_and_feeds_state_and_header() {
        let (builder, calls) = counting("helloworld");
        let resp = app(builder.build().unwrap()).oneshot(get_req("/")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(resp.headers().get("x-request-id").unwrap(), "helloworld");
        let json = body_json(resp).await;
        assert_eq!(json["state"]["reqId"], "helloworld");
    }

    #[tokio::test]
    async fn each_request_gets_a_fresh_id() {
        let app = app(RequestIdOptions::default());
        let a = app.clone().oneshot(get_req("/")).await.unwrap();
        let b = app.oneshot(get_req("/")).await.unwrap();
        assert_ne!(
            a.headers().get("x-request-id").unwrap(),
            b.headers().get("x-request-id").unwrap()
        );
    }

    // -----------------------------------------------------------------------
    // Caller-supplied ids
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn incoming_header_wins_over_generator() {
        let (builder, calls) = counting("fixed-id");
        let resp = app(builder.build().unwrap())
            .oneshot(
                Request::get("/")
                    .header("X-Request-Id", "incoming")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(resp.headers().get("x-request-id").unwrap(), "incoming");
        let json = body_json(resp).await;
        assert_eq!(json["state"]["reqId"], "incoming");
    }

    #[tokio::test]
    async fn query_wins_over_header() {
        let (builder, calls) = counting("fixed-id");
        let options = builder.query_source("reqId").build().unwrap();
        let resp = app(options)
            .oneshot(
                Request::get("/?reqId=abc")
                    .header("x-request-id", "zzz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(resp.headers().get("x-request-id").unwrap(), "abc");
        let json = body_json(resp).await;
        assert_eq!(json["state"]["reqId"], "abc");
    }

    #[tokio::test]
    async fn custom_request_header_is_read() {
        let options = RequestIdOptions::builder().header_source("X-Custom-Id").build().unwrap();
        let resp = app(options)
            .oneshot(
                Request::get("/")
                    .header("x-custom-id", "hack-the-planet")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let json = body_json(resp).await;
        assert_eq!(json["state"]["reqId"], "hack-the-planet");
    }

    // -----------------------------------------------------------------------
    // Response header exposure
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn disabled_expose_header_writes_nothing() {
        let options = RequestIdOptions::builder()
            .query_source("reqId")
            .disable_expose_header()
            .build()
            .unwrap();
        let resp = app(options).oneshot(get_req("/?reqId=abc")).await.unwrap();

        assert!(resp.headers().get("x-request-id").is_none());
        // Only the JSON content-type and length set by the handler remain.
        assert!(resp.headers().keys().all(|k| k == "content-type" || k == "content-length"));
        let json = body_json(resp).await;
        assert_eq!(json["state"]["reqId"], "abc");
    }

    #[tokio::test]
    async fn custom_expose_header_is_written_exactly_once() {
        let options = RequestIdOptions::builder().expose_header("X-Kasa-Req-Id").build().unwrap();
        let resp = app(options).oneshot(get_req("/")).await.unwrap();

        let values: Vec<_> = resp.headers().get_all("x-kasa-req-id").iter().collect();
        assert_eq!(values.len(), 1);
        assert!(resp.headers().get("x-request-id").is_none());

        let exposed = values[0].to_str().unwrap().to_owned();
        let json = body_json(resp).await;
        assert_eq!(json["state"]["reqId"], exposed);
    }

    #[tokio::test]
    async fn handler_set_header_is_not_overwritten() {
        let resp = app(RequestIdOptions::default())
            .oneshot(
                Request::get("/own-header")
                    .header("x-request-id", "incoming")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let values: Vec<_> = resp.headers().get_all("x-request-id").iter().collect();
        assert_eq!(values, ["set-by-handler"]);
    }

    #[tokio::test]
    async fn unencodable_query_id_is_stored_but_not_exposed() {
        let options = RequestIdOptions::builder().query_source("rid").build().unwrap();
        let resp = app(options).oneshot(get_req("/?rid=line%0Abreak")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get("x-request-id").is_none());
        let json = body_json(resp).await;
        assert_eq!(json["state"]["reqId"], "line\nbreak");
    }

    // -----------------------------------------------------------------------
    // State bag and pass-through
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn custom_state_property_name() {
        let options = RequestIdOptions::builder()
            .state_property_name("correlationId")
            .generator(|| "cid-1".to_owned())
            .build()
            .unwrap();
        let resp = app(options).oneshot(get_req("/")).await.unwrap();

        let json = body_json(resp).await;
        assert_eq!(json["state"], json!({ "correlationId": "cid-1" }));
    }

    #[tokio::test]
    async fn existing_state_entries_survive() {
        async fn seed_state(mut req: axum::extract::Request, next: Next) -> Response {
            let mut state = RequestState::default();
            state.insert("user", "alice");
            req.extensions_mut().insert(state);
            next.run(req).await
        }

        let options = RequestIdOptions::builder().generator(|| "rid".to_owned()).build().unwrap();
        // Added last, so `seed_state` wraps and runs before the id middleware.
        let app = app(options).layer(middleware::from_fn(seed_state));
        let resp = app.oneshot(get_req("/")).await.unwrap();

        let json = body_json(resp).await;
        assert_eq!(json["state"], json!({ "user": "alice", "reqId": "rid" }));
    }

    #[tokio::test]
    async fn downstream_status_passes_through() {
        let resp = app(RequestIdOptions::default()).oneshot(get_req("/teapot")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
        assert!(resp.headers().get("x-request-id").is_some());
    }

    #[tokio::test]
    async fn panicking_generator_propagates_without_fallback() {
        let reached = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&reached);
        let options = RequestIdOptions::builder()
            .generator(|| panic!("generator exhausted"))
            .build()
            .unwrap();
        let app = Router::new()
            .route(
                "/",
                get(move |state: Option<Extension<RequestState>>| async move {
                    if state.is_some() {
                        seen.fetch_add(1, Ordering::SeqCst);
                    }
                    StatusCode::OK
                }),
            )
            .layer(middleware::from_fn_with_state(
                Arc::new(options),
                request_id_middleware,
            ));

        let err = tokio::spawn(app.oneshot(get_req("/")))
            .await
            .expect_err("the generator panic must reach the caller");
        assert!(err.is_panic());
        let payload = err.into_panic();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"generator exhausted"));
        assert_eq!(reached.load(Ordering::SeqCst), 0, "no id may be stored or passed on");
    }

    #[tokio::test]
    async fn non_ascii_header_id_is_kept_and_exposed() {
        let resp = app(RequestIdOptions::default())
            .oneshot(
                Request::get("/")
                    .header("x-request-id", HeaderValue::from_bytes("réq-1".as_bytes()).unwrap())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.headers().get("x-request-id").unwrap().as_bytes(), "réq-1".as_bytes());
        let json = body_json(resp).await;
        assert_eq!(json["state"]["reqId"], "réq-1");
    }

    #[test]
    fn id_source_display() {
        assert_eq!(IdSource::Query.to_string(), "query");
        assert_eq!(IdSource::Header.to_string(), "header");
        assert_eq!(IdSource::Generated.to_string(), "generated");
    }

    #[test]
    fn request_id_display_is_raw_value() {
        let id = RequestId("abc".into());
        assert_eq!(id.to_string(), "abc");
        assert_eq!(id.as_str(), "abc");
    }
}
