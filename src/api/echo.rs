//! `GET /` — reports the id the middleware assigned to this request.
//!
//! Handy for checking a deployment's `[request_id]` settings with curl:
//! ```text
//! $ curl -s -H 'X-Request-Id: abc' localhost:8080/
//! {"request_id":"abc","state":{"reqId":"abc"}}
//! ```

use axum::{Extension, Json};
use serde::Serialize;

use crate::{
    error::AppError,
    request_id::{RequestId, RequestState},
};

#[derive(Debug, Serialize)]
pub struct EchoResponse {
    pub request_id: String,
    pub state: RequestState,
}

pub async fn echo(
    request_id: Option<Extension<RequestId>>,
    state: Option<Extension<RequestState>>,
) -> Result<Json<EchoResponse>, AppError> {
    let Some(Extension(RequestId(id))) = request_id else {
        return Err(anyhow::anyhow!("request id middleware is not installed").into());
    };
    let state = state.map(|Extension(s)| s).unwrap_or_default();

    Ok(Json(EchoResponse { request_id: id, state }))
}
