//! Correlation-id middleware for axum.
//!
//! See [`request_id`] for the middleware itself. The [`api`] and [`config`]
//! modules back the `reqid-gateway` demo binary.

pub mod api;
pub mod config;
pub mod error;
pub mod request_id;

pub use config::Config;
pub use error::{AppError, RequestIdError};
pub use request_id::{
    request_id_middleware, IdSource, RequestId, RequestIdOptions, RequestIdOptionsBuilder,
    RequestState,
};
