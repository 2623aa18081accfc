//! Per-request state bag.
//!
//! Middleware links share loosely-typed data with each other and with the
//! final handler through a single [`RequestState`] request extension. Each link
//! adds its own keys and leaves the rest alone.

use std::collections::HashMap;

use axum::http::Extensions;
use serde::Serialize;
use serde_json::Value;

/// String-keyed bag stored as a request extension.
///
/// Handlers read it with `Extension<RequestState>`:
/// ```rust,ignore
/// async fn handler(Extension(state): Extension<RequestState>) { ... }
/// ```
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(transparent)]
pub struct RequestState(HashMap<String, Value>);

impl RequestState {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Convenience for string entries such as the request id.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Set `key` on the bag already attached to `extensions`, creating the bag
    /// if no earlier link has.
    pub fn set_in(extensions: &mut Extensions, key: &str, value: impl Into<Value>) {
        match extensions.get_mut::<RequestState>() {
            Some(state) => state.insert(key, value),
            None => {
                let mut state = RequestState::default();
                state.insert(key, value);
                extensions.insert(state);
            }
        }
    }
}
