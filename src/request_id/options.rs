//! Immutable middleware configuration.
//!
//! [`RequestIdOptions`] is built once at setup (directly via
//! [`RequestIdOptions::default`], through [`RequestIdOptionsBuilder`], or from
//! the `[request_id]` config section) and shared read-only across requests as
//! an `Arc<RequestIdOptions>`.
//!
//! | option                | default        |
//! |-----------------------|----------------|
//! | `query_source`        | none           |
//! | `header_source`       | `X-Request-Id` |
//! | `expose_header`       | `X-Request-Id` |
//! | `generator`           | UUID v4        |
//! | `state_property_name` | `reqId`        |

use std::{collections::HashMap, fmt, sync::Arc};

use axum::{
    extract::Query,
    http::{HeaderMap, HeaderName, Uri},
};

use super::generator::{self, Generator};
use super::IdSource;
use crate::error::RequestIdError;

/// Header used for both lookup and exposure unless configured otherwise.
pub const DEFAULT_HEADER: &str = "x-request-id";

/// Key under which the id lands in the [`RequestState`](super::RequestState) bag.
pub const DEFAULT_STATE_PROPERTY: &str = "reqId";

/// Where to read an incoming id, how to make a new one, and where to put it.
#[derive(Clone)]
pub struct RequestIdOptions {
    query_source: Option<String>,
    header_source: Option<HeaderName>,
    expose_header: Option<HeaderName>,
    generator: Generator,
    state_property_name: String,
}

impl Default for RequestIdOptions {
    fn default() -> Self {
        Self {
            query_source: None,
            header_source: Some(HeaderName::from_static(DEFAULT_HEADER)),
            expose_header: Some(HeaderName::from_static(DEFAULT_HEADER)),
            generator: Arc::new(generator::uuid_v4),
            state_property_name: DEFAULT_STATE_PROPERTY.to_owned(),
        }
    }
}

impl fmt::Debug for RequestIdOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestIdOptions")
            .field("query_source", &self.query_source)
            .field("header_source", &self.header_source)
            .field("expose_header", &self.expose_header)
            .field("generator", &"<fn>")
            .field("state_property_name", &self.state_property_name)
            .finish()
    }
}

impl RequestIdOptions {
    pub fn builder() -> RequestIdOptionsBuilder {
        RequestIdOptionsBuilder::default()
    }

    pub fn query_source(&self) -> Option<&str> {
        self.query_source.as_deref()
    }

    pub fn header_source(&self) -> Option<&HeaderName> {
        self.header_source.as_ref()
    }

    pub fn expose_header(&self) -> Option<&HeaderName> {
        self.expose_header.as_ref()
    }

    pub fn state_property_name(&self) -> &str {
        &self.state_property_name
    }

    /// Pick the id for one request.
    ///
    /// Lookup order, first non-empty value wins:
    /// 1. the `query_source` query parameter, if configured
    /// 2. the `header_source` request header, if configured
    /// 3. a fresh id from the generator
    ///
    /// Caller-supplied values are returned verbatim. Each source is consulted
    /// at most once and later sources are skipped entirely once one matches.
    pub fn resolve(&self, uri: &Uri, headers: &HeaderMap) -> (String, IdSource) {
        if let Some(id) = self.from_query(uri) {
            return (id, IdSource::Query);
        }
        if let Some(id) = self.from_header(headers) {
            return (id, IdSource::Header);
        }
        ((self.generator)(), IdSource::Generated)
    }

    fn from_query(&self, uri: &Uri) -> Option<String> {
        let name = self.query_source.as_deref()?;
        // A query string that fails to parse counts as "no id supplied".
        let Query(mut params) = Query::<HashMap<String, String>>::try_from_uri(uri).ok()?;
        params.remove(name).filter(|v| !v.is_empty())
    }

    fn from_header(&self, headers: &HeaderMap) -> Option<String> {
        let name = self.header_source.as_ref()?;
        // Any UTF-8 value is taken as-is; `to_str` would also drop non-ASCII ids.
        headers
            .get(name)
            .and_then(|v| std::str::from_utf8(v.as_bytes()).ok())
            .filter(|v| !v.is_empty())
            .map(String::from)
    }
}

/// Builder for [`RequestIdOptions`].
///
/// Header names are parsed in [`build`](Self::build), so a typo surfaces at
/// setup time instead of on the first request.
pub struct RequestIdOptionsBuilder {
    query_source: Option<String>,
    header_source: Option<String>,
    expose_header: Option<String>,
    generator: Generator,
    state_property_name: String,
}

impl Default for RequestIdOptionsBuilder {
    fn default() -> Self {
        Self {
            query_source: None,
            header_source: Some(DEFAULT_HEADER.to_owned()),
            expose_header: Some(DEFAULT_HEADER.to_owned()),
            generator: Arc::new(generator::uuid_v4),
            state_property_name: DEFAULT_STATE_PROPERTY.to_owned(),
        }
    }
}

impl RequestIdOptionsBuilder {
    /// Check this query parameter before any header.
    pub fn query_source(mut self, name: impl Into<String>) -> Self {
        self.query_source = Some(name.into());
        self
    }

    pub fn header_source(mut self, name: impl Into<String>) -> Self {
        self.header_source = Some(name.into());
        self
    }

    /// Never read the id from a request header.
    pub fn disable_header_source(mut self) -> Self {
        self.header_source = None;
        self
    }

    pub fn expose_header(mut self, name: impl Into<String>) -> Self {
        self.expose_header = Some(name.into());
        self
    }

    /// Never write the id into the response.
    pub fn disable_expose_header(mut self) -> Self {
        self.expose_header = None;
        self
    }

    pub fn generator<F>(mut self, f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.generator = Arc::new(f);
        self
    }

    pub fn shared_generator(mut self, generator: Generator) -> Self {
        self.generator = generator;
        self
    }

    pub fn state_property_name(mut self, name: impl Into<String>) -> Self {
        self.state_property_name = name.into();
        self
    }

    pub fn build(self) -> Result<RequestIdOptions, RequestIdError> {
        if self.state_property_name.is_empty() {
            return Err(RequestIdError::EmptyStateProperty);
        }
        if matches!(self.query_source.as_deref(), Some("")) {
            return Err(RequestIdError::EmptyQuerySource);
        }

        Ok(RequestIdOptions {
            query_source: self.query_source,
            header_source: self.header_source.as_deref().map(parse_header).transpose()?,
            expose_header: self.expose_header.as_deref().map(parse_header).transpose()?,
            generator: self.generator,
            state_property_name: self.state_property_name,
        })
    }
}

fn parse_header(name: &str) -> Result<HeaderName, RequestIdError> {
    HeaderName::try_from(name).map_err(|source| RequestIdError::InvalidHeaderName {
        name: name.to_owned(),
        source,
    })
}
