//! Configuration types for reqid-gateway.
//!
//! Config is loaded once at startup from a TOML file and validated before the
//! server opens its port. Every field is optional; a missing file yields the
//! defaults.
//!
//! # Example
//! ```toml
//! [server]
//! port = 8080
//!
//! [request_id]
//! query_source        = "reqId"
//! header_source       = "X-Request-Id"
//! expose_header       = false
//! state_property_name = "reqId"
//! generator           = "uuid_simple"
//! ```

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    error::RequestIdError,
    request_id::{GeneratorKind, RequestIdOptions, DEFAULT_HEADER, DEFAULT_STATE_PROPERTY},
};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub request_id: RequestIdConfig,
}

impl Config {
    /// Read, parse and validate `path`.
    ///
    /// Returns the middleware options built during validation alongside the
    /// config, so callers never build them a second time.
    pub fn load(path: &Path) -> anyhow::Result<(Self, RequestIdOptions)> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: Self = toml::from_str(&content).context("parsing config TOML")?;
        let options = config.validate()?;
        Ok((config, options))
    }

    /// Like [`load`](Self::load), but a missing file means "all defaults".
    pub fn load_or_default(path: &Path) -> anyhow::Result<(Self, RequestIdOptions)> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();
            let options = config.validate()?;
            Ok((config, options))
        }
    }

    fn validate(&self) -> anyhow::Result<RequestIdOptions> {
        self.request_id
            .options()
            .context("invalid [request_id] section")
    }
}

/// Listener and logging settings for the demo server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Port to listen on (default: 8080).
    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Log level override (also controlled by `RUST_LOG` env var).
    #[serde(default)]
    pub log_level: Option<String>,

    #[serde(default)]
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Port `--healthcheck` probes: `REQID_PORT` when it parses, else `port`.
    pub fn healthcheck_port(&self, env_override: Option<&str>) -> u16 {
        env_override
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: defaults::port(),
            log_level: None,
            log_format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// A header option that accepts either a name or a boolean.
///
/// `false` disables the feature, `true` keeps the default header name.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum HeaderSetting {
    Enabled(bool),
    Named(String),
}

impl Default for HeaderSetting {
    fn default() -> Self {
        Self::Enabled(true)
    }
}

impl HeaderSetting {
    /// Header name this setting resolves to, or `None` when disabled.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Enabled(true) => Some(DEFAULT_HEADER),
            Self::Enabled(false) => None,
            Self::Named(name) => Some(name),
        }
    }
}

/// The `[request_id]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestIdConfig {
    /// Query parameter checked before any header. Unset by default.
    #[serde(default)]
    pub query_source: Option<String>,

    /// Request header carrying a caller-supplied id (default: `X-Request-Id`).
    #[serde(default)]
    pub header_source: HeaderSetting,

    /// Response header the id is echoed in (default: `X-Request-Id`).
    #[serde(default)]
    pub expose_header: HeaderSetting,

    /// Key of the id in the per-request state bag (default: `reqId`).
    #[serde(default = "defaults::state_property_name")]
    pub state_property_name: String,

    #[serde(default)]
    pub generator: GeneratorKind,
}

impl Default for RequestIdConfig {
    fn default() -> Self {
        Self {
            query_source: None,
            header_source: HeaderSetting::default(),
            expose_header: HeaderSetting::default(),
            state_property_name: defaults::state_property_name(),
            generator: GeneratorKind::default(),
        }
    }
}

impl RequestIdConfig {
    /// Build the middleware options this section describes.
    pub fn options(&self) -> Result<RequestIdOptions, RequestIdError> {
        let mut builder = RequestIdOptions::builder()
            .shared_generator(self.generator.generator())
            .state_property_name(self.state_property_name.as_str());

        if let Some(query) = &self.query_source {
            builder = builder.query_source(query.as_str());
        }
        builder = match self.header_source.name() {
            Some(name) => builder.header_source(name),
            None => builder.disable_header_source(),
        };
        builder = match self.expose_header.name() {
            Some(name) => builder.expose_header(name),
            None => builder.disable_expose_header(),
        };

        builder.build()
    }
}

mod defaults {
    pub fn port() -> u16 { 8080 }
    pub fn state_property_name() -> String { super::DEFAULT_STATE_PROPERTY.to_owned() }
}
