use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use reqid_gateway::{
    api,
    config::{Config, LogFormat},
    RequestIdOptions,
};
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // When invoked as a Docker HEALTHCHECK, hit /healthz and exit immediately.
    if std::env::args().nth(1).as_deref() == Some("--healthcheck") {
        return healthcheck().await;
    }

    let (config, options) = load_config()?;

    init_tracing(&config);

    info!(
        port = config.server.port,
        query_source = ?options.query_source(),
        header_source = ?options.header_source(),
        expose_header = ?options.expose_header(),
        state_property = options.state_property_name(),
        generator = %config.request_id.generator,
        "reqid-gateway starting"
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    let app = api::router(Arc::new(options));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

fn load_config() -> anyhow::Result<(Config, RequestIdOptions)> {
    let config_path = std::env::var("REQID_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/etc/reqid-gateway/config.toml"));

    Config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        config
            .server
            .log_level
            .as_deref()
            .unwrap_or("reqid_gateway=info,tower_http=warn")
            .into()
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.server.log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

/// Lightweight healthcheck: GET /healthz and exit 0 on 200, 1 otherwise.
///
/// Probes the configured `[server] port`; `REQID_PORT` overrides it.
async fn healthcheck() -> anyhow::Result<()> {
    let (config, _) = load_config()?;
    let port = config
        .server
        .healthcheck_port(std::env::var("REQID_PORT").ok().as_deref());

    let url = format!("http://127.0.0.1:{port}/healthz");
    let resp = reqwest::get(&url).await?;

    if resp.status().is_success() {
        std::process::exit(0);
    } else {
        std::process::exit(1);
    }
}
