mod calendar;
mod cli;
mod config;
mod crontab;
mod durfmt;
mod error;
mod provider;
mod registry;
mod server;
mod snooze;
mod time_source;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::Cli;
use crate::registry::Registry;
use crate::time_source::SystemClock;

const DEFAULT_HTTP_ADDR: &str = ":8080";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = config::load(&cli.config).with_context(|| format!("loading config from {}", cli.config.display()))?;
    info!(config_path = %cli.config.display(), checks = config.checks.len(), "config loaded");

    let clock = Arc::new(SystemClock);
    let registry = Arc::new(
        Registry::setup(&config, clock)
            .await
            .context("arming checks at startup")?,
    );
    info!("all checks armed");

    let cancel = CancellationToken::new();
    let state = server::AppState { registry, cancel: cancel.clone() };
    let app = server::build_router(state);

    let addr_str = cli
        .http_addr
        .clone()
        .or(config.server.bind_address.clone())
        .unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string());
    let addr = parse_listen_addr(&addr_str).with_context(|| format!("invalid --http.addr {addr_str:?}"))?;

    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await
        .context("serving HTTP")?;

    Ok(())
}

/// Parses a `HOST:PORT` listen address, defaulting the host to `0.0.0.0`
/// when omitted (the `":8080"` shorthand Go's `net/http` accepts).
fn parse_listen_addr(s: &str) -> Result<SocketAddr> {
    if let Some(port) = s.strip_prefix(':') {
        let port: u16 = port.parse().with_context(|| format!("invalid port in {s:?}"))?;
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }
    s.parse().with_context(|| format!("parsing socket address {s:?}"))
}

/// Waits for SIGINT/SIGTERM (or an internal cancellation) and signals the
/// `axum` server to stop accepting new connections and drain in-flight
/// check-ins, the way `daemon::run` installs a shutdown hook in the
/// teacher crate (`spec.md` §1: graceful shutdown is out of scope for the
/// engine itself but still required of the binary).
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received, draining in-flight check-ins");
    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_port_as_any_interface() {
        let addr = parse_listen_addr(":8080").unwrap();
        assert_eq!(addr, SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080));
    }

    #[test]
    fn parses_explicit_host_and_port() {
        let addr = parse_listen_addr("127.0.0.1:9090").unwrap();
        assert_eq!(addr.port(), 9090);
    }
}
