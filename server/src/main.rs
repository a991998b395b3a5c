use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use demo_server::config::{ServerConfig, TransportMode};
use demo_server::listener::ListenerSet;
use demo_server::{diagnostics_app, tls};

/// Serve the demo endpoints on one or more bind addresses.
#[derive(Debug, Parser)]
#[command(name = "demo-server")]
struct Args {
    /// Addresses to bind to; repeatable or comma-separated.
    #[arg(short, long, value_delimiter = ',', value_name = "ADDR")]
    bind: Vec<String>,

    /// Root directory for static files.
    #[arg(long, default_value = "/var/www", value_name = "DIR")]
    www: PathBuf,

    /// Serve cleartext TCP instead of the encrypted transport.
    #[arg(long)]
    tcp: bool,

    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,

    /// PEM certificate chain for the encrypted mode.
    #[arg(long, value_name = "PEM", requires = "key")]
    cert: Option<PathBuf>,

    /// PEM private key for the encrypted mode.
    #[arg(long, value_name = "PEM", requires = "cert")]
    key: Option<PathBuf>,

    /// Start the diagnostics listener on this address.
    #[arg(long, value_name = "ADDR")]
    diagnostics: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let mode = if args.tcp {
        TransportMode::Tcp
    } else {
        TransportMode::Tls
    };

    let tls_config = match (&args.cert, &args.key) {
        (Some(cert), Some(key)) => {
            Some(tls::server_config(cert, key).context("failed to load TLS material")?)
        }
        _ => None,
    };
    if mode == TransportMode::Tls && tls_config.is_none() {
        bail!("encrypted mode requires --cert and --key; pass --tcp for the cleartext fallback");
    }

    let config = ServerConfig {
        binds: args.bind,
        www_root: args.www,
        mode,
        diagnostics: args.diagnostics,
    };

    if let Some(addr) = &config.diagnostics {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("cannot bind diagnostics listener on {addr}"))?;
        tracing::info!(%addr, "diagnostics listener up");
        tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, diagnostics_app()).await {
                tracing::error!(error = %err, "diagnostics listener failed");
            }
        });
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    let app = demo_server::app(config.www_root.clone());
    let outcomes = ListenerSet::new(&config, tls_config)
        .serve(app, shutdown_rx)
        .await;

    let failed = outcomes
        .iter()
        .filter(|outcome| outcome.result.is_err())
        .count();
    for outcome in &outcomes {
        if let Err(err) = &outcome.result {
            tracing::error!(addr = %outcome.addr, error = %err, "binding ended with error");
        }
    }
    if failed == outcomes.len() && !outcomes.is_empty() {
        bail!("all {} binding(s) failed", outcomes.len());
    }
    Ok(())
}
