//! Listener set supervision: one independent task per bind address.
//!
//! # Design
//! Every binding owns its socket and runs to its own completion; a bind or
//! serve failure is logged and recorded in that binding's outcome without
//! touching its siblings. `serve` returns only after the whole set has
//! terminated, yielding exactly one outcome per configured address. The
//! shutdown watch channel is observed at every accept/serve suspension
//! point, so a stalled peer cannot keep a binding alive past shutdown.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_rustls::rustls::ServerConfig as RustlsConfig;
use tokio_rustls::TlsAcceptor;

use crate::config::{ServerConfig, TransportMode};

#[derive(Debug, Error)]
pub enum ListenError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("listener on {addr} failed: {source}")]
    Serve {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("encrypted mode requires TLS material")]
    MissingTlsConfig,

    #[error("listener task failed: {0}")]
    Task(String),
}

/// Terminal state of one binding.
#[derive(Debug)]
pub struct BindingOutcome {
    pub addr: String,
    pub result: Result<(), ListenError>,
}

/// Supervises one listener task per configured bind address.
pub struct ListenerSet {
    binds: Vec<String>,
    mode: TransportMode,
    tls: Option<Arc<RustlsConfig>>,
    bound_tx: Option<mpsc::UnboundedSender<SocketAddr>>,
}

impl ListenerSet {
    pub fn new(config: &ServerConfig, tls: Option<Arc<RustlsConfig>>) -> Self {
        Self {
            binds: config.effective_binds(),
            mode: config.mode,
            tls,
            bound_tx: None,
        }
    }

    /// Publish each binding's local address once its socket is bound.
    /// Callers binding to port 0 use this to learn the ephemeral port.
    pub fn notify_bound(mut self, tx: mpsc::UnboundedSender<SocketAddr>) -> Self {
        self.bound_tx = Some(tx);
        self
    }

    /// Start every binding and block until all of them have terminated.
    ///
    /// Returns one outcome per configured address, in completion order.
    pub async fn serve(self, app: Router, shutdown: watch::Receiver<bool>) -> Vec<BindingOutcome> {
        if self.mode == TransportMode::Tls && self.tls.is_none() {
            return self
                .binds
                .into_iter()
                .map(|addr| BindingOutcome {
                    addr,
                    result: Err(ListenError::MissingTlsConfig),
                })
                .collect();
        }

        let mut set = JoinSet::new();
        let mut in_flight = HashMap::with_capacity(self.binds.len());
        for addr in self.binds {
            let app = app.clone();
            let mode = self.mode;
            let tls = self.tls.clone();
            let shutdown = shutdown.clone();
            let bound_tx = self.bound_tx.clone();
            let task_addr = addr.clone();
            let handle =
                set.spawn(
                    async move { run_binding(task_addr, app, mode, tls, shutdown, bound_tx).await },
                );
            in_flight.insert(handle.id(), addr);
        }

        let mut outcomes = Vec::with_capacity(in_flight.len());
        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((id, outcome)) => {
                    in_flight.remove(&id);
                    outcomes.push(outcome);
                }
                Err(err) => {
                    if let Some(addr) = in_flight.remove(&err.id()) {
                        outcomes.push(BindingOutcome {
                            addr,
                            result: Err(ListenError::Task(err.to_string())),
                        });
                    }
                }
            }
        }
        outcomes
    }
}

async fn run_binding(
    addr: String,
    app: Router,
    mode: TransportMode,
    tls: Option<Arc<RustlsConfig>>,
    shutdown: watch::Receiver<bool>,
    bound_tx: Option<mpsc::UnboundedSender<SocketAddr>>,
) -> BindingOutcome {
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(source) => {
            tracing::error!(%addr, error = %source, "bind failed");
            return BindingOutcome {
                result: Err(ListenError::Bind { addr: addr.clone(), source }),
                addr,
            };
        }
    };

    if let (Some(tx), Ok(local)) = (&bound_tx, listener.local_addr()) {
        let _ = tx.send(local);
    }
    tracing::info!(%addr, ?mode, "listening");

    let served = match mode {
        TransportMode::Tcp => serve_plain(listener, app, shutdown).await,
        // The mode check in `serve` guarantees the config is present.
        TransportMode::Tls => match tls {
            Some(tls) => serve_tls(listener, app, tls, shutdown).await,
            None => {
                return BindingOutcome {
                    addr,
                    result: Err(ListenError::MissingTlsConfig),
                }
            }
        },
    };

    let result = served.map_err(|source| {
        tracing::error!(%addr, error = %source, "listener failed");
        ListenError::Serve { addr: addr.clone(), source }
    });
    if result.is_ok() {
        tracing::info!(%addr, "listener stopped");
    }
    BindingOutcome { addr, result }
}

async fn serve_plain(
    listener: TcpListener,
    app: Router,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
}

/// Accept loop for the encrypted mode: handshake per connection, then serve
/// the router over the wrapped stream. Handshake and connection errors stay
/// scoped to their connection.
async fn serve_tls(
    listener: TcpListener,
    app: Router,
    tls: Arc<RustlsConfig>,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    let acceptor = TlsAcceptor::from(tls);
    loop {
        let (stream, peer) = tokio::select! {
            _ = shutdown.changed() => return Ok(()),
            accepted = listener.accept() => accepted?,
        };

        let acceptor = acceptor.clone();
        let app = app.clone();
        tokio::spawn(async move {
            let tls_stream = match acceptor.accept(stream).await {
                Ok(tls_stream) => tls_stream,
                Err(err) => {
                    tracing::debug!(%peer, error = %err, "TLS handshake failed");
                    return;
                }
            };

            let service = TowerToHyperService::new(app);
            if let Err(err) = hyper::server::conn::http1::Builder::new()
                .serve_connection(TokioIo::new(tls_stream), service)
                .await
            {
                tracing::debug!(%peer, error = %err, "connection closed with error");
            }
        });
    }
}
