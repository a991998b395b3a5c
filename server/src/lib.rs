//! Demo server: synthetic endpoints over independently supervised listeners.
//!
//! # Overview
//! Serves a fixed handler set — a small image, a page referencing it many
//! times, a body echo, generated large payloads, digested file uploads, and
//! static files — on one or more bind addresses at once. Bindings run as
//! independent tasks; one failing does not stop the others.
//!
//! # Design
//! - `app()` builds the whole router up front; handler registration happens
//!   once and is read-only while listeners run.
//! - Uploads and generated downloads stream in bounded chunks, so memory use
//!   does not scale with payload size.
//! - Transport security below the HTTP layer is confined to `tls` and the
//!   listener accept path.

pub mod config;
pub mod listener;
pub mod routes;
pub mod static_files;
pub mod tls;
pub mod upload;

pub use config::{ServerConfig, TransportMode, DEFAULT_BIND};
pub use listener::{BindingOutcome, ListenError, ListenerSet};
pub use routes::{app, diagnostics_app, TILE_COUNT, TILE_PNG};

use std::io;

use tokio::net::TcpListener;

/// Serve the demo app on an already-bound listener until the task is
/// dropped. Convenience for tests and embedders; production startup goes
/// through `ListenerSet`.
pub async fn run(listener: TcpListener, www_root: std::path::PathBuf) -> io::Result<()> {
    axum::serve(listener, app(www_root)).await
}
