//! Demo endpoints and router assembly.
//!
//! # Design
//! Handlers are free functions registered in `app()`; none of them share
//! state beyond the www root threaded to the static fallback. Generated
//! payloads are streamed from cheaply cloned chunks so a large response
//! never exists as one allocation. Bad size arguments render an inline HTML
//! fragment with status 200 rather than an HTTP error, matching the
//! user-facing soft-error policy of the upload endpoint.

use std::convert::Infallible;
use std::path::PathBuf;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Path};
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use futures::Stream;

use crate::static_files;
use crate::upload;

/// Number of image references emitted by `/demo/tiles`.
pub const TILE_COUNT: usize = 200;

const BYTES_PER_MIB: u64 = 1024 * 1024;

/// A small 40x40 PNG.
pub const TILE_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x28, 0x00, 0x00, 0x00, 0x28, 0x01, 0x03, 0x00, 0x00, 0x00, 0xb6,
    0x30, 0x2a, 0x2e, 0x00, 0x00, 0x00, 0x03, 0x50, 0x4c, 0x54, 0x45, 0x5a, 0xc3, 0x5a, 0xad,
    0x38, 0xaa, 0xdb, 0x00, 0x00, 0x00, 0x0b, 0x49, 0x44, 0x41, 0x54, 0x78, 0x01, 0x63, 0x18,
    0x61, 0x00, 0x00, 0x00, 0xf0, 0x00, 0x01, 0xe2, 0xb8, 0x75, 0x22, 0x00, 0x00, 0x00, 0x00,
    0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

const SIZE_ERROR_PAGE: &str =
    "<html><body><p>Value not allowed! Insert only integers.</p></body></html>";

/// Build the demo router. `www_root` feeds the static file fallback.
pub fn app(www_root: PathBuf) -> Router {
    Router::new()
        .route("/demo/tile", get(tile))
        .route("/demo/tiles", get(tiles))
        .route("/demo/echo", get(echo).post(echo))
        .route("/demo/big/{n}", get(big))
        .route(
            "/demo/upload",
            get(upload::upload_form).post(upload::accept_upload),
        )
        .fallback(static_files::serve)
        // Uploads and echoes may be large; the ingestor enforces its own cap
        // on top of this.
        .layer(DefaultBodyLimit::max(upload::MAX_UPLOAD_BYTES))
        .with_state(www_root)
}

/// Router for the optional diagnostics listener.
pub fn diagnostics_app() -> Router {
    Router::new().route("/healthz", get(|| async { "ok" }))
}

async fn tile() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], TILE_PNG)
}

async fn tiles() -> Html<String> {
    let mut page = String::with_capacity(64 * TILE_COUNT);
    page.push_str("<html><head><style>img{width:40px;height:40px;}</style></head><body>");
    for i in 0..TILE_COUNT {
        page.push_str(&format!(r#"<img src="/demo/tile?cachebust={i}">"#));
    }
    page.push_str("</body></html>");
    Html(page)
}

async fn echo(body: Bytes) -> Bytes {
    body
}

async fn big(Path(size): Path<String>) -> Response {
    // A size whose byte count does not fit in u64 is as bad as a non-number.
    let total = size
        .parse::<u64>()
        .ok()
        .and_then(|mebibytes| mebibytes.checked_mul(BYTES_PER_MIB));

    match total {
        None => Html(SIZE_ERROR_PAGE).into_response(),
        Some(total) => {
            tracing::debug!(bytes = total, "generating payload");
            (
                [(header::CONTENT_TYPE, "application/octet-stream")],
                Body::from_stream(zero_chunks(total)),
            )
                .into_response()
        }
    }
}

static ZERO_CHUNK: [u8; 64 * 1024] = [0; 64 * 1024];

/// Yields exactly `total` zero bytes by re-slicing one shared chunk.
fn zero_chunks(total: u64) -> impl Stream<Item = Result<Bytes, Infallible>> {
    let chunk = Bytes::from_static(&ZERO_CHUNK);
    futures::stream::unfold(total, move |remaining| {
        let chunk = chunk.clone();
        async move {
            if remaining == 0 {
                return None;
            }
            let n = remaining.min(chunk.len() as u64) as usize;
            Some((Ok(chunk.slice(..n)), remaining - n as u64))
        }
    })
}
