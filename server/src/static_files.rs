//! Catch-all static file handler rooted at the configured directory.
//!
//! Files stream out in fixed-size chunks straight from disk; nothing is read
//! ahead of the connection draining it. Path traversal components are
//! rejected before the filesystem is touched.

use std::io;
use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::Stream;
use tokio::io::AsyncReadExt;

const READ_CHUNK: usize = 64 * 1024;

/// Fallback handler serving files under the www root.
pub async fn serve(State(root): State<PathBuf>, uri: Uri) -> Response {
    let Some(mut path) = resolve(&root, uri.path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_dir() => path.push("index.html"),
        Ok(_) => {}
        Err(_) => return StatusCode::NOT_FOUND.into_response(),
    }

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "static file open failed");
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    (
        [(header::CONTENT_TYPE, content_type(&path))],
        Body::from_stream(file_chunks(file)),
    )
        .into_response()
}

/// Map a request path onto the root, refusing traversal components.
fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let mut resolved = root.to_path_buf();
    for part in request_path.split('/') {
        match part {
            "" | "." => continue,
            ".." => return None,
            part if part.contains('\\') => return None,
            part => resolved.push(part),
        }
    }
    Some(resolved)
}

fn file_chunks(file: tokio::fs::File) -> impl Stream<Item = io::Result<Bytes>> {
    futures::stream::try_unfold(file, |mut file| async move {
        let mut buf = vec![0u8; READ_CHUNK];
        let n = file.read(&mut buf).await?;
        if n == 0 {
            Ok(None)
        } else {
            buf.truncate(n);
            Ok(Some((Bytes::from(buf), file)))
        }
    })
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("js") => "text/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_components_are_rejected() {
        let root = Path::new("/srv/www");
        assert!(resolve(root, "/../etc/passwd").is_none());
        assert!(resolve(root, "/a/../../b").is_none());
        assert!(resolve(root, "/a\\b").is_none());
    }

    #[test]
    fn plain_paths_resolve_under_the_root() {
        let root = Path::new("/srv/www");
        assert_eq!(
            resolve(root, "/sub/page.html"),
            Some(PathBuf::from("/srv/www/sub/page.html"))
        );
        assert_eq!(resolve(root, "/"), Some(PathBuf::from("/srv/www")));
    }

    #[test]
    fn content_types_cover_the_demo_assets() {
        assert_eq!(content_type(Path::new("index.html")), "text/html; charset=utf-8");
        assert_eq!(content_type(Path::new("tile.png")), "image/png");
        assert_eq!(content_type(Path::new("blob.bin")), "application/octet-stream");
    }
}
