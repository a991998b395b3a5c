//! Bounded-memory upload ingestion.
//!
//! # Design
//! The file part is digested incrementally as its chunks stream in; the
//! reported part size is never trusted and no buffer is sized from it. A
//! running byte counter enforces the cap even when the surrounding body
//! limit is raised. Every non-fatal problem (no file part, undecodable
//! body, oversized part) falls back to the static upload form with status
//! 200 — these are user-facing slips, not server errors.

use std::fmt::Write;

use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::response::{Html, IntoResponse, Response};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Maximum accepted upload size: 1 GiB.
pub const MAX_UPLOAD_BYTES: usize = 1 << 30;

/// Field name carrying the uploaded file.
const UPLOAD_FIELD: &str = "uploadfile";

pub const UPLOAD_FORM: &str = r#"<html><body><form action="/demo/upload" method="post" enctype="multipart/form-data">
        <input type="file" name="uploadfile"><br>
        <input type="submit">
    </form></body></html>"#;

#[derive(Debug, Error)]
enum UploadError {
    #[error("multipart decode failed: {0}")]
    Decode(#[from] MultipartError),

    #[error("upload exceeds the {limit} byte limit")]
    TooLarge { limit: usize },
}

pub async fn upload_form() -> Html<&'static str> {
    Html(UPLOAD_FORM)
}

/// Accept a multipart POST and respond with the hex digest of the file part.
pub async fn accept_upload(multipart: Result<Multipart, MultipartRejection>) -> Response {
    let Ok(mut multipart) = multipart else {
        return Html(UPLOAD_FORM).into_response();
    };

    match digest_file_part(&mut multipart).await {
        Ok(Some(digest)) => digest.into_response(),
        Ok(None) => Html(UPLOAD_FORM).into_response(),
        Err(err) => {
            tracing::info!(error = %err, "error receiving upload");
            Html(UPLOAD_FORM).into_response()
        }
    }
}

/// Walk the fields until the upload field appears, digesting its chunks as
/// they arrive. `None` when the request carries no file part.
async fn digest_file_part(multipart: &mut Multipart) -> Result<Option<String>, UploadError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let mut hasher = Sha256::new();
        let mut total: u64 = 0;
        while let Some(chunk) = field.chunk().await? {
            total += chunk.len() as u64;
            if total > MAX_UPLOAD_BYTES as u64 {
                return Err(UploadError::TooLarge {
                    limit: MAX_UPLOAD_BYTES,
                });
            }
            hasher.update(&chunk);
        }

        tracing::debug!(bytes = total, "upload digested");
        return Ok(Some(lowercase_hex(&hasher.finalize())));
    }
    Ok(None)
}

fn lowercase_hex(digest: &[u8]) -> String {
    digest.iter().fold(String::with_capacity(digest.len() * 2), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_rendering_is_lowercase_and_padded() {
        assert_eq!(lowercase_hex(&[0x00, 0x0f, 0xa5, 0xff]), "000fa5ff");
    }

    #[test]
    fn empty_input_digest_matches_sha256() {
        let digest = Sha256::digest(b"");
        assert_eq!(
            lowercase_hex(&digest),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
