//! Error types for dispatched requests.
//!
//! # Design
//! `TimedOut` gets a dedicated variant because deadline expiry is a policy
//! signal (slow or stalled peer) rather than a broken connection, and callers
//! treat the two differently. Transport failures during connect/send are kept
//! separate from failures while draining an already-started response body so
//! a record shows how far the request got.

use thiserror::Error;

/// Errors captured into a `ResponseRecord` for a single request.
///
/// Non-2xx statuses are not errors; only transport and I/O failures are.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The per-request deadline expired before the response completed.
    #[error("request timed out")]
    TimedOut,

    /// The request could not be issued or the response never arrived.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),

    /// The response arrived but its body could not be read to the end.
    #[error("failed to read response body: {0}")]
    Body(reqwest::Error),

    /// The dispatched task itself died before producing an outcome.
    #[error("request task failed: {0}")]
    Task(String),
}

impl FetchError {
    /// Classify a reqwest error from the send path, splitting out timeouts.
    pub(crate) fn from_send(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::TimedOut
        } else {
            FetchError::Transport(err)
        }
    }

    /// Classify a reqwest error from the body-read path.
    pub(crate) fn from_body(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::TimedOut
        } else {
            FetchError::Body(err)
        }
    }
}
