//! Request targets and per-request outcome records.
//!
//! # Design
//! A `Target` is immutable once handed to the dispatcher, and every dispatch
//! produces exactly one `ResponseRecord` for it — success and failure both
//! land in the record's `outcome`, so a whole run can be inspected after the
//! join barrier instead of aborting on the first bad request. All fields use
//! owned types so records can be moved freely out of spawned tasks.

use bytes::Bytes;

use crate::error::FetchError;

/// One request destination plus its method parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub url: String,
    pub kind: TargetKind,
}

/// How a target is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Get,
    /// Streamed multipart POST of a generated payload of this many MiB.
    Post { mebibytes: u64 },
}

impl Target {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: TargetKind::Get,
        }
    }

    pub fn post(url: impl Into<String>, mebibytes: u64) -> Self {
        Self {
            url: url.into(),
            kind: TargetKind::Post { mebibytes },
        }
    }
}

/// Whether response bodies are retained or only counted.
///
/// `Count` is the quiet mode: the body is drained chunk by chunk and only its
/// length is recorded, so large downloads never accumulate in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyCapture {
    Count,
    Full,
}

/// Successfully read response body, per the active `BodyCapture` mode.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub len: u64,
    /// Present only under `BodyCapture::Full`.
    pub body: Option<Bytes>,
}

/// Result of one dispatched request. Created when the request completes and
/// never mutated afterwards.
#[derive(Debug)]
pub struct ResponseRecord {
    pub target: Target,
    pub outcome: Result<FetchedBody, FetchError>,
}

impl ResponseRecord {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}
