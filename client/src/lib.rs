//! Concurrent fetch client for the demo server.
//!
//! # Overview
//! Dispatches many GET requests in parallel, or a single streamed multipart
//! POST of a generated payload, and aggregates one `ResponseRecord` per
//! `Target`. Failures are captured per record; the whole run is inspectable
//! after the join barrier.
//!
//! # Design
//! - `Dispatcher` is cheap to clone and holds only the HTTP client plus run
//!   policy (body capture mode, per-request deadline).
//! - The multipart encoder streams through a bounded pipe so an encoded body
//!   never materializes in memory.
//! - The transport below (connection security, stream multiplexing) belongs
//!   to the HTTP client library; this crate only orchestrates on top of it.

pub mod diag;
pub mod dispatch;
pub mod error;
pub mod multipart;
pub mod target;

pub use dispatch::Dispatcher;
pub use error::FetchError;
pub use multipart::{StreamingForm, ZeroSource};
pub use target::{BodyCapture, FetchedBody, ResponseRecord, Target, TargetKind};
