//! Concurrent request dispatch and outcome aggregation.
//!
//! # Design
//! `fetch_all` spawns one task per target and waits on a `JoinSet` as the
//! join barrier, so the number of records returned always equals the number
//! of targets handed in. A failed request is captured into its own record;
//! sibling requests keep running and the caller decides after the barrier
//! whether the run as a whole failed. Completion order is whatever the
//! barrier yields — no ordering is guaranteed across targets.
//!
//! Tasks share nothing mutable: each owns its `Target` and produces its own
//! record, so the join barrier is the only synchronization in play.

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::error::FetchError;
use crate::multipart::{StreamingForm, ZeroSource};
use crate::target::{BodyCapture, FetchedBody, ResponseRecord, Target, TargetKind};

const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Field name the upload endpoint extracts; must match the server.
const UPLOAD_FIELD: &str = "uploadfile";

/// Issues requests for a set of targets and aggregates their outcomes.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    capture: BodyCapture,
    timeout: Option<Duration>,
}

impl Dispatcher {
    /// `timeout` is the per-request deadline; `None` means requests may run
    /// for as long as the peer keeps the connection alive.
    pub fn new(client: reqwest::Client, capture: BodyCapture, timeout: Option<Duration>) -> Self {
        Self {
            client,
            capture,
            timeout,
        }
    }

    /// Dispatch every target concurrently and return one record per target.
    ///
    /// Records arrive in completion order. A panicked task still yields a
    /// record for its target, carrying `FetchError::Task`.
    pub async fn fetch_all(&self, targets: Vec<Target>) -> Vec<ResponseRecord> {
        let mut set = JoinSet::new();
        let mut in_flight = HashMap::with_capacity(targets.len());

        for target in targets {
            let dispatcher = self.clone();
            let task_target = target.clone();
            let handle = set.spawn(async move { dispatcher.fetch_one(task_target).await });
            in_flight.insert(handle.id(), target);
        }

        let mut records = Vec::with_capacity(in_flight.len());
        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((id, record)) => {
                    in_flight.remove(&id);
                    records.push(record);
                }
                Err(err) => {
                    // The task never produced a record; synthesize one so the
                    // target is not silently dropped.
                    if let Some(target) = in_flight.remove(&err.id()) {
                        records.push(ResponseRecord {
                            target,
                            outcome: Err(FetchError::Task(err.to_string())),
                        });
                    }
                }
            }
        }
        records
    }

    /// Dispatch a single target and record its outcome.
    pub async fn fetch_one(&self, target: Target) -> ResponseRecord {
        let outcome = match target.kind {
            TargetKind::Get => self.run_get(&target.url).await,
            TargetKind::Post { mebibytes } => self.run_post(&target.url, mebibytes).await,
        };
        ResponseRecord { target, outcome }
    }

    /// Convenience wrapper for the single streamed-POST mode.
    pub async fn post_generated(&self, url: &str, mebibytes: u64) -> ResponseRecord {
        self.fetch_one(Target::post(url, mebibytes)).await
    }

    async fn run_get(&self, url: &str) -> Result<FetchedBody, FetchError> {
        tracing::info!(url, "GET");
        let mut request = self.client.get(url);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(FetchError::from_send)?;
        tracing::debug!(url, status = %response.status(), "response headers received");
        self.read_body(response).await
    }

    async fn run_post(&self, url: &str, mebibytes: u64) -> Result<FetchedBody, FetchError> {
        tracing::info!(url, mebibytes, "POST generated payload");
        let source = ZeroSource::new(mebibytes.saturating_mul(BYTES_PER_MIB));
        let form = StreamingForm::file_part(UPLOAD_FIELD, "test.bin", source);

        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, form.content_type().to_owned())
            .body(form.into_body());
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(FetchError::from_send)?;
        tracing::debug!(url, status = %response.status(), "response headers received");
        self.read_body(response).await
    }

    /// Drain the response body per the capture mode. `Count` never retains
    /// more than one chunk, so huge downloads stay cheap.
    async fn read_body(&self, mut response: reqwest::Response) -> Result<FetchedBody, FetchError> {
        match self.capture {
            BodyCapture::Full => {
                let body = response.bytes().await.map_err(FetchError::from_body)?;
                Ok(FetchedBody {
                    len: body.len() as u64,
                    body: Some(body),
                })
            }
            BodyCapture::Count => {
                let mut len = 0u64;
                while let Some(chunk) = response.chunk().await.map_err(FetchError::from_body)? {
                    len += chunk.len() as u64;
                }
                Ok(FetchedBody { len, body: None })
            }
        }
    }
}
