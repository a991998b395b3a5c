//! Debug artifacts: TLS key log and the per-run trace file.
//!
//! Both are independent switches. The key log is created up front so a bad
//! path fails the run before any request is issued; the trace is assembled
//! in memory from finished records and written once after the join barrier.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use uuid::Uuid;

use crate::target::ResponseRecord;

/// Create (truncating) the key log file and export it for the TLS backend.
///
/// rustls's `KeyLogFile` reads `SSLKEYLOGFILE` at client construction, so
/// this must run before the HTTP client is built. The export goes through
/// `std::env::set_var`, so it also must run before the async runtime starts:
/// writing the environment while other threads read it is a race.
pub fn init_key_log(path: &Path) -> io::Result<()> {
    std::fs::File::create(path)?;
    std::env::set_var("SSLKEYLOGFILE", path);
    Ok(())
}

/// Trace of one client run, written as `client_<run-id>.qlog`.
#[derive(Debug, Serialize)]
pub struct RunTrace {
    run_id: String,
    events: Vec<TraceEvent>,
}

#[derive(Debug, Serialize)]
struct TraceEvent {
    url: String,
    method: &'static str,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl RunTrace {
    pub fn from_records(records: &[ResponseRecord]) -> Self {
        let events = records
            .iter()
            .map(|record| {
                let method = match record.target.kind {
                    crate::target::TargetKind::Get => "GET",
                    crate::target::TargetKind::Post { .. } => "POST",
                };
                match &record.outcome {
                    Ok(body) => TraceEvent {
                        url: record.target.url.clone(),
                        method,
                        success: true,
                        bytes: Some(body.len),
                        error: None,
                    },
                    Err(err) => TraceEvent {
                        url: record.target.url.clone(),
                        method,
                        success: false,
                        bytes: None,
                        error: Some(err.to_string()),
                    },
                }
            })
            .collect();

        Self {
            run_id: Uuid::new_v4().simple().to_string(),
            events,
        }
    }

    /// Write the trace next to the working directory and return its path.
    pub fn write(&self) -> io::Result<PathBuf> {
        let path = PathBuf::from(format!("client_{}.qlog", self.run_id));
        let json = serde_json::to_vec_pretty(self).map_err(io::Error::other)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}
