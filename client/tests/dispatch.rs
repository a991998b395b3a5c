//! Dispatcher tests against the live demo server.
//!
//! # Design
//! Starts the server on a random port, then drives the dispatcher over real
//! HTTP. Validates the one-record-per-target invariant, failure isolation
//! across concurrent targets, and the streamed POST round-trip end to end.

use std::net::SocketAddr;
use std::time::Duration;

use sha2::{Digest, Sha256};

use demo_client::{BodyCapture, Dispatcher, FetchError, Target};

async fn start_server() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(demo_server::run(listener, std::env::temp_dir()));
    addr
}

fn dispatcher(capture: BodyCapture) -> Dispatcher {
    Dispatcher::new(reqwest::Client::new(), capture, None)
}

#[tokio::test]
async fn three_targets_produce_three_records() {
    let addr = start_server().await;
    let targets = vec![
        Target::get(format!("http://{addr}/demo/tile")),
        Target::get(format!("http://{addr}/demo/tiles")),
        Target::get(format!("http://{addr}/demo/big/1")),
    ];

    let records = dispatcher(BodyCapture::Full).fetch_all(targets).await;

    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.is_success()));

    // Records arrive in completion order; find the big download by URL.
    let big = records
        .iter()
        .find(|r| r.target.url.ends_with("/demo/big/1"))
        .unwrap();
    let body = big.outcome.as_ref().unwrap();
    assert_eq!(body.len, 1_048_576);
    assert_eq!(body.body.as_ref().unwrap().len(), 1_048_576);
}

#[tokio::test]
async fn one_unreachable_target_does_not_poison_the_run() {
    let addr = start_server().await;
    let targets = vec![
        Target::get(format!("http://{addr}/demo/tile")),
        // Port 1 is never listening; connection must be refused.
        Target::get("http://127.0.0.1:1/demo/tile"),
        Target::get(format!("http://{addr}/demo/tiles")),
    ];

    let records = dispatcher(BodyCapture::Full).fetch_all(targets).await;

    assert_eq!(records.len(), 3, "no target may be silently dropped");
    let failures: Vec<_> = records.iter().filter(|r| !r.is_success()).collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].target.url.starts_with("http://127.0.0.1:1/"));
}

#[tokio::test]
async fn quiet_mode_counts_without_retaining_bodies() {
    let addr = start_server().await;
    let targets = vec![Target::get(format!("http://{addr}/demo/big/2"))];

    let records = dispatcher(BodyCapture::Count).fetch_all(targets).await;

    assert_eq!(records.len(), 1);
    let body = records[0].outcome.as_ref().unwrap();
    assert_eq!(body.len, 2 * 1_048_576);
    assert!(body.body.is_none());
}

#[tokio::test]
async fn streamed_post_round_trips_the_digest() {
    let addr = start_server().await;

    let record = dispatcher(BodyCapture::Full)
        .post_generated(&format!("http://{addr}/demo/upload"), 2)
        .await;

    let body = record.outcome.as_ref().expect("upload must succeed");
    let digest = String::from_utf8(body.body.as_ref().unwrap().to_vec()).unwrap();

    let expected: String = Sha256::digest(vec![0u8; 2 * 1024 * 1024])
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect();
    assert_eq!(digest, expected);
}

/// Accepts connections and never answers, holding each socket open.
async fn start_stalled_listener() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    addr
}

#[tokio::test]
async fn deadline_expiry_becomes_timed_out_without_stalling_siblings() {
    let addr = start_server().await;
    let stalled = start_stalled_listener().await;

    let dispatcher = Dispatcher::new(
        reqwest::Client::new(),
        BodyCapture::Full,
        Some(Duration::from_millis(250)),
    );
    let targets = vec![
        Target::get(format!("http://{addr}/demo/tile")),
        Target::get(format!("http://{stalled}/demo/tile")),
    ];

    let records = dispatcher.fetch_all(targets).await;

    assert_eq!(records.len(), 2);
    let timed_out = records
        .iter()
        .find(|r| r.target.url.starts_with(&format!("http://{stalled}")))
        .unwrap();
    assert!(matches!(timed_out.outcome, Err(FetchError::TimedOut)));

    let healthy = records
        .iter()
        .find(|r| r.target.url.starts_with(&format!("http://{addr}")))
        .unwrap();
    assert!(healthy.is_success(), "the live target must still complete");
}

#[tokio::test]
async fn non_2xx_statuses_are_not_errors() {
    let addr = start_server().await;
    let targets = vec![Target::get(format!("http://{addr}/no-such-file.html"))];

    let records = dispatcher(BodyCapture::Full).fetch_all(targets).await;

    assert_eq!(records.len(), 1);
    assert!(records[0].is_success(), "a 404 is still a completed request");
}
