//! Listener set supervision tests over real sockets.
//!
//! # Design
//! Starts the listener set on ephemeral ports, learns the bound addresses
//! through the notify channel, and exercises failure isolation: a bad
//! sibling binding must be reported without taking the healthy one down.

use std::path::PathBuf;

use tokio::sync::{mpsc, watch};

use demo_server::config::{ServerConfig, TransportMode};
use demo_server::listener::{ListenError, ListenerSet};
use demo_server::{app, TILE_PNG};

fn test_config(binds: Vec<String>, mode: TransportMode) -> ServerConfig {
    ServerConfig {
        binds,
        www_root: std::env::temp_dir(),
        mode,
        diagnostics: None,
    }
}

#[tokio::test]
async fn sibling_keeps_serving_after_a_failed_bind() {
    let config = test_config(
        vec!["127.0.0.1:0".into(), "999.0.0.1:0".into()],
        TransportMode::Tcp,
    );
    let (bound_tx, mut bound_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let set = ListenerSet::new(&config, None).notify_bound(bound_tx);
    let serving = tokio::spawn(set.serve(app(config.www_root.clone()), shutdown_rx));

    // Step 1: the valid binding comes up and reports its ephemeral port.
    let local = bound_rx.recv().await.expect("valid binding reports its address");

    // Step 2: it answers requests even though its sibling already failed.
    let body = reqwest::get(format!("http://{local}/demo/tile"))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(&body[..], TILE_PNG);

    // Step 3: shut down; serve returns one outcome per configured binding.
    shutdown_tx.send(true).unwrap();
    let outcomes = serving.await.unwrap();
    assert_eq!(outcomes.len(), 2);

    let good = outcomes.iter().find(|o| o.addr == "127.0.0.1:0").unwrap();
    assert!(good.result.is_ok());

    let bad = outcomes.iter().find(|o| o.addr == "999.0.0.1:0").unwrap();
    assert!(matches!(bad.result, Err(ListenError::Bind { .. })));
}

#[tokio::test]
async fn all_bindings_terminate_on_shutdown() {
    let config = test_config(
        vec!["127.0.0.1:0".into(), "127.0.0.1:0".into(), "127.0.0.1:0".into()],
        TransportMode::Tcp,
    );
    let (bound_tx, mut bound_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let set = ListenerSet::new(&config, None).notify_bound(bound_tx);
    let serving = tokio::spawn(set.serve(app(config.www_root.clone()), shutdown_rx));

    for _ in 0..3 {
        bound_rx.recv().await.expect("each binding reports its address");
    }

    shutdown_tx.send(true).unwrap();
    let outcomes = serving.await.unwrap();
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| o.result.is_ok()));
}

#[tokio::test]
async fn encrypted_mode_without_material_fails_every_binding() {
    let config = test_config(
        vec!["127.0.0.1:0".into(), "127.0.0.1:0".into()],
        TransportMode::Tls,
    );
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let outcomes = ListenerSet::new(&config, None)
        .serve(app(config.www_root.clone()), shutdown_rx)
        .await;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o.result, Err(ListenError::MissingTlsConfig))));
}
