//! Error-budget tests: fetch failures against the sliding window

use super::*;
use std::sync::Arc;
use std::time::Duration;
use tunnerse::{
    CreateTunnel, Durability, EngineConfig, MemoryTunnelStore, SessionRegistry, TunnelStore,
};

fn governed_config() -> EngineConfig {
    // Reference governor (10 failures / 10 s), monitors silenced.
    let mut config = EngineConfig::default();
    config.healthcheck.initial_delay = Duration::from_secs(3600);
    config.ping.initial_delay = Duration::from_secs(3600);
    config
}

#[tokio::test]
async fn test_error_budget_exhaustion_closes_session() {
    init_test_logging();
    let broker = MockBroker::start().await;
    let echo = start_echo_server().await;
    let store = Arc::new(MemoryTunnelStore::new());
    let registry = SessionRegistry::new(store.clone(), governed_config());

    // Ten broker-side failures well inside the ten-second window.
    for _ in 0..10 {
        broker.queue_status(500);
    }

    registry
        .create(CreateTunnel {
            name: Some("flaky".to_string()),
            local_port: echo.port,
            broker_url: broker.url.clone(),
            durability: Durability::Persistent,
        })
        .await
        .expect("create should succeed");

    assert!(wait_until(|| registry.is_empty(), Duration::from_secs(10)).await);
    assert!(wait_until(|| broker.closes() >= 1, Duration::from_secs(5)).await);
    let record = store.record("flaky").await.unwrap().unwrap();
    assert!(!record.active);
}

#[tokio::test]
async fn test_failures_below_threshold_do_not_close() {
    init_test_logging();
    let broker = MockBroker::start().await;
    let echo = start_echo_server().await;
    let registry = SessionRegistry::new(Arc::new(MemoryTunnelStore::new()), governed_config());

    // Nine failures, then a real request: the budget is never exhausted.
    for _ in 0..9 {
        broker.queue_status(500);
    }

    registry
        .create(CreateTunnel {
            name: Some("bumpy".to_string()),
            local_port: echo.port,
            broker_url: broker.url.clone(),
            durability: Durability::Persistent,
        })
        .await
        .expect("create should succeed");

    broker.queue_request(envelope("GET", "/bumpy/ok", "tok-ok"));

    assert!(wait_until(|| broker.responses().len() == 1, Duration::from_secs(5)).await);
    assert_eq!(broker.responses()[0].status_code, 200);
    assert!(registry.lookup("bumpy").is_some());

    registry.stop("bumpy").unwrap();
    assert!(wait_until(|| registry.is_empty(), Duration::from_secs(5)).await);
}
