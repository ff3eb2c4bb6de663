//! Registry and session lifecycle tests

use super::*;
use std::sync::Arc;
use std::time::Duration;
use tunnerse::{
    Agent, CreateTunnel, Durability, MemoryTunnelStore, SessionRegistry, TunnelError, TunnelStore,
};

#[tokio::test]
async fn test_registration_failure_starts_no_session() {
    init_test_logging();
    let broker = MockBroker::start_with_register_status(500).await;
    let registry = SessionRegistry::new(
        Arc::new(MemoryTunnelStore::new()),
        quiet_monitor_config(),
    );

    let result = registry
        .create(CreateTunnel {
            name: Some("rejected".to_string()),
            local_port: 8080,
            broker_url: broker.url.clone(),
            durability: Durability::Persistent,
        })
        .await;

    assert!(matches!(result, Err(TunnelError::Registration(_))));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_stop_tears_down_and_clears_active_flag() {
    init_test_logging();
    let broker = MockBroker::start().await;
    let echo = start_echo_server().await;
    let store = Arc::new(MemoryTunnelStore::new());
    let registry = SessionRegistry::new(store.clone(), quiet_monitor_config());

    registry
        .create(CreateTunnel {
            name: Some("stopme".to_string()),
            local_port: echo.port,
            broker_url: broker.url.clone(),
            durability: Durability::Persistent,
        })
        .await
        .expect("create should succeed");

    assert_eq!(registry.list(), vec!["stopme".to_string()]);
    assert!(store.record("stopme").await.unwrap().unwrap().active);

    registry.stop("stopme").unwrap();
    assert!(wait_until(|| registry.is_empty(), Duration::from_secs(5)).await);
    assert!(wait_until(|| broker.closes() >= 1, Duration::from_secs(5)).await);

    let record = store.record("stopme").await.unwrap().unwrap();
    assert!(!record.active);

    // A second stop finds nothing to stop.
    assert!(matches!(
        registry.stop("stopme"),
        Err(TunnelError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_ephemeral_tunnel_leaves_no_record() {
    init_test_logging();
    let broker = MockBroker::start().await;
    let echo = start_echo_server().await;
    let store = Arc::new(MemoryTunnelStore::new());
    let registry = SessionRegistry::new(store.clone(), quiet_monitor_config());

    let handle = registry
        .create(CreateTunnel {
            name: None,
            local_port: echo.port,
            broker_url: broker.url.clone(),
            durability: Durability::Ephemeral,
        })
        .await
        .expect("create should succeed");

    // The broker assigned the id.
    assert_eq!(handle.id, "assigned");
    assert!(registry.lookup("assigned").is_some());

    // Quick tunnels persist nothing, not even after serving a request.
    broker.queue_request(envelope("GET", "/assigned/x", "tok-q"));
    assert!(wait_until(|| broker.responses().len() == 1, Duration::from_secs(5)).await);
    assert!(store.record("assigned").await.unwrap().is_none());
    assert!(store.counters("assigned").await.unwrap().is_none());

    registry.stop("assigned").unwrap();
    assert!(wait_until(|| registry.is_empty(), Duration::from_secs(5)).await);
}

#[tokio::test]
async fn test_stop_races_self_termination_cleanly() {
    init_test_logging();
    let broker = MockBroker::start().await;
    let echo = start_echo_server().await;
    let registry = SessionRegistry::new(
        Arc::new(MemoryTunnelStore::new()),
        quiet_monitor_config(),
    );

    registry
        .create(CreateTunnel {
            name: Some("racy".to_string()),
            local_port: echo.port,
            broker_url: broker.url.clone(),
            durability: Durability::Persistent,
        })
        .await
        .expect("create should succeed");

    // Fatal signal and explicit stop race; exactly one teardown wins and
    // the registry entry is removed exactly once.
    broker.queue_request(control_envelope("tunnel-working", "tok-race"));
    let _ = registry.stop("racy");

    assert!(wait_until(|| registry.is_empty(), Duration::from_secs(5)).await);
    assert!(wait_until(|| broker.closes() >= 1, Duration::from_secs(5)).await);
}

#[tokio::test]
async fn test_agent_facade_end_to_end() {
    init_test_logging();
    let broker = MockBroker::start().await;
    let echo = start_echo_server().await;
    let store = Arc::new(MemoryTunnelStore::new());

    let agent = Agent::builder()
        .broker_url(broker.url.clone())
        .store(store.clone())
        .engine(quiet_monitor_config())
        .build()
        .expect("agent should build");

    let handle = agent.expose("facade", echo.port).await.expect("expose");
    assert_eq!(agent.list(), vec!["facade".to_string()]);

    broker.queue_request(envelope("GET", "/facade/hi", "tok-f"));
    assert!(wait_until(|| broker.responses().len() == 1, Duration::from_secs(5)).await);

    let status = agent.status(&handle.id).await.expect("status");
    assert!(status.running);
    assert!(status.record.is_some());

    agent.stop(&handle.id).unwrap();
    assert!(wait_until(|| agent.list().is_empty(), Duration::from_secs(5)).await);

    // After teardown the record survives with the active flag cleared.
    let status = agent.status(&handle.id).await.expect("status");
    assert!(!status.running);
    assert!(!status.record.unwrap().active);
}
