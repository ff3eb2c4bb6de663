//! Protocol loop tests: fetch, classify, forward, respond

use super::*;
use std::sync::Arc;
use std::time::Duration;
use tunnerse::{CreateTunnel, Durability, MemoryTunnelStore, RoutingMode, SessionRegistry};

fn create_request(name: &str, port: u16, broker_url: &str) -> CreateTunnel {
    CreateTunnel {
        name: Some(name.to_string()),
        local_port: port,
        broker_url: broker_url.to_string(),
        durability: Durability::Persistent,
    }
}

#[tokio::test]
async fn test_round_trip_serves_public_request() {
    init_test_logging();
    let broker = MockBroker::start().await;
    let echo = start_echo_server().await;
    let store = Arc::new(MemoryTunnelStore::new());
    let registry = SessionRegistry::new(store.clone(), quiet_monitor_config());

    let handle = registry
        .create(create_request("mytunnel", echo.port, &broker.url))
        .await
        .expect("create should succeed");
    assert_eq!(handle.id, "mytunnel");
    assert_eq!(handle.routing, RoutingMode::PathPrefix);
    assert_eq!(handle.public_url, format!("{}/mytunnel", broker.url));

    broker.queue_request(envelope("GET", "/mytunnel/hello", "tok-1"));

    assert!(wait_until(|| broker.responses().len() == 1, Duration::from_secs(5)).await);
    let response = broker.responses().remove(0);
    assert_eq!(response.status_code, 200);
    assert_eq!(response.token, "tok-1");
    assert_eq!(
        String::from_utf8(response.body).unwrap(),
        "echo GET /hello"
    );
    assert!(response
        .headers
        .keys()
        .any(|k| k.eq_ignore_ascii_case("content-type")));
    // Content-Length never crosses the broker; the framing is re-encoded.
    assert!(!response
        .headers
        .keys()
        .any(|k| k.eq_ignore_ascii_case("content-length")));

    // The routing prefix was stripped before dispatch.
    assert_eq!(
        echo.hits.lock().unwrap().as_slice(),
        &[("GET".to_string(), "/hello".to_string())]
    );

    // The request counter lands asynchronously.
    assert!(
        wait_for_counters(&store, "mytunnel", |c| c.requests == 1, Duration::from_secs(5)).await
    );

    registry.stop("mytunnel").unwrap();
    assert!(wait_until(|| registry.is_empty(), Duration::from_secs(5)).await);
}

#[tokio::test]
async fn test_healthcheck_question_answered_without_local_contact() {
    init_test_logging();
    let broker = MockBroker::start().await;
    let echo = start_echo_server().await;
    let registry = SessionRegistry::new(
        Arc::new(MemoryTunnelStore::new()),
        quiet_monitor_config(),
    );

    registry
        .create(create_request("probe", echo.port, &broker.url))
        .await
        .expect("create should succeed");

    broker.queue_request(control_envelope("healthcheck-question", "tok-probe"));

    assert!(wait_until(|| broker.responses().len() == 1, Duration::from_secs(5)).await);
    let response = broker.responses().remove(0);
    assert_eq!(response.status_code, 204);
    assert_eq!(response.token, "tok-probe");
    assert_eq!(
        response.headers.get("Tunnerse").unwrap(),
        &vec!["healthcheck-conclued".to_string()]
    );

    // The probe never reaches the local target.
    assert!(echo.hits.lock().unwrap().is_empty());
    // And the session keeps running.
    assert!(registry.lookup("probe").is_some());

    registry.stop("probe").unwrap();
    assert!(wait_until(|| registry.is_empty(), Duration::from_secs(5)).await);
}

#[tokio::test]
async fn test_local_failure_synthesizes_503_and_continues() {
    init_test_logging();
    let broker = MockBroker::start().await;
    let dead_port = get_free_port();
    let registry = SessionRegistry::new(
        Arc::new(MemoryTunnelStore::new()),
        quiet_monitor_config(),
    );

    registry
        .create(create_request("deadend", dead_port, &broker.url))
        .await
        .expect("create should succeed");

    broker.queue_request(envelope("GET", "/deadend/a", "tok-a"));
    broker.queue_request(envelope("GET", "/deadend/b", "tok-b"));

    // Each failed forward produces exactly one definite answer, and the
    // loop keeps going.
    assert!(wait_until(|| broker.responses().len() == 2, Duration::from_secs(5)).await);
    let responses = broker.responses();
    assert_eq!(responses[0].status_code, 503);
    assert_eq!(responses[0].token, "tok-a");
    assert_eq!(responses[1].status_code, 503);
    assert_eq!(responses[1].token, "tok-b");
    assert!(registry.lookup("deadend").is_some());

    registry.stop("deadend").unwrap();
    assert!(wait_until(|| registry.is_empty(), Duration::from_secs(5)).await);
}

#[tokio::test]
async fn test_revoked_signal_terminates_session() {
    init_test_logging();
    let broker = MockBroker::start().await;
    let echo = start_echo_server().await;
    let store = Arc::new(MemoryTunnelStore::new());
    let registry = SessionRegistry::new(store.clone(), quiet_monitor_config());

    registry
        .create(create_request("revoked", echo.port, &broker.url))
        .await
        .expect("create should succeed");

    broker.queue_request(control_envelope("tunnel-not-found", "tok-x"));

    assert!(wait_until(|| registry.is_empty(), Duration::from_secs(5)).await);
    // Teardown fires the best-effort close and clears the active flag.
    assert!(wait_until(|| broker.closes() >= 1, Duration::from_secs(5)).await);
    {
        use tunnerse::TunnelStore;
        let record = store.record("revoked").await.unwrap().unwrap();
        assert!(!record.active);
    }
    // No response was sent for the control envelope.
    assert!(broker.responses().is_empty());
}

#[tokio::test]
async fn test_html_rewritten_under_path_prefix() {
    init_test_logging();
    let broker = MockBroker::start().await;
    let html_port =
        start_html_server("<html><head></head><body><a href=\"/style.css\">s</a></body></html>")
            .await;

    let mut config = quiet_monitor_config();
    config.rewrite = tunnerse::common::RewriteStrategy::AttributePrefix;
    let registry = SessionRegistry::new(Arc::new(MemoryTunnelStore::new()), config);

    registry
        .create(create_request("site", html_port, &broker.url))
        .await
        .expect("create should succeed");

    broker.queue_request(envelope("GET", "/site/", "tok-html"));

    assert!(wait_until(|| broker.responses().len() == 1, Duration::from_secs(5)).await);
    let response = broker.responses().remove(0);
    let body = String::from_utf8(response.body).unwrap();
    assert!(body.contains("href=\"/site/style.css\""));

    registry.stop("site").unwrap();
    assert!(wait_until(|| registry.is_empty(), Duration::from_secs(5)).await);
}

#[tokio::test]
async fn test_demo_path_served_without_local_call() {
    init_test_logging();
    let broker = MockBroker::start().await;
    let echo = start_echo_server().await;
    let registry = SessionRegistry::new(
        Arc::new(MemoryTunnelStore::new()),
        quiet_monitor_config(),
    );

    registry
        .create(create_request("demo", echo.port, &broker.url))
        .await
        .expect("create should succeed");

    broker.queue_request(envelope("GET", "/demo/tunnerse", "tok-demo"));

    assert!(wait_until(|| broker.responses().len() == 1, Duration::from_secs(5)).await);
    let response = broker.responses().remove(0);
    assert_eq!(response.status_code, 200);
    assert!(String::from_utf8(response.body)
        .unwrap()
        .contains("Tunnerse"));
    // Served from the built-in page, not the local target.
    assert!(echo.hits.lock().unwrap().is_empty());

    registry.stop("demo").unwrap();
    assert!(wait_until(|| registry.is_empty(), Duration::from_secs(5)).await);
}
