//! Per-session protocol loop
//!
//! Drives the fetch → classify → forward → respond cycle against the broker.
//! The broker communicates exclusively through HTTP status codes and a
//! reserved header, so recognized signals are whitelisted and everything
//! else is forwarded as an ordinary request.

use crate::broker::{BrokerClient, FetchError};
use crate::governor::ErrorGovernor;
use crate::rewrite;
use crate::store::{Counter, CounterHandle};
use crate::tunnel::session::TunnelSession;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Method;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tunnerse_common::config::{EngineConfig, RewriteStrategy, RoutingMode};
use tunnerse_common::{Result, TunnelError};
use tunnerse_protocol::constants::{CONTROL_HEADER, DEMO_PATH, REQUEST_ID_HEADER};
use tunnerse_protocol::envelope::Headers;
use tunnerse_protocol::{ControlSignal, RequestEnvelope, ResponseEnvelope};

/// Built-in page served for the reserved demo path, before any network call.
const DEMO_PAGE: &str = "<!DOCTYPE html>\n<html>\n<head><title>Tunnerse</title></head>\n\
<body>\n<h1>Tunnerse</h1>\n<p>This tunnel is alive. Requests to any other path \
reach the local service behind it.</p>\n</body>\n</html>\n";

/// Why a session ended on the fatal path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatalReason {
    /// The fetch error budget was exhausted.
    ErrorBudget,
    /// The broker revoked this session identity.
    Revoked(ControlSignal),
    /// The broker gave up waiting (gateway timeout on fetch).
    ResponseTimeExceeded,
    /// A response could not be delivered; without that channel the session
    /// cannot function.
    ResponseDelivery(String),
}

impl std::fmt::Display for FatalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ErrorBudget => write!(f, "fetch error budget exhausted"),
            Self::Revoked(signal) => write!(f, "session revoked by broker: {signal}"),
            Self::ResponseTimeExceeded => write!(f, "response time exceeded"),
            Self::ResponseDelivery(e) => write!(f, "response delivery failed: {e}"),
        }
    }
}

/// Terminal outcome of a protocol loop.
///
/// A running loop that observes the cancellation signal drains (finishes
/// the current iteration) and ends `Stopped`; every other exit is `Fatal`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Stop was requested and the loop drained normally.
    Stopped,
    /// The loop terminated on its own.
    Fatal(FatalReason),
}

/// The per-session protocol loop.
pub struct SessionWorker {
    session: Arc<TunnelSession>,
    broker: BrokerClient,
    forward: reqwest::Client,
    counters: CounterHandle,
    governor: ErrorGovernor,
    rewrite: RewriteStrategy,
}

impl SessionWorker {
    /// Build a worker for a session.
    pub fn new(
        session: Arc<TunnelSession>,
        broker: BrokerClient,
        counters: CounterHandle,
        config: &EngineConfig,
    ) -> Result<Self> {
        let forward = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.forward_timeout)
            .build()
            .map_err(|e| TunnelError::Config(format!("failed to build forward client: {e}")))?;
        Ok(Self {
            session,
            broker,
            forward,
            counters,
            governor: ErrorGovernor::new(&config.governor),
            rewrite: config.rewrite,
        })
    }

    /// Run the loop until a stop request or a fatal condition.
    ///
    /// Cancellation is cooperative: the signal is checked at the loop head,
    /// so an in-flight call completes before the loop observes it.
    pub async fn run(mut self) -> SessionEnd {
        let id = self.session.id().to_string();
        info!("starting tunnel loop for tunnel {id}");

        loop {
            if self.session.is_cancelled() {
                info!("tunnel loop stopped for tunnel {id}");
                return SessionEnd::Stopped;
            }

            if self.governor.exhausted() {
                error!("broker did not respond, closing tunnel {id}");
                return SessionEnd::Fatal(FatalReason::ErrorBudget);
            }

            let envelope = match self.broker.fetch().await {
                Ok(envelope) => envelope,
                Err(FetchError::ResponseTimeExceeded) => {
                    error!("response time exceeded, closing tunnel {id}");
                    return SessionEnd::Fatal(FatalReason::ResponseTimeExceeded);
                }
                Err(e) => {
                    debug!("fetch failed for tunnel {id}: {e}");
                    self.governor.record_failure();
                    continue;
                }
            };

            if let Some(signal) = envelope.control_signal() {
                if signal.is_terminal() {
                    error!("session revoked by broker ({signal}), closing tunnel {id}");
                    return SessionEnd::Fatal(FatalReason::Revoked(signal));
                }
                // Liveness probe: answer immediately, never touch the local
                // target.
                let reply = ResponseEnvelope::healthcheck_reply(&envelope);
                if let Err(e) = self.broker.send_response(&reply).await {
                    error!("failed to answer liveness probe for tunnel {id}: {e}");
                    return SessionEnd::Fatal(FatalReason::ResponseDelivery(e.to_string()));
                }
                continue;
            }

            debug!(
                "request received for tunnel {id}: {} {}",
                envelope.method, envelope.path
            );

            let (response, served) = match self.forward_to_local(&envelope).await {
                Ok(response) => (response, true),
                Err(e) => {
                    warn!("failed to forward request for tunnel {id}: {e}");
                    (ResponseEnvelope::service_unavailable(&envelope), false)
                }
            };

            if let Err(e) = self.broker.send_response(&response).await {
                error!("failed to deliver response for tunnel {id}: {e}");
                return SessionEnd::Fatal(FatalReason::ResponseDelivery(e.to_string()));
            }

            if served {
                self.counters.record(Counter::Requests);
            }
        }
    }

    /// Forward one request to the local target and capture its reply.
    async fn forward_to_local(&self, envelope: &RequestEnvelope) -> Result<ResponseEnvelope> {
        let local_path = match self.session.routing() {
            RoutingMode::PathPrefix => strip_routing_prefix(&envelope.path, self.session.id()),
            RoutingMode::Subdomain => envelope.path.clone(),
        };

        if is_demo_path(&local_path) {
            return Ok(demo_response(envelope));
        }

        let method = Method::from_bytes(envelope.method.as_bytes())
            .map_err(|_| TunnelError::Protocol(format!("invalid method: {}", envelope.method)))?;
        let url = format!("{}{local_path}", self.session.local_url());

        let response = self
            .forward
            .request(method, &url)
            .headers(outbound_headers(&envelope.headers))
            .body(envelope.body.clone().into_bytes())
            .send()
            .await
            .map_err(|e| TunnelError::LocalService(e.to_string()))?;

        let status = response.status().as_u16();
        let response_headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| TunnelError::LocalService(e.to_string()))?
            .to_vec();

        Ok(self.build_response(envelope, status, &response_headers, body))
    }

    /// Re-frame a local reply as a response envelope: drop `Content-Length`
    /// (the framing is re-encoded), default the content type, rewrite HTML
    /// under path-prefix routing, echo the request id.
    fn build_response(
        &self,
        envelope: &RequestEnvelope,
        status: u16,
        response_headers: &HeaderMap,
        mut body: Vec<u8>,
    ) -> ResponseEnvelope {
        let content_type = response_headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if self.session.routing() == RoutingMode::PathPrefix && content_type.contains("text/html")
        {
            body = rewrite::apply(self.rewrite, body, self.session.id());
        }

        let mut headers = Headers::new();
        for name in response_headers.keys() {
            if *name == CONTENT_LENGTH {
                continue;
            }
            let values: Vec<String> = response_headers
                .get_all(name)
                .iter()
                .filter_map(|v| v.to_str().ok().map(String::from))
                .collect();
            headers.insert(name.as_str().to_string(), values);
        }

        if !headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
            headers.insert(
                "Content-Type".to_string(),
                vec!["text/html; charset=utf-8".to_string()],
            );
        }
        if !envelope.request_id.is_empty() {
            headers.insert(
                REQUEST_ID_HEADER.to_string(),
                vec![envelope.request_id.clone()],
            );
        }

        ResponseEnvelope::new(status, headers, body, envelope.token.clone())
    }
}

/// Remove the `/{id}` routing prefix so the local target sees the path the
/// public caller meant.
fn strip_routing_prefix(path: &str, tunnel_id: &str) -> String {
    let prefix = format!("/{tunnel_id}");
    if path == prefix {
        return "/".to_string();
    }
    if let Some(rest) = path.strip_prefix(&format!("{prefix}/")) {
        return format!("/{rest}");
    }
    path.to_string()
}

/// Whether a local path is the reserved built-in page.
fn is_demo_path(path: &str) -> bool {
    if path.is_empty() {
        return false;
    }
    let normalized = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    normalized == DEMO_PATH || normalized.starts_with(&format!("{DEMO_PATH}/"))
}

/// The fixed demo reply, served without contacting the local target.
fn demo_response(envelope: &RequestEnvelope) -> ResponseEnvelope {
    let mut headers = Headers::new();
    headers.insert(
        "Content-Type".to_string(),
        vec!["text/html; charset=utf-8".to_string()],
    );
    headers.insert(CONTROL_HEADER.to_string(), vec!["demo".to_string()]);
    if !envelope.request_id.is_empty() {
        headers.insert(
            REQUEST_ID_HEADER.to_string(),
            vec![envelope.request_id.clone()],
        );
    }
    ResponseEnvelope::new(
        200,
        headers,
        DEMO_PAGE.as_bytes().to_vec(),
        envelope.token.clone(),
    )
}

/// Convert an envelope's header multimap for the outbound local request.
/// Names or values that are not valid HTTP are skipped.
fn outbound_headers(headers: &Headers) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, values) in headers {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            debug!("skipping invalid header name: {name}");
            continue;
        };
        for value in values {
            if let Ok(value) = HeaderValue::from_str(value) {
                map.append(name.clone(), value);
            }
        }
    }
    map
}
