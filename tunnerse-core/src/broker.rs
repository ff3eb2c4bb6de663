//! Broker wire-contract client
//!
//! Everything the engine says to the broker goes through here: the one-shot
//! registration, the long-poll fetch, the response POST, and the best-effort
//! close. Fetch outcomes are classified so the protocol loop can tell a
//! transient failure (counted by the error governor) from a terminal one.

use reqwest::StatusCode;
use tracing::{debug, warn};
use tunnerse_common::config::RoutingMode;
use tunnerse_common::{Result, TunnelError};
use tunnerse_protocol::constants::{CLOSE_PATH, FETCH_PATH, REGISTER_PATH, RESPONSE_PATH};
use tunnerse_protocol::{CloseRequest, RegisterRequest, RegisterResponse, RequestEnvelope, ResponseEnvelope};

/// A failed long-poll fetch, classified for the protocol loop.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Network failure reaching the broker; counted, loop continues.
    #[error("fetch failed: {0}")]
    Transport(String),

    /// Generic non-2xx from the broker; counted, loop continues.
    #[error("unexpected status from broker: {0}")]
    Status(u16),

    /// 504 from the broker: it gave up waiting and the session is no longer
    /// current. Terminal.
    #[error("response time exceeded")]
    ResponseTimeExceeded,

    /// Body did not decode into a request envelope; counted, loop continues.
    #[error("invalid envelope: {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether this failure ends the session instead of being counted.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ResponseTimeExceeded)
    }
}

/// Outcome of a successful broker registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Assigned tunnel id (broker may override the requested name).
    pub id: String,
    pub routing: RoutingMode,
    /// Base URL of this session on the broker.
    pub session_url: String,
}

/// Register a tunnel with the broker root.
///
/// Performed synchronously before a session starts; any failure here
/// surfaces to the caller and no session is created.
pub async fn register(
    http: &reqwest::Client,
    broker_root: &str,
    name: &str,
) -> Result<Registration> {
    let root = broker_root.trim_end_matches('/');
    let url = format!("{root}{REGISTER_PATH}");

    let response = http
        .post(&url)
        .json(&RegisterRequest { name })
        .send()
        .await
        .map_err(|e| TunnelError::Registration(format!("post register: {e}")))?;

    if !response.status().is_success() {
        return Err(TunnelError::Registration(format!(
            "broker rejected registration with status {}",
            response.status()
        )));
    }

    let decoded: RegisterResponse = response.json().await.map_err(|e| {
        TunnelError::Registration(format!(
            "decode register response, broker may be offline: {e}"
        ))
    })?;

    let routing = if decoded.data.subdomain {
        RoutingMode::Subdomain
    } else {
        RoutingMode::PathPrefix
    };

    let domain = strip_scheme(root);
    let assigned = decoded.data.tunnel;

    // Some brokers return the full public URL instead of a bare id.
    let (id, session_url) = if assigned.starts_with("http://") || assigned.starts_with("https://") {
        (extract_tunnel_id(&assigned, domain), assigned)
    } else {
        let url = session_url(root, &assigned, routing);
        (assigned, url)
    };

    Ok(Registration {
        id,
        routing,
        session_url,
    })
}

/// Build the session base URL for a tunnel id under the given routing mode.
#[must_use]
pub fn session_url(broker_root: &str, id: &str, routing: RoutingMode) -> String {
    let root = broker_root.trim_end_matches('/');
    let scheme = if root.starts_with("http://") {
        "http"
    } else {
        "https"
    };
    let domain = strip_scheme(root);
    match routing {
        RoutingMode::Subdomain => format!("{scheme}://{id}.{domain}"),
        RoutingMode::PathPrefix => format!("{scheme}://{domain}/{id}"),
    }
}

fn strip_scheme(url: &str) -> &str {
    url.trim_start_matches("http://")
        .trim_start_matches("https://")
}

fn extract_tunnel_id(full_url: &str, domain: &str) -> String {
    let trimmed = strip_scheme(full_url);
    let trimmed = trimmed.strip_suffix(&format!(".{domain}")).unwrap_or(trimmed);
    let trimmed = trimmed.strip_prefix(&format!("{domain}/")).unwrap_or(trimmed);
    trimmed.to_string()
}

/// HTTP client bound to one session's base URL.
#[derive(Debug, Clone)]
pub struct BrokerClient {
    http: reqwest::Client,
    session_url: String,
}

impl BrokerClient {
    /// Build a client for a session.
    ///
    /// The client carries a connect timeout but no overall timeout: the
    /// fetch is a long poll bounded server-side by the broker.
    pub fn new(session_url: String, connect_timeout: std::time::Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TunnelError::Config(format!("failed to build broker client: {e}")))?;
        Ok(Self { http, session_url })
    }

    /// The session base URL this client talks to.
    #[must_use]
    pub fn session_url(&self) -> &str {
        &self.session_url
    }

    /// Long-poll the next queued public request.
    pub async fn fetch(&self) -> std::result::Result<RequestEnvelope, FetchError> {
        let url = format!("{}{FETCH_PATH}", self.session_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::GATEWAY_TIMEOUT {
                return Err(FetchError::ResponseTimeExceeded);
            }
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// Deliver a response envelope to the broker.
    pub async fn send_response(&self, envelope: &ResponseEnvelope) -> Result<()> {
        let url = format!("{}{RESPONSE_PATH}", self.session_url);
        debug!(
            "sending response to broker: status={} url={url}",
            envelope.status_code
        );
        self.http
            .post(&url)
            .json(envelope)
            .send()
            .await
            .map_err(|e| TunnelError::Broker(format!("post response: {e}")))?;
        Ok(())
    }

    /// Ask the broker to drop this session. Best-effort: failures are logged
    /// and swallowed.
    pub async fn close(&self, name: &str) {
        let url = format!("{}{CLOSE_PATH}", self.session_url);
        match self.http.post(&url).json(&CloseRequest { name }).send().await {
            Ok(_) => debug!("close delivered for tunnel {name}"),
            Err(e) => warn!("failed to deliver close for tunnel {name}: {e}"),
        }
    }
}
