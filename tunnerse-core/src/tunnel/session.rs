//! Per-session handle shared by the protocol loop and both monitors

use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tunnerse_common::config::{Durability, RoutingMode};

/// The unit of ownership for one exposed tunnel.
///
/// The cancellation token transitions open→closed exactly once; the
/// `stopped` flag is flipped under a mutex guarding that transition, so an
/// explicit kill and a fatal self-termination can race safely.
#[derive(Debug)]
pub struct TunnelSession {
    id: String,
    session_url: String,
    local_url: String,
    local_port: u16,
    routing: RoutingMode,
    durability: Durability,
    cancel: CancellationToken,
    stopped: Mutex<bool>,
}

impl TunnelSession {
    pub fn new(
        id: String,
        session_url: String,
        local_url: String,
        local_port: u16,
        routing: RoutingMode,
        durability: Durability,
    ) -> Self {
        Self {
            id,
            session_url,
            local_url,
            local_port,
            routing,
            durability,
            cancel: CancellationToken::new(),
            stopped: Mutex::new(false),
        }
    }

    /// Tunnel id (broker-assigned or caller-chosen).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Base URL of this session on the broker.
    #[must_use]
    pub fn session_url(&self) -> &str {
        &self.session_url
    }

    /// Base URL of the local target.
    #[must_use]
    pub fn local_url(&self) -> &str {
        &self.local_url
    }

    /// Port of the local target.
    #[must_use]
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    #[must_use]
    pub fn routing(&self) -> RoutingMode {
        self.routing
    }

    #[must_use]
    pub fn durability(&self) -> Durability {
        self.durability
    }

    /// Request teardown. Returns `true` for the single caller that wins the
    /// close guard; every later call is a no-op returning `false`.
    pub fn stop(&self) -> bool {
        let mut stopped = self.stopped.lock().unwrap_or_else(|e| e.into_inner());
        if *stopped {
            return false;
        }
        *stopped = true;
        self.cancel.cancel();
        true
    }

    /// Whether teardown has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when teardown is requested.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}
