//! Session registry and lifecycle controller
//!
//! Owns every running session. Creation registers with the broker
//! synchronously, persists the tunnel record, then spawns the protocol loop
//! and both liveness monitors under one cancellation token; a supervision
//! task joins them on teardown, removes the registry entry exactly once,
//! clears the persistent active flag, and fires the best-effort close.

use crate::broker::{self, BrokerClient};
use crate::monitor::{run_local_healthcheck, run_ping_challenge, ShutdownHandler};
use crate::store::{CounterHandle, CounterSnapshot, TunnelRecord, TunnelStore};
use crate::tunnel::session::TunnelSession;
use crate::tunnel::worker::{SessionEnd, SessionWorker};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};
use tunnerse_common::config::{Durability, EngineConfig, RoutingMode};
use tunnerse_common::{Result, TunnelError};
use tunnerse_protocol::validate_tunnel_name;

/// Request to expose a local port through the broker.
#[derive(Debug, Clone)]
pub struct CreateTunnel {
    /// Caller-chosen tunnel name; empty lets the broker assign one.
    pub name: Option<String>,
    /// Local port the tunnel forwards to.
    pub local_port: u16,
    /// Broker root URL, e.g. `https://tunnerse.dev`.
    pub broker_url: String,
    pub durability: Durability,
}

/// What the control plane gets back from a successful create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelHandle {
    /// Assigned tunnel id.
    pub id: String,
    /// Public base URL of the tunnel.
    pub public_url: String,
    pub routing: RoutingMode,
}

/// Read-only view for the control plane's info query.
#[derive(Debug, Clone)]
pub struct TunnelStatus {
    /// Whether a session is currently running for this id.
    pub running: bool,
    pub record: Option<TunnelRecord>,
    pub counters: Option<CounterSnapshot>,
}

/// Thread-safe registry of running sessions.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, Arc<TunnelSession>>>,
    store: Arc<dyn TunnelStore>,
    config: EngineConfig,
    shutdown: ShutdownHandler,
}

impl SessionRegistry {
    /// Create a registry over a store, with the default (process-exit)
    /// shutdown handler.
    pub fn new(store: Arc<dyn TunnelStore>, config: EngineConfig) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            store,
            config,
            shutdown: ShutdownHandler::process_exit(),
        }
    }

    /// Replace the shutdown handler fired when a local target is considered
    /// permanently gone.
    #[must_use]
    pub fn with_shutdown_handler(mut self, handler: ShutdownHandler) -> Self {
        self.shutdown = handler;
        self
    }

    /// Register with the broker and start a session.
    ///
    /// Registration happens synchronously: on failure the error surfaces to
    /// the caller and no session is started.
    pub async fn create(&self, request: CreateTunnel) -> Result<TunnelHandle> {
        let name = request.name.clone().unwrap_or_default();
        if !name.is_empty() {
            validate_tunnel_name(&name).map_err(|e| TunnelError::Config(e.to_string()))?;
        }

        let http = reqwest::Client::builder()
            .connect_timeout(self.config.connect_timeout)
            .build()
            .map_err(|e| TunnelError::Config(format!("failed to build register client: {e}")))?;
        let registration = broker::register(&http, &request.broker_url, &name).await?;

        let id = registration.id.clone();
        if self.sessions.contains_key(&id) {
            return Err(TunnelError::SessionExists(id));
        }

        let local_url = format!(
            "http://{}:{}",
            self.config.local_host, request.local_port
        );
        let session = Arc::new(TunnelSession::new(
            id.clone(),
            registration.session_url.clone(),
            local_url,
            request.local_port,
            registration.routing,
            request.durability,
        ));

        let counters = if request.durability.is_persistent() {
            let record = TunnelRecord::new(
                id.clone(),
                request.local_port,
                registration.session_url.clone(),
                request.broker_url.clone(),
            );
            self.store.create(record).await?;
            CounterHandle::new(self.store.clone(), id.clone())
        } else {
            CounterHandle::disabled()
        };

        let broker_client =
            BrokerClient::new(registration.session_url.clone(), self.config.connect_timeout)?;
        let worker = SessionWorker::new(
            session.clone(),
            broker_client.clone(),
            counters.clone(),
            &self.config,
        )?;

        let monitor_http = reqwest::Client::builder()
            .connect_timeout(self.config.connect_timeout)
            .timeout(self.config.ping.timeout)
            .build()
            .map_err(|e| TunnelError::Config(format!("failed to build monitor client: {e}")))?;

        // Concurrent creates for the same id race to this insert; the loser
        // never spawns anything.
        match self.sessions.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(TunnelError::SessionExists(id));
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(session.clone());
            }
        }
        info!(
            "tunnel {id} registered at {} (local port {})",
            registration.session_url, request.local_port
        );

        let healthcheck = tokio::spawn(run_local_healthcheck(
            session.clone(),
            broker_client.clone(),
            counters.clone(),
            monitor_http.clone(),
            self.config.healthcheck.clone(),
            self.shutdown.clone(),
        ));
        let ping = tokio::spawn(run_ping_challenge(
            session.clone(),
            counters,
            monitor_http,
            self.config.ping.clone(),
        ));

        let sessions = self.sessions.clone();
        let store = self.store.clone();
        tokio::spawn(async move {
            let end = worker.run().await;

            // Self-termination also cancels the monitors; on an external
            // stop this is a no-op thanks to the close guard.
            session.stop();
            let _ = healthcheck.await;
            let _ = ping.await;

            sessions.remove(session.id());
            if session.durability().is_persistent() {
                if let Err(e) = store.set_active(session.id(), false).await {
                    warn!(
                        "failed to clear active flag for tunnel {}: {e}",
                        session.id()
                    );
                }
            }
            broker_client.close(session.id()).await;

            match end {
                SessionEnd::Stopped => info!("tunnel {} closed", session.id()),
                SessionEnd::Fatal(reason) => {
                    warn!("tunnel {} closed: {reason}", session.id());
                }
            }
        });

        Ok(TunnelHandle {
            id,
            public_url: registration.session_url,
            routing: registration.routing,
        })
    }

    /// Find a running session.
    #[must_use]
    pub fn lookup(&self, id: &str) -> Option<Arc<TunnelSession>> {
        self.sessions.get(id).map(|s| s.clone())
    }

    /// Ids of all running sessions.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.sessions.iter().map(|s| s.key().clone()).collect()
    }

    /// Number of running sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Request teardown of a session.
    ///
    /// Safe to call concurrently with the session's own self-termination:
    /// the session's close guard picks a single winner, and the supervision
    /// task removes the registry entry exactly once either way.
    pub fn stop(&self, id: &str) -> Result<()> {
        let session = self
            .lookup(id)
            .ok_or_else(|| TunnelError::SessionNotFound(id.to_string()))?;
        if session.stop() {
            info!("stop requested for tunnel {id}");
        }
        Ok(())
    }

    /// Counters and status for the control plane's info query.
    pub async fn status(&self, id: &str) -> Result<TunnelStatus> {
        let running = self.sessions.contains_key(id);
        let record = self.store.record(id).await?;
        let counters = self.store.counters(id).await?;
        if !running && record.is_none() && counters.is_none() {
            return Err(TunnelError::SessionNotFound(id.to_string()));
        }
        Ok(TunnelStatus {
            running,
            record,
            counters,
        })
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}
