//! Embeddable tunnel agent with builder pattern.
//!
//! # Example
//!
//! ```rust,no_run
//! use tunnerse::Agent;
//!
//! # async fn example() -> tunnerse::Result<()> {
//! let agent = Agent::builder()
//!     .broker_url("https://tunnerse.dev")
//!     .build()?;
//!
//! let handle = agent.expose("myapp", 8080).await?;
//! println!("serving at {}", handle.public_url);
//!
//! agent.stop(&handle.id)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use tunnerse_common::config::{Durability, EngineConfig};
use tunnerse_common::{Result, TunnelError};
use tunnerse_core::{
    CreateTunnel, MemoryTunnelStore, SessionRegistry, ShutdownHandler, TunnelHandle, TunnelStatus,
    TunnelStore,
};

/// A tunnel agent that can be embedded in your application.
///
/// One agent owns a session registry and can expose any number of local
/// ports through a single broker. Use [`Agent::builder()`] to construct one.
#[derive(Debug)]
pub struct Agent {
    registry: SessionRegistry,
    broker_url: String,
}

/// Builder for constructing an [`Agent`] with ergonomic configuration.
#[derive(Default)]
pub struct AgentBuilder {
    broker_url: String,
    engine: EngineConfig,
    store: Option<Arc<dyn TunnelStore>>,
    shutdown: Option<ShutdownHandler>,
}

impl Agent {
    /// Create a new agent builder.
    pub fn builder() -> AgentBuilder {
        AgentBuilder::default()
    }

    /// Expose a local port as a persistent tunnel under a chosen name.
    ///
    /// Registers with the broker synchronously; on success the session loop
    /// and its liveness monitors are already running.
    pub async fn expose(&self, name: impl Into<String>, local_port: u16) -> Result<TunnelHandle> {
        self.registry
            .create(CreateTunnel {
                name: Some(name.into()),
                local_port,
                broker_url: self.broker_url.clone(),
                durability: Durability::Persistent,
            })
            .await
    }

    /// Expose a local port as an ephemeral quick tunnel with a
    /// broker-assigned name. Nothing is persisted.
    pub async fn expose_quick(&self, local_port: u16) -> Result<TunnelHandle> {
        self.registry
            .create(CreateTunnel {
                name: None,
                local_port,
                broker_url: self.broker_url.clone(),
                durability: Durability::Ephemeral,
            })
            .await
    }

    /// Request teardown of a running tunnel.
    pub fn stop(&self, id: &str) -> Result<()> {
        self.registry.stop(id)
    }

    /// Ids of all running tunnels.
    pub fn list(&self) -> Vec<String> {
        self.registry.list()
    }

    /// Status and counters for a tunnel.
    pub async fn status(&self, id: &str) -> Result<TunnelStatus> {
        self.registry.status(id).await
    }

    /// The underlying session registry, for control planes that need direct
    /// access.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// The broker this agent registers with.
    pub fn broker_url(&self) -> &str {
        &self.broker_url
    }
}

impl AgentBuilder {
    /// Set the broker root URL, e.g. `https://tunnerse.dev`.
    #[must_use]
    pub fn broker_url(mut self, url: impl Into<String>) -> Self {
        self.broker_url = url.into();
        self
    }

    /// Override the engine configuration.
    #[must_use]
    pub fn engine(mut self, config: EngineConfig) -> Self {
        self.engine = config;
        self
    }

    /// Use a durable store for tunnel records and counters.
    ///
    /// Defaults to an in-memory store that vanishes with the process.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn TunnelStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the handler fired when a local target is considered
    /// permanently gone. Defaults to exiting the process.
    #[must_use]
    pub fn shutdown_handler(mut self, handler: ShutdownHandler) -> Self {
        self.shutdown = Some(handler);
        self
    }

    /// Build the agent with the configured options.
    ///
    /// # Errors
    ///
    /// Returns an error if `broker_url` is missing or has no HTTP scheme.
    pub fn build(self) -> Result<Agent> {
        if self.broker_url.is_empty() {
            return Err(TunnelError::Config("broker_url is required".into()));
        }
        if !self.broker_url.starts_with("http://") && !self.broker_url.starts_with("https://") {
            return Err(TunnelError::Config(
                "broker_url must start with http:// or https://".into(),
            ));
        }

        let store: Arc<dyn TunnelStore> = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryTunnelStore::new()));
        let mut registry = SessionRegistry::new(store, self.engine);
        if let Some(handler) = self.shutdown {
            registry = registry.with_shutdown_handler(handler);
        }

        Ok(Agent {
            registry,
            broker_url: self.broker_url,
        })
    }
}
