//! # Tunnerse
//!
//! Expose a local network service to the public internet through a Tunnerse
//! broker: the agent opens an outbound session, long-polls queued public
//! requests, forwards them to the local target, and relays the responses
//! back. No inbound port, no NAT configuration.
//!
//! ## Quick Start
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
//! println!("public URL: {}", handle.public_url);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Tunnerse consists of several crates:
//!
//! - [`tunnerse-common`] - Shared errors, configuration, and constants
//! - [`tunnerse-protocol`] - Broker wire contract: envelopes and signals
//! - [`tunnerse-core`] - The session engine: protocol loop, monitors,
//!   registry
//! - `tunnerse-observability` - Logging bootstrap for embedding applications
//!
//! ## Re-exports
//!
//! This crate re-exports the most commonly used items from the subcrates
//! for convenience.

// Re-export subcrates
pub use tunnerse_common as common;
pub use tunnerse_core as engine;
pub use tunnerse_protocol as protocol;

mod agent;

pub use agent::{Agent, AgentBuilder};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::agent::{Agent, AgentBuilder};
    pub use crate::common::{Durability, EngineConfig, Result, RoutingMode, TunnelError};
    pub use crate::engine::{CreateTunnel, SessionRegistry, TunnelHandle, TunnelStatus};
    pub use crate::protocol::{ControlSignal, RequestEnvelope, ResponseEnvelope};
}

// Convenience re-exports at crate root
pub use common::{Durability, EngineConfig, Result, RoutingMode, TunnelError};
pub use engine::{
    CreateTunnel, MemoryTunnelStore, SessionRegistry, ShutdownHandler, TunnelHandle, TunnelStatus,
    TunnelStore,
};
pub use protocol::{ControlSignal, RequestEnvelope, ResponseEnvelope};
