//! Common utilities and types for Tunnerse

pub mod config;
pub mod constants;
pub mod error;

pub use config::{
    Durability, EngineConfig, GovernorConfig, HealthcheckConfig, PingConfig, RewriteStrategy,
    RoutingMode,
};
pub use constants::{DEFAULT_BROKER_PORT, DEFAULT_LOCAL_HOST};
pub use error::{Result, TunnelError};
