//! Error types for Tunnerse

use thiserror::Error;

/// Main error type for Tunnerse operations
#[derive(Error, Debug)]
pub enum TunnelError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Broker registration failed
    #[error("Registration failed: {0}")]
    Registration(String),

    /// Transport failure talking to the broker
    #[error("Broker unreachable: {0}")]
    Broker(String),

    /// Envelope could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Protocol violation
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Local target could not be reached
    #[error("Local service error: {0}")]
    LocalService(String),

    /// Session not found
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// A session with this id is already running
    #[error("Session already active: {0}")]
    SessionExists(String),

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, TunnelError>;
