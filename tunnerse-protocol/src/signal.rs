//! Control signals carried in the reserved envelope header
//!
//! The broker has no structured error channel; protocol signals ride in a
//! reserved header value. Recognized signals are whitelisted here — any
//! other value is an ordinary request.

use crate::constants::{
    HEALTHCHECK_QUESTION, HEALTHCHECK_QUESTION_LEGACY, TUNNEL_NOT_FOUND, TUNNEL_TIMEOUT,
    TUNNEL_WORKING,
};

/// A recognized out-of-band signal embedded in a request envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Broker-originated liveness probe; answered with a 204, never
    /// forwarded to the local target.
    HealthcheckQuestion,
    /// The broker no longer recognizes this session.
    TunnelNotFound,
    /// The broker expired this session.
    TunnelTimeout,
    /// A conflicting session is already bound to this tunnel id.
    TunnelWorking,
}

impl ControlSignal {
    /// Parse a header value into a signal, `None` for unrecognized values.
    pub fn from_value(value: &str) -> Option<Self> {
        match value {
            HEALTHCHECK_QUESTION | HEALTHCHECK_QUESTION_LEGACY => Some(Self::HealthcheckQuestion),
            TUNNEL_NOT_FOUND => Some(Self::TunnelNotFound),
            TUNNEL_TIMEOUT => Some(Self::TunnelTimeout),
            TUNNEL_WORKING => Some(Self::TunnelWorking),
            _ => None,
        }
    }

    /// Whether this signal ends the session.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::HealthcheckQuestion)
    }
}

impl std::fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            Self::HealthcheckQuestion => HEALTHCHECK_QUESTION,
            Self::TunnelNotFound => TUNNEL_NOT_FOUND,
            Self::TunnelTimeout => TUNNEL_TIMEOUT,
            Self::TunnelWorking => TUNNEL_WORKING,
        };
        f.write_str(value)
    }
}
