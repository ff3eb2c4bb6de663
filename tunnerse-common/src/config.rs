//! Configuration types for the Tunnerse session engine

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the broker addresses this tunnel publicly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingMode {
    /// `https://{id}.{domain}`
    Subdomain,
    /// `https://{domain}/{id}` — requires HTML rewriting so root-relative
    /// links resolve under the prefix.
    PathPrefix,
}

/// Whether a tunnel leaves a durable record behind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Durability {
    /// Recorded on disk; counters and the active flag are maintained.
    #[default]
    Persistent,
    /// Quick tunnel: nothing is persisted, teardown leaves no trace.
    Ephemeral,
}

impl Durability {
    /// Whether counter updates should be persisted for this tunnel.
    pub fn is_persistent(self) -> bool {
        matches!(self, Self::Persistent)
    }
}

/// HTML rewriting strategy for path-prefix routing.
///
/// Exactly one strategy is active per deployment: applying both would
/// double-prefix every URL.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RewriteStrategy {
    /// Insert `<base href="/{id}/">` after the first `<head>` tag.
    #[default]
    BaseTag,
    /// Rewrite `href="/`, `src="/` and `action="/` attributes in place.
    AttributePrefix,
}

/// Error-budget window for broker fetch failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernorConfig {
    /// Sliding window width.
    pub window: Duration,
    /// Failures within the window that exhaust the budget.
    pub threshold: usize,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(10),
            threshold: 10,
        }
    }
}

/// Local-service healthcheck monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthcheckConfig {
    /// Delay before the first probe.
    pub initial_delay: Duration,
    /// Probe interval.
    pub interval: Duration,
    /// Consecutive failures that force session teardown and agent shutdown.
    pub max_failures: u32,
}

impl Default for HealthcheckConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            interval: Duration::from_secs(60),
            max_failures: 10,
        }
    }
}

/// End-to-end ping challenge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingConfig {
    /// Delay before the first challenge.
    pub initial_delay: Duration,
    /// Challenge interval.
    pub interval: Duration,
    /// Per-request timeout; longer than the loop's clients because the ping
    /// traverses the full tunnel round trip.
    pub timeout: Duration,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Combined engine configuration shared by every session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub governor: GovernorConfig,
    pub healthcheck: HealthcheckConfig,
    pub ping: PingConfig,
    pub rewrite: RewriteStrategy,
    /// Host the local target is reached on.
    pub local_host: String,
    /// Connect timeout for broker and local-target clients.
    pub connect_timeout: Duration,
    /// Overall timeout for forward-to-local calls. The long-poll fetch has
    /// no overall timeout; the broker bounds it server-side.
    pub forward_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            governor: GovernorConfig::default(),
            healthcheck: HealthcheckConfig::default(),
            ping: PingConfig::default(),
            rewrite: RewriteStrategy::default(),
            local_host: crate::constants::DEFAULT_LOCAL_HOST.to_string(),
            connect_timeout: Duration::from_secs(10),
            forward_timeout: Duration::from_secs(30),
        }
    }
}
