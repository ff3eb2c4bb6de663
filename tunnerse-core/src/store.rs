//! Persistence interface for tunnel records and counters
//!
//! The durable store (SQLite in the reference deployment) lives outside this
//! crate; the engine only consumes this trait. Counter increments are
//! dispatched as detached tasks so a slow store can never back up the
//! protocol loop — failures are logged, never propagated.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::warn;
use tunnerse_common::Result;

/// The four monotonic per-tunnel counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// Public requests served end to end.
    Requests,
    /// Successful end-to-end ping challenges.
    Healthchecks,
    /// Local-service liveness warnings.
    Warns,
    /// Failed ping challenges and other recorded errors.
    Errors,
}

impl std::fmt::Display for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Requests => "requests",
            Self::Healthchecks => "healthchecks",
            Self::Warns => "warns",
            Self::Errors => "errors",
        };
        f.write_str(name)
    }
}

/// One persistent tunnel row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelRecord {
    pub id: String,
    pub port: u16,
    pub url: String,
    pub domain: String,
    pub active: bool,
    pub created_at: String,
}

impl TunnelRecord {
    /// Build an active record stamped with the current time.
    #[must_use]
    pub fn new(id: String, port: u16, url: String, domain: String) -> Self {
        Self {
            id,
            port,
            url,
            domain,
            active: true,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Counter snapshot for the control plane's info query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub requests: u64,
    pub healthchecks: u64,
    pub warns: u64,
    pub errors: u64,
}

/// Store consumed by the engine for records and counters.
#[async_trait]
pub trait TunnelStore: Send + Sync {
    /// Persist a new tunnel record with zeroed counters.
    async fn create(&self, record: TunnelRecord) -> Result<()>;

    /// Fetch a tunnel record.
    async fn record(&self, id: &str) -> Result<Option<TunnelRecord>>;

    /// Flip the active flag of a record.
    async fn set_active(&self, id: &str, active: bool) -> Result<()>;

    /// Increment one counter.
    async fn increment(&self, id: &str, counter: Counter) -> Result<()>;

    /// Read the counters of a tunnel.
    async fn counters(&self, id: &str) -> Result<Option<CounterSnapshot>>;
}

/// In-memory store for tests and embedded use.
#[derive(Debug, Default)]
pub struct MemoryTunnelStore {
    records: DashMap<String, TunnelRecord>,
    counters: DashMap<String, CounterSnapshot>,
}

impl MemoryTunnelStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TunnelStore for MemoryTunnelStore {
    async fn create(&self, record: TunnelRecord) -> Result<()> {
        self.counters
            .insert(record.id.clone(), CounterSnapshot::default());
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn record(&self, id: &str) -> Result<Option<TunnelRecord>> {
        Ok(self.records.get(id).map(|r| r.clone()))
    }

    async fn set_active(&self, id: &str, active: bool) -> Result<()> {
        if let Some(mut record) = self.records.get_mut(id) {
            record.active = active;
        }
        Ok(())
    }

    async fn increment(&self, id: &str, counter: Counter) -> Result<()> {
        let mut snapshot = self.counters.entry(id.to_string()).or_default();
        match counter {
            Counter::Requests => snapshot.requests += 1,
            Counter::Healthchecks => snapshot.healthchecks += 1,
            Counter::Warns => snapshot.warns += 1,
            Counter::Errors => snapshot.errors += 1,
        }
        Ok(())
    }

    async fn counters(&self, id: &str) -> Result<Option<CounterSnapshot>> {
        Ok(self.counters.get(id).map(|c| *c))
    }
}

/// Fire-and-forget counter dispatcher bound to one tunnel.
///
/// Ephemeral sessions get a disabled handle: every update is a no-op, so
/// quick tunnels leave no durable trace.
#[derive(Clone)]
pub struct CounterHandle {
    target: Option<(Arc<dyn TunnelStore>, String)>,
}

impl CounterHandle {
    /// Handle that persists updates for `tunnel_id`.
    #[must_use]
    pub fn new(store: Arc<dyn TunnelStore>, tunnel_id: String) -> Self {
        Self {
            target: Some((store, tunnel_id)),
        }
    }

    /// Handle that drops every update.
    #[must_use]
    pub fn disabled() -> Self {
        Self { target: None }
    }

    /// Dispatch one increment as a detached task.
    pub fn record(&self, counter: Counter) {
        let Some((store, id)) = self.target.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = store.increment(&id, counter).await {
                warn!("failed to persist {counter} counter for tunnel {id}: {e}");
            }
        });
    }
}

impl std::fmt::Debug for CounterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterHandle")
            .field("enabled", &self.target.is_some())
            .finish()
    }
}
