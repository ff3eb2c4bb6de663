pub mod broker;
pub mod governor;
pub mod monitor;
pub mod rewrite;
pub mod store;
pub mod tunnel;

// Re-export specific items for convenience
pub use broker::{BrokerClient, FetchError, Registration};
pub use governor::ErrorGovernor;
pub use monitor::ShutdownHandler;
pub use store::{
    Counter, CounterHandle, CounterSnapshot, MemoryTunnelStore, TunnelRecord, TunnelStore,
};
pub use tunnel::registry::{CreateTunnel, SessionRegistry, TunnelHandle, TunnelStatus};
pub use tunnel::session::TunnelSession;
pub use tunnel::worker::{FatalReason, SessionEnd, SessionWorker};
