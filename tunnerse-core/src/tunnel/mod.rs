//! Session lifecycle: handle, protocol loop, registry

pub mod registry;
pub mod session;
pub mod worker;

pub use registry::{CreateTunnel, SessionRegistry, TunnelHandle, TunnelStatus};
pub use session::TunnelSession;
pub use worker::{FatalReason, SessionEnd, SessionWorker};
