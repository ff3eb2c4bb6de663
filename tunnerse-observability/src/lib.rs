pub mod tracing;

pub use tracing::{init_minimal_logging, try_init_logging};
