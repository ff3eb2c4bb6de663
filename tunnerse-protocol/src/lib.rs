//! Tunnerse broker wire contract
//!
//! This crate defines the JSON envelopes exchanged with a Tunnerse broker
//! and the reserved control header layered on top of them. The broker speaks
//! plain HTTP: anything that is not a recognized control signal is an
//! ordinary proxied request.

pub mod constants;
pub mod envelope;
pub mod register;
pub mod signal;
pub mod validation;

pub use envelope::{RequestEnvelope, ResponseEnvelope};
pub use register::{CloseRequest, RegisterRequest, RegisterResponse};
pub use signal::ControlSignal;
pub use validation::{validate_tunnel_name, ValidationError};
