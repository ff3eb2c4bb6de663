//! Registration and close messages exchanged with the broker root

use serde::{Deserialize, Serialize};

/// Body of `POST {broker}/register`.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub name: &'a str,
}

/// Broker reply to a registration request.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RegisterResponse {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    pub data: RegisterData,
    #[serde(default)]
    pub status: i32,
}

/// Payload of a registration reply. `tunnel` is the assigned id, or a full
/// public URL on brokers that hand those out directly.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RegisterData {
    #[serde(default)]
    pub message: String,
    pub subdomain: bool,
    pub tunnel: String,
}

/// Body of `POST {sessionURL}/close`, best-effort.
#[derive(Debug, Clone, Serialize)]
pub struct CloseRequest<'a> {
    pub name: &'a str,
}
