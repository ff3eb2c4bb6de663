//! Proxied request/response envelopes
//!
//! One public HTTP request is delivered by the broker as a JSON
//! [`RequestEnvelope`]; the agent answers with a [`ResponseEnvelope`] whose
//! body travels base64-encoded. The `token` field correlates a response with
//! the public request it answers, since the channel is a single polling
//! connection rather than a synchronous exchange.

use crate::constants::{CONTROL_HEADER, HEALTHCHECK_CONCLUDED, REQUEST_ID_HEADER};
use crate::signal::ControlSignal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Header multimap: keys unique per name, values ordered, case preserved.
pub type Headers = HashMap<String, Vec<String>>;

/// One public HTTP request fetched from the broker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RequestEnvelope {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub token: String,
}

impl RequestEnvelope {
    /// Inspect the reserved control header.
    ///
    /// Returns `None` for ordinary requests and for control values this
    /// agent does not recognize; unknown values must be forwarded as plain
    /// requests so new broker signals do not break older agents.
    pub fn control_signal(&self) -> Option<ControlSignal> {
        let values = self.headers.get(CONTROL_HEADER)?;
        ControlSignal::from_value(values.first()?)
    }
}

/// The agent's reply for one request, posted back to the broker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ResponseEnvelope {
    pub status_code: u16,
    pub headers: Headers,
    #[serde(with = "base64_body")]
    pub body: Vec<u8>,
    pub token: String,
}

impl ResponseEnvelope {
    /// Build a response from a forwarded local reply.
    pub fn new(status_code: u16, headers: Headers, body: Vec<u8>, token: String) -> Self {
        Self {
            status_code,
            headers,
            body,
            token,
        }
    }

    /// The `204` answer to a broker liveness probe.
    pub fn healthcheck_reply(request: &RequestEnvelope) -> Self {
        let mut headers = Headers::new();
        headers.insert(
            CONTROL_HEADER.to_string(),
            vec![HEALTHCHECK_CONCLUDED.to_string()],
        );
        Self {
            status_code: 204,
            headers,
            body: Vec::new(),
            token: request.token.clone(),
        }
    }

    /// The `503` answer sent when the local target cannot be reached, so the
    /// public caller is not left hanging.
    pub fn service_unavailable(request: &RequestEnvelope) -> Self {
        let mut headers = Headers::new();
        headers.insert(
            "Content-Type".to_string(),
            vec!["text/html; charset=utf-8".to_string()],
        );
        if !request.request_id.is_empty() {
            headers.insert(
                REQUEST_ID_HEADER.to_string(),
                vec![request.request_id.clone()],
            );
        }
        Self {
            status_code: 503,
            headers,
            body: b"service unavailable".to_vec(),
            token: request.token.clone(),
        }
    }
}

mod base64_body {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
