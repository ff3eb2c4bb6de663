//! Wire-contract constants
//!
//! Header names, control values, and URL paths are fixed by the broker
//! contract; changing any of them breaks interoperability with deployed
//! brokers.

/// Reserved header carrying control signals in request and response envelopes.
pub const CONTROL_HEADER: &str = "Tunnerse";

/// Response header echoing the broker-assigned request id.
pub const REQUEST_ID_HEADER: &str = "X-Tunnerse-Request-ID";

/// Control value: the broker is probing session liveness.
pub const HEALTHCHECK_QUESTION: &str = "healthcheck-question";

/// Misspelled variant of [`HEALTHCHECK_QUESTION`] sent by older brokers.
pub const HEALTHCHECK_QUESTION_LEGACY: &str = "healtcheck-question";

/// Control value answering a liveness probe. The spelling is fixed by the
/// broker contract.
pub const HEALTHCHECK_CONCLUDED: &str = "healthcheck-conclued";

/// Control value: the broker no longer knows this session.
pub const TUNNEL_NOT_FOUND: &str = "tunnel-not-found";

/// Control value: the broker expired this session.
pub const TUNNEL_TIMEOUT: &str = "tunnel-timeout";

/// Control value: another session already owns this tunnel id.
pub const TUNNEL_WORKING: &str = "tunnel-working";

/// Path fetched to long-poll the next queued public request.
pub const FETCH_PATH: &str = "/tunnel";

/// Path the response envelope is posted to.
pub const RESPONSE_PATH: &str = "/response";

/// Registration path under the broker root.
pub const REGISTER_PATH: &str = "/register";

/// Best-effort session close path.
pub const CLOSE_PATH: &str = "/close";

/// Public path used by the end-to-end ping challenge.
pub const PING_PATH: &str = "/_tunnerse_healthcheck";

/// Reserved path segment served from a built-in page instead of the local
/// target.
pub const DEMO_PATH: &str = "/tunnerse";
