//! Liveness monitors
//!
//! Two independent periodic tasks run alongside each protocol loop, sharing
//! its cancellation token:
//!
//! - the **local healthcheck** probes the local target directly and forces
//!   session teardown plus agent shutdown once the target is considered
//!   permanently gone;
//! - the **ping challenge** proves the full public path (broker routing plus
//!   local forwarding) end to end, something the local probe alone cannot.
//!
//! Both use a longer-timeout client than the protocol loop because the ping
//! traverses the whole tunnel round trip.

use crate::broker::BrokerClient;
use crate::store::{Counter, CounterHandle};
use crate::tunnel::session::TunnelSession;
use std::sync::Arc;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use tunnerse_common::config::{HealthcheckConfig, PingConfig};
use tunnerse_protocol::constants::{
    CONTROL_HEADER, HEALTHCHECK_CONCLUDED, HEALTHCHECK_QUESTION, PING_PATH,
};

/// Process-level shutdown hook fired when the local target is considered
/// permanently gone.
///
/// The registry owns one handler and hands it to every healthcheck monitor;
/// the default exits the process, tests inject a recording closure.
#[derive(Clone)]
pub struct ShutdownHandler {
    action: Arc<dyn Fn() + Send + Sync>,
}

impl ShutdownHandler {
    /// Handler running an arbitrary action.
    pub fn new(action: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            action: Arc::new(action),
        }
    }

    /// Handler that exits the process.
    #[must_use]
    pub fn process_exit() -> Self {
        Self::new(|| std::process::exit(0))
    }

    /// Fire the shutdown action.
    pub fn trigger(&self) {
        (self.action)();
    }
}

impl Default for ShutdownHandler {
    fn default() -> Self {
        Self::process_exit()
    }
}

impl std::fmt::Debug for ShutdownHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownHandler").finish_non_exhaustive()
    }
}

/// Periodically probe the local target; tear the session down and fire the
/// shutdown handler after `max_failures` consecutive failures.
pub(crate) async fn run_local_healthcheck(
    session: Arc<TunnelSession>,
    broker: BrokerClient,
    counters: CounterHandle,
    http: reqwest::Client,
    config: HealthcheckConfig,
    shutdown: ShutdownHandler,
) {
    tokio::select! {
        () = session.cancelled() => return,
        () = sleep(config.initial_delay) => {}
    }

    let mut failures: u32 = 0;
    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = session.cancelled() => {
                info!("healthcheck stopped for tunnel {}", session.id());
                return;
            }
            _ = ticker.tick() => {}
        }

        match http.get(session.local_url()).send().await {
            Ok(_) => {
                if failures > 0 {
                    info!("local service reestablished for tunnel {}", session.id());
                }
                failures = 0;
            }
            Err(e) => {
                failures += 1;
                if e.is_connect() {
                    warn!(
                        "local service refused connection for tunnel {} (attempt {failures})",
                        session.id()
                    );
                } else {
                    warn!(
                        "local healthcheck failed for tunnel {} (attempt {failures}): {e}",
                        session.id()
                    );
                }
                counters.record(Counter::Warns);

                if failures >= config.max_failures {
                    error!(
                        "local service failed {failures} consecutive checks, closing tunnel {}",
                        session.id()
                    );
                    broker.close(session.id()).await;
                    session.stop();
                    shutdown.trigger();
                    return;
                }
            }
        }
    }
}

/// Periodically prove the full tunnel path with a challenge HEAD through the
/// public URL. Observability only: outcomes are counted, never terminal.
pub(crate) async fn run_ping_challenge(
    session: Arc<TunnelSession>,
    counters: CounterHandle,
    http: reqwest::Client,
    config: PingConfig,
) {
    tokio::select! {
        () = session.cancelled() => return,
        () = sleep(config.initial_delay) => {}
    }

    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let url = format!("{}{PING_PATH}", session.session_url());

    loop {
        tokio::select! {
            () = session.cancelled() => {
                info!("ping challenge stopped for tunnel {}", session.id());
                return;
            }
            _ = ticker.tick() => {}
        }

        let response = http
            .head(&url)
            .header(CONTROL_HEADER, HEALTHCHECK_QUESTION)
            .send()
            .await;

        match response {
            Ok(response)
                if response
                    .headers()
                    .get(CONTROL_HEADER)
                    .and_then(|v| v.to_str().ok())
                    == Some(HEALTHCHECK_CONCLUDED) =>
            {
                debug!("ping challenge completed for tunnel {}", session.id());
                counters.record(Counter::Healthchecks);
            }
            Ok(response) => {
                error!(
                    "ping challenge failed for tunnel {}: expected {CONTROL_HEADER}: {HEALTHCHECK_CONCLUDED}, got {:?}",
                    session.id(),
                    response.headers().get(CONTROL_HEADER)
                );
                counters.record(Counter::Errors);
            }
            Err(e) => {
                error!("ping challenge errored for tunnel {}: {e}", session.id());
                counters.record(Counter::Errors);
            }
        }
    }
}
