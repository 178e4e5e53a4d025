// src/supervisor/ready.rs

//! Readiness polling for a subordinate's invoke endpoint.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, trace};

use crate::errors::{ClapLambdaError, Result};

pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(100);

/// Knobs for [`wait_ready_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub probe_timeout: Duration,
}

impl Default for ReadyPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_READY_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

pub fn local_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// Poll `port` with the default interval until it accepts or `limit` passes.
pub async fn wait_ready(port: u16, limit: Duration) -> Result<()> {
    wait_ready_with(
        port,
        ReadyPolicy {
            timeout: limit,
            ..ReadyPolicy::default()
        },
    )
    .await
}

/// Poll `port` until a connection succeeds or `policy.timeout` elapses.
///
/// Sleeps `poll_interval` between attempts and never waits past the overall
/// deadline.
pub async fn wait_ready_with(port: u16, policy: ReadyPolicy) -> Result<()> {
    let started = Instant::now();
    let deadline = started + policy.timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if probe(port, policy.probe_timeout).await {
            debug!(port, attempts, elapsed = ?started.elapsed(), "endpoint is ready");
            return Ok(());
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(ClapLambdaError::ReadinessTimeout {
                port,
                waited_ms: started.elapsed().as_millis(),
            });
        }

        trace!(port, attempts, "endpoint not ready yet");
        sleep(policy.poll_interval.min(deadline - now)).await;
    }
}

/// One short-timeout connection attempt.
pub async fn probe(port: u16, probe_timeout: Duration) -> bool {
    matches!(
        timeout(probe_timeout, TcpStream::connect(local_addr(port))).await,
        Ok(Ok(_))
    )
}
