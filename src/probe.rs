//! Database readiness probe
//!
//! Container start order is not guaranteed across an orchestrated
//! deployment, so the launch blocks here until the database answers a TCP
//! connect, up to a configurable attempt ceiling. One [`ProbeResult`] is
//! produced per polling iteration; only the terminal outcome matters.

use crate::error::{StokerError, StokerResult};
use crate::shutdown::ShutdownSignal;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, info};

/// Outcome of a single reachability attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    Reachable { attempt: u32 },
    NotYet { attempt: u32 },
}

/// Attempt one TCP connect with a bounded connect timeout
async fn attempt(host: &str, port: u16, connect_timeout: Duration, n: u32) -> ProbeResult {
    match timeout(connect_timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => ProbeResult::Reachable { attempt: n },
        Ok(Err(e)) => {
            debug!("Probe attempt {} failed: {}", n, e);
            ProbeResult::NotYet { attempt: n }
        }
        Err(_) => {
            debug!("Probe attempt {} timed out", n);
            ProbeResult::NotYet { attempt: n }
        }
    }
}

/// Block until `host:port` accepts a TCP connection.
///
/// Performs exactly `attempts` tries at most, sleeping `interval` between
/// failed tries, and fails with `DependencyUnreachable` after the last.
/// A termination signal cancels the probe mid-sleep or mid-connect.
pub async fn wait_for_tcp(
    host: &str,
    port: u16,
    attempts: u32,
    interval: Duration,
    shutdown: &mut ShutdownSignal,
) -> StokerResult<()> {
    // A zero-length connect timeout would never succeed.
    let connect_timeout = interval.max(Duration::from_secs(1));

    for n in 1..=attempts {
        if shutdown.is_triggered() {
            return Err(StokerError::Interrupted);
        }

        let result = tokio::select! {
            r = attempt(host, port, connect_timeout, n) => r,
            _ = shutdown.recv() => return Err(StokerError::Interrupted),
        };

        match result {
            ProbeResult::Reachable { attempt } => {
                info!("Database reachable at {}:{} (attempt {})", host, port, attempt);
                return Ok(());
            }
            ProbeResult::NotYet { .. } if n < attempts => {
                tokio::select! {
                    _ = sleep(interval) => {}
                    _ = shutdown.recv() => return Err(StokerError::Interrupted),
                }
            }
            ProbeResult::NotYet { .. } => {}
        }
    }

    Err(StokerError::DependencyUnreachable {
        host: host.to_string(),
        port,
        attempts,
    })
}
