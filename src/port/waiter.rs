//! Port Waiter: bounded TCP reachability checks.

use crate::error::{Error, Result};
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

/// Pause between polling attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Total bound on a polling wait.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);
/// Bound on a single connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Outcome of one connection attempt that did not fail fatally.
enum Attempt {
    Accepted,
    NotReady(String),
}

/// Checks whether `host:port` accepts TCP connections.
///
/// [`check`](Self::check) makes one attempt; [`wait`](Self::wait) polls at a
/// fixed interval until the endpoint accepts or the timeout elapses.
/// "Refused", "unreachable" and per-attempt timeouts mean "not ready yet";
/// anything else (for example a host name that does not resolve) aborts
/// with [`Error::Provisioning`].
#[derive(Debug, Clone)]
pub struct PortWaiter {
    host: String,
    port: u16,
    timeout: Duration,
    interval: Duration,
    connect_timeout: Duration,
    label: Option<String>,
}

impl PortWaiter {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_WAIT_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            label: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Describe what is listening, e.g. "container 'pg-test' port 5432".
    /// Used in error messages.
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn target(&self) -> String {
        match &self.label {
            Some(label) => format!("{} ({})", label, self.endpoint()),
            None => self.endpoint(),
        }
    }

    /// Single-shot mode: one attempt, no waiting.
    pub async fn check(&self) -> Result<bool> {
        match self.attempt().await? {
            Attempt::Accepted => Ok(true),
            Attempt::NotReady(reason) => {
                tracing::debug!("{} not accepting connections: {}", self.target(), reason);
                Ok(false)
            }
        }
    }

    /// Polling mode: retry until the endpoint accepts or the timeout elapses.
    ///
    /// Returns the time spent waiting. The first attempt is made immediately.
    pub async fn wait(&self) -> Result<Duration> {
        let start = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let reason = match self.attempt().await? {
                Attempt::Accepted => {
                    let elapsed = start.elapsed();
                    tracing::debug!(
                        "{} accepted a connection after {:?} ({} attempt(s))",
                        self.target(),
                        elapsed,
                        attempts
                    );
                    return Ok(elapsed);
                }
                Attempt::NotReady(reason) => reason,
            };

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                tracing::debug!(
                    "Gave up on {} after {} attempt(s); last error: {}",
                    self.target(),
                    attempts,
                    reason
                );
                return Err(Error::ProvisioningTimeout {
                    target: self.target(),
                    elapsed,
                    timeout: self.timeout,
                });
            }
            tokio::time::sleep(self.interval.min(self.timeout - elapsed)).await;
        }
    }

    async fn resolve(&self) -> Result<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| {
                Error::provisioning(
                    self.target(),
                    format!("cannot resolve host '{}': {}", self.host, e),
                )
            })?
            .collect();
        if addrs.is_empty() {
            return Err(Error::provisioning(
                self.target(),
                format!("host '{}' resolved to no addresses", self.host),
            ));
        }
        Ok(addrs)
    }

    async fn attempt(&self) -> Result<Attempt> {
        let mut last = String::new();
        for addr in self.resolve().await? {
            match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr)).await {
                Ok(Ok(_stream)) => return Ok(Attempt::Accepted),
                Ok(Err(e)) if is_not_ready(&e) => last = format!("{}: {}", addr, e),
                Ok(Err(e)) => {
                    return Err(Error::provisioning(
                        self.target(),
                        format!("unexpected error connecting to {}: {}", addr, e),
                    ))
                }
                Err(_) => {
                    last = format!(
                        "{}: no answer within {:?}",
                        addr, self.connect_timeout
                    )
                }
            }
        }
        Ok(Attempt::NotReady(last))
    }
}

/// Errors that mean "nothing is listening yet" rather than a misconfiguration.
fn is_not_ready(e: &io::Error) -> bool {
    use io::ErrorKind::*;
    matches!(
        e.kind(),
        ConnectionRefused
            | ConnectionReset
            | ConnectionAborted
            | NotConnected
            | TimedOut
            | Interrupted
            | HostUnreachable
            | NetworkUnreachable
            | AddrNotAvailable
    )
}
