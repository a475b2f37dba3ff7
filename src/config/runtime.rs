//! Container engine endpoint configuration.
//!
//! Resolved once per process from the environment and shared read-only by
//! every container-backed service. Tests construct it explicitly instead.

use super::{parse_duration, VarSource};
use crate::error::Result;
use std::sync::OnceLock;
use std::time::Duration;

/// Engine binary to invoke (`docker`, `podman`, or a full path).
pub const RUNTIME_BINARY_VAR: &str = "TESTSERVICES_RUNTIME";
/// Engine endpoint (socket or TCP URL). Falls back to `DOCKER_HOST`.
pub const RUNTIME_ENDPOINT_VAR: &str = "TESTSERVICES_CONTAINER_HOST";
pub const PING_TIMEOUT_VAR: &str = "TESTSERVICES_PING_TIMEOUT";
pub const COMMAND_TIMEOUT_VAR: &str = "TESTSERVICES_COMMAND_TIMEOUT";
pub const PULL_TIMEOUT_VAR: &str = "TESTSERVICES_PULL_TIMEOUT";

const DEFAULT_BINARY: &str = "docker";
const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_PULL_TIMEOUT: Duration = Duration::from_secs(300);

static GLOBAL: OnceLock<RuntimeConfig> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Engine CLI binary.
    pub binary: String,
    /// Endpoint handed to the engine; `None` uses the engine's own default.
    pub endpoint: Option<String>,
    /// Bound on the cheap reachability check behind `possible()`.
    pub ping_timeout: Duration,
    /// Bound on ordinary engine commands (inspect, run, start, rm, logs).
    pub command_timeout: Duration,
    /// Bound on image pulls.
    pub pull_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            endpoint: None,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            pull_timeout: DEFAULT_PULL_TIMEOUT,
        }
    }
}

impl RuntimeConfig {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            ..Self::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Resolve from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(&VarSource::Process)
    }

    pub fn from_vars(vars: &VarSource) -> Result<Self> {
        let mut config = Self::default();

        if let Some(binary) = vars.non_empty(RUNTIME_BINARY_VAR) {
            config.binary = binary.trim().to_string();
        }
        config.endpoint = vars
            .non_empty(RUNTIME_ENDPOINT_VAR)
            .or_else(|| vars.non_empty(config.endpoint_env_var()))
            .map(|e| e.trim().to_string());

        if let Some(value) = vars.non_empty(PING_TIMEOUT_VAR) {
            config.ping_timeout = parse_duration(PING_TIMEOUT_VAR, &value)?;
        }
        if let Some(value) = vars.non_empty(COMMAND_TIMEOUT_VAR) {
            config.command_timeout = parse_duration(COMMAND_TIMEOUT_VAR, &value)?;
        }
        if let Some(value) = vars.non_empty(PULL_TIMEOUT_VAR) {
            config.pull_timeout = parse_duration(PULL_TIMEOUT_VAR, &value)?;
        }

        Ok(config)
    }

    /// Process-wide configuration, resolved on first use.
    ///
    /// An unparsable environment falls back to defaults with a warning so a
    /// bad timeout variable does not take down every container candidate.
    pub fn global() -> &'static RuntimeConfig {
        GLOBAL.get_or_init(|| match Self::from_env() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring invalid container runtime settings: {}", e);
                Self::default()
            }
        })
    }

    /// Variable the engine CLI reads its endpoint from.
    pub fn endpoint_env_var(&self) -> &'static str {
        if self.is_podman() {
            "CONTAINER_HOST"
        } else {
            "DOCKER_HOST"
        }
    }

    pub fn is_podman(&self) -> bool {
        std::path::Path::new(&self.binary)
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("podman"))
    }

    /// Short description for diagnostics, e.g. `docker (unix:///run/docker.sock)`.
    pub fn describe(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => format!("{} ({})", self.binary, endpoint),
            None => self.binary.clone(),
        }
    }
}
