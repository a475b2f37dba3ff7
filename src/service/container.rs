use super::{Availability, ConnectionHandle, Service};
use crate::docker::{ContainerRuntime, ContainerSpec, ContainerState, DockerClient, DockerError};
use crate::error::{Error, Result};
use crate::port::PortWaiter;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Total bound on a container becoming ready (port plus log phrases).
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(60);
/// Pause between readiness polls.
pub const DEFAULT_READY_INTERVAL: Duration = Duration::from_millis(100);
/// Log lines attached to errors about containers that died while starting.
const FAILURE_LOG_TAIL: usize = 20;

/// When a container counts as ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    pub timeout: Duration,
    pub interval: Duration,
    /// Phrases that must appear, in order, in the container log.
    pub phrases: Vec<String>,
}

impl Default for Readiness {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_READY_TIMEOUT,
            interval: DEFAULT_READY_INTERVAL,
            phrases: Vec::new(),
        }
    }
}

/// Manages one named container as a disposable service instance.
///
/// The container name is the idempotency key: `create()` reuses a running
/// container, restarts a stopped one, and only launches a new one when none
/// exists.
pub struct ContainerService {
    spec: ContainerSpec,
    runtime: Arc<dyn ContainerRuntime>,
    readiness: Readiness,
    scheme: Option<String>,
    params: BTreeMap<String, String>,
}

impl ContainerService {
    pub fn new(spec: ContainerSpec, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            spec,
            runtime,
            readiness: Readiness::default(),
            scheme: None,
            params: BTreeMap::new(),
        }
    }

    /// Container service talking to the process-wide engine configuration.
    pub fn docker(spec: ContainerSpec) -> Self {
        Self::new(spec, Arc::new(DockerClient::from_env()))
    }

    pub fn with_readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.readiness.timeout = timeout;
        self
    }

    pub fn with_ready_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.readiness.phrases.push(phrase.into());
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    /// Parameter copied into every handle.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn spec(&self) -> &ContainerSpec {
        &self.spec
    }

    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    fn runtime_error(&self, e: DockerError) -> Error {
        Error::provisioning(&self.spec.name, e.to_string())
    }

    fn port_label(&self) -> String {
        format!("container '{}' port {}", self.spec.name, self.spec.ready_port)
    }

    /// Launch, treating a lost name race as "someone else created it".
    async fn launch(&self) -> Result<()> {
        match self.runtime.start(&self.spec).await {
            Ok(()) => Ok(()),
            Err(DockerError::NameInUse { .. }) => {
                tracing::debug!(
                    "Container '{}' appeared while starting it, reusing",
                    self.spec.name
                );
                match self.runtime.find(&self.spec.name).await {
                    Ok(Some(state)) if state.is_running() => Ok(()),
                    Ok(Some(_)) => self
                        .runtime
                        .restart(&self.spec.name)
                        .await
                        .map_err(|e| self.runtime_error(e)),
                    Ok(None) => Err(Error::provisioning(
                        &self.spec.name,
                        "name reported in use but no container found",
                    )),
                    Err(e) => Err(self.runtime_error(e)),
                }
            }
            Err(e) => Err(self.runtime_error(e)),
        }
    }

    /// Error for a container that is no longer running, with its log tail.
    async fn not_running_error(&self, status: &str) -> Error {
        let logs = self
            .runtime
            .logs(&self.spec.name, Some(FAILURE_LOG_TAIL))
            .await
            .unwrap_or_default();
        let mut message = format!("container is {} (image {})", status, self.spec.image);
        if !logs.trim().is_empty() {
            message.push_str("\nlogs:\n");
            message.push_str(logs.trim_end());
        }
        Error::provisioning(&self.spec.name, message)
    }

    /// Poll the log until every readiness phrase has appeared in order.
    async fn wait_for_phrases(&self, deadline: Instant, started: Instant) -> Result<()> {
        if self.readiness.phrases.is_empty() {
            return Ok(());
        }
        loop {
            let log = self
                .runtime
                .logs(&self.spec.name, None)
                .await
                .map_err(|e| self.runtime_error(e))?;
            let missing = first_missing_phrase(&log, &self.readiness.phrases);
            let Some(missing) = missing else {
                return Ok(());
            };

            if !self.runtime.running(&self.spec.name).await {
                return Err(self.not_running_error("not running").await);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::ProvisioningTimeout {
                    target: format!("{} to log {:?}", self.port_label(), missing),
                    elapsed: now - started,
                    timeout: self.readiness.timeout,
                });
            }
            tokio::time::sleep(self.readiness.interval.min(deadline - now)).await;
        }
    }
}

/// The first phrase not found after the previous one, if any.
fn first_missing_phrase<'a>(log: &str, phrases: &'a [String]) -> Option<&'a str> {
    let mut from = 0;
    for phrase in phrases {
        match log[from..].find(phrase.as_str()) {
            Some(index) => from += index + phrase.len(),
            None => return Some(phrase),
        }
    }
    None
}

/// Image reference without the default registry and namespace, so that
/// `postgres:16` and `docker.io/library/postgres:16` compare equal.
fn short_image(image: &str) -> &str {
    let image = image.strip_prefix("docker.io/").unwrap_or(image);
    image.strip_prefix("library/").unwrap_or(image)
}

/// Image the running container was started from, when it is not `configured`.
fn image_mismatch<'a>(configured: &str, state: &'a ContainerState) -> Option<&'a str> {
    if state.image.is_empty() || short_image(&state.image) == short_image(configured) {
        None
    } else {
        Some(&state.image)
    }
}

#[async_trait]
impl Service for ContainerService {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn kind(&self) -> &'static str {
        "container"
    }

    async fn availability(&self) -> Result<Availability> {
        if self.runtime.ping().await {
            Ok(Availability::Available)
        } else {
            Ok(Availability::Unavailable(format!(
                "container runtime {} unreachable",
                self.runtime.describe()
            )))
        }
    }

    async fn exists(&self) -> Result<bool> {
        let state = self
            .runtime
            .find(&self.spec.name)
            .await
            .map_err(|e| self.runtime_error(e))?;
        Ok(state.is_some_and(|s| s.is_running()))
    }

    async fn create(&self) -> Result<()> {
        let state = self
            .runtime
            .find(&self.spec.name)
            .await
            .map_err(|e| self.runtime_error(e))?;

        match state {
            Some(state) if state.is_running() => {
                match image_mismatch(&self.spec.image, &state) {
                    Some(running) => tracing::warn!(
                        "Container '{}' runs image {} but {} is configured; reusing it anyway. \
                         Destroy it to pick up the configured image",
                        self.spec.name,
                        running,
                        self.spec.image
                    ),
                    None => {
                        tracing::debug!("Container '{}' already running, reusing", self.spec.name)
                    }
                }
                Ok(())
            }
            Some(state) => {
                tracing::info!(
                    "Container '{}' exists but is {}, restarting",
                    self.spec.name,
                    state.status
                );
                self.runtime
                    .restart(&self.spec.name)
                    .await
                    .map_err(|e| self.runtime_error(e))
            }
            None => {
                tracing::info!(
                    "Starting container '{}' from {}",
                    self.spec.name,
                    self.spec.image
                );
                self.launch().await
            }
        }
    }

    async fn get(&self) -> Result<ConnectionHandle> {
        let started = Instant::now();
        let deadline = started + self.readiness.timeout;

        let state = self
            .runtime
            .find(&self.spec.name)
            .await
            .map_err(|e| self.runtime_error(e))?
            .ok_or_else(|| {
                Error::provisioning(&self.spec.name, "no such container; create() it first")
            })?;
        if !state.is_running() {
            return Err(self.not_running_error(&state.status.to_string()).await);
        }

        let host_port = state
            .host_port(self.spec.ready_port)
            .or_else(|| self.spec.ready_mapping().and_then(|m| m.host))
            .ok_or_else(|| {
                Error::provisioning(
                    &self.spec.name,
                    format!("port {} is not published", self.spec.ready_port),
                )
            })?;

        let waiter = PortWaiter::new(&self.spec.host, host_port)
            .with_timeout(self.readiness.timeout)
            .with_interval(self.readiness.interval)
            .labeled(self.port_label());
        match waiter.wait().await {
            Ok(_) => {}
            Err(timeout @ Error::ProvisioningTimeout { .. }) => {
                if !self.runtime.running(&self.spec.name).await {
                    return Err(self.not_running_error("not running").await);
                }
                return Err(timeout);
            }
            Err(e) => return Err(e),
        }

        self.wait_for_phrases(deadline, started).await?;
        tracing::debug!(
            "Container '{}' ready on {}:{} after {:?}",
            self.spec.name,
            self.spec.host,
            host_port,
            started.elapsed()
        );

        let mut handle = ConnectionHandle::new(&self.spec.host, host_port);
        handle.scheme = self.scheme.clone();
        handle.params = self.params.clone();
        Ok(handle)
    }

    async fn destroy(&self) -> Result<()> {
        tracing::info!("Removing container '{}'", self.spec.name);
        self.runtime
            .remove(&self.spec.name)
            .await
            .map_err(|e| self.runtime_error(e))
    }
}
