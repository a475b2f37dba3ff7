//! Container Runtime Adapter.
//!
//! A narrow capability over the container engine: reachability, lookup by
//! name, start, restart, removal and logs. [`DockerClient`] implements it by
//! driving the `docker` (or `podman`) CLI; tests plug in fakes.

pub mod client;
pub mod error;
pub mod spec;

pub use client::DockerClient;
pub use error::DockerError;
pub use spec::{validate_container_name, ContainerSpec, PortMapping, DEFAULT_HOST_IP};

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

/// Engine-reported lifecycle state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Unknown,
}

impl ContainerStatus {
    /// Parse `.State.Status` as printed by docker and podman.
    pub fn parse(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "created" | "configured" | "initialized" => ContainerStatus::Created,
            "running" => ContainerStatus::Running,
            "paused" => ContainerStatus::Paused,
            "restarting" => ContainerStatus::Restarting,
            "removing" => ContainerStatus::Removing,
            "exited" | "stopped" => ContainerStatus::Exited,
            "dead" => ContainerStatus::Dead,
            _ => ContainerStatus::Unknown,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ContainerStatus::Running)
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerStatus::Created => write!(f, "created"),
            ContainerStatus::Running => write!(f, "running"),
            ContainerStatus::Paused => write!(f, "paused"),
            ContainerStatus::Restarting => write!(f, "restarting"),
            ContainerStatus::Removing => write!(f, "removing"),
            ContainerStatus::Exited => write!(f, "exited"),
            ContainerStatus::Dead => write!(f, "dead"),
            ContainerStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Snapshot of one container as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerState {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: ContainerStatus,
    /// Published ports: container port to host port.
    pub ports: HashMap<u16, u16>,
}

impl ContainerState {
    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    /// Host port currently published for `container_port`.
    pub fn host_port(&self, container_port: u16) -> Option<u16> {
        self.ports.get(&container_port).copied()
    }
}

/// The container engine capability consumed by container-backed services.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Cheap reachability check. Never errors: unreachable is `false`.
    async fn ping(&self) -> bool;

    /// Look up a container by name, running or not.
    async fn find(&self, name: &str) -> Result<Option<ContainerState>, DockerError>;

    /// Launch a new container from `spec`, pulling the image if needed.
    ///
    /// Fails with [`DockerError::NameInUse`] if the name is already taken.
    async fn start(&self, spec: &ContainerSpec) -> Result<(), DockerError>;

    /// Start an existing, stopped container.
    async fn restart(&self, name: &str) -> Result<(), DockerError>;

    /// Whether a container with this name exists and is running.
    async fn running(&self, name: &str) -> bool {
        matches!(self.find(name).await, Ok(Some(state)) if state.is_running())
    }

    /// Force-remove a container. Succeeds if it does not exist.
    async fn remove(&self, name: &str) -> Result<(), DockerError>;

    /// Combined stdout/stderr log of the container, optionally only the last `tail` lines.
    async fn logs(&self, name: &str, tail: Option<usize>) -> Result<String, DockerError>;

    /// Short description of the engine for diagnostics.
    fn describe(&self) -> String;
}
