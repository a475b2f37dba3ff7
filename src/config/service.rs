//! Candidate service configuration types.
//!
//! Each entry under a need is one candidate, tried in the order written:
//!
//! ```yaml
//! needs:
//!   postgres:
//!     - env:
//!         name: ci-postgres
//!         preset: postgres
//!     - container:
//!         name: pg-test
//!         preset: postgres
//!         image: postgres:16
//! ```

use crate::docker::PortMapping;
use crate::service::Preset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One candidate for a need.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CandidateConfig {
    /// A container launched on demand
    Container { container: ContainerConfig },
    /// An instance described by environment variables
    Env { env: EnvConfig },
}

impl CandidateConfig {
    pub fn name(&self) -> &str {
        match self {
            CandidateConfig::Container { container } => &container.name,
            CandidateConfig::Env { env } => &env.name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CandidateConfig::Container { .. } => "container",
            CandidateConfig::Env { .. } => "environment",
        }
    }
}

/// A container-backed candidate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Container name; reused across runs.
    pub name: String,

    /// Database preset (postgres, mysql, mariadb, clickhouse)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,

    /// Image reference. Required without a preset, overrides the preset's default otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Published ports (`"5432"`, `"15432:5432"`, `"127.0.0.1:15432:5432"`).
    /// Defaults to the readiness port on an engine-chosen host port.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,

    /// Container port to wait on. Defaults to the preset's port, or the single published port.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_port: Option<u16>,

    /// Log phrases that must appear, in order, before the service is ready.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ready_phrases: Vec<String>,

    /// Readiness timeout (e.g., "60s", "2m")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Readiness poll interval (e.g., "100ms")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    /// Host the published ports are reached on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default)]
    pub always_pull: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,

    /// Extra handle parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,

    // Preset login overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

impl ContainerConfig {
    pub fn preset(&self) -> Result<Option<Preset>, String> {
        self.preset.as_deref().map(str::parse).transpose()
    }

    /// Parsed `ports`, in declaration order.
    pub fn port_mappings(&self) -> Result<Vec<PortMapping>, String> {
        self.ports.iter().map(|p| p.parse()).collect()
    }

    /// Container port to wait on: explicit, the preset's, or the only published port.
    pub fn resolved_ready_port(&self) -> Result<u16, String> {
        if let Some(port) = self.ready_port {
            return Ok(port);
        }
        if let Some(preset) = self.preset()? {
            return Ok(preset.port());
        }
        match self.port_mappings()?.as_slice() {
            [only] => Ok(only.container),
            [] => Err("no ready_port: set ready_port, publish a port, or use a preset".to_string()),
            _ => Err("several ports published: set ready_port to the one to wait on".to_string()),
        }
    }
}

/// An environment-backed candidate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvConfig {
    pub name: String,

    /// Variable preset; `postgres` reads the libpq `PG*` variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,

    /// URL-style variable (e.g., `DATABASE_URL`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Host variable name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Port variable name; when set, the port is liveness-checked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_port: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,

    /// Handle parameter to variable name; the variables must be set
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,

    /// Handle parameter to variable name; read when set
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub optional_params: BTreeMap<String, String>,

    /// Bound on waiting for the port (e.g., "5s")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

impl EnvConfig {
    /// Only the postgres preset has a variable convention.
    pub fn preset(&self) -> Result<Option<Preset>, String> {
        match self.preset.as_deref().map(str::parse::<Preset>).transpose()? {
            Some(Preset::Postgres) => Ok(Some(Preset::Postgres)),
            Some(other) => Err(format!(
                "preset '{}' has no environment variant (only postgres does)",
                other
            )),
            None => Ok(None),
        }
    }
}
