//! Service factory for creating services from configuration.
//!
//! This module handles:
//! - Building a [`ContainerService`] or [`EnvService`] for each candidate
//! - Applying presets before explicit overrides
//! - Sharing one container runtime between all container candidates

use super::{Collection, Provider};
use crate::config::{
    parse_duration, CandidateConfig, Config, ContainerConfig, EnvConfig, VarSource,
};
use crate::docker::{ContainerRuntime, ContainerSpec, DockerClient, PortMapping};
use crate::error::{Error, Result};
use crate::service::{ContainerService, Credentials, EnvService, Service};
use std::sync::Arc;

/// Builds services from candidate configuration.
#[derive(Clone)]
pub struct ServiceFactory {
    runtime: Arc<dyn ContainerRuntime>,
    vars: VarSource,
}

impl ServiceFactory {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, vars: VarSource) -> Self {
        Self { runtime, vars }
    }

    /// Factory using the process-wide engine configuration and environment.
    pub fn from_env() -> Self {
        Self::new(Arc::new(DockerClient::from_env()), VarSource::Process)
    }

    pub fn runtime(&self) -> &Arc<dyn ContainerRuntime> {
        &self.runtime
    }

    /// Build a validated config into a collection, one provider per need.
    pub fn collection(&self, config: &Config) -> Result<Collection> {
        config.validate()?;
        let mut collection = Collection::new();
        for (need, candidates) in &config.needs {
            collection.manage(self.provider(need, candidates)?)?;
        }
        Ok(collection)
    }

    pub fn provider(&self, need: &str, candidates: &[CandidateConfig]) -> Result<Provider> {
        let mut provider = Provider::new(need);
        for candidate in candidates {
            provider.push(self.service(candidate)?);
        }
        Ok(provider)
    }

    pub fn service(&self, candidate: &CandidateConfig) -> Result<Box<dyn Service>> {
        Ok(match candidate {
            CandidateConfig::Container { container } => Box::new(self.container(container)?),
            CandidateConfig::Env { env } => Box::new(self.env(env)?),
        })
    }

    pub fn container(&self, config: &ContainerConfig) -> Result<ContainerService> {
        let invalid = |e: String| Error::Validation(format!("Candidate '{}': {}", config.name, e));
        let preset = config.preset().map_err(invalid)?;
        let ready_port = config.resolved_ready_port().map_err(invalid)?;
        let mappings = config.port_mappings().map_err(invalid)?;

        let credentials = preset.map(|preset| {
            let defaults = preset.credentials();
            Credentials {
                user: config.user.clone().unwrap_or(defaults.user),
                password: config.password.clone().unwrap_or(defaults.password),
                database: config.database.clone().unwrap_or(defaults.database),
            }
        });

        let mut spec = match (preset, &credentials) {
            (Some(preset), Some(credentials)) => {
                preset.spec(&config.name, config.image.as_deref(), credentials)
            }
            _ => {
                let image = config.image.as_deref().ok_or_else(|| {
                    invalid("set either 'image' or 'preset'".to_string())
                })?;
                ContainerSpec::new(&config.name, image, ready_port)
            }
        };
        spec.ready_port = ready_port;
        if !mappings.is_empty() {
            spec = spec.with_ports(mappings);
        } else if spec.ready_mapping().is_none() {
            spec = spec.with_ports(vec![PortMapping::ephemeral(ready_port)]);
        }
        for (key, value) in &config.env {
            spec = spec.with_env(key, value);
        }
        for volume in &config.volumes {
            spec = spec.with_volume(volume);
        }
        if let Some(host) = &config.host {
            spec = spec.with_host(host);
        }
        spec = spec.always_pull(config.always_pull);

        let mut service = ContainerService::new(spec, Arc::clone(&self.runtime));
        if let (Some(preset), Some(credentials)) = (preset, &credentials) {
            service = preset.configure(service, credentials);
        }
        if let Some(timeout) = &config.timeout {
            service = service.with_timeout(parse_duration("timeout", timeout)?);
        }
        if let Some(interval) = &config.interval {
            let mut readiness = service.readiness().clone();
            readiness.interval = parse_duration("interval", interval)?;
            service = service.with_readiness(readiness);
        }
        for phrase in &config.ready_phrases {
            service = service.with_ready_phrase(phrase);
        }
        if let Some(scheme) = &config.scheme {
            service = service.with_scheme(scheme);
        }
        for (key, value) in &config.params {
            service = service.with_param(key, value);
        }
        Ok(service)
    }

    pub fn env(&self, config: &EnvConfig) -> Result<EnvService> {
        let preset = config
            .preset()
            .map_err(|e| Error::Validation(format!("Candidate '{}': {}", config.name, e)))?;

        let mut service = match preset {
            Some(_) => EnvService::postgres(&config.name),
            None => EnvService::new(&config.name),
        };
        service = service.with_vars(self.vars.clone());
        if let Some(url) = &config.url {
            service = service.with_url_var(url);
        }
        if let Some(host) = &config.host {
            service = service.with_host_var(host);
        }
        if let Some(port) = &config.port {
            service = service.with_port_var(port);
        }
        if let Some(port) = config.default_port {
            service = service.with_default_port(port);
        }
        if let Some(scheme) = &config.scheme {
            service = service.with_scheme(scheme);
        }
        for (key, variable) in &config.params {
            service = service.with_param(key, variable);
        }
        for (key, variable) in &config.optional_params {
            service = service.with_optional_param(key, variable);
        }
        if let Some(timeout) = &config.timeout {
            service = service.with_timeout(parse_duration("timeout", timeout)?);
        }
        Ok(service)
    }
}
