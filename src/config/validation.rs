use super::{parse_duration_string, CandidateConfig, Config, ContainerConfig, EnvConfig};
use crate::docker::validate_container_name;
use crate::error::{Error, Result};
use std::collections::HashSet;

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();

        for (need, candidates) in &self.needs {
            if need.trim().is_empty() {
                return Err(Error::Validation("Need names must not be empty".to_string()));
            }
            if candidates.is_empty() {
                return Err(Error::Validation(format!(
                    "Need '{}' declares no candidates. Add at least one 'container' or 'env' entry",
                    need
                )));
            }

            for candidate in candidates {
                // Candidate names identify containers and rejections, so they must be unique
                if !names.insert(candidate.name()) {
                    return Err(Error::Validation(format!(
                        "Candidate name '{}' is used more than once",
                        candidate.name()
                    )));
                }

                match candidate {
                    CandidateConfig::Container { container } => {
                        validate_container(need, container)?
                    }
                    CandidateConfig::Env { env } => validate_env(need, env)?,
                }
            }
        }

        Ok(())
    }
}

fn invalid(need: &str, candidate: &str, message: impl std::fmt::Display) -> Error {
    Error::Validation(format!("Need '{}', candidate '{}': {}", need, candidate, message))
}

fn validate_duration(need: &str, candidate: &str, field: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(value) if parse_duration_string(value).is_none() => Err(invalid(
            need,
            candidate,
            format!(
                "invalid {} '{}'. Use formats like '5s', '30s', '1m', '500ms'",
                field, value
            ),
        )),
        _ => Ok(()),
    }
}

fn validate_container(need: &str, config: &ContainerConfig) -> Result<()> {
    let name = config.name.as_str();
    validate_container_name(name).map_err(|e| invalid(need, name, e))?;

    let preset = config.preset().map_err(|e| invalid(need, name, e))?;
    match (&config.image, preset) {
        (Some(image), _) if image.trim().is_empty() => {
            return Err(invalid(need, name, "image must not be empty"));
        }
        (None, None) => {
            return Err(invalid(need, name, "set either 'image' or 'preset'"));
        }
        _ => {}
    }
    if preset.is_none()
        && (config.user.is_some() || config.password.is_some() || config.database.is_some())
    {
        return Err(invalid(
            need,
            name,
            "user/password/database only apply to presets; use 'env' and 'params' instead",
        ));
    }

    let mappings = config.port_mappings().map_err(|e| invalid(need, name, e))?;
    let ready_port = config
        .resolved_ready_port()
        .map_err(|e| invalid(need, name, e))?;
    if !mappings.is_empty() && !mappings.iter().any(|m| m.container == ready_port) {
        return Err(invalid(
            need,
            name,
            format!("ready_port {} is not among the published ports", ready_port),
        ));
    }
    let mut host_ports = HashSet::new();
    for host in mappings.iter().filter_map(|m| m.host) {
        if !host_ports.insert(host) {
            return Err(invalid(
                need,
                name,
                format!("host port {} is published twice", host),
            ));
        }
    }

    if config.ready_phrases.iter().any(|p| p.is_empty()) {
        return Err(invalid(need, name, "ready_phrases must not contain empty phrases"));
    }
    validate_duration(need, name, "timeout", config.timeout.as_deref())?;
    validate_duration(need, name, "interval", config.interval.as_deref())?;
    Ok(())
}

fn validate_env(need: &str, config: &EnvConfig) -> Result<()> {
    let name = config.name.as_str();
    if name.trim().is_empty() {
        return Err(Error::Validation(format!(
            "Need '{}' has an env candidate without a name",
            need
        )));
    }

    let preset = config.preset().map_err(|e| invalid(need, name, e))?;
    if preset.is_none() && config.url.is_none() && config.host.is_none() {
        return Err(invalid(
            need,
            name,
            "declare a 'url' or 'host' variable (or use preset: postgres)",
        ));
    }

    let variables = config
        .url
        .iter()
        .chain(config.host.iter())
        .chain(config.port.iter())
        .chain(config.params.values())
        .chain(config.optional_params.values());
    for variable in variables {
        if variable.trim().is_empty() || variable.contains('=') {
            return Err(invalid(
                need,
                name,
                format!("'{}' is not a valid environment variable name", variable),
            ));
        }
    }

    if config.default_port == Some(0) {
        return Err(invalid(need, name, "default_port must not be 0"));
    }
    validate_duration(need, name, "timeout", config.timeout.as_deref())?;
    Ok(())
}
