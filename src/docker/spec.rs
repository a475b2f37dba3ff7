//! Launch attributes for a container-backed service.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Address published ports bind to when a mapping names no host IP.
pub const DEFAULT_HOST_IP: &str = "127.0.0.1";

/// A published port: `[host-ip:][host-port:]container-port[/tcp]`.
///
/// An IPv6 host IP is written in brackets, as in `[::1]:15432:5432`.
/// A missing host port lets the engine pick one; it is read back from the
/// engine whenever a handle is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub host_ip: Option<String>,
    pub host: Option<u16>,
    pub container: u16,
}

impl PortMapping {
    /// Publish `container` on an engine-chosen host port.
    pub fn ephemeral(container: u16) -> Self {
        Self {
            host_ip: None,
            host: None,
            container,
        }
    }

    /// Publish `container` on a fixed host port.
    pub fn fixed(host: u16, container: u16) -> Self {
        Self {
            host_ip: None,
            host: Some(host),
            container,
        }
    }

    /// Argument for `-p`. Always names a host IP so nothing binds to every interface.
    pub fn publish_arg(&self) -> String {
        let ip = bracketed(self.host_ip.as_deref().unwrap_or(DEFAULT_HOST_IP));
        match self.host {
            Some(host) => format!("{}:{}:{}", ip, host, self.container),
            None => format!("{}::{}", ip, self.container),
        }
    }
}

fn bracketed(ip: &str) -> String {
    if ip.contains(':') {
        format!("[{}]", ip)
    } else {
        ip.to_string()
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ip) = &self.host_ip {
            write!(f, "{}:", bracketed(ip))?;
        }
        match self.host {
            Some(host) => write!(f, "{}:{}", host, self.container),
            None => write!(f, "{}", self.container),
        }
    }
}

impl FromStr for PortMapping {
    type Err = String;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err("Empty port specification".to_string());
        }

        // Reject binding to all interfaces (0.0.0.0 for IPv4, [::] for IPv6)
        if spec.starts_with("0.0.0.0:") || spec.starts_with("[::]") {
            return Err(format!(
                "Binding to all interfaces (0.0.0.0 or [::]) not allowed: '{}'",
                spec
            ));
        }

        let port_part = match spec.split_once('/') {
            Some((ports, "tcp")) => ports,
            Some((_, proto)) => {
                return Err(format!(
                    "Only tcp ports can be waited on, got '{}' in '{}'",
                    proto, spec
                ))
            }
            None => spec,
        };

        let parse_port = |s: &str| -> Result<u16, String> {
            match s.parse::<u16>() {
                Ok(0) => Err(format!("Port 0 not allowed in port specification: '{}'", spec)),
                Ok(port) => Ok(port),
                Err(_) => Err(format!("Invalid port '{}' in '{}'", s, spec)),
            }
        };

        if let Some(inner) = port_part.strip_prefix('[') {
            let (ip, rest) = inner
                .split_once("]:")
                .ok_or_else(|| format!("Unterminated IPv6 host IP in '{}'", spec))?;
            if ip.is_empty() {
                return Err(format!("Empty host IP in '{}'", spec));
            }
            let (host, container) = rest
                .split_once(':')
                .ok_or_else(|| format!("Invalid port specification: '{}'", spec))?;
            let host = if host.is_empty() {
                None
            } else {
                Some(parse_port(host)?)
            };
            return Ok(Self {
                host_ip: Some(ip.to_string()),
                host,
                container: parse_port(container)?,
            });
        }

        let components: Vec<&str> = port_part.split(':').collect();
        match components.as_slice() {
            [container] => Ok(Self::ephemeral(parse_port(container)?)),
            [host, container] => Ok(Self {
                host_ip: None,
                host: Some(parse_port(host)?),
                container: parse_port(container)?,
            }),
            [ip, host, container] => {
                if ip.is_empty() {
                    return Err(format!("Empty host IP in '{}'", spec));
                }
                let host = if host.is_empty() {
                    None
                } else {
                    Some(parse_port(host)?)
                };
                Ok(Self {
                    host_ip: Some(ip.to_string()),
                    host,
                    container: parse_port(container)?,
                })
            }
            _ => Err(format!("Invalid port specification: '{}'", spec)),
        }
    }
}

/// Everything needed to launch one named container.
///
/// `name` is the idempotency key: launching a spec whose name already exists
/// reuses that container instead of creating a second one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub ports: Vec<PortMapping>,
    pub env: BTreeMap<String, String>,
    pub volumes: Vec<String>,
    /// Container port that must accept connections before the service is ready.
    pub ready_port: u16,
    /// Host the published ports are reached on.
    pub host: String,
    /// Pull the image even when it is present locally.
    pub always_pull: bool,
}

impl ContainerSpec {
    /// A spec publishing `ready_port` on an engine-chosen host port.
    pub fn new(name: impl Into<String>, image: impl Into<String>, ready_port: u16) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            ports: vec![PortMapping::ephemeral(ready_port)],
            env: BTreeMap::new(),
            volumes: Vec::new(),
            ready_port,
            host: DEFAULT_HOST_IP.to_string(),
            always_pull: false,
        }
    }

    /// Replace the published ports.
    pub fn with_ports(mut self, ports: Vec<PortMapping>) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_volume(mut self, volume: impl Into<String>) -> Self {
        self.volumes.push(volume.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn always_pull(mut self, always: bool) -> Self {
        self.always_pull = always;
        self
    }

    /// Mapping that publishes the readiness port, if any.
    pub fn ready_mapping(&self) -> Option<&PortMapping> {
        self.ports.iter().find(|p| p.container == self.ready_port)
    }
}

/// Check a name against the engine's `[a-zA-Z0-9][a-zA-Z0-9_.-]*` rule.
pub fn validate_container_name(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    match chars.next() {
        None => return Err("Container name must not be empty".to_string()),
        Some(c) if !c.is_ascii_alphanumeric() => {
            return Err(format!(
                "Container name '{}' must start with a letter or digit",
                name
            ))
        }
        _ => {}
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
    {
        return Err(format!(
            "Container name '{}' contains invalid character '{}'",
            name, bad
        ));
    }
    Ok(())
}
