// Allow unused_assignments at module level because thiserror's generated code
// for struct variants triggers false positive warnings - the fields ARE used
// in the Display impl but rustc's lint pass doesn't see this.
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Why a candidate service was passed over by a [`Provider`](crate::provider::Provider).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Name of the rejected service.
    pub service: String,
    /// Human-readable reason, e.g. "variable PGHOST unset".
    pub reason: String,
}

impl Rejection {
    pub fn new(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.service, self.reason)
    }
}

fn format_rejections(rejections: &[Rejection]) -> String {
    if rejections.is_empty() {
        return "  (no candidates declared)".to_string();
    }
    rejections
        .iter()
        .map(|r| format!("  - {}", r))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Problems with the config file itself (not the environment).
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable '{variable}' {reason}")]
    #[diagnostic(
        code(testservices::configuration),
        help("Export '{variable}' before running the tests, or drop it from the service definition")
    )]
    Configuration { variable: String, reason: String },

    #[error("Failed to provision '{service}': {message}")]
    #[diagnostic(
        code(testservices::provisioning),
        help("Check that the container runtime is running with `docker ps`")
    )]
    Provisioning { service: String, message: String },

    #[error("Timed out after {:.1}s waiting for {target} (limit {:.1}s)", .elapsed.as_secs_f64(), .timeout.as_secs_f64())]
    #[diagnostic(
        code(testservices::timeout),
        help("The service may be slow to start. Raise the readiness timeout or inspect its logs")
    )]
    ProvisioningTimeout {
        target: String,
        elapsed: Duration,
        timeout: Duration,
    },

    #[error("No service available for '{need}':\n{}", format_rejections(.rejections))]
    #[diagnostic(
        code(testservices::no_service),
        help("Start a container runtime or export the variables of an environment-backed candidate")
    )]
    NoServiceAvailable {
        need: String,
        rejections: Vec<Rejection>,
    },

    #[error("Need '{0}' is already managed by this collection")]
    NameConflict(String),

    #[error("Need not found: {0}")]
    #[diagnostic(
        code(testservices::need::not_found),
        help("List the declared needs with `testsvc check`")
    )]
    NeedNotFound(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(testservices::config::validation),
        help("Run `testsvc validate` for detailed validation errors")
    )]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Multiple errors occurred:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<Error>),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn provisioning(service: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Provisioning {
            service: service.into(),
            message: message.into(),
        }
    }

    pub(crate) fn configuration(variable: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Configuration {
            variable: variable.into(),
            reason: reason.into(),
        }
    }

    /// Returns a helpful suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::Configuration { variable, .. } => Some(format!(
                "Set '{}' in the environment (for example `export {}=...`) and retry.",
                variable, variable
            )),
            Error::Provisioning { message, .. } if message.contains("already allocated") => Some(
                "Another container or process holds the host port. Stop it or let the engine pick a port by omitting the host side of the mapping.".to_string()
            ),
            Error::Provisioning { .. } => Some(
                "Check that the container runtime is running: docker ps".to_string()
            ),
            Error::ProvisioningTimeout { .. } => Some(
                "Raise the readiness timeout (`timeout: 120s`) or inspect the container logs with `docker logs <name>`.".to_string()
            ),
            Error::NoServiceAvailable { .. } => Some(
                "Run `testsvc check` to see why each candidate was rejected.".to_string()
            ),
            Error::NeedNotFound(_) => Some(
                "Declared needs live under the 'needs:' section of testservices.yaml.".to_string()
            ),
            Error::Config(msg) if msg.contains("Could not find") => None,
            Error::Config(_) | Error::Validation(_) => Some(
                "Validate your config with: testsvc validate".to_string()
            ),
            _ => None,
        }
    }

    /// Formats the error with its suggestion (if any) for user-friendly display.
    pub fn with_suggestion(&self) -> String {
        match self.suggestion() {
            Some(suggestion) => format!("{}\n\nHint: {}", self, suggestion),
            None => self.to_string(),
        }
    }
}
