//! Candidate selection.
//!
//! A [`Provider`] holds the ordered candidates for one logical need and
//! provisions the first one that is possible. A [`Collection`] groups the
//! providers of a test suite by need name, and a [`ServiceFactory`] builds
//! both from a parsed [`Config`](crate::config::Config).

mod collection;
mod factory;

pub use collection::Collection;
pub use factory::ServiceFactory;

use crate::error::{Error, Rejection, Result};
use crate::service::{Availability, ConnectionHandle, Service};
use serde::Serialize;

/// Outcome of a successful [`Provider::resolve`].
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub need: String,
    /// Name of the chosen candidate.
    pub service: String,
    pub kind: &'static str,
    /// Whether `create()` ran (the candidate did not exist yet).
    pub created: bool,
    pub handle: ConnectionHandle,
}

/// Diagnostic view of one candidate, produced by [`Provider::check`].
#[derive(Debug, Clone, Serialize)]
pub struct CandidateReport {
    pub service: String,
    pub kind: &'static str,
    /// `None` when available, otherwise why not.
    pub unavailable: Option<String>,
    /// Only checked for available candidates.
    pub exists: Option<bool>,
}

/// Ordered candidates for one need.
///
/// Candidate order is part of the contract: the first possible candidate
/// wins and later ones are never queried. A chosen candidate that then fails
/// to provision is a hard error; there is no fallthrough.
pub struct Provider {
    need: String,
    candidates: Vec<Box<dyn Service>>,
}

impl Provider {
    pub fn new(need: impl Into<String>) -> Self {
        Self {
            need: need.into(),
            candidates: Vec::new(),
        }
    }

    /// Add a candidate after the existing ones.
    pub fn with(mut self, candidate: impl Service + 'static) -> Self {
        self.candidates.push(Box::new(candidate));
        self
    }

    pub fn push(&mut self, candidate: Box<dyn Service>) {
        self.candidates.push(candidate);
    }

    pub fn need(&self) -> &str {
        &self.need
    }

    pub fn candidates(&self) -> &[Box<dyn Service>] {
        &self.candidates
    }

    /// First possible candidate, or `NoServiceAvailable` with every rejection.
    pub async fn select(&self) -> Result<&dyn Service> {
        let mut rejections = Vec::new();

        for candidate in &self.candidates {
            match candidate.availability().await? {
                Availability::Available => {
                    tracing::debug!(
                        "Need '{}': selected {} candidate '{}'",
                        self.need,
                        candidate.kind(),
                        candidate.name()
                    );
                    return Ok(candidate.as_ref());
                }
                Availability::Unavailable(reason) => {
                    tracing::debug!(
                        "Need '{}': skipping '{}': {}",
                        self.need,
                        candidate.name(),
                        reason
                    );
                    rejections.push(Rejection::new(candidate.name(), reason));
                }
            }
        }

        Err(Error::NoServiceAvailable {
            need: self.need.clone(),
            rejections,
        })
    }

    /// Select a candidate, create it if it does not exist, and wait for it.
    pub async fn resolve(&self) -> Result<Resolution> {
        let service = self.select().await?;

        let created = if service.exists().await? {
            tracing::debug!("'{}' already exists, reusing", service.name());
            false
        } else {
            tracing::info!("Provisioning '{}' for need '{}'", service.name(), self.need);
            service.create().await?;
            true
        };
        let handle = service.get().await?;

        Ok(Resolution {
            need: self.need.clone(),
            service: service.name().to_string(),
            kind: service.kind(),
            created,
            handle,
        })
    }

    /// The handle of the first possible candidate, provisioning it if needed.
    pub async fn get_instance(&self) -> Result<ConnectionHandle> {
        Ok(self.resolve().await?.handle)
    }

    /// Check every candidate without creating anything.
    pub async fn check(&self) -> Result<Vec<CandidateReport>> {
        let mut reports = Vec::with_capacity(self.candidates.len());
        for candidate in &self.candidates {
            let availability = candidate.availability().await?;
            let exists = if availability.is_available() {
                Some(candidate.exists().await?)
            } else {
                None
            };
            reports.push(CandidateReport {
                service: candidate.name().to_string(),
                kind: candidate.kind(),
                unavailable: availability.reason().map(str::to_string),
                exists,
            });
        }
        Ok(reports)
    }

    /// Destroy every possible candidate. Errors are collected, not short-circuited.
    pub async fn down(&self) -> Vec<Error> {
        let mut errors = Vec::new();
        for candidate in &self.candidates {
            match candidate.possible().await {
                Ok(true) => {
                    if let Err(e) = candidate.destroy().await {
                        errors.push(e);
                    }
                }
                Ok(false) => {}
                Err(e) => errors.push(e),
            }
        }
        errors
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("need", &self.need)
            .field(
                "candidates",
                &self.candidates.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
