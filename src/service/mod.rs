//! Provisioning strategies.
//!
//! This module provides the [`Service`] trait and its implementations:
//!
//! - **Container services** ([`ContainerService`]): one named container per instance
//! - **Database presets** ([`Preset`]): container services with known credentials
//! - **Environment services** ([`EnvService`]): externally managed instances read from variables
//!
//! # Example
//!
//! ```ignore
//! use testservices::service::{Service, EnvService};
//!
//! async fn connect(service: &dyn Service) -> testservices::Result<()> {
//!     if service.possible().await? {
//!         let handle = service.get().await?;
//!         println!("{} is at {}", service.name(), handle.address());
//!     }
//!     Ok(())
//! }
//! ```

mod container;
mod env;
mod presets;
mod types;

pub use container::{ContainerService, Readiness, DEFAULT_READY_INTERVAL, DEFAULT_READY_TIMEOUT};
pub use env::EnvService;
pub use presets::{Credentials, Preset, PRESET_PASSWORD};
pub use types::*;
