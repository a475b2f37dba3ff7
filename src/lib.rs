//! # testservices
//!
//! Provision the service instances a test suite needs (most often databases)
//! from whichever source is cheapest on the current machine.
//!
//! ## Features
//!
//! - **Ordered candidates**: a [`Provider`] tries each [`Service`] in declared order
//!   and provisions the first one that is possible
//! - **Container services**: one named container per instance, reused across runs,
//!   restarted when stopped, and waited on until its port (and log) says ready
//! - **Environment services**: externally managed instances described by variables
//!   such as `DATABASE_URL` or the libpq `PG*` set
//! - **Database presets**: Postgres, MySQL, MariaDB and ClickHouse with known credentials
//! - **Bounded waits**: every readiness wait has a total timeout; there is no
//!   other cancellation
//!
//! ## Quick Start
//!
//! ```no_run
//! use testservices::{ContainerService, ContainerSpec, EnvService, Provider};
//!
//! # async fn example() -> Result<(), testservices::Error> {
//! let provider = Provider::new("postgres")
//!     .with(EnvService::postgres("ci-postgres"))
//!     .with(ContainerService::docker(ContainerSpec::new("pg-test", "postgres:16", 5432)));
//!
//! let handle = provider.get_instance().await?;
//! println!("postgres at {}", handle.address());
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! Lifecycle calls are `async` and awaited by the caller; nothing runs in the
//! background and services hold no locks. Concurrent `create()` calls for the
//! same container name converge on one container, so racing test workers are
//! safe as long as they share the name.

pub mod config;
pub mod docker;
pub mod error;
pub mod port;
pub mod provider;
pub mod service;

pub use config::{CandidateConfig, Config, Parser, RuntimeConfig, VarSource};
pub use docker::{ContainerRuntime, ContainerSpec, DockerClient, DockerError, PortMapping};
pub use error::{Error, Rejection, Result};
pub use port::PortWaiter;
pub use provider::{Collection, Provider, Resolution, ServiceFactory};
pub use service::{
    Availability, ConnectionHandle, ContainerService, EnvService, Preset, Service,
};
