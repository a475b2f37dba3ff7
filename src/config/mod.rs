//! Configuration parsing and types.
//!
//! This module provides the configuration system for testservices,
//! organized into focused submodules:
//!
//! - `runtime` - Container engine endpoint (`RuntimeConfig`), resolved once per process
//! - `vars` - Environment variable lookup (`VarSource`)
//! - `duration` - Duration strings such as `"500ms"` or `"2m"`
//! - `types` - Root config structure (`Config`)
//! - `service` - Candidate configuration (`CandidateConfig`, `ContainerConfig`, `EnvConfig`)
//! - `parser` - YAML config parsing and discovery
//! - `validation` - Config validation

mod duration;
mod parser;
mod runtime;
mod service;
mod types;
mod validation;
mod vars;

pub use duration::*;
pub use parser::*;
pub use runtime::*;
pub use service::*;
pub use types::*;
pub use vars::*;
