//! Environment variable lookup.
//!
//! Environment-backed services and the runtime endpoint read variables
//! through a [`VarSource`] so tests can supply a fixed set instead of
//! mutating the process environment. Every lookup re-reads the source.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub enum VarSource {
    /// The live process environment.
    #[default]
    Process,
    /// A fixed set of variables.
    Fixed(HashMap<String, String>),
}

impl VarSource {
    /// Build a fixed source from key/value pairs.
    pub fn fixed<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        VarSource::Fixed(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Raw value of `name`, if set (may be empty).
    pub fn get(&self, name: &str) -> Option<String> {
        match self {
            VarSource::Process => std::env::var(name).ok(),
            VarSource::Fixed(vars) => vars.get(name).cloned(),
        }
    }

    /// Value of `name` if it is set and not blank.
    pub fn non_empty(&self, name: &str) -> Option<String> {
        self.get(name).filter(|v| !v.trim().is_empty())
    }
}
