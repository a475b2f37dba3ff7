//! Core configuration types.
//!
//! This module contains the root [`Config`] struct for `testservices.yaml`.

use super::CandidateConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration structure for testservices.yaml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Project name, used in log output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Need name to its candidates, in preference order
    #[serde(default)]
    pub needs: BTreeMap<String, Vec<CandidateConfig>>,
}

impl Config {
    /// Candidates declared for `need`.
    pub fn candidates(&self, need: &str) -> Option<&[CandidateConfig]> {
        self.needs.get(need).map(Vec::as_slice)
    }

    /// Declared need names, sorted.
    pub fn need_names(&self) -> Vec<&str> {
        self.needs.keys().map(String::as_str).collect()
    }
}
