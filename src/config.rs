//! Configuration
//!
//! Layered with the `config` crate: built-in defaults, then the user config
//! file, then an explicit file, then `FACETVIEW__SECTION__KEY` environment
//! variables.

pub mod facade;
pub mod merge {
    pub mod policy;
    pub mod service;
}
pub mod sources {
    pub mod environment;
    pub mod file;
}
pub mod storage;

pub use facade::ConfigLoader;
pub use storage::StorageConfig;

use crate::logging::LoggingConfig;
use crate::nodetype::{NT_HANDLE, NT_REQUEST};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maps a custom primary type onto a built-in one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeAlias {
    pub name: String,
    pub target: String,
}

impl TypeAlias {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
        }
    }
}

/// Virtual view engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the observation bridge's reverse-lookup table
    #[serde(default = "default_observer_capacity")]
    pub observer_capacity: usize,

    #[serde(default)]
    pub type_aliases: Vec<TypeAlias>,

    /// Cap on result set children when a navigation node sets no `hippo:limit`
    #[serde(default)]
    pub default_result_limit: Option<usize>,

    /// Pending workflow requests
    #[serde(default = "default_request_type")]
    pub request_type: String,

    #[serde(default = "default_handle_type")]
    pub handle_type: String,
}

fn default_observer_capacity() -> usize {
    256
}

fn default_request_type() -> String {
    NT_REQUEST.to_string()
}

fn default_handle_type() -> String {
    NT_HANDLE.to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            observer_capacity: default_observer_capacity(),
            type_aliases: Vec::new(),
            default_result_limit: None,
            request_type: default_request_type(),
            handle_type: default_handle_type(),
        }
    }
}

impl EngineConfig {
    pub fn with_alias(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.type_aliases.push(TypeAlias::new(name, target));
        self
    }

    pub fn alias_map(&self) -> HashMap<String, String> {
        self.type_aliases
            .iter()
            .map(|a| (a.name.clone(), a.target.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}
