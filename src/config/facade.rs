//! ConfigLoader facade delegating to the merge service.

use super::merge::service::MergeService;
use super::ViewConfig;
use config::ConfigError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the user config file (if any) and the environment.
    pub fn load() -> Result<ViewConfig, ConfigError> {
        MergeService::load(None)
    }

    /// Load with an explicit file on top of the user config file.
    pub fn load_from_file(path: &Path) -> Result<ViewConfig, ConfigError> {
        MergeService::load(Some(path))
    }

    pub fn default() -> ViewConfig {
        ViewConfig::default()
    }
}
