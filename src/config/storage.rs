//! StorageConfig: where a persistent repository keeps its sled database.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// sled directory; None means `<platform data dir>/store`
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the store directory. Relative paths are taken from `base`.
    pub fn resolve_path(&self, base: &Path) -> Result<PathBuf, ApiError> {
        match &self.path {
            Some(path) if path.is_absolute() => Ok(path.clone()),
            Some(path) => Ok(base.join(path)),
            None => default_store_path(),
        }
    }
}

fn default_store_path() -> Result<PathBuf, ApiError> {
    let dirs = directories::ProjectDirs::from("", "facetview", "facetview").ok_or_else(|| {
        ApiError::ConfigError("Could not determine platform data directory (HOME not set)".to_string())
    })?;
    Ok(dirs.data_dir().join("store"))
}
