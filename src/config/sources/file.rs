//! File sources: the per-user config file and explicit `--config` files.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::debug;

/// `<platform config dir>/facetview/config.toml`
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "facetview", "facetview").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Add the user config file when present.
pub fn add_user_file(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    match user_config_path() {
        Some(path) if path.exists() => {
            debug!(path = %path.display(), "Using user config file");
            builder.add_source(File::from(path).format(FileFormat::Toml).required(false))
        }
        _ => builder,
    }
}

/// Add a required file; the format follows its extension, TOML otherwise.
pub fn add_file(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }
    let format = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        _ => FileFormat::Toml,
    };
    Ok(builder.add_source(File::from(path).format(format).required(true)))
}
