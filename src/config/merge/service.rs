//! MergeService: orchestrates sources and deserializes to ViewConfig.

use super::policy;
use crate::config::sources::{environment, file};
use crate::config::ViewConfig;
use config::ConfigError;
use std::path::Path;
use tracing::debug;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Precedence: defaults (lowest) -> user file -> explicit file -> environment (highest).
    pub fn load(explicit: Option<&Path>) -> Result<ViewConfig, ConfigError> {
        let builder = policy::builder_with_defaults()?;
        let builder = file::add_user_file(builder);
        let builder = match explicit {
            Some(path) => file::add_file(builder, path)?,
            None => builder,
        };
        let builder = environment::add_to_builder(builder)?;

        let config: ViewConfig = builder.build()?.try_deserialize()?;
        debug!(
            aliases = config.engine.type_aliases.len(),
            observer_capacity = config.engine.observer_capacity,
            "Configuration loaded"
        );
        Ok(config)
    }
}
