//! Environment variable source: FACETVIEW prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

pub const PREFIX: &str = "FACETVIEW";

/// Overlay `FACETVIEW__SECTION__KEY` variables onto the builder.
///
/// `FACETVIEW__ENGINE__OBSERVER_CAPACITY=64` sets `engine.observer_capacity`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    add_with_prefix(builder, PREFIX)
}

fn add_with_prefix(
    builder: ConfigBuilder<DefaultState>,
    prefix: &str,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(
        Environment::with_prefix(prefix)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    ))
}
