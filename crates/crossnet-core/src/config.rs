//! Configuration management for CrossNet.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`CROSSNET_` prefix, `__` between section and key)
//! 2. Config file (`crossnet.toml` by default)
//! 3. Defaults

use serde::de::DeserializeOwned;

use crate::error::Result;

/// Default config file prefix.
pub const DEFAULT_FILE_PREFIX: &str = "crossnet";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "CROSSNET";

/// Load one `[section]` of the configuration.
///
/// A missing file or a missing section falls back to `T::default()`;
/// a present but malformed section is an error.
pub fn load_section<T>(file_prefix: &str, section: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    match cfg.get::<T>(section) {
        Ok(value) => Ok(value),
        Err(config::ConfigError::NotFound(_)) => {
            tracing::debug!(section, "Config section not found, using defaults");
            Ok(T::default())
        }
        Err(e) => Err(e.into()),
    }
}
