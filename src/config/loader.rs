// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{BrokerConfig, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; durations and limits are checked
/// by [`load_and_validate`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it into a `BrokerConfig`.
///
/// A missing path means "all defaults".
pub fn load_and_validate(path: Option<&Path>) -> Result<BrokerConfig> {
    let raw = match path {
        Some(path) => load_from_path(path)?,
        None => RawConfigFile::default(),
    };
    BrokerConfig::try_from(raw)
}
