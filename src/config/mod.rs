// src/config/mod.rs

//! Configuration loading and validation for the broker.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Turn the raw model into a typed `BrokerConfig` (`validate.rs`).
//! - Parse human duration strings like `"250ms"` (`duration.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{load_and_validate, load_from_path};
pub use model::{
    BrokerConfig, RawConfigFile, RetentionPolicy, RetentionSection, ServerSection, TailSection,
    DEFAULT_SOCKET_PATH, MAX_CHUNK_SIZE,
};
