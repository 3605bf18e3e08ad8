// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Socket path used when neither the config file nor the CLI names one.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/broker.sock";

/// Upper bound for one output message sent to a tailing client.
pub const MAX_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Raw configuration as read from a TOML file.
///
/// ```toml
/// [server]
/// socket = "/tmp/broker.sock"
/// scratch_dir = "/var/tmp/broker"
/// drain_timeout = "30s"
///
/// [tail]
/// poll_interval = "1s"
/// chunk_size = 4194304
///
/// [retention]
/// completed_ttl = "10m"
/// sweep_interval = "1m"
/// remove_scratch_files = true
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub tail: TailSection,

    #[serde(default)]
    pub retention: RetentionSection,
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Unix socket the broker listens on.
    #[serde(default = "default_socket")]
    pub socket: PathBuf,

    /// Directory for stdout/stderr scratch files.
    ///
    /// If `None`, the system temp dir is used.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,

    /// How long to wait for in-flight requests after shutdown was requested.
    ///
    /// If `None`, the server waits until every request has finished.
    #[serde(default)]
    pub drain_timeout: Option<String>,
}

fn default_socket() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_PATH)
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            socket: default_socket(),
            scratch_dir: None,
            drain_timeout: None,
        }
    }
}

/// `[tail]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TailSection {
    /// How long a tailer sleeps after catching up with a running process.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    /// Maximum number of bytes per output message.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_poll_interval() -> String {
    "1s".to_string()
}

fn default_chunk_size() -> usize {
    MAX_CHUNK_SIZE
}

impl Default for TailSection {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            chunk_size: default_chunk_size(),
        }
    }
}

/// `[retention]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionSection {
    /// Completed records older than this are evicted.
    ///
    /// If `None`, records are kept for the lifetime of the broker.
    #[serde(default)]
    pub completed_ttl: Option<String>,

    /// How often the sweeper looks for expired records.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: String,

    /// Whether evicting a record also deletes its scratch files.
    #[serde(default = "default_remove_scratch_files")]
    pub remove_scratch_files: bool,
}

fn default_sweep_interval() -> String {
    "1m".to_string()
}

fn default_remove_scratch_files() -> bool {
    true
}

impl Default for RetentionSection {
    fn default() -> Self {
        Self {
            completed_ttl: None,
            sweep_interval: default_sweep_interval(),
            remove_scratch_files: default_remove_scratch_files(),
        }
    }
}

/// Validated, typed broker configuration.
///
/// Built from a [`RawConfigFile`] via `TryFrom` (see `validate.rs`).
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub socket_path: PathBuf,
    pub scratch_dir: PathBuf,
    pub drain_timeout: Option<Duration>,
    pub poll_interval: Duration,
    pub chunk_size: usize,
    pub retention: RetentionPolicy,
}

/// What happens to completed process records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub completed_ttl: Option<Duration>,
    pub sweep_interval: Duration,
    pub remove_scratch_files: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            completed_ttl: None,
            sweep_interval: Duration::from_secs(60),
            remove_scratch_files: true,
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket(),
            scratch_dir: std::env::temp_dir(),
            drain_timeout: None,
            poll_interval: Duration::from_secs(1),
            chunk_size: MAX_CHUNK_SIZE,
            retention: RetentionPolicy::default(),
        }
    }
}

impl BrokerConfig {
    /// Config rooted in `dir`: socket and scratch files both live there.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            socket_path: dir.join("broker.sock"),
            scratch_dir: dir,
            ..Self::default()
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }
}
