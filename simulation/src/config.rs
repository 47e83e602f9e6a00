//! Configuration file for the `netsim` binary
//!
//! Every section has defaults, so an empty file (or no file at all) is a
//! valid configuration.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:3001"
//!
//! [engine]
//! settle_delay_ms = 1000
//! path_strategy = "depth-first"
//! seed = "demo"
//!
//! [logging]
//! default_level = "info"
//!
//! [logging.targets]
//! netsim_engine = "debug"
//!
//! [storage]
//! snapshot_path = "data/topology.json"
//! restore_on_start = true
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use netsim_engine::EngineConfig;
use netsim_logging::LogConfig;

/// Default address the API server listens on
pub const DEFAULT_BIND: ([u8; 4], u16) = ([127, 0, 0, 1], 3001);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub logging: LogConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(DEFAULT_BIND),
        }
    }
}

/// Snapshot persistence. Disabled when `snapshot_path` is unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub snapshot_path: Option<PathBuf>,
    /// Restore devices and connections from the snapshot at startup
    pub restore_on_start: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            restore_on_start: true,
        }
    }
}

impl AppConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("invalid configuration")
    }

    /// Load the configuration file, or the defaults when no path is given
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }
}
