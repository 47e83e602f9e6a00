//! Logging configuration
//!
//! Loaded from the `[logging]` table of the netsim configuration file.
//! Every field has a default, so a partial table is enough.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Crates whose spans and events make up the engine's own output
const ENGINE_TARGETS: [&str; 3] = ["netsim_engine", "netsim_api", "netsim_storage"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level for every target without an entry in `targets`.
    /// `RUST_LOG` replaces the whole filter when set.
    pub default_level: String,

    /// Per-target levels, e.g. `netsim_engine = "debug"`
    pub targets: BTreeMap<String, String>,

    pub console: ConsoleConfig,

    /// Rolling JSONL file, off unless configured
    pub file: Option<FileConfig>,

    pub jsonl: JsonlConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            targets: BTreeMap::new(),
            console: ConsoleConfig::default(),
            file: None,
            jsonl: JsonlConfig::default(),
        }
    }
}

impl LogConfig {
    /// Pretty console output with the engine crates at `debug`, so packet
    /// sends, path lookups and settles are visible. Request tracing stays
    /// at `info`.
    pub fn development() -> Self {
        let mut targets: BTreeMap<String, String> = ENGINE_TARGETS
            .iter()
            .map(|target| (target.to_string(), "debug".to_string()))
            .collect();
        targets.insert("tower_http".to_string(), "info".to_string());

        Self {
            default_level: "debug".to_string(),
            targets,
            console: ConsoleConfig {
                enabled: true,
                pretty: true,
                ansi: true,
            },
            ..Default::default()
        }
    }

    /// Long-running HTTP server: JSONL on the console and in a daily
    /// `netsim-server` file under `log_dir`. Settle timers fire once per
    /// packet, so the engine stays at `info`.
    pub fn server(log_dir: PathBuf) -> Self {
        Self {
            default_level: "info".to_string(),
            targets: BTreeMap::from([("tower_http".to_string(), "debug".to_string())]),
            console: ConsoleConfig::default(),
            file: Some(FileConfig {
                directory: log_dir,
                prefix: "netsim-server".to_string(),
                rotation: RotationStrategy::Daily,
            }),
            jsonl: JsonlConfig {
                include_location: true,
                ..JsonlConfig::default()
            },
        }
    }

    /// One-shot commands print their own report; only warnings reach the
    /// console, without span context.
    pub fn command_line() -> Self {
        Self {
            default_level: "warn".to_string(),
            console: ConsoleConfig {
                enabled: true,
                pretty: true,
                ansi: true,
            },
            jsonl: JsonlConfig {
                include_spans: false,
                current_span: false,
                ..JsonlConfig::default()
            },
            ..Default::default()
        }
    }

    /// Warnings only
    pub fn testing() -> Self {
        Self {
            default_level: "warn".to_string(),
            console: ConsoleConfig {
                enabled: true,
                pretty: false,
                ansi: false,
            },
            ..Default::default()
        }
    }

    /// `EnvFilter` directives: the default level followed by each target
    pub fn filter_directives(&self) -> String {
        let mut directives = vec![self.default_level.clone()];
        directives.extend(self.targets.iter().map(|(target, level)| format!("{target}={level}")));
        directives.join(",")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    /// Human-readable lines instead of JSONL
    pub pretty: bool,
    pub ansi: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pretty: false,
            ansi: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub directory: PathBuf,
    /// File name prefix; the rotation date is appended
    pub prefix: String,
    pub rotation: RotationStrategy,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            prefix: "netsim".to_string(),
            rotation: RotationStrategy::Daily,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    /// Single file, truncated on start
    Never,
}

/// Shape of each JSONL line.
///
/// With spans on, an event logged while a packet is in flight carries the
/// `send_packet` or `traceroute` span with its `packet_id`, `source` and
/// `destination`, and `resolve_path` nested below it. That is what makes a
/// single packet's lines easy to pull out of a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonlConfig {
    /// Event fields at the top level instead of under `fields`
    pub flatten_events: bool,
    /// Every enclosing span, outermost first
    pub include_spans: bool,
    /// The innermost span on its own
    pub current_span: bool,
    pub include_location: bool,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            flatten_events: true,
            include_spans: true,
            current_span: true,
            include_location: false,
        }
    }
}
