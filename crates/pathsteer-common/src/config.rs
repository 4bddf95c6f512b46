//! Configuration loading.
//!
//! The daemon reads a single JSON document at startup. Every field has a
//! default tuned for the mobile/vehicle scenario; a missing file is fatal
//! (the process must not run with guessed identity or credentials).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::uplink::UplinkId;

/// Default tripwire thresholds.
pub const DEFAULT_RTT_STEP_MS: i64 = 80;
pub const DEFAULT_RTT_WINDOW_MS: i64 = 200;
pub const DEFAULT_PROBE_MISS_COUNT: u32 = 2;
pub const DEFAULT_PROBE_MISS_WINDOW_MS: i64 = 300;
pub const DEFAULT_RSRP_DROP_DB: f64 = 8.0;
pub const DEFAULT_SINR_DROP_DB: f64 = 6.0;

/// Default switching parameters.
pub const DEFAULT_PREROLL_MS: i64 = 500;
pub const DEFAULT_MIN_HOLD_SEC: i64 = 3;
pub const DEFAULT_CLEAN_EXIT_SEC: i64 = 2;

pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot open config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Node identity.
    pub id: String,
    pub role: String,

    // Tripwire thresholds
    pub rtt_step_threshold_ms: i64,
    pub rtt_step_window_ms: i64,
    pub probe_miss_count: u32,
    pub probe_miss_window_ms: i64,
    pub rsrp_drop_threshold_db: f64,
    pub sinr_drop_threshold_db: f64,

    // Switching parameters
    pub preroll_ms: i64,
    pub min_hold_sec: i64,
    pub clean_exit_sec: i64,

    // Feature flags
    pub gps_enabled: bool,
    pub pcap_enabled: bool,

    pub sample_rate_hz: u32,

    pub controller: ControllerConfig,
    pub probe: ProbeConfig,
    pub paths: PathsConfig,

    /// Per-uplink overrides, keyed by canonical name.
    pub uplinks: HashMap<String, UplinkConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            id: "edge".into(),
            role: "edge".into(),
            rtt_step_threshold_ms: DEFAULT_RTT_STEP_MS,
            rtt_step_window_ms: DEFAULT_RTT_WINDOW_MS,
            probe_miss_count: DEFAULT_PROBE_MISS_COUNT,
            probe_miss_window_ms: DEFAULT_PROBE_MISS_WINDOW_MS,
            rsrp_drop_threshold_db: DEFAULT_RSRP_DROP_DB,
            sinr_drop_threshold_db: DEFAULT_SINR_DROP_DB,
            preroll_ms: DEFAULT_PREROLL_MS,
            min_hold_sec: DEFAULT_MIN_HOLD_SEC,
            clean_exit_sec: DEFAULT_CLEAN_EXIT_SEC,
            gps_enabled: true,
            pcap_enabled: true,
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            controller: ControllerConfig::default(),
            probe: ProbeConfig::default(),
            paths: PathsConfig::default(),
            uplinks: HashMap::new(),
        }
    }
}

/// Remote controller access for PoP switching.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub host: String,
    pub user: String,
    pub password: String,
}

/// Probe targets and helper addresses.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Target for cellular probes, reached through the raw modem interface.
    pub cellular_target: String,
    /// Target for namespace probes (satellite and fiber).
    pub external_target: String,
    /// Dish stats address, reachable from each satellite namespace.
    pub dish_addr: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            cellular_target: "104.204.136.13".into(),
            external_target: "8.8.8.8".into(),
            dish_addr: "192.168.100.1".into(),
        }
    }
}

/// Filesystem layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Volatile runtime files: status, chaos, GPS, command queue.
    pub runtime_dir: PathBuf,
    /// Persistent data; JSONL run logs live under `logs/`.
    pub data_dir: PathBuf,
    /// Helper scripts.
    pub script_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            runtime_dir: PathBuf::from("/run/pathsteer"),
            data_dir: PathBuf::from("/var/lib/pathsteer"),
            script_dir: PathBuf::from("/opt/pathsteer/scripts"),
        }
    }
}

impl PathsConfig {
    pub fn status_file(&self) -> PathBuf {
        self.runtime_dir.join("status.json")
    }

    pub fn status_tmp_file(&self) -> PathBuf {
        self.runtime_dir.join("status.json.tmp")
    }

    pub fn chaos_file(&self) -> PathBuf {
        self.runtime_dir.join("chaos.json")
    }

    pub fn gps_file(&self) -> PathBuf {
        self.runtime_dir.join("gps.json")
    }

    pub fn command_dir(&self) -> PathBuf {
        self.runtime_dir.join("cmdq")
    }

    pub fn legacy_command_file(&self) -> PathBuf {
        self.runtime_dir.join("command")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn log_file(&self, run_id: &str) -> PathBuf {
        self.log_dir().join(format!("pathsteerd_{run_id}.jsonl"))
    }
}

/// Per-uplink configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UplinkConfig {
    pub enabled: bool,
}

impl Default for UplinkConfig {
    fn default() -> Self {
        UplinkConfig { enabled: true }
    }
}

impl Config {
    /// Load from a JSON file. Missing or malformed files are fatal.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Whether an uplink is enabled at startup (default: enabled).
    pub fn uplink_enabled(&self, id: UplinkId) -> bool {
        self.uplinks
            .get(id.name())
            .map(|u| u.enabled)
            .unwrap_or(true)
    }
}
