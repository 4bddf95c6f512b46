//! Core data model for the edge daemon.
//!
//! These types are shared between the decision engine (which mutates them)
//! and the daemon (which feeds them from probes and publishes them in the
//! status document).

use serde::{Deserialize, Serialize};

// ── Operating mode ──────────────────────────────────────────────────

/// How aggressively the daemon actuates.
///
/// `Training` observes only: probes run, risk is computed and logged, but
/// nothing touches duplication or routing. `Tripwire` is the default —
/// duplication stays off until a trigger fires. `Mirror` keeps duplication
/// permanently installed for maximum stability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Training,
    Tripwire,
    Mirror,
}

impl Mode {
    /// Display name used in the status document and log events.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Training => "TRAINING",
            Mode::Tripwire => "TRIPWIRE",
            Mode::Mirror => "MIRROR",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "training" => Ok(Mode::Training),
            "tripwire" => Ok(Mode::Tripwire),
            "mirror" => Ok(Mode::Mirror),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

// ── System state ────────────────────────────────────────────────────

/// Protection state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SysState {
    /// No issues detected.
    Normal,
    /// Prediction indicates upcoming degradation, pre-arming.
    Prepare,
    /// Trigger fired, duplication active, evaluating a switch.
    Protect,
    /// Waiting out duplication settle / preroll before switching.
    Switching,
    /// Switch decision made, holding in protection.
    Holding,
}

impl SysState {
    pub fn as_str(self) -> &'static str {
        match self {
            SysState::Normal => "NORMAL",
            SysState::Prepare => "PREPARE",
            SysState::Protect => "PROTECT",
            SysState::Switching => "SWITCHING",
            SysState::Holding => "HOLDING",
        }
    }
}

impl std::fmt::Display for SysState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Trigger reasons ─────────────────────────────────────────────────

/// What caused the tripwire to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    None,
    /// RTT jumped significantly over baseline.
    RttStep,
    /// Lost consecutive probes.
    ProbeMiss,
    /// Active uplink unavailable or disabled.
    LinkDown,
    /// LTE signal power degraded.
    RsrpDrop,
    /// LTE signal quality degraded.
    SinrDrop,
    /// Satellite obstruction present or imminent.
    StarlinkObstruction,
    /// Prediction engine warned ahead of time.
    Predicted,
    /// Operator forced via the command queue.
    Manual,
}

impl Trigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::None => "none",
            Trigger::RttStep => "rtt_step",
            Trigger::ProbeMiss => "probe_miss",
            Trigger::LinkDown => "link_down",
            Trigger::RsrpDrop => "rsrp_drop",
            Trigger::SinrDrop => "sinr_drop",
            Trigger::StarlinkObstruction => "starlink_obstruction",
            Trigger::Predicted => "predicted",
            Trigger::Manual => "manual",
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Risk recommendation ─────────────────────────────────────────────

/// Global verdict of the risk engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Normal,
    Prepare,
    Protect,
}

impl Recommendation {
    pub fn as_str(self) -> &'static str {
        match self {
            Recommendation::Normal => "NORMAL",
            Recommendation::Prepare => "PREPARE",
            Recommendation::Protect => "PROTECT",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Kind-specific records ───────────────────────────────────────────

/// LTE modem signal metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CellularInfo {
    /// Reference Signal Received Power (dBm), -140 to -44.
    pub rsrp: f64,
    /// Reference Signal Received Quality (dB), -20 to -3.
    pub rsrq: f64,
    /// Signal to Interference+Noise (dB), -20 to +30.
    pub sinr: f64,
    /// Received Signal Strength Indicator (dBm).
    pub rssi: f64,
    pub carrier: String,
    pub cell_id: String,
    pub band: String,
    pub connected: bool,
    pub timestamp_us: i64,
}

/// Satellite dish metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SatelliteInfo {
    /// Whether the stats helper could reach the dish at all.
    pub connected: bool,
    /// Whether the dish reports a usable satellite link.
    pub online: bool,
    pub state: String,
    pub latency_ms: f64,
    pub downlink_mbps: f64,
    pub uplink_mbps: f64,
    pub obstructed: bool,
    /// Percent of time obstructed.
    pub obstruction_pct: f64,
    /// Seconds until the next predicted obstruction, -1 if unknown.
    pub obstruction_eta: i64,
    pub timestamp_us: i64,
}

impl Default for SatelliteInfo {
    fn default() -> Self {
        SatelliteInfo {
            connected: false,
            online: false,
            state: String::new(),
            latency_ms: 0.0,
            downlink_mbps: 0.0,
            uplink_mbps: 0.0,
            obstructed: false,
            obstruction_pct: 0.0,
            obstruction_eta: -1,
            timestamp_us: 0,
        }
    }
}

/// Values parsed from one cellular monitor invocation. Fields the helper
/// did not report stay `None` and leave the record untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CellularReading {
    pub sinr: Option<f64>,
    pub rsrp: Option<f64>,
}

/// Values parsed from one dish stats invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct SatelliteReading {
    pub online: bool,
    pub latency_ms: f64,
    pub downlink_mbps: f64,
    pub uplink_mbps: f64,
    pub obstructed: bool,
    pub obstruction_pct: f64,
    pub obstruction_eta: i64,
}

// ── GPS ─────────────────────────────────────────────────────────────

/// Most recent GPS fix.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Stored in m/s; published as mph.
    pub speed_mps: f64,
    /// Degrees from north.
    pub heading: f64,
    pub valid: bool,
    pub timestamp_us: i64,
}

/// Conversion factor between m/s and mph.
pub const MPH_PER_MPS: f64 = 2.237;
