//! The explicit world value: uplink array, system status, GPS.
//!
//! There is exactly one `World` per process, owned by the controller task.
//! All mutation flows through the methods here so the invariants (exactly
//! one active uplink, `force_failed` implies unavailable) hold across
//! arbitrary probe/command interleavings.

use std::collections::HashMap;

use rand::Rng;
use rand::RngExt as _;

use pathsteer_common::config::Config;
use pathsteer_common::models::{
    CellularInfo, CellularReading, GpsFix, Mode, Recommendation, SatelliteInfo, SatelliteReading,
    SysState, Trigger,
};
use pathsteer_common::uplink::{UplinkId, UplinkIdentity, UplinkKind};

use crate::history::{Ewma, ProbeHistory, ProbeSample, LOSS_WINDOW};

/// Baseline RTT smoothing factor — slow on purpose, so a step change shows
/// up against the baseline instead of being absorbed into it.
pub const BASELINE_ALPHA: f64 = 0.05;

/// Probe failures before an uplink is declared unavailable.
pub const FAIL_THRESHOLD: u32 = 5;

/// Chaos injection offsets for one uplink.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChaosOffsets {
    pub rtt: f64,
    pub jitter: f64,
    pub loss: f64,
}

/// Complete live state for one uplink path.
#[derive(Debug, Clone)]
pub struct Uplink {
    pub identity: &'static UplinkIdentity,

    pub enabled: bool,
    pub available: bool,
    /// Operator-forced failure — sticky until explicitly cleared.
    pub force_failed: bool,
    pub is_active: bool,

    pub chaos: ChaosOffsets,

    pub rtt_ms: f64,
    pub baseline: Ewma,
    pub loss_pct: f64,
    pub jitter_ms: f64,
    pub consec_fail: u32,

    pub cellular: CellularInfo,
    pub starlink: SatelliteInfo,

    pub history: ProbeHistory,

    pub risk_now: f64,
    pub risk_ahead: f64,
    pub confidence: f64,
}

impl Uplink {
    fn new(identity: &'static UplinkIdentity, enabled: bool) -> Uplink {
        let mut cellular = CellularInfo::default();
        if let Some(carrier) = identity.carrier {
            cellular.carrier = carrier.to_string();
        }
        Uplink {
            identity,
            enabled,
            available: false,
            force_failed: false,
            is_active: false,
            chaos: ChaosOffsets::default(),
            rtt_ms: 0.0,
            baseline: Ewma::new(BASELINE_ALPHA),
            loss_pct: 0.0,
            jitter_ms: 0.0,
            consec_fail: 0,
            cellular,
            starlink: SatelliteInfo::default(),
            history: ProbeHistory::new(),
            risk_now: 0.0,
            risk_ahead: 0.0,
            confidence: 0.0,
        }
    }

    pub fn id(&self) -> UplinkId {
        self.identity.id
    }

    pub fn kind(&self) -> UplinkKind {
        self.identity.kind
    }

    pub fn rtt_baseline(&self) -> f64 {
        self.baseline.value()
    }
}

/// Last processed operator command, surfaced in the status document.
#[derive(Debug, Clone, Default)]
pub struct LastCommand {
    pub id: String,
    pub result: String,
    pub detail: String,
}

/// Overall controller status.
#[derive(Debug, Clone)]
pub struct SystemStatus {
    pub mode: Mode,
    pub state: SysState,

    pub last_trigger: Trigger,
    pub trigger_detail: String,

    pub active_uplink: UplinkId,
    /// Operator force — suppresses automatic arbitration until cleared.
    pub force_locked: bool,
    pub active_controller: u8,

    pub dup_enabled: bool,
    pub dup_enabled_at_us: i64,
    /// When duplication was confirmed engaged (after the settle window).
    pub dup_engaged_at_us: i64,

    pub protect_start_us: i64,
    pub switch_start_us: i64,
    pub last_clean_us: i64,
    pub switches_this_window: u32,

    pub hold_remaining_sec: i64,
    pub clean_remaining_sec: i64,
    pub flap_suppressed: bool,

    pub global_risk: f64,
    pub recommendation: Recommendation,

    pub run_id: String,
    pub last_cmd: LastCommand,
}

impl SystemStatus {
    fn new(run_id: &str) -> SystemStatus {
        SystemStatus {
            mode: Mode::Tripwire,
            state: SysState::Normal,
            last_trigger: Trigger::None,
            trigger_detail: String::new(),
            active_uplink: UplinkId::CellA,
            force_locked: false,
            active_controller: 0,
            dup_enabled: false,
            dup_enabled_at_us: 0,
            dup_engaged_at_us: 0,
            protect_start_us: 0,
            switch_start_us: 0,
            last_clean_us: 0,
            switches_this_window: 0,
            hold_remaining_sec: 0,
            clean_remaining_sec: 0,
            flap_suppressed: false,
            global_risk: 0.0,
            recommendation: Recommendation::Normal,
            run_id: run_id.to_string(),
            last_cmd: LastCommand::default(),
        }
    }
}

/// All mutable daemon state, owned by the controller.
#[derive(Debug, Clone)]
pub struct World {
    pub uplinks: Vec<Uplink>,
    pub status: SystemStatus,
    pub gps: GpsFix,
}

impl World {
    pub fn new(cfg: &Config, run_id: &str) -> World {
        let uplinks = UplinkId::ALL
            .iter()
            .map(|&id| Uplink::new(id.identity(), cfg.uplink_enabled(id)))
            .collect::<Vec<_>>();
        let mut world = World {
            uplinks,
            status: SystemStatus::new(run_id),
            gps: GpsFix::default(),
        };
        world.uplinks[UplinkId::CellA.index()].is_active = true;
        world
    }

    pub fn uplink(&self, id: UplinkId) -> &Uplink {
        &self.uplinks[id.index()]
    }

    pub fn uplink_mut(&mut self, id: UplinkId) -> &mut Uplink {
        &mut self.uplinks[id.index()]
    }

    pub fn active(&self) -> &Uplink {
        self.uplink(self.status.active_uplink)
    }

    /// Apply one probe result to an uplink.
    ///
    /// `rtt_ms` is `None` (or non-positive) on a failed probe. Chaos RTT
    /// and jitter offsets are applied to both the history sample and the
    /// live value so the tripwire sees the injected latency; the baseline
    /// tracks the raw measurement.
    pub fn apply_probe(
        &mut self,
        id: UplinkId,
        rtt_ms: Option<f64>,
        now_us: i64,
        rng: &mut impl Rng,
    ) {
        let u = self.uplink_mut(id);
        if !u.enabled {
            return;
        }

        let success = rtt_ms.is_some_and(|r| r > 0.0);
        let jitter_draw = (rng.random::<f64>() - 0.5) * 2.0;
        let chaos_offset = u.chaos.rtt + u.chaos.jitter * jitter_draw;
        let raw = rtt_ms.unwrap_or(-1.0);

        u.history.push(ProbeSample {
            rtt_ms: raw + chaos_offset,
            success,
            timestamp_us: now_us,
        });

        if success {
            u.rtt_ms = raw + chaos_offset;
            if !u.force_failed {
                u.available = true;
            }
            u.consec_fail = 0;
            u.baseline.update(raw);
        } else {
            u.consec_fail += 1;
            if u.consec_fail > FAIL_THRESHOLD {
                u.available = false;
            }
        }

        u.loss_pct = (u.history.loss_pct(LOSS_WINDOW) + u.chaos.loss).clamp(0.0, 100.0);
        u.jitter_ms = u.history.jitter_ms(LOSS_WINDOW);
    }

    /// Merge a cellular monitor reading. A failed helper invocation never
    /// reaches here — the record simply stays stale.
    pub fn apply_cellular(&mut self, id: UplinkId, reading: CellularReading, now_us: i64) {
        let u = self.uplink_mut(id);
        if let Some(sinr) = reading.sinr {
            u.cellular.sinr = sinr;
        }
        if let Some(rsrp) = reading.rsrp {
            u.cellular.rsrp = rsrp;
        }
        u.cellular.connected = true;
        u.cellular.timestamp_us = now_us;
    }

    /// Merge a dish stats reading; `None` marks the dish unreachable.
    pub fn apply_satellite(
        &mut self,
        id: UplinkId,
        reading: Option<SatelliteReading>,
        now_us: i64,
    ) {
        let u = self.uplink_mut(id);
        match reading {
            Some(r) => {
                u.starlink.connected = true;
                u.starlink.online = r.online;
                u.starlink.latency_ms = r.latency_ms;
                u.starlink.downlink_mbps = r.downlink_mbps;
                u.starlink.uplink_mbps = r.uplink_mbps;
                u.starlink.obstructed = r.obstructed;
                u.starlink.obstruction_pct = r.obstruction_pct;
                u.starlink.obstruction_eta = r.obstruction_eta;
                u.starlink.state = if r.online { "CONNECTED" } else { "SEARCHING" }.to_string();
                u.starlink.timestamp_us = now_us;
            }
            None => u.starlink.connected = false,
        }
    }

    /// Replace all chaos offsets from the chaos map; uplinks absent from
    /// the map reset to zero.
    pub fn apply_chaos(&mut self, offsets: &HashMap<String, ChaosOffsets>) {
        for u in &mut self.uplinks {
            u.chaos = offsets
                .get(u.identity.name)
                .copied()
                .unwrap_or_default();
        }
    }

    pub fn set_enabled(&mut self, id: UplinkId, enabled: bool) {
        self.uplink_mut(id).enabled = enabled;
    }

    /// Operator-forced failure: sticky until `clear_forced_failure`.
    pub fn force_failure(&mut self, id: UplinkId) {
        let u = self.uplink_mut(id);
        u.available = false;
        u.force_failed = true;
        u.consec_fail = 10;
    }

    pub fn clear_forced_failure(&mut self, id: UplinkId) {
        let u = self.uplink_mut(id);
        u.force_failed = false;
        u.available = true;
        u.consec_fail = 0;
    }

    /// Commit a verified route switch: flip the active flag, count it
    /// toward the protection window.
    pub fn commit_switch(&mut self, target: UplinkId, now_us: i64) {
        let old = self.status.active_uplink;
        self.uplinks[old.index()].is_active = false;
        self.uplinks[target.index()].is_active = true;
        self.status.active_uplink = target;
        self.status.switches_this_window += 1;
        self.status.switch_start_us = now_us;
    }

    /// Bitmask-style enabled snapshot, distributed to the probe workers.
    pub fn enabled_mask(&self) -> [bool; UplinkId::COUNT] {
        let mut mask = [false; UplinkId::COUNT];
        for u in &self.uplinks {
            mask[u.id().index()] = u.enabled;
        }
        mask
    }
}
