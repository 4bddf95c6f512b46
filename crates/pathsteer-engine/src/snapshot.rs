//! The serializable status document.
//!
//! Captured from the world at 10 Hz and written atomically for the web UI.
//! Field names are the stable external contract; readers parse the whole
//! document or nothing.

use serde::Serialize;

use pathsteer_common::models::MPH_PER_MPS;
use pathsteer_common::uplink::UplinkKind;

use crate::world::World;

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub mode: &'static str,
    pub state: &'static str,
    pub trigger: &'static str,
    pub trigger_detail: String,
    pub active_uplink: &'static str,
    pub force_locked: bool,
    pub active_controller: u8,
    pub dup_enabled: bool,
    pub dup_enabled_at_us: i64,
    pub dup_engaged_at_us: i64,
    pub hold_remaining: i64,
    pub clean_remaining: i64,
    pub switches_this_window: u32,
    pub flap_suppressed: bool,
    pub global_risk: f64,
    pub recommendation: &'static str,
    pub run_id: String,
    pub last_cmd: LastCmdSnapshot,
    pub gps: GpsSnapshot,
    pub uplinks: Vec<UplinkSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LastCmdSnapshot {
    pub id: String,
    pub result: String,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GpsSnapshot {
    pub valid: bool,
    pub lat: f64,
    pub lon: f64,
    pub speed_mph: f64,
    pub heading: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UplinkSnapshot {
    pub name: &'static str,
    pub enabled: bool,
    pub available: bool,
    pub active: bool,
    pub rtt_ms: f64,
    pub rtt_baseline: f64,
    pub loss_pct: f64,
    pub jitter_ms: f64,
    pub risk_now: f64,
    pub consec_fail: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cellular: Option<CellularSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starlink: Option<StarlinkSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CellularSnapshot {
    pub rsrp: f64,
    pub sinr: f64,
    pub carrier: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StarlinkSnapshot {
    pub state: String,
    pub latency: f64,
    pub obstructed: bool,
    pub obstruction_pct: f64,
    pub eta: i64,
}

/// Build a snapshot of the whole world.
pub fn capture(world: &World) -> StatusSnapshot {
    let status = &world.status;

    let uplinks = world
        .uplinks
        .iter()
        .map(|u| UplinkSnapshot {
            name: u.identity.name,
            enabled: u.enabled,
            available: u.available,
            active: u.is_active,
            rtt_ms: u.rtt_ms,
            rtt_baseline: u.rtt_baseline(),
            loss_pct: u.loss_pct,
            jitter_ms: u.jitter_ms,
            risk_now: u.risk_now,
            consec_fail: u.consec_fail,
            cellular: (u.kind() == UplinkKind::Lte).then(|| CellularSnapshot {
                rsrp: u.cellular.rsrp,
                sinr: u.cellular.sinr,
                carrier: u.cellular.carrier.clone(),
            }),
            starlink: (u.kind() == UplinkKind::Sat).then(|| StarlinkSnapshot {
                state: u.starlink.state.clone(),
                latency: u.starlink.latency_ms,
                obstructed: u.starlink.obstructed,
                obstruction_pct: u.starlink.obstruction_pct,
                eta: u.starlink.obstruction_eta,
            }),
        })
        .collect();

    StatusSnapshot {
        mode: status.mode.as_str(),
        state: status.state.as_str(),
        trigger: status.last_trigger.as_str(),
        trigger_detail: status.trigger_detail.clone(),
        active_uplink: status.active_uplink.name(),
        force_locked: status.force_locked,
        active_controller: status.active_controller,
        dup_enabled: status.dup_enabled,
        dup_enabled_at_us: status.dup_enabled_at_us,
        dup_engaged_at_us: status.dup_engaged_at_us,
        hold_remaining: status.hold_remaining_sec,
        clean_remaining: status.clean_remaining_sec,
        switches_this_window: status.switches_this_window,
        flap_suppressed: status.flap_suppressed,
        global_risk: status.global_risk,
        recommendation: status.recommendation.as_str(),
        run_id: status.run_id.clone(),
        last_cmd: LastCmdSnapshot {
            id: status.last_cmd.id.clone(),
            result: status.last_cmd.result.clone(),
            detail: status.last_cmd.detail.clone(),
        },
        gps: GpsSnapshot {
            valid: world.gps.valid,
            lat: world.gps.latitude,
            lon: world.gps.longitude,
            speed_mph: world.gps.speed_mps * MPH_PER_MPS,
            heading: world.gps.heading,
        },
        uplinks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathsteer_common::config::Config;

    #[test]
    fn snapshot_serializes_the_external_contract() {
        let world = World::new(&Config::default(), "run_42");
        let snap = capture(&world);
        let json = serde_json::to_value(&snap).unwrap();

        assert_eq!(json["mode"], "TRIPWIRE");
        assert_eq!(json["state"], "NORMAL");
        assert_eq!(json["trigger"], "none");
        assert_eq!(json["active_uplink"], "cell_a");
        assert_eq!(json["run_id"], "run_42");
        assert_eq!(json["recommendation"], "NORMAL");
        assert_eq!(json["uplinks"].as_array().unwrap().len(), 6);

        // Kind-specific blocks appear only for their kind.
        let uplinks = json["uplinks"].as_array().unwrap();
        assert_eq!(uplinks[0]["cellular"]["carrier"], "T-Mobile");
        assert!(uplinks[0].get("starlink").is_none());
        assert!(uplinks[2].get("cellular").is_none());
        assert_eq!(uplinks[2]["starlink"]["eta"], -1);
        assert!(uplinks[4].get("cellular").is_none());
        assert!(uplinks[4].get("starlink").is_none());
    }

    #[test]
    fn gps_speed_converts_to_mph() {
        let mut world = World::new(&Config::default(), "r");
        world.gps.speed_mps = 10.0;
        world.gps.valid = true;
        let snap = capture(&world);
        assert!((snap.gps.speed_mph - 22.37).abs() < 1e-9);
    }
}
