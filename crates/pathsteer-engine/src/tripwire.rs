//! Fast-path degradation detection.
//!
//! The tripwire is a stateless predicate over the active uplink, evaluated
//! every tick. First match wins; any non-`None` result causes immediate
//! protection entry (duplication first, arbitration later).

use pathsteer_common::models::Trigger;
use pathsteer_common::uplink::UplinkKind;

use crate::world::World;

/// RSRP floor below which an LTE uplink is considered failing.
pub const RSRP_FLOOR_DBM: f64 = -120.0;

/// Obstruction forecast horizon: a predicted obstruction closer than this
/// fires the tripwire before the dish actually occludes.
pub const OBSTRUCTION_ETA_SEC: i64 = 5;

/// History depth required before the RTT step rule applies.
const RTT_STEP_MIN_DEPTH: u64 = 5;

/// Successful samples averaged for the RTT step comparison.
const RTT_STEP_SAMPLES: usize = 3;

/// Thresholds the tripwire evaluates against.
#[derive(Debug, Clone, Copy)]
pub struct TripwireConfig {
    pub rtt_step_ms: i64,
    pub probe_miss_count: u32,
}

/// Evaluate the active uplink. Returns `Trigger::None` when healthy.
pub fn check(world: &World, cfg: &TripwireConfig) -> Trigger {
    let active = world.active();

    if !active.enabled || !active.available {
        return Trigger::LinkDown;
    }

    // RTT step: recent successful probes jumped well above baseline.
    if active.history.written() >= RTT_STEP_MIN_DEPTH {
        if let Some(recent_avg) = active.history.recent_success_mean(RTT_STEP_SAMPLES) {
            if recent_avg - active.rtt_baseline() >= cfg.rtt_step_ms as f64 {
                return Trigger::RttStep;
            }
        }
    }

    if active.consec_fail >= cfg.probe_miss_count {
        return Trigger::ProbeMiss;
    }

    if active.kind() == UplinkKind::Lte && active.cellular.rsrp < RSRP_FLOOR_DBM {
        return Trigger::RsrpDrop;
    }

    if active.kind() == UplinkKind::Sat {
        if active.starlink.obstructed {
            return Trigger::StarlinkObstruction;
        }
        let eta = active.starlink.obstruction_eta;
        if eta > 0 && eta < OBSTRUCTION_ETA_SEC {
            return Trigger::StarlinkObstruction;
        }
    }

    Trigger::None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathsteer_common::config::Config;
    use pathsteer_common::uplink::UplinkId;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn cfg() -> TripwireConfig {
        TripwireConfig {
            rtt_step_ms: 80,
            probe_miss_count: 2,
        }
    }

    fn world_with_clean_active() -> (World, StdRng) {
        let mut w = World::new(&Config::default(), "t");
        let mut r = StdRng::seed_from_u64(1);
        for _ in 0..20 {
            w.apply_probe(UplinkId::CellA, Some(30.0), 0, &mut r);
        }
        (w, r)
    }

    #[test]
    fn clean_active_is_none() {
        let (w, _) = world_with_clean_active();
        assert_eq!(check(&w, &cfg()), Trigger::None);
    }

    #[test]
    fn unavailable_active_is_link_down() {
        let (mut w, mut r) = world_with_clean_active();
        for _ in 0..6 {
            w.apply_probe(UplinkId::CellA, None, 0, &mut r);
        }
        assert_eq!(check(&w, &cfg()), Trigger::LinkDown);
    }

    #[test]
    fn disabled_active_is_link_down() {
        let (mut w, _) = world_with_clean_active();
        w.set_enabled(UplinkId::CellA, false);
        assert_eq!(check(&w, &cfg()), Trigger::LinkDown);
    }

    #[test]
    fn rtt_step_fires_on_jump_over_baseline() {
        let (mut w, mut r) = world_with_clean_active();
        for _ in 0..3 {
            w.apply_probe(UplinkId::CellA, Some(150.0), 0, &mut r);
        }
        // Baseline barely moved from 30 ms; the recent mean is 150 ms.
        assert_eq!(check(&w, &cfg()), Trigger::RttStep);
    }

    #[test]
    fn rtt_step_needs_history_depth() {
        let mut w = World::new(&Config::default(), "t");
        let mut r = StdRng::seed_from_u64(1);
        // Only 4 samples — below the depth requirement, even though the
        // jump over the first-sample baseline is large.
        w.apply_probe(UplinkId::CellA, Some(30.0), 0, &mut r);
        for _ in 0..3 {
            w.apply_probe(UplinkId::CellA, Some(200.0), 0, &mut r);
        }
        assert_eq!(check(&w, &cfg()), Trigger::None);
    }

    #[test]
    fn probe_miss_fires_before_unavailability() {
        let (mut w, mut r) = world_with_clean_active();
        w.apply_probe(UplinkId::CellA, None, 0, &mut r);
        assert_eq!(check(&w, &cfg()), Trigger::None);
        w.apply_probe(UplinkId::CellA, None, 0, &mut r);
        assert_eq!(check(&w, &cfg()), Trigger::ProbeMiss);
    }

    #[test]
    fn weak_rsrp_fires_for_lte() {
        let (mut w, _) = world_with_clean_active();
        w.uplink_mut(UplinkId::CellA).cellular.rsrp = -125.0;
        assert_eq!(check(&w, &cfg()), Trigger::RsrpDrop);
    }

    #[test]
    fn obstruction_fires_for_satellite() {
        let (mut w, mut r) = world_with_clean_active();
        w.commit_switch(UplinkId::SlA, 0);
        for _ in 0..10 {
            w.apply_probe(UplinkId::SlA, Some(45.0), 0, &mut r);
        }
        assert_eq!(check(&w, &cfg()), Trigger::None);
        w.uplink_mut(UplinkId::SlA).starlink.obstructed = true;
        assert_eq!(check(&w, &cfg()), Trigger::StarlinkObstruction);
    }

    #[test]
    fn imminent_obstruction_fires_before_occlusion() {
        let (mut w, mut r) = world_with_clean_active();
        w.commit_switch(UplinkId::SlA, 0);
        for _ in 0..10 {
            w.apply_probe(UplinkId::SlA, Some(45.0), 0, &mut r);
        }
        let sat = &mut w.uplink_mut(UplinkId::SlA).starlink;
        sat.obstructed = false;
        sat.obstruction_eta = 3;
        assert_eq!(check(&w, &cfg()), Trigger::StarlinkObstruction);
        // Unknown ETA (-1) does not fire.
        w.uplink_mut(UplinkId::SlA).starlink.obstruction_eta = -1;
        assert_eq!(check(&w, &cfg()), Trigger::None);
    }

    #[test]
    fn rtt_step_outranks_probe_miss() {
        let (mut w, mut r) = world_with_clean_active();
        for _ in 0..3 {
            w.apply_probe(UplinkId::CellA, Some(200.0), 0, &mut r);
        }
        w.apply_probe(UplinkId::CellA, None, 0, &mut r);
        w.apply_probe(UplinkId::CellA, None, 0, &mut r);
        // Both rules match; the RTT step is checked first.
        assert_eq!(check(&w, &cfg()), Trigger::RttStep);
    }
}
