//! Protection window lifecycle.
//!
//! Entry zeroes the window counters; the per-tick timer maintenance
//! computes the hold and clean-exit countdowns and reports when both are
//! satisfied so the caller can tear duplication down and return to NORMAL.

use pathsteer_common::models::{SysState, Trigger};
use pathsteer_common::uplink::UplinkId;

use crate::world::World;

/// RTT headroom over baseline still considered clean.
pub const CLEAN_RTT_MARGIN_MS: f64 = 30.0;

/// Loss below this is clean.
pub const CLEAN_LOSS_PCT: f64 = 2.0;

/// Enter protection. The caller has already attempted duplication; this
/// only records the trigger and resets the window counters.
pub fn fire(world: &mut World, trigger: Trigger, detail: &str, now_us: i64) {
    let status = &mut world.status;
    status.state = SysState::Protect;
    status.last_trigger = trigger;
    status.trigger_detail = detail.to_string();
    status.protect_start_us = now_us;
    status.switches_this_window = 0;
    status.last_clean_us = 0;
    status.flap_suppressed = false;
}

/// Pick the duplication peer: the next enabled and available uplink after
/// the active one in id order, wrapping. `None` when the active uplink is
/// the only usable path.
pub fn dup_peer(world: &World) -> Option<UplinkId> {
    let active = world.status.active_uplink;
    let mut candidate = active.next();
    while candidate != active {
        let u = world.uplink(candidate);
        if u.enabled && u.available {
            return Some(candidate);
        }
        candidate = candidate.next();
    }
    None
}

/// What a completed protection window looked like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitSummary {
    pub held_sec: i64,
    pub clean_sec: i64,
}

/// Per-tick timer maintenance while in protection.
///
/// Returns `Some` exactly when the exit condition (minimum hold elapsed
/// AND a contiguous clean interval) is met; the state is then already
/// NORMAL and the caller is responsible for disabling duplication unless
/// the mode keeps it on.
pub fn tick(
    world: &mut World,
    min_hold_sec: i64,
    clean_exit_sec: i64,
    now_us: i64,
) -> Option<ExitSummary> {
    let elapsed_sec = (now_us - world.status.protect_start_us) / 1_000_000;
    world.status.hold_remaining_sec = (min_hold_sec - elapsed_sec).max(0);

    let active = world.active();
    let is_clean = active.consec_fail == 0
        && active.rtt_ms < active.rtt_baseline() + CLEAN_RTT_MARGIN_MS
        && active.loss_pct < CLEAN_LOSS_PCT;

    if !is_clean {
        world.status.last_clean_us = 0;
        world.status.clean_remaining_sec = clean_exit_sec;
        return None;
    }

    if world.status.last_clean_us == 0 {
        world.status.last_clean_us = now_us;
    }
    let clean_sec = (now_us - world.status.last_clean_us) / 1_000_000;
    world.status.clean_remaining_sec = (clean_exit_sec - clean_sec).max(0);

    if elapsed_sec >= min_hold_sec && clean_sec >= clean_exit_sec {
        world.status.state = SysState::Normal;
        world.status.last_trigger = Trigger::None;
        return Some(ExitSummary {
            held_sec: elapsed_sec,
            clean_sec,
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathsteer_common::config::Config;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SEC: i64 = 1_000_000;

    fn world_with_probes() -> World {
        let mut w = World::new(&Config::default(), "t");
        let mut r = StdRng::seed_from_u64(5);
        for id in UplinkId::ALL {
            for _ in 0..20 {
                w.apply_probe(id, Some(30.0), 0, &mut r);
            }
        }
        w
    }

    #[test]
    fn fire_resets_the_window() {
        let mut w = world_with_probes();
        w.status.switches_this_window = 2;
        w.status.flap_suppressed = true;
        w.status.last_clean_us = 99;

        fire(&mut w, Trigger::ProbeMiss, "probe_miss", 5 * SEC);

        assert_eq!(w.status.state, SysState::Protect);
        assert_eq!(w.status.last_trigger, Trigger::ProbeMiss);
        assert_eq!(w.status.trigger_detail, "probe_miss");
        assert_eq!(w.status.protect_start_us, 5 * SEC);
        assert_eq!(w.status.switches_this_window, 0);
        assert_eq!(w.status.last_clean_us, 0);
        assert!(!w.status.flap_suppressed);
    }

    #[test]
    fn dup_peer_is_next_usable_in_order() {
        let mut w = world_with_probes();
        assert_eq!(dup_peer(&w), Some(UplinkId::CellB));

        w.set_enabled(UplinkId::CellB, false);
        w.force_failure(UplinkId::SlA);
        assert_eq!(dup_peer(&w), Some(UplinkId::SlB));
    }

    #[test]
    fn dup_peer_wraps_past_the_end() {
        let mut w = world_with_probes();
        w.commit_switch(UplinkId::FiberB, 0);
        assert_eq!(dup_peer(&w), Some(UplinkId::CellA));
    }

    #[test]
    fn dup_peer_none_when_alone() {
        let mut w = world_with_probes();
        for id in UplinkId::ALL {
            if id != UplinkId::CellA {
                w.set_enabled(id, false);
            }
        }
        assert_eq!(dup_peer(&w), None);
    }

    #[test]
    fn exit_requires_hold_and_clean() {
        let mut w = world_with_probes();
        fire(&mut w, Trigger::RttStep, "rtt_step", 0);

        // Clean immediately, but the hold timer dominates early. The
        // clean run starts counting from this tick.
        assert_eq!(tick(&mut w, 3, 2, 1 * SEC), None);
        assert_eq!(w.status.hold_remaining_sec, 2);
        assert_eq!(w.status.clean_remaining_sec, 2);

        // Hold satisfied at 3 s and the clean run started at 1 s.
        assert_eq!(
            tick(&mut w, 3, 2, 3 * SEC),
            Some(ExitSummary {
                held_sec: 3,
                clean_sec: 2,
            })
        );
        assert_eq!(w.status.state, SysState::Normal);
        assert_eq!(w.status.last_trigger, Trigger::None);
    }

    #[test]
    fn dirt_resets_the_clean_run() {
        let mut w = world_with_probes();
        let mut r = StdRng::seed_from_u64(9);
        fire(&mut w, Trigger::RttStep, "rtt_step", 0);

        assert_eq!(tick(&mut w, 3, 2, 1 * SEC), None);
        assert!(w.status.last_clean_us > 0);

        // A probe miss dirties the path; the clean clock restarts.
        w.apply_probe(UplinkId::CellA, None, 2 * SEC, &mut r);
        assert_eq!(tick(&mut w, 3, 2, 2 * SEC), None);
        assert_eq!(w.status.last_clean_us, 0);
        assert_eq!(w.status.clean_remaining_sec, 2);

        // Clean again from 3 s (the miss must also age out of the loss
        // window); exit only once 2 contiguous clean seconds have accrued,
        // at 5 s.
        for _ in 0..20 {
            w.apply_probe(UplinkId::CellA, Some(30.0), 3 * SEC, &mut r);
        }
        assert_eq!(tick(&mut w, 3, 2, 3 * SEC), None);
        assert_eq!(tick(&mut w, 3, 2, 4 * SEC), None);
        assert!(tick(&mut w, 3, 2, 5 * SEC).is_some());
    }

    #[test]
    fn elevated_rtt_is_not_clean() {
        let mut w = world_with_probes();
        fire(&mut w, Trigger::RttStep, "rtt_step", 0);
        w.uplink_mut(UplinkId::CellA).rtt_ms = 70.0; // baseline 30 + margin 30 < 70
        assert_eq!(tick(&mut w, 3, 2, 4 * SEC), None);
        assert_eq!(w.status.last_clean_us, 0);
    }

    #[test]
    fn hold_countdown_clamps_at_zero() {
        let mut w = world_with_probes();
        fire(&mut w, Trigger::RttStep, "rtt_step", 0);
        w.uplink_mut(UplinkId::CellA).loss_pct = 50.0; // never clean
        let _ = tick(&mut w, 3, 2, 10 * SEC);
        assert_eq!(w.status.hold_remaining_sec, 0);
    }
}
