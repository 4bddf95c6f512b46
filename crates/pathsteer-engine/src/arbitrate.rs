//! Slow-path arbitration.
//!
//! Once duplication protects the traffic, there is time to pick the best
//! path deliberately. The step function returns an explicit decision so
//! the settling-vs-engaged duplication sub-state is visible to the caller
//! (and to tests) instead of being a delay buried in the loop.

use pathsteer_common::models::SysState;
use pathsteer_common::uplink::{UplinkId, UplinkKind};

use crate::world::World;

/// Minimum delay between enabling duplication and committing a switch,
/// so the backup path is actually carrying traffic first.
pub const DUP_SETTLE_MS: i64 = 50;

/// Hard cap on switches per protection window.
pub const MAX_SWITCHES_PER_WINDOW: u32 = 3;

/// Switching parameters from the config.
#[derive(Debug, Clone, Copy)]
pub struct SwitchingConfig {
    pub preroll_ms: i64,
    pub min_hold_sec: i64,
    pub clean_exit_sec: i64,
}

/// Outcome of one arbitration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arbitration {
    /// Duplication just passed its settle window; the caller should log
    /// the engagement and step again.
    Engaged { settle_ms: i64 },
    /// Duplication is installed but not yet settled; no switch.
    Settling,
    /// Still inside the preroll window; no switch.
    Preroll,
    /// Flap cap reached; no switch until the window exits.
    Suppressed,
    /// The active uplink is already the best choice.
    Hold,
    /// Commit a switch to this uplink.
    Switch(UplinkId),
}

/// Run one arbitration step.
///
/// Mutates the world's sub-state (SWITCHING while waiting, engaged
/// timestamp, flap flag, HOLDING on a no-op outcome) but never the active
/// uplink: a `Switch` decision is only committed by the caller after route
/// actuation verifies.
pub fn step(world: &mut World, cfg: &SwitchingConfig, now_us: i64) -> Arbitration {
    let status = &mut world.status;
    let elapsed_ms = (now_us - status.protect_start_us) / 1000;

    // Duplication must be confirmed engaged before any switch.
    if status.dup_enabled && status.dup_engaged_at_us == 0 {
        let dup_age_ms = (now_us - status.dup_enabled_at_us) / 1000;
        if dup_age_ms >= DUP_SETTLE_MS {
            status.dup_engaged_at_us = now_us;
            return Arbitration::Engaged {
                settle_ms: dup_age_ms,
            };
        }
        status.state = SysState::Switching;
        return Arbitration::Settling;
    }

    if elapsed_ms < cfg.preroll_ms {
        status.state = SysState::Switching;
        return Arbitration::Preroll;
    }

    if status.switches_this_window >= MAX_SWITCHES_PER_WINDOW {
        status.flap_suppressed = true;
        return Arbitration::Suppressed;
    }

    let best = select_best(world);
    if best != world.status.active_uplink {
        return Arbitration::Switch(best);
    }

    world.status.state = SysState::Holding;
    Arbitration::Hold
}

/// Score every enabled, available uplink and return the best.
///
/// An operator force lock pins the current active uplink. Comparison is
/// strictly greater, so ties keep the incumbent (earliest in id order
/// among challengers).
pub fn select_best(world: &World) -> UplinkId {
    if world.status.force_locked {
        return world.status.active_uplink;
    }

    let mut best = world.status.active_uplink;
    let mut best_score = -9999.0_f64;

    for u in &world.uplinks {
        if !u.enabled || !u.available {
            continue;
        }
        let score = score(u);
        if score > best_score {
            best_score = score;
            best = u.id();
        }
    }

    best
}

fn score(u: &crate::world::Uplink) -> f64 {
    let mut score = 100.0 - u.rtt_ms;
    score -= u.risk_now * 50.0;
    score -= u.loss_pct * 10.0;

    if u.kind() == UplinkKind::Sat && u.starlink.online && !u.starlink.obstructed {
        score += 20.0;
    }
    if u.kind() == UplinkKind::Lte && u.cellular.rsrp > -90.0 {
        score += 15.0;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protection;
    use pathsteer_common::config::Config;
    use pathsteer_common::models::Trigger;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn cfg() -> SwitchingConfig {
        SwitchingConfig {
            preroll_ms: 500,
            min_hold_sec: 3,
            clean_exit_sec: 2,
        }
    }

    /// All six uplinks up: cell_a (active) at 30 ms, fa at 10 ms, the
    /// rest at 40 ms.
    fn contested_world() -> World {
        let mut w = World::new(&Config::default(), "t");
        let mut r = StdRng::seed_from_u64(11);
        for id in UplinkId::ALL {
            let rtt = match id {
                UplinkId::CellA => 30.0,
                UplinkId::FiberA => 10.0,
                _ => 40.0,
            };
            for _ in 0..20 {
                w.apply_probe(id, Some(rtt), 0, &mut r);
            }
        }
        w
    }

    #[test]
    fn fiber_wins_on_raw_rtt() {
        // cell_a scores 85 (30 ms plus the strong-signal bonus, since an
        // unpolled modem reports 0 dBm); fa's 10 ms scores 90.
        let w = contested_world();
        assert_eq!(select_best(&w), UplinkId::FiberA);
    }

    #[test]
    fn satellite_bonus_applies_when_healthy() {
        let mut w = contested_world();
        let sat = &mut w.uplink_mut(UplinkId::SlA).starlink;
        sat.online = true;
        sat.obstructed = false;
        // sl_a: 100 - 40 + 20 = 80 < fa's 90. Push sl_a's RTT down so the
        // bonus decides it.
        w.uplink_mut(UplinkId::SlA).rtt_ms = 15.0;
        assert_eq!(select_best(&w), UplinkId::SlA);
    }

    #[test]
    fn lte_bonus_requires_strong_signal() {
        let mut w = contested_world();
        w.uplink_mut(UplinkId::CellA).rtt_ms = 20.0;
        w.uplink_mut(UplinkId::CellA).cellular.rsrp = -80.0;
        // Strong signal: 100 - 20 + 15 = 95 > fa's 90.
        assert_eq!(select_best(&w), UplinkId::CellA);
        // Weak signal drops the bonus: 80 < 90.
        w.uplink_mut(UplinkId::CellA).cellular.rsrp = -95.0;
        assert_eq!(select_best(&w), UplinkId::FiberA);
    }

    #[test]
    fn ties_keep_the_incumbent() {
        let mut w = contested_world();
        w.uplink_mut(UplinkId::CellA).rtt_ms = 10.0;
        w.uplink_mut(UplinkId::CellA).cellular.rsrp = -95.0;
        // cell_a and fa both score 90; strictly-greater comparison keeps
        // the earlier (active) one.
        assert_eq!(select_best(&w), UplinkId::CellA);
    }

    #[test]
    fn force_lock_pins_the_active_uplink() {
        let mut w = contested_world();
        w.status.force_locked = true;
        assert_eq!(select_best(&w), UplinkId::CellA);
    }

    #[test]
    fn unavailable_uplinks_are_skipped() {
        let mut w = contested_world();
        w.force_failure(UplinkId::FiberA);
        assert_eq!(select_best(&w), UplinkId::CellA);
    }

    #[test]
    fn risk_and_loss_penalties_count() {
        let mut w = contested_world();
        w.uplink_mut(UplinkId::FiberA).risk_now = 0.5; // -25
        w.uplink_mut(UplinkId::FiberA).loss_pct = 6.0; // -60
        // fa: 90 - 85 = 5; cell_a: 85.
        assert_eq!(select_best(&w), UplinkId::CellA);
    }

    // ─── Step function ──────────────────────────────────────────────────

    fn enter_protection(w: &mut World, now_us: i64) {
        protection::fire(w, Trigger::RttStep, "rtt_step", now_us);
        w.status.dup_enabled = true;
        w.status.dup_enabled_at_us = now_us;
        w.status.dup_engaged_at_us = 0;
    }

    #[test]
    fn settle_gates_the_switch() {
        let mut w = contested_world();
        enter_protection(&mut w, 1_000_000);

        // 20 ms after enable: still settling.
        assert_eq!(step(&mut w, &cfg(), 1_020_000), Arbitration::Settling);
        assert_eq!(w.status.state, SysState::Switching);
        assert_eq!(w.status.dup_engaged_at_us, 0);

        // 60 ms after enable: engages, then the next step proceeds.
        assert_eq!(
            step(&mut w, &cfg(), 1_060_000),
            Arbitration::Engaged { settle_ms: 60 }
        );
        assert_eq!(w.status.dup_engaged_at_us, 1_060_000);
    }

    #[test]
    fn preroll_gates_the_switch_after_engagement() {
        let mut w = contested_world();
        enter_protection(&mut w, 1_000_000);
        let _ = step(&mut w, &cfg(), 1_060_000); // engage

        assert_eq!(step(&mut w, &cfg(), 1_100_000), Arbitration::Preroll);
        assert_eq!(w.status.state, SysState::Switching);

        // Past preroll (500 ms from protection entry): switch decision.
        assert_eq!(
            step(&mut w, &cfg(), 1_600_000),
            Arbitration::Switch(UplinkId::FiberA)
        );
        // The step itself must not move the active uplink.
        assert_eq!(w.status.active_uplink, UplinkId::CellA);
    }

    #[test]
    fn flap_cap_suppresses_fourth_switch() {
        let mut w = contested_world();
        enter_protection(&mut w, 0);
        let _ = step(&mut w, &cfg(), 60_000);

        w.status.switches_this_window = MAX_SWITCHES_PER_WINDOW;
        assert_eq!(step(&mut w, &cfg(), 700_000), Arbitration::Suppressed);
        assert!(w.status.flap_suppressed);
        // Suppression leaves the state untouched.
        assert_eq!(w.status.state, SysState::Protect);
    }

    #[test]
    fn hold_when_active_is_already_best() {
        let mut w = contested_world();
        w.commit_switch(UplinkId::FiberA, 0);
        w.status.switches_this_window = 0;
        enter_protection(&mut w, 0);
        let _ = step(&mut w, &cfg(), 60_000);

        assert_eq!(step(&mut w, &cfg(), 700_000), Arbitration::Hold);
        assert_eq!(w.status.state, SysState::Holding);
    }

    #[test]
    fn no_duplication_skips_straight_to_preroll() {
        let mut w = contested_world();
        protection::fire(&mut w, Trigger::Manual, "operator", 0);
        // Duplication install failed — dup_enabled stayed false.
        assert_eq!(step(&mut w, &cfg(), 100_000), Arbitration::Preroll);
        assert_eq!(
            step(&mut w, &cfg(), 600_000),
            Arbitration::Switch(UplinkId::FiberA)
        );
    }
}
