//! Risk scoring and the global recommendation.
//!
//! Runs at 4 Hz over every enabled uplink. `risk_now` is an additive score
//! clamped to [0, 1]; the global risk is the worst score among active
//! uplinks and maps onto a three-level recommendation.

use pathsteer_common::models::Recommendation;
use pathsteer_common::uplink::UplinkKind;

use crate::world::World;

/// Recommendation thresholds on the global risk.
pub const PROTECT_THRESHOLD: f64 = 0.7;
pub const PREPARE_THRESHOLD: f64 = 0.4;

/// Recompute `risk_now` for every enabled uplink and refresh the global
/// risk and recommendation.
pub fn tick(world: &mut World) {
    let mut max_risk = 0.0_f64;

    for u in &mut world.uplinks {
        if !u.enabled {
            continue;
        }

        let mut risk = 0.0;

        if u.rtt_ms > u.baseline.value() * 1.5 {
            risk += 0.3;
        }

        if u.loss_pct > 50.0 {
            risk += 0.5;
        } else if u.loss_pct > 20.0 {
            risk += 0.4;
        } else if u.loss_pct > 5.0 {
            risk += 0.3;
        }

        risk += 0.2 * u.consec_fail.min(5) as f64;

        match u.kind() {
            UplinkKind::Sat => risk += 0.01 * u.starlink.obstruction_pct,
            UplinkKind::Lte if u.cellular.rsrp < -110.0 => risk += 0.4,
            _ => {}
        }

        u.risk_now = risk.min(1.0);

        if u.is_active && u.risk_now > max_risk {
            max_risk = u.risk_now;
        }
    }

    world.status.global_risk = max_risk;
    world.status.recommendation = if max_risk >= PROTECT_THRESHOLD {
        Recommendation::Protect
    } else if max_risk >= PREPARE_THRESHOLD {
        Recommendation::Prepare
    } else {
        Recommendation::Normal
    };
}
