//! Dish stats output parsing.
//!
//! The stats helper emits one JSON object. An empty body or anything
//! containing `error` means the dish was unreachable from the namespace.

use serde::Deserialize;

use pathsteer_common::models::SatelliteReading;

/// Fraction of obstructed time above which the dish counts as obstructed.
pub const OBSTRUCTION_FRACTION_THRESHOLD: f64 = 0.10;

#[derive(Debug, Deserialize)]
struct DishStats {
    #[serde(default)]
    latency_ms: f64,
    /// Fraction of time obstructed, 0.0-1.0.
    #[serde(default)]
    obstruction: f64,
    #[serde(default)]
    snr_ok: bool,
    #[serde(default)]
    downlink_bps: f64,
    #[serde(default)]
    uplink_bps: f64,
    /// Seconds until the next predicted obstruction, absent when unknown.
    obstruction_eta: Option<i64>,
}

/// Parse a stats report. `None` marks the dish disconnected.
pub fn parse(output: &str) -> Option<SatelliteReading> {
    let trimmed = output.trim();
    if trimmed.is_empty() || trimmed.contains("error") {
        return None;
    }
    let stats: DishStats = serde_json::from_str(trimmed).ok()?;

    Some(SatelliteReading {
        online: stats.snr_ok,
        latency_ms: stats.latency_ms,
        downlink_mbps: stats.downlink_bps / 1_000_000.0,
        uplink_mbps: stats.uplink_bps / 1_000_000.0,
        obstructed: stats.obstruction > OBSTRUCTION_FRACTION_THRESHOLD,
        obstruction_pct: stats.obstruction * 100.0,
        obstruction_eta: stats.obstruction_eta.unwrap_or(-1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_healthy_dish() {
        let out = r#"{
            "latency_ms": 38.5,
            "obstruction": 0.02,
            "snr_ok": true,
            "downlink_bps": 145000000,
            "uplink_bps": 18000000
        }"#;
        let r = parse(out).unwrap();
        assert!(r.online);
        assert_eq!(r.latency_ms, 38.5);
        assert!(!r.obstructed);
        assert!((r.obstruction_pct - 2.0).abs() < 1e-9);
        assert!((r.downlink_mbps - 145.0).abs() < 1e-9);
        assert!((r.uplink_mbps - 18.0).abs() < 1e-9);
        assert_eq!(r.obstruction_eta, -1);
    }

    #[test]
    fn obstruction_fraction_threshold() {
        let make = |frac: f64| {
            parse(&format!(
                r#"{{"latency_ms": 40, "obstruction": {frac}, "snr_ok": true}}"#
            ))
            .unwrap()
        };
        assert!(!make(0.10).obstructed);
        assert!(make(0.11).obstructed);
    }

    #[test]
    fn eta_passes_through_when_reported() {
        let out = r#"{"snr_ok": true, "obstruction": 0.0, "obstruction_eta": 3}"#;
        assert_eq!(parse(out).unwrap().obstruction_eta, 3);
    }

    #[test]
    fn unreachable_dish_is_none() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("   \n"), None);
        assert_eq!(parse(r#"{"error": "timeout talking to dish"}"#), None);
        assert_eq!(parse("not json at all"), None);
    }
}
