//! GPS fix file parsing.
//!
//! A sidecar process writes `{lat, lon, speed_mph, fix}` once a second;
//! the fix is valid only when the fix flag is set and both coordinates
//! are present.

use std::path::Path;

use serde::Deserialize;

use pathsteer_common::models::{GpsFix, MPH_PER_MPS};

#[derive(Debug, Deserialize)]
struct GpsFile {
    lat: Option<f64>,
    lon: Option<f64>,
    speed_mph: Option<f64>,
    #[serde(default)]
    heading: Option<f64>,
    fix: Option<bool>,
}

/// Parse a GPS file body. `None` when unreadable; the previous fix stays.
pub fn parse(raw: &str, now_us: i64) -> Option<GpsFix> {
    let file: GpsFile = serde_json::from_str(raw).ok()?;
    Some(GpsFix {
        latitude: file.lat.unwrap_or(0.0),
        longitude: file.lon.unwrap_or(0.0),
        speed_mps: file.speed_mph.unwrap_or(0.0) / MPH_PER_MPS,
        heading: file.heading.unwrap_or(0.0),
        valid: file.fix == Some(true) && file.lat.is_some() && file.lon.is_some(),
        timestamp_us: now_us,
    })
}

/// Read and parse the GPS file; `None` when absent or malformed.
pub async fn read(path: &Path, now_us: i64) -> Option<GpsFix> {
    let raw = tokio::fs::read_to_string(path).await.ok()?;
    parse(&raw, now_us)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_fix() {
        let fix = parse(
            r#"{"lat": 30.2672, "lon": -97.7431, "speed_mph": 44.74, "fix": true}"#,
            42,
        )
        .unwrap();
        assert!(fix.valid);
        assert_eq!(fix.latitude, 30.2672);
        assert!((fix.speed_mps - 20.0).abs() < 0.01);
        assert_eq!(fix.timestamp_us, 42);
    }

    #[test]
    fn no_fix_flag_means_invalid() {
        let fix = parse(r#"{"lat": 30.0, "lon": -97.0, "fix": false}"#, 0).unwrap();
        assert!(!fix.valid);
        // Coordinates still pass through for display.
        assert_eq!(fix.latitude, 30.0);
    }

    #[test]
    fn fix_without_coordinates_is_invalid() {
        let fix = parse(r#"{"fix": true}"#, 0).unwrap();
        assert!(!fix.valid);
    }

    #[test]
    fn malformed_body_is_none() {
        assert!(parse("nonsense", 0).is_none());
    }
}
