//! Microsecond clock and run-id stamps.
//!
//! All timestamps in the system are wall-clock microseconds since the Unix
//! epoch, carried as `i64` and passed explicitly into the decision logic so
//! tests can drive a synthetic clock.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in microseconds since the Unix epoch.
pub fn now_us() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    now_us() / 1000
}

/// Run id stamped at startup, e.g. `20260801_143015`.
pub fn run_id() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}
