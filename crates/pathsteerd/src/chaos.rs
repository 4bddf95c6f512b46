//! Chaos injection file.
//!
//! Demo tooling writes a JSON map keyed by canonical uplink name:
//! `{"cell_a": {"rtt": 120, "jitter": 15, "loss": 5}}`. The file is read
//! once per probe cycle; uplinks absent from the map (or the whole file
//! being absent) reset their offsets to zero.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use pathsteer_engine::world::ChaosOffsets;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChaosEntry {
    rtt: f64,
    jitter: f64,
    loss: f64,
}

/// Parse a chaos document into per-uplink offsets. Malformed input clears
/// all injections rather than leaving stale chaos behind.
pub fn parse(raw: &str) -> HashMap<String, ChaosOffsets> {
    let entries: HashMap<String, ChaosEntry> = match serde_json::from_str(raw) {
        Ok(map) => map,
        Err(_) => return HashMap::new(),
    };
    entries
        .into_iter()
        .map(|(name, e)| {
            (
                name,
                ChaosOffsets {
                    rtt: e.rtt,
                    jitter: e.jitter,
                    loss: e.loss,
                },
            )
        })
        .collect()
}

/// Read the chaos file; absence means no injections.
pub async fn read(path: &Path) -> HashMap<String, ChaosOffsets> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => parse(&raw),
        Err(_) => HashMap::new(),
    }
}
