//! Per-uplink probe workers.
//!
//! One task per uplink, ticking at the configured sample rate. Cellular
//! uplinks probe a fixed controller address through the raw modem
//! interface (path-correct); satellite and fiber uplinks probe an external
//! target from inside their namespace. Results flow to the controller over
//! a channel — workers never touch shared state directly.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

use pathsteer_common::clock;
use pathsteer_common::config::ProbeConfig;
use pathsteer_common::models::{CellularReading, SatelliteReading};
use pathsteer_common::uplink::{UplinkId, UplinkKind};

use crate::ops::NetOps;

/// Minimum spacing between cellular monitor invocations — the modem
/// client cannot be hammered at probe rate.
pub const CELLULAR_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Kind-specific data attached to a probe report.
#[derive(Debug, Clone, PartialEq)]
pub enum AuxReading {
    /// Nothing polled this cycle (rate-limited, wrong kind, or a failed
    /// cellular helper — the record stays stale).
    None,
    Cellular(CellularReading),
    /// `None` inside means the dish was unreachable.
    Satellite(Option<SatelliteReading>),
}

/// One probe result, sent to the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    pub uplink: UplinkId,
    pub rtt_ms: Option<f64>,
    pub timestamp_us: i64,
    pub aux: AuxReading,
}

/// Run one uplink's probe loop until shutdown.
pub async fn run(
    id: UplinkId,
    probe_cfg: ProbeConfig,
    sample_rate_hz: u32,
    ops: Arc<dyn NetOps>,
    enabled: watch::Receiver<[bool; UplinkId::COUNT]>,
    mut shutdown: watch::Receiver<bool>,
    reports: mpsc::Sender<ProbeReport>,
) {
    let ident = id.identity();
    let period = Duration::from_secs_f64(1.0 / sample_rate_hz.max(1) as f64);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // First cellular poll happens on the first enabled tick.
    let mut last_cellular_poll = Instant::now() - CELLULAR_POLL_INTERVAL;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => return,
        }
        if *shutdown.borrow() {
            return;
        }
        if !enabled.borrow()[id.index()] {
            continue;
        }

        let timestamp_us = clock::now_us();
        let rtt_ms = match ident.kind {
            UplinkKind::Lte => {
                ops.probe_iface(ident.interface, &probe_cfg.cellular_target)
                    .await
            }
            UplinkKind::Sat | UplinkKind::Fiber => {
                ops.probe_netns(ident.netns, &probe_cfg.external_target).await
            }
        };

        let aux = match ident.kind {
            UplinkKind::Lte if last_cellular_poll.elapsed() >= CELLULAR_POLL_INTERVAL => {
                last_cellular_poll = Instant::now();
                match ops
                    .poll_cellular(ident.modem_index.unwrap_or(0), ident.name)
                    .await
                {
                    Some(reading) => AuxReading::Cellular(reading),
                    None => AuxReading::None,
                }
            }
            UplinkKind::Sat => {
                AuxReading::Satellite(ops.poll_satellite(ident.netns, &probe_cfg.dish_addr).await)
            }
            _ => AuxReading::None,
        };

        let report = ProbeReport {
            uplink: id,
            rtt_ms,
            timestamp_us,
            aux,
        };
        if reports.send(report).await.is_err() {
            // Controller gone; nothing left to probe for.
            return;
        }
    }
}
