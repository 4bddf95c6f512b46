//! The control loop.
//!
//! The controller is the exclusive owner of the world. Probe workers feed
//! it reports over a channel; each scheduler tick it runs the cadenced
//! work (chaos, GPS, risk, status) by elapsed-time comparison, drives the
//! protection state machine, and drains the operator command queue.
//!
//! Ordering guarantees live here:
//! 1. Duplication is installed on protection entry and must pass its
//!    settle window (the engaged sub-state) before any switch.
//! 2. The active uplink only changes after route actuation verifies.
//! 3. The per-window switch counter resets only on protection entry.

use std::path::PathBuf;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use tokio::sync::watch;

use pathsteer_common::clock;
use pathsteer_common::config::Config;
use pathsteer_common::events::EventLog;
use pathsteer_common::models::{Mode, Recommendation, SysState, Trigger};
use pathsteer_common::uplink::UplinkId;
use pathsteer_engine::arbitrate::{self, Arbitration, SwitchingConfig};
use pathsteer_engine::command::Command;
use pathsteer_engine::protection;
use pathsteer_engine::tripwire::{self, TripwireConfig};
use pathsteer_engine::world::World;
use pathsteer_engine::{risk, snapshot};

use crate::ops::NetOps;
use crate::probe::{AuxReading, ProbeReport};
use crate::{chaos, cmdq, gps, status_file};

/// Risk engine cadence.
pub const RISK_INTERVAL_US: i64 = 250_000;
/// Status publication cadence.
pub const STATUS_INTERVAL_US: i64 = 100_000;
/// GPS read cadence.
pub const GPS_INTERVAL_US: i64 = 1_000_000;
/// Scheduler tick.
pub const TICK_MS: u64 = 10;

/// In MIRROR mode duplication always targets the fixed secondary.
const MIRROR_PEER: UplinkId = UplinkId::CellB;

pub struct Controller {
    pub world: World,
    cfg: Config,
    tripwire_cfg: TripwireConfig,
    switching_cfg: SwitchingConfig,
    ops: Arc<dyn NetOps>,
    log: EventLog,
    rng: StdRng,
    enabled_tx: watch::Sender<[bool; UplinkId::COUNT]>,

    status_path: PathBuf,
    status_tmp_path: PathBuf,
    chaos_path: PathBuf,
    gps_path: PathBuf,
    cmd_dir: PathBuf,
    legacy_cmd_path: PathBuf,

    probe_interval_us: i64,
    last_chaos_us: i64,
    last_gps_us: i64,
    last_risk_us: i64,
    last_status_us: i64,
    last_training_verdict: Recommendation,
}

impl Controller {
    pub fn new(
        world: World,
        cfg: Config,
        ops: Arc<dyn NetOps>,
        log: EventLog,
        enabled_tx: watch::Sender<[bool; UplinkId::COUNT]>,
    ) -> Controller {
        let tripwire_cfg = TripwireConfig {
            rtt_step_ms: cfg.rtt_step_threshold_ms,
            probe_miss_count: cfg.probe_miss_count,
        };
        let switching_cfg = SwitchingConfig {
            preroll_ms: cfg.preroll_ms,
            min_hold_sec: cfg.min_hold_sec,
            clean_exit_sec: cfg.clean_exit_sec,
        };
        let probe_interval_us = 1_000_000 / cfg.sample_rate_hz.max(1) as i64;
        Controller {
            status_path: cfg.paths.status_file(),
            status_tmp_path: cfg.paths.status_tmp_file(),
            chaos_path: cfg.paths.chaos_file(),
            gps_path: cfg.paths.gps_file(),
            cmd_dir: cfg.paths.command_dir(),
            legacy_cmd_path: cfg.paths.legacy_command_file(),
            world,
            cfg,
            tripwire_cfg,
            switching_cfg,
            ops,
            log,
            rng: StdRng::seed_from_u64(clock::now_us() as u64),
            enabled_tx,
            probe_interval_us,
            last_chaos_us: 0,
            last_gps_us: 0,
            last_risk_us: 0,
            last_status_us: 0,
            last_training_verdict: Recommendation::Normal,
        }
    }

    /// One-time startup actuation: clear stale duplication state and pin
    /// the service-namespace route to the boot-time active uplink.
    pub async fn startup(&mut self) {
        self.ops.dup_remove().await;
        self.log.emit(
            "dup_init",
            json!({"status": "ready", "method": "nftables_dup"}),
        );

        let active = self.world.status.active_uplink.identity();
        if let Err(e) = self
            .ops
            .replace_default_route(active.vip_gw, active.vip_dev)
            .await
        {
            tracing::warn!(error = %e, "initial route install failed");
        }
        self.log.emit(
            "init_route",
            json!({"vip_dev": active.vip_dev, "vip_gw": active.vip_gw}),
        );

        self.log.emit(
            "startup",
            json!({
                "version": env!("CARGO_PKG_VERSION"),
                "run_id": self.world.status.run_id,
                "node_id": self.cfg.id,
            }),
        );
    }

    /// Apply one probe report from a worker.
    pub fn handle_report(&mut self, report: ProbeReport) {
        self.world
            .apply_probe(report.uplink, report.rtt_ms, report.timestamp_us, &mut self.rng);
        match report.aux {
            AuxReading::None => {}
            AuxReading::Cellular(reading) => {
                self.world
                    .apply_cellular(report.uplink, reading, report.timestamp_us)
            }
            AuxReading::Satellite(reading) => {
                self.world
                    .apply_satellite(report.uplink, reading, report.timestamp_us)
            }
        }
    }

    /// One scheduler tick. `now_us` comes from the caller so tests can
    /// drive a synthetic clock.
    pub async fn tick(&mut self, now_us: i64) {
        if now_us - self.last_chaos_us >= self.probe_interval_us {
            let offsets = chaos::read(&self.chaos_path).await;
            self.world.apply_chaos(&offsets);
            self.last_chaos_us = now_us;
        }

        if self.cfg.gps_enabled && now_us - self.last_gps_us >= GPS_INTERVAL_US {
            if let Some(fix) = gps::read(&self.gps_path, now_us).await {
                self.world.gps = fix;
            }
            self.last_gps_us = now_us;
        }

        if now_us - self.last_risk_us >= RISK_INTERVAL_US {
            risk::tick(&mut self.world);
            self.training_verdict();
            self.last_risk_us = now_us;
        }

        if self.world.status.mode != Mode::Training {
            self.state_machine(now_us).await;
        }

        self.process_commands(now_us).await;

        if now_us - self.last_status_us >= STATUS_INTERVAL_US {
            self.publish_status().await;
            self.last_status_us = now_us;
        }
    }

    /// In TRAINING mode the risk engine still runs; log what the state
    /// machine would have done when the verdict changes.
    fn training_verdict(&mut self) {
        let rec = self.world.status.recommendation;
        if self.world.status.mode == Mode::Training && rec != self.last_training_verdict {
            self.log.emit(
                "would_do",
                json!({
                    "recommendation": rec.as_str(),
                    "global_risk": self.world.status.global_risk,
                }),
            );
        }
        self.last_training_verdict = rec;
    }

    async fn state_machine(&mut self, now_us: i64) {
        match self.world.status.state {
            SysState::Normal | SysState::Prepare => {
                // An enabled uplink with no probe data yet is unknown, not
                // down; hold off until the first report lands.
                let active = self.world.active();
                if active.enabled && active.history.written() == 0 {
                    return;
                }
                let trigger = tripwire::check(&self.world, &self.tripwire_cfg);
                if trigger != Trigger::None {
                    self.enter_protection(trigger, trigger.as_str(), now_us).await;
                }
            }
            // Arbitration keeps running through HOLDING: oscillating
            // conditions may switch again within the window, up to the
            // flap cap.
            SysState::Protect | SysState::Switching | SysState::Holding => {
                self.arbitrate(now_us).await;
                self.protection_tick(now_us).await;
            }
        }
    }

    /// Fast path: duplication first, state bookkeeping second. Speed
    /// matters here — the slow path arbitrates at leisure afterwards.
    async fn enter_protection(&mut self, trigger: Trigger, detail: &str, now_us: i64) {
        let wall_start = clock::now_us();

        if let Some(peer) = protection::dup_peer(&self.world) {
            self.dup_enable(self.world.status.active_uplink, peer, now_us)
                .await;
        }
        protection::fire(&mut self.world, trigger, detail, now_us);

        self.log.emit(
            "tripwire_fire",
            json!({
                "trigger": trigger.as_str(),
                "detail": detail,
                "latency_us": clock::now_us() - wall_start,
            }),
        );
    }

    async fn dup_enable(&mut self, src: UplinkId, dst: UplinkId, now_us: i64) {
        let src_dev = src.identity().vip_dev;
        let dst_ident = dst.identity();
        let wall_start = clock::now_us();

        match self
            .ops
            .dup_install(src_dev, dst_ident.vip_gw, dst_ident.vip_dev)
            .await
        {
            Ok(()) => {
                let status = &mut self.world.status;
                status.dup_enabled = true;
                status.dup_enabled_at_us = now_us;
                status.dup_engaged_at_us = 0;
                self.log.emit(
                    "dup_enable",
                    json!({
                        "src": src.name(),
                        "dst": dst.name(),
                        "gw": dst_ident.vip_gw,
                        "latency_us": clock::now_us() - wall_start,
                    }),
                );
            }
            Err(e) => {
                tracing::warn!(src = %src, dst = %dst, error = %e, "duplication install failed");
                self.log
                    .emit("dup_enable_fail", json!({"reason": e.to_string()}));
            }
        }
    }

    async fn dup_disable(&mut self) {
        self.ops.dup_remove().await;
        let status = &mut self.world.status;
        status.dup_enabled = false;
        status.dup_enabled_at_us = 0;
        status.dup_engaged_at_us = 0;
        self.log.emit("dup_disable", json!({"status": "disabled"}));
    }

    /// Slow path: step the arbitration until it parks or switches.
    async fn arbitrate(&mut self, now_us: i64) {
        loop {
            match arbitrate::step(&mut self.world, &self.switching_cfg, now_us) {
                Arbitration::Engaged { settle_ms } => {
                    self.log.emit("dup_engaged", json!({"settle_ms": settle_ms}));
                }
                Arbitration::Settling
                | Arbitration::Preroll
                | Arbitration::Suppressed
                | Arbitration::Hold => break,
                Arbitration::Switch(target) => {
                    self.execute_switch(target, now_us).await;
                    // Protection continues in HOLDING whether or not the
                    // actuation verified; a failed switch retries via
                    // arbitration on a later trigger.
                    self.world.status.state = SysState::Holding;
                    break;
                }
            }
        }
    }

    /// Two-phase route switch: replace, verify, and only then commit.
    async fn execute_switch(&mut self, target: UplinkId, now_us: i64) -> bool {
        let from = self.world.status.active_uplink;
        let ident = target.identity();

        self.log.emit(
            "switch",
            json!({
                "from": from.name(),
                "to": target.name(),
                "vip_dev": ident.vip_dev,
                "vip_gw": ident.vip_gw,
            }),
        );

        if let Err(e) = self
            .ops
            .replace_default_route(ident.vip_gw, ident.vip_dev)
            .await
        {
            tracing::warn!(uplink = %target, error = %e, "route replace failed");
        }

        if !self.ops.verify_default_route(ident.vip_gw, ident.vip_dev).await {
            self.log.emit(
                "switch_fail",
                json!({
                    "target": target.name(),
                    "vip_dev": ident.vip_dev,
                    "reason": "route_verify_failed",
                }),
            );
            return false;
        }

        self.ops.spawn_return_route(target.name());
        self.world.commit_switch(target, now_us);

        self.log.emit(
            "switch_ok",
            json!({
                "from": from.name(),
                "to": target.name(),
                "vip_dev": ident.vip_dev,
            }),
        );
        true
    }

    async fn protection_tick(&mut self, now_us: i64) {
        if let Some(exit) = protection::tick(
            &mut self.world,
            self.switching_cfg.min_hold_sec,
            self.switching_cfg.clean_exit_sec,
            now_us,
        ) {
            if self.world.status.mode != Mode::Mirror {
                self.dup_disable().await;
            }
            self.log.emit(
                "protection_exit",
                json!({"duration_sec": exit.held_sec, "clean_sec": exit.clean_sec}),
            );
        }
    }

    // ── Commands ────────────────────────────────────────────────────

    async fn process_commands(&mut self, now_us: i64) {
        let queued = cmdq::drain(&self.cmd_dir, &self.legacy_cmd_path).await;
        for cmd in queued {
            self.dispatch(&cmd.id, &cmd.line, now_us).await;
        }
    }

    /// Dispatch one command line; the outcome lands in the last-command
    /// triple and the event log.
    pub async fn dispatch(&mut self, id: &str, line: &str, now_us: i64) {
        let (result, detail) = match line.parse::<Command>() {
            Ok(command) => self.execute_command(command, now_us).await,
            Err(_) => ("fail", "unknown_cmd".to_string()),
        };

        let last = &mut self.world.status.last_cmd;
        last.id = id.to_string();
        last.result = result.to_string();
        last.detail = detail.clone();

        self.log.emit(
            "cmd_result",
            json!({"id": id, "result": result, "detail": detail}),
        );
    }

    async fn execute_command(&mut self, command: Command, now_us: i64) -> (&'static str, String) {
        match command {
            Command::SetMode(mode) => {
                self.world.status.mode = mode;
                match mode {
                    Mode::Training | Mode::Tripwire => self.dup_disable().await,
                    Mode::Mirror => {
                        let active = self.world.status.active_uplink;
                        self.dup_enable(active, MIRROR_PEER, now_us).await;
                    }
                }
                self.log
                    .emit("mode_change", json!({"mode": mode.as_str()}));
                ("exec", format!("mode={}", mode.as_str()))
            }

            Command::Force(target) => {
                // Operator override bypasses protection entirely.
                let u = self.world.uplink_mut(target);
                u.force_failed = false;
                u.available = true;
                self.execute_switch(target, now_us).await;
                self.world.status.force_locked = true;
                ("exec", format!("force={target}"))
            }

            Command::ForceAuto => {
                self.world.status.force_locked = false;
                self.world.status.switches_this_window = 0;
                self.world.status.state = SysState::Normal;
                let best = arbitrate::select_best(&self.world);
                if best != self.world.status.active_uplink {
                    self.execute_switch(best, now_us).await;
                }
                ("exec", "force=auto".to_string())
            }

            Command::Trigger => {
                self.enter_protection(Trigger::Manual, "operator", now_us).await;
                ("exec", "manual_trigger".to_string())
            }

            Command::ControllerSwitch(controller) => {
                self.log
                    .emit("c8000_switch", json!({"controller": controller}));
                if self.ops.controller_switch(controller).await.is_ok() {
                    self.world.status.active_controller = controller;
                }
                ("exec", format!("c8000={controller}"))
            }

            Command::Enable(target) => {
                self.world.set_enabled(target, true);
                self.publish_enabled_mask();
                self.log.emit("uplink_enabled", json!({"uplink": target.name()}));
                ("exec", format!("enable={target}"))
            }

            Command::Disable(target) => {
                self.world.set_enabled(target, false);
                self.publish_enabled_mask();
                self.log
                    .emit("uplink_disabled", json!({"uplink": target.name()}));
                ("exec", format!("disable={target}"))
            }

            Command::Fail(target) => {
                self.world.force_failure(target);
                self.log
                    .emit("uplink_force_fail", json!({"uplink": target.name()}));
                ("exec", format!("fail={target}"))
            }

            Command::Unfail(target) => {
                self.world.clear_forced_failure(target);
                self.log
                    .emit("uplink_unfail", json!({"uplink": target.name()}));
                ("exec", format!("unfail={target}"))
            }
        }
    }

    fn publish_enabled_mask(&mut self) {
        let _ = self.enabled_tx.send(self.world.enabled_mask());
    }

    // ── Status ──────────────────────────────────────────────────────

    pub async fn publish_status(&mut self) {
        let snap = snapshot::capture(&self.world);
        if let Err(e) = status_file::publish(&snap, &self.status_tmp_path, &self.status_path).await
        {
            tracing::warn!(error = %e, "status publish failed");
        }
    }

    /// Graceful teardown: drop duplication, write one final snapshot.
    pub async fn shutdown(&mut self) {
        self.dup_disable().await;
        self.publish_status().await;
        self.log
            .emit("shutdown", json!({"run_id": self.world.status.run_id}));
    }
}
