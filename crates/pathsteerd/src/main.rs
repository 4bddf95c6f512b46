//! PathSteer Edge Daemon
//!
//! Runs on the edge router and steers service traffic across the WAN
//! uplinks:
//!
//! - Probes every enabled uplink (cellular, satellite, fiber)
//! - Detects degradation through tripwire triggers
//! - Duplicates traffic onto a backup path while a switch is arbitrated
//! - Replaces the service-namespace default route, with verification
//! - Publishes a JSON status snapshot for the web UI
//! - Drains an operator command queue

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

use pathsteer_common::clock;
use pathsteer_common::config::Config;
use pathsteer_common::events::EventLog;
use pathsteer_common::uplink::UplinkId;
use pathsteer_engine::world::World;

use pathsteerd::controller::{Controller, TICK_MS};
use pathsteerd::ops::ShellOps;
use pathsteerd::probe;

/// PathSteer edge daemon.
#[derive(Parser, Debug)]
#[command(name = "pathsteerd", about = "PathSteer edge failover daemon")]
struct Cli {
    /// Configuration file.
    #[arg(long, short = 'c', default_value = "/etc/pathsteer/config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // A broken pipe on a helper must not kill the daemon.
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }

    // Missing or malformed config is fatal — exit non-zero.
    let cfg = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    std::fs::create_dir_all(&cfg.paths.runtime_dir).ok();
    std::fs::create_dir_all(cfg.paths.command_dir()).ok();
    std::fs::create_dir_all(cfg.paths.log_dir()).ok();

    let run_id = clock::run_id();
    let log = EventLog::open(&cfg.paths.log_file(&run_id), &run_id)
        .unwrap_or_else(|_| EventLog::stderr(&run_id));

    tracing::info!(
        node_id = %cfg.id,
        run_id = %run_id,
        config = %cli.config.display(),
        "pathsteerd starting"
    );

    let world = World::new(&cfg, &run_id);
    let ops: Arc<dyn pathsteerd::ops::NetOps> =
        Arc::new(ShellOps::new(cfg.paths.script_dir.clone()));

    // ── Channels ────────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (enabled_tx, enabled_rx) = watch::channel(world.enabled_mask());
    let (report_tx, mut report_rx) = mpsc::channel::<probe::ProbeReport>(256);

    // ── Probe workers, one per uplink ───────────────────────────────
    for id in UplinkId::ALL {
        tokio::spawn(probe::run(
            id,
            cfg.probe.clone(),
            cfg.sample_rate_hz,
            ops.clone(),
            enabled_rx.clone(),
            shutdown_rx.clone(),
            report_tx.clone(),
        ));
    }
    drop(report_tx);

    // ── Signal handling ─────────────────────────────────────────────
    tokio::spawn(async move {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("installing SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("received SIGINT"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        }
        let _ = shutdown_tx.send(true);
    });

    // ── Control loop ────────────────────────────────────────────────
    let mut controller = Controller::new(world, cfg, ops, log, enabled_tx);
    controller.startup().await;

    let mut ticker = tokio::time::interval(Duration::from_millis(TICK_MS));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut shutdown = shutdown_rx;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                controller.tick(clock::now_us()).await;
            }
            Some(report) = report_rx.recv() => {
                controller.handle_report(report);
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    controller.shutdown().await;
    tracing::info!("pathsteerd stopped");
    Ok(())
}
