//! Side-effect adapter: everything that touches the network stack or runs
//! a helper subprocess goes through the [`NetOps`] trait so the control
//! logic can be driven by deterministic fakes in tests.
//!
//! [`ShellOps`] is the production implementation. Every invocation carries
//! an explicit timeout; a hung helper costs one bounded wait, never the
//! loop.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use pathsteer_common::models::{CellularReading, SatelliteReading};

use crate::{cellular, starlink};

/// The service namespace whose default route steers all service traffic.
pub const SERVICE_NETNS: &str = "ns_vip";

/// nftables table holding the duplication rule.
const DUP_TABLE: &str = "dup_table";

#[async_trait]
pub trait NetOps: Send + Sync {
    /// Single-shot RTT probe out of a raw interface. `None` on loss.
    async fn probe_iface(&self, iface: &str, target: &str) -> Option<f64>;

    /// Single-shot RTT probe from inside a namespace. `None` on loss.
    async fn probe_netns(&self, netns: &str, target: &str) -> Option<f64>;

    /// Run the cellular monitor helper and parse its report.
    async fn poll_cellular(&self, modem_index: u8, name: &str) -> Option<CellularReading>;

    /// Run the dish stats helper. `None` when the dish is unreachable.
    async fn poll_satellite(&self, netns: &str, dish_addr: &str) -> Option<SatelliteReading>;

    /// Install the packet-duplication rule cloning traffic that egresses
    /// `src_dev` to `gw` via `dst_dev`. Tears down any previous rule first.
    async fn dup_install(&self, src_dev: &str, gw: &str, dst_dev: &str) -> anyhow::Result<()>;

    /// Remove the duplication rule. Idempotent.
    async fn dup_remove(&self);

    /// Replace the default route in the service namespace.
    async fn replace_default_route(&self, gw: &str, dev: &str) -> anyhow::Result<()>;

    /// Check that the current default route matches `gw`/`dev`.
    async fn verify_default_route(&self, gw: &str, dev: &str) -> bool;

    /// Fire-and-forget the controller-side return-route helper.
    fn spawn_return_route(&self, uplink_name: &str);

    /// Run the remote-controller switch helper.
    async fn controller_switch(&self, controller: u8) -> anyhow::Result<()>;
}

// ── Output parsing ──────────────────────────────────────────────────

/// Extract the RTT from ping output (`... time=23.4 ms`).
pub fn parse_ping_rtt(output: &str) -> Option<f64> {
    let idx = output.find("time=")?;
    let rest = &output[idx + 5..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(rest.len());
    rest[..end].parse().ok().filter(|rtt| *rtt > 0.0)
}

/// Check `ip route show default` output against the expected hop.
pub fn default_route_matches(output: &str, gw: &str, dev: &str) -> bool {
    output.contains(&format!("via {gw} dev {dev}"))
}

// ── Production implementation ───────────────────────────────────────

pub struct ShellOps {
    script_dir: PathBuf,
}

impl ShellOps {
    pub fn new(script_dir: PathBuf) -> ShellOps {
        ShellOps { script_dir }
    }

    fn script(&self, name: &str) -> PathBuf {
        self.script_dir.join(name)
    }

    /// Run a command to completion within `timeout`; returns stdout on
    /// exit 0, `None` otherwise.
    async fn run(&self, cmd: &mut Command, timeout: Duration) -> Option<String> {
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        let output = tokio::time::timeout(timeout, cmd.output()).await.ok()?.ok()?;
        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Like `run`, but only the exit status matters.
    async fn run_status(&self, cmd: &mut Command, timeout: Duration) -> bool {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        matches!(
            tokio::time::timeout(timeout, cmd.status()).await,
            Ok(Ok(status)) if status.success()
        )
    }

    fn nft_in_vip(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("ip");
        cmd.args(["netns", "exec", SERVICE_NETNS, "nft"]);
        cmd.args(args);
        cmd
    }
}

#[async_trait]
impl NetOps for ShellOps {
    async fn probe_iface(&self, iface: &str, target: &str) -> Option<f64> {
        let mut cmd = Command::new("ping");
        cmd.args(["-c1", "-W2", "-I", iface, target]);
        let out = self.run(&mut cmd, Duration::from_secs(3)).await?;
        parse_ping_rtt(&out)
    }

    async fn probe_netns(&self, netns: &str, target: &str) -> Option<f64> {
        let mut cmd = Command::new("ip");
        cmd.args(["netns", "exec", netns, "ping", "-c1", "-W1", target]);
        let out = self.run(&mut cmd, Duration::from_secs(2)).await?;
        parse_ping_rtt(&out)
    }

    async fn poll_cellular(&self, modem_index: u8, name: &str) -> Option<CellularReading> {
        let mut cmd = Command::new(self.script("cellular-monitor.sh"));
        cmd.arg("poll").arg(modem_index.to_string()).arg(name);
        let out = self.run(&mut cmd, Duration::from_secs(2)).await?;
        cellular::parse(&out)
    }

    async fn poll_satellite(&self, netns: &str, dish_addr: &str) -> Option<SatelliteReading> {
        let mut cmd = Command::new(self.script("starlink-stats.sh"));
        cmd.arg(netns).arg(dish_addr);
        let out = self.run(&mut cmd, Duration::from_secs(2)).await?;
        starlink::parse(&out)
    }

    async fn dup_install(&self, src_dev: &str, gw: &str, dst_dev: &str) -> anyhow::Result<()> {
        // Stale table from a previous enable (or run) is expected.
        let _ = self
            .run_status(
                &mut self.nft_in_vip(&["delete", "table", "ip", DUP_TABLE]),
                Duration::from_secs(1),
            )
            .await;

        if !self
            .run_status(
                &mut self.nft_in_vip(&["add", "table", "ip", DUP_TABLE]),
                Duration::from_secs(1),
            )
            .await
        {
            anyhow::bail!("nft add table failed");
        }

        if !self
            .run_status(
                &mut self.nft_in_vip(&[
                    "add",
                    "chain",
                    "ip",
                    DUP_TABLE,
                    "postrouting",
                    "{",
                    "type",
                    "filter",
                    "hook",
                    "postrouting",
                    "priority",
                    "0",
                    ";",
                    "}",
                ]),
                Duration::from_secs(1),
            )
            .await
        {
            anyhow::bail!("nft add chain failed");
        }

        if !self
            .run_status(
                &mut self.nft_in_vip(&[
                    "add",
                    "rule",
                    "ip",
                    DUP_TABLE,
                    "postrouting",
                    "oif",
                    src_dev,
                    "dup",
                    "to",
                    gw,
                    "device",
                    dst_dev,
                ]),
                Duration::from_secs(1),
            )
            .await
        {
            anyhow::bail!("nft add rule failed for {src_dev} -> {gw} via {dst_dev}");
        }

        Ok(())
    }

    async fn dup_remove(&self) {
        let _ = self
            .run_status(
                &mut self.nft_in_vip(&["delete", "table", "ip", DUP_TABLE]),
                Duration::from_secs(1),
            )
            .await;
    }

    async fn replace_default_route(&self, gw: &str, dev: &str) -> anyhow::Result<()> {
        let mut cmd = Command::new("ip");
        cmd.args([
            "netns", "exec", SERVICE_NETNS, "ip", "route", "replace", "default", "via", gw,
            "dev", dev,
        ]);
        if self.run_status(&mut cmd, Duration::from_secs(2)).await {
            Ok(())
        } else {
            anyhow::bail!("route replace failed for {gw} dev {dev}")
        }
    }

    async fn verify_default_route(&self, gw: &str, dev: &str) -> bool {
        let mut cmd = Command::new("ip");
        cmd.args(["netns", "exec", SERVICE_NETNS, "ip", "route", "show", "default"]);
        match self.run(&mut cmd, Duration::from_secs(2)).await {
            Some(out) => default_route_matches(&out, gw, dev),
            None => false,
        }
    }

    fn spawn_return_route(&self, uplink_name: &str) {
        let mut cmd = Command::new(self.script("controller-route-switch.sh"));
        cmd.arg(uplink_name)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        match cmd.spawn() {
            // Detached on purpose; the return-route contract is best-effort.
            Ok(_child) => {}
            Err(e) => {
                tracing::warn!(uplink = uplink_name, error = %e, "return-route helper failed to spawn")
            }
        }
    }

    async fn controller_switch(&self, controller: u8) -> anyhow::Result<()> {
        let target = if controller == 0 { "ctrl_a" } else { "ctrl_b" };
        let mut cmd = Command::new(self.script("c8000-switch.sh"));
        cmd.arg(target);
        if self.run_status(&mut cmd, Duration::from_secs(30)).await {
            Ok(())
        } else {
            anyhow::bail!("controller switch to {target} failed")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_rtt_extraction() {
        let out = "64 bytes from 8.8.8.8: icmp_seq=1 ttl=117 time=23.4 ms\n";
        assert_eq!(parse_ping_rtt(out), Some(23.4));
        assert_eq!(parse_ping_rtt("1 packets transmitted, 0 received"), None);
        assert_eq!(parse_ping_rtt(""), None);
    }

    #[test]
    fn ping_rtt_integer_milliseconds() {
        let out = "64 bytes from 1.1.1.1: icmp_seq=1 ttl=60 time=31 ms";
        assert_eq!(parse_ping_rtt(out), Some(31.0));
    }

    #[test]
    fn route_verification_matching() {
        let out = "default via 10.201.10.2 dev vip_fa\n";
        assert!(default_route_matches(out, "10.201.10.2", "vip_fa"));
        assert!(!default_route_matches(out, "10.201.10.6", "vip_fa"));
        assert!(!default_route_matches(out, "10.201.10.2", "vip_fb"));
        assert!(!default_route_matches("", "10.201.10.2", "vip_fa"));
    }
}
