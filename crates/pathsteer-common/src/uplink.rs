//! Fixed uplink identity table.
//!
//! Each physical WAN path has an identity that never changes at runtime:
//! logical name, raw interface, isolation namespace, veth pair into it, and
//! the device + gateway used inside the service namespace for route and
//! duplication actuation. Only the live metrics and enablement mutate.

use serde::{Deserialize, Serialize};

/// Logical uplink id, also the arbitration iteration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UplinkId {
    CellA,
    CellB,
    SlA,
    SlB,
    FiberA,
    FiberB,
}

/// Physical technology of an uplink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UplinkKind {
    Lte,
    Sat,
    Fiber,
}

/// Static per-uplink identity.
#[derive(Debug, Clone, Copy)]
pub struct UplinkIdentity {
    pub id: UplinkId,
    pub kind: UplinkKind,
    /// Canonical name used in config, commands, chaos file, and status.
    pub name: &'static str,
    /// Raw physical interface.
    pub interface: &'static str,
    /// Isolation network namespace.
    pub netns: &'static str,
    /// Veth peer into the namespace.
    pub veth: &'static str,
    /// Device inside the service namespace.
    pub vip_dev: &'static str,
    /// Gateway inside the service namespace.
    pub vip_gw: &'static str,
    pub carrier: Option<&'static str>,
    /// Modem index for the cellular monitor helper.
    pub modem_index: Option<u8>,
}

static IDENTITIES: [UplinkIdentity; UplinkId::COUNT] = [
    UplinkIdentity {
        id: UplinkId::CellA,
        kind: UplinkKind::Lte,
        name: "cell_a",
        interface: "wwan0",
        netns: "ns_cell_a",
        veth: "veth_cell_a",
        vip_dev: "vip_cell_a",
        vip_gw: "10.201.10.18",
        carrier: Some("T-Mobile"),
        modem_index: Some(0),
    },
    UplinkIdentity {
        id: UplinkId::CellB,
        kind: UplinkKind::Lte,
        name: "cell_b",
        interface: "wwan1",
        netns: "ns_cell_b",
        veth: "veth_cell_b",
        vip_dev: "vip_cell_b",
        vip_gw: "10.201.10.22",
        carrier: Some("AT&T"),
        modem_index: Some(1),
    },
    UplinkIdentity {
        id: UplinkId::SlA,
        kind: UplinkKind::Sat,
        name: "sl_a",
        interface: "enp3s0",
        netns: "ns_sl_a",
        veth: "veth_sl_a",
        vip_dev: "vip_sl_a",
        vip_gw: "10.201.10.10",
        carrier: None,
        modem_index: None,
    },
    UplinkIdentity {
        id: UplinkId::SlB,
        kind: UplinkKind::Sat,
        name: "sl_b",
        interface: "enp4s0",
        netns: "ns_sl_b",
        veth: "veth_sl_b",
        vip_dev: "vip_sl_b",
        vip_gw: "10.201.10.14",
        carrier: None,
        modem_index: None,
    },
    UplinkIdentity {
        id: UplinkId::FiberA,
        kind: UplinkKind::Fiber,
        name: "fa",
        interface: "enp1s0",
        netns: "ns_fa",
        veth: "veth_fa",
        vip_dev: "vip_fa",
        vip_gw: "10.201.10.2",
        carrier: None,
        modem_index: None,
    },
    UplinkIdentity {
        id: UplinkId::FiberB,
        kind: UplinkKind::Fiber,
        name: "fb",
        interface: "enp2s0",
        netns: "ns_fb",
        veth: "veth_fb",
        vip_dev: "vip_fb",
        vip_gw: "10.201.10.6",
        carrier: None,
        modem_index: None,
    },
];

impl UplinkId {
    pub const COUNT: usize = 6;

    pub const ALL: [UplinkId; UplinkId::COUNT] = [
        UplinkId::CellA,
        UplinkId::CellB,
        UplinkId::SlA,
        UplinkId::SlB,
        UplinkId::FiberA,
        UplinkId::FiberB,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Next id in order, wrapping past the end.
    pub fn next(self) -> UplinkId {
        UplinkId::ALL[(self.index() + 1) % UplinkId::COUNT]
    }

    pub fn identity(self) -> &'static UplinkIdentity {
        &IDENTITIES[self.index()]
    }

    pub fn kind(self) -> UplinkKind {
        self.identity().kind
    }

    pub fn name(self) -> &'static str {
        self.identity().name
    }

    pub fn from_name(name: &str) -> Option<UplinkId> {
        UplinkId::ALL.iter().copied().find(|id| id.name() == name)
    }
}

impl std::fmt::Display for UplinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
