//! PathSteer edge daemon internals.
//!
//! The binary in `main.rs` wires these together:
//! - [`ops`] — the side-effect adapter: probes, duplication, routing, helpers
//! - [`probe`] — per-uplink probe worker tasks
//! - [`controller`] — the control loop that owns the world
//! - [`cellular`] / [`starlink`] / [`gps`] / [`chaos`] — helper output parsers
//! - [`cmdq`] — filesystem command queue
//! - [`status_file`] — atomic status publication

pub mod cellular;
pub mod chaos;
pub mod cmdq;
pub mod controller;
pub mod gps;
pub mod ops;
pub mod probe;
pub mod starlink;
pub mod status_file;
