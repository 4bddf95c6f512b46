//! Shared types for the PathSteer edge daemon.
//!
//! This crate contains:
//! - **Core enums** — operating mode, system state, trigger reasons
//! - **Uplink identity** — the fixed uplink table (ids, kinds, devices, gateways)
//! - **Configuration** — config.json loading with defaults
//! - **Event log** — append-only JSONL run log
//! - **Clock** — epoch-microsecond timestamps and run ids

pub mod clock;
pub mod config;
pub mod events;
pub mod models;
pub mod uplink;
