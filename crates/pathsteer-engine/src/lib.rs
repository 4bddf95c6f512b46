//! PathSteer decision engine.
//!
//! Pure control-plane logic with no I/O: the daemon feeds probe results and
//! timestamps in, and gets explicit decisions back out (trigger reasons,
//! arbitration steps, protection exits). Every function takes `now_us`
//! from the caller so the whole pipeline can be driven by a synthetic
//! clock in tests.
//!
//! - [`world`] — the explicit mutable state value: uplink array + system status
//! - [`history`] — probe ring buffer, EWMA baseline, loss/jitter windows
//! - [`tripwire`] — fast-path degradation detection on the active uplink
//! - [`risk`] — per-uplink risk scoring and the global recommendation
//! - [`arbitrate`] — slow-path best-uplink selection with settle/preroll gates
//! - [`protection`] — protection window entry, timers, clean exit
//! - [`command`] — operator command grammar
//! - [`snapshot`] — the serializable status document

pub mod arbitrate;
pub mod command;
pub mod history;
pub mod protection;
pub mod risk;
pub mod snapshot;
pub mod tripwire;
pub mod world;
