//! Shared data structures for the OEE time-series engine
//!
//! - Tags and samples (production counter, reject counter, machine state)
//! - Jobs and counter semantics
//! - Machine state codes and derived state runs
//! - Per-tick metric snapshots, skip reasons, and the series report

mod job;
mod snapshot;
mod state;
mod tag;

pub use job::*;
pub use snapshot::*;
pub use state::*;
pub use tag::*;
