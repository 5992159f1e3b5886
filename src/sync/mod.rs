//! Concurrency primitives: bounded cancellable work and the fleet gate.
//!
//! Everything long-running in this crate is built on these two types:
//! - [`WorkGroup`]: admits units of work until stopped, broadcasts a stop
//!   signal, and drains deterministically;
//! - [`SyncGate`]: a one-shot fleet-wide gate background jobs wait on before
//!   beginning active work.

mod gate;
mod workgroup;

pub use gate::SyncGate;
pub use workgroup::{WorkGroup, WorkGuard};
