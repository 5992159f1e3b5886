//! Event subscribers: the observability side of the bus.
//!
//! A [`Subscribe`] implementation attaches its own broadcast receiver to the
//! [`Bus`](crate::events::Bus) via [`spawn_listener`] and reacts to events.
//! Built-ins:
//! - [`LogWriter`] — emits every event through `tracing` with severity,
//!   caller tag, and the node's data-directory path;
//! - [`JobTracker`] — maintains the set of running jobs per node, consumed
//!   by the fleet status surface.

mod log;
mod subscriber;
mod tracker;

pub use log::LogWriter;
pub use subscriber::{spawn_listener, Subscribe};
pub use tracker::JobTracker;
