//! Runtime events: types and broadcast bus.
//!
//! Nodes, jobs, and the fleet publish their lifecycle and monitoring events
//! here; subscribers (logging, job tracking) consume them off the bus. Every
//! retried error and every state transition in the crate passes through this
//! module, carrying a severity, a caller tag, and the node's data-directory
//! path for correlation across a multi-node stream.
//!
//! ## Contents
//! - [`EventKind`], [`Severity`], [`Event`] — classification and payload
//! - [`Bus`] — thin wrapper over `tokio::sync::broadcast`

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind, Severity};
