//! One managed node: its external process and its handle.
//!
//! [`NodeHandle`] is the unit the fleet works with — it owns the process (or
//! a connection to a pre-existing endpoint), the API client bound to it, and
//! the node's [`JobScheduler`](crate::jobs::JobScheduler).

mod handle;
mod process;

pub use handle::NodeHandle;
