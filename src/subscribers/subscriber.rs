//! # Event subscriber trait.
//!
//! [`Subscribe`] is the extension point for plugging custom event handlers
//! into the runtime: metrics, assertions in tests, forwarding to an external
//! collector. Each subscriber runs on its own broadcast receiver inside a
//! dedicated listener task, so a slow subscriber only lags itself.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use nodefarm::events::{Event, EventKind};
//! use nodefarm::subscribers::Subscribe;
//!
//! struct RetryCounter;
//!
//! #[async_trait]
//! impl Subscribe for RetryCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::JobRetry) {
//!             // increment a counter, etc.
//!         }
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;

use crate::events::{Bus, Event};

/// Event subscriber for runtime observability.
///
/// Implementations should use async I/O, handle errors internally, and not
/// panic; events are delivered in publish order per subscriber.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    async fn on_event(&self, event: &Event);
}

/// Spawns a listener task feeding `subscriber` from its own bus receiver.
///
/// The task exits when the bus is dropped. A lagging receiver skips the
/// overwritten events and keeps going; there is no backpressure onto
/// publishers.
pub fn spawn_listener(bus: &Bus, subscriber: Arc<dyn Subscribe>) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => subscriber.on_event(&ev).await,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });
}
