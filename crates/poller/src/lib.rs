//! Linewatch polling scheduler.
//!
//! [`Poller`] owns the polling lifecycle: a periodic driver that fetches
//! every equipment log, builds one line snapshot per tick and publishes it to
//! the [`SnapshotHub`](linewatch_events::SnapshotHub) in tick order.

pub mod config;
pub mod error;
pub mod scheduler;
pub mod stats;

pub use config::{ConfigError, PollerConfig};
pub use error::PollerError;
pub use scheduler::{Poller, MAX_OVERLAPPING_TICKS};
pub use stats::{PollingState, SystemStats};
