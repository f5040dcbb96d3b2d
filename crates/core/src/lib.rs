//! Linewatch domain logic.
//!
//! Pure, synchronous building blocks of the production-line metrics engine:
//!
//! - [`config`]: static line configuration (equipment, processes, topology).
//! - [`parser`]: equipment log line validation into [`record::EventRecord`]s.
//! - [`cycle_time`]: paired-event and continuous-flow cycle-time reconstruction.
//! - [`outlier`]: population-σ outlier detection and trimmed means.
//! - [`aggregate`]: equipment → process → line metric aggregation.
//! - [`snapshot`]: assembly of the published [`snapshot::LineSnapshot`].
//!
//! Nothing in this crate performs I/O beyond reading the configuration file.

pub mod aggregate;
pub mod config;
pub mod cycle_time;
pub mod error;
pub mod messages;
pub mod outlier;
pub mod parser;
pub mod record;
pub mod snapshot;
pub mod types;

pub use config::LineConfig;
pub use error::CoreError;
pub use record::{EventRecord, EventStatus};
pub use snapshot::LineSnapshot;
