//! Linewatch equipment log collection.
//!
//! - [`EquipmentSource`]: one equipment log behind a TTL cache and single-flight
//!   reads retried with linear backoff.
//! - [`SourceRegistry`]: every configured source, keyed by equipment id.
//! - [`LogTransport`]: the network seam, with [`HttpTransport`] for real
//!   equipment and [`MemoryTransport`] for tests and offline runs.

pub mod error;
pub mod registry;
pub mod source;
pub mod transport;

pub use error::SourceError;
pub use registry::SourceRegistry;
pub use source::{EquipmentSource, SourceConfig};
pub use transport::{HttpTransport, LogTransport, MemoryTransport};
