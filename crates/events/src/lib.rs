//! Linewatch snapshot fan-out.
//!
//! [`SnapshotHub`] keeps the set of live subscribers and delivers every
//! published [`LineSnapshot`](linewatch_core::LineSnapshot) to each of them.

pub mod hub;

pub use hub::{SnapshotHub, Subscription};
