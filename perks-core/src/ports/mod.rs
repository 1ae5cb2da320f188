//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod event_channel;
mod snapshot_store;

pub use event_channel::EventChannel;
pub use snapshot_store::{Snapshot, SnapshotStore};
