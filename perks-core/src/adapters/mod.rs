//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - JSON files on disk for the SnapshotStore port
//! - A scripted in-process demo feed for the EventChannel port

pub mod demo;
pub mod json_snapshot;

#[cfg(test)]
pub mod memory;
