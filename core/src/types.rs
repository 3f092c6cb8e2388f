//! Shared primitive types used across the entire crate.

/// A simulation tick. One tick = one applied input event.
pub type Tick = u64;

/// The canonical session identifier.
pub type RunId = String;

/// Index of a node inside a [`Snapshot`](crate::snapshot::Snapshot).
pub type NodeId = usize;
