//! Storage layer for Hearthshare
//!
//! This crate implements the local replica of both partitions:
//! - RecordStore: arena of records keyed by RecordId, behind one RwLock
//! - Explicit typed edge list with an adjacency index
//! - Secondary indices (partition_index, kind_index)
//! - RelocationPlan: checked, atomic partition moves
//!
//! The co-residency invariant (both ends of every edge in the same partition)
//! is enforced on every write.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod index;
pub mod relocation;
pub mod store;

pub use index::{EdgeIndex, KindIndex, PartitionIndex};
pub use relocation::RelocationPlan;
pub use store::{RecordStore, UpsertOutcome};
