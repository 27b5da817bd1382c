//! Core types for Hearthshare
//!
//! This crate defines the foundational types used throughout the system:
//! - RecordId, Partition, RecordKind, EdgeKind, Role, Permission, IdentityKey
//! - Record and its typed payloads, Contributor
//! - ShareHandle, ShareState, InvitationMetadata, RemoteRecord
//! - SessionState and its persisted key-value layout
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod record;
pub mod session;
pub mod share;
pub mod types;

pub use error::{Error, RemoteError, Result};
pub use record::{normalize_name, Contributor, ContributorProfile, MediaRef, Record, RecordPayload};
pub use session::{PersistedSession, SessionState};
pub use share::{
    AcceptResult, InvitationMetadata, RemoteRecord, RemoteShare, ShareHandle, ShareState,
};
pub use types::{
    Edge, EdgeKind, IdentityKey, Partition, PartitionFilter, Permission, RecordId, RecordKind, Role,
};
