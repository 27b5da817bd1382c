//! Error types for Hearthshare
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! - `Error`: everything the engine surfaces to the façade caller
//! - `RemoteError`: failures reported by the cloud backend or code lookup

use crate::types::{Partition, RecordId, RecordKind};
use std::io;
use thiserror::Error;

/// Result type alias for Hearthshare operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a remote collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Transport failure, timeout, or service unavailable
    #[error("network error: {0}")]
    Network(String),

    /// The remote has no such object
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote refused the request
    #[error("rejected: {0}")]
    Rejected(String),
}

/// Error types for the sync and sharing engine
#[derive(Debug, Error)]
pub enum Error {
    /// No heuristic matched and no contributor exists; create one and retry
    #[error("No contributor available for this session")]
    NoContributorAvailable,

    /// An edge would connect records in different partitions
    #[error("Partition mismatch: {from} ({from_partition}) -> {to} ({to_partition})")]
    PartitionMismatch {
        /// Edge source
        from: RecordId,
        /// Partition of the source
        from_partition: Partition,
        /// Edge target
        to: RecordId,
        /// Partition of the target
        to_partition: Partition,
    },

    /// Invitation is for a closed share
    #[error("This invitation is private and cannot be joined by code or link. Ask the sender to create a new invitation.")]
    PrivateShareNotSupported,

    /// Invitation belongs to the current account
    #[error("This invitation was created by this account. Open it with the other person's account.")]
    SelfInviteNotAllowed,

    /// Root entity is shared and cannot be deleted
    #[error("Cannot delete shared root {0}: it is visible to every participant")]
    SharedRootDeletionBlocked(RecordId),

    /// Record lives in the shared partition and cannot be deleted
    #[error("Cannot delete shared record {0}")]
    SharedRecordDeletionBlocked(RecordId),

    /// Deleter is not the record's creator
    #[error("Not authorized to delete record {0}")]
    DeletionNotAuthorized(RecordId),

    /// Record does not exist
    #[error("Record not found: {0}")]
    RecordNotFound(RecordId),

    /// Record id already in use
    #[error("Duplicate record: {0}")]
    DuplicateRecord(RecordId),

    /// Relationship between these kinds is not defined
    #[error("Invalid relationship: {from} -> {to}")]
    InvalidRelationship {
        /// Source kind
        from: RecordKind,
        /// Target kind
        to: RecordKind,
    },

    /// Share operation is not valid from the root's current state
    #[error("Invalid share state for {root}: {state}")]
    InvalidShareState {
        /// Root entity
        root: RecordId,
        /// Current state name
        state: &'static str,
    },

    /// Share does not allow participants to add records
    #[error("Share for {0} is read-only")]
    ShareReadOnly(RecordId),

    /// Record is shared but this device knows no share carrying it
    #[error("Record {0} is shared but no share covering it is reachable; sync this device and try again")]
    ShareUnavailable(RecordId),

    /// Code or link could not be used
    #[error("Invalid invitation: {0}")]
    InvalidInvitation(String),

    /// Remote collaborator failure
    #[error("Remote {operation} failed: {source}")]
    Remote {
        /// Operation that failed
        operation: &'static str,
        /// Underlying failure
        #[source]
        source: RemoteError,
    },

    /// Configuration is unreadable or invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error (session file, config file)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid operation or state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl Error {
    /// Wrap a remote failure with the operation it interrupted
    pub fn remote(operation: &'static str, source: RemoteError) -> Self {
        Error::Remote { operation, source }
    }

    /// Whether the caller can recover by retrying the same call
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::NoContributorAvailable
                | Error::ShareUnavailable(_)
                | Error::Remote {
                    source: RemoteError::Network(_),
                    ..
                }
        )
    }

    /// Whether the error is a local invariant violation
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Error::PartitionMismatch { .. } | Error::InvalidRelationship { .. }
        )
    }
}
