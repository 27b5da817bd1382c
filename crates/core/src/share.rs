//! Share and invitation types
//!
//! A `ShareHandle` is the unit of invitation: one exists per shared root
//! entity and tracks which records the share currently covers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::record::Record;
use crate::types::{Edge, IdentityKey, Permission, RecordId};

/// Cloud-mediated grant making a root and its attached records visible
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareHandle {
    /// Root entity (a Grandchild) anchoring the share
    pub root_entity_id: RecordId,
    /// Opaque backend token; also the invitation link
    pub share_token: String,
    /// Public permission
    pub permission: Permission,
    /// Records currently covered by the share
    pub records: BTreeSet<RecordId>,
}

impl ShareHandle {
    /// Create a handle covering only its root
    pub fn new(root_entity_id: RecordId, share_token: impl Into<String>, permission: Permission) -> Self {
        let mut records = BTreeSet::new();
        records.insert(root_entity_id);
        Self {
            root_entity_id,
            share_token: share_token.into(),
            permission,
            records,
        }
    }

    /// Whether the share already covers a record
    pub fn covers(&self, id: &RecordId) -> bool {
        self.records.contains(id)
    }

    /// Merge another handle's record set into this one
    ///
    /// Used when two concurrent extensions of the same share race; the
    /// result is the union, so merge order does not matter.
    pub fn merge(&mut self, other: &ShareHandle) {
        self.records.extend(other.records.iter().copied());
    }
}

/// A share as the backend reports it to one account
///
/// Carries the owner so a device that only has the replica can tell whether
/// the signed-in account created the share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteShare {
    /// Current handle, with every record the share carries
    pub handle: ShareHandle,
    /// Account that created the share
    pub owner_identity: IdentityKey,
}

impl RemoteShare {
    /// Whether `identity` is the share's owner
    pub fn is_owned_by(&self, identity: &IdentityKey) -> bool {
        &self.owner_identity == identity
    }
}

/// Lifecycle state of a root entity's share
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareState {
    /// No share exists
    Unshared,
    /// Share creation is in flight
    Pending,
    /// Share is active
    Shared(ShareHandle),
}

impl ShareState {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareState::Unshared => "Unshared",
            ShareState::Pending => "SharePending",
            ShareState::Shared(_) => "Shared",
        }
    }
}

impl fmt::Display for ShareState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata the backend returns for an invitation link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationMetadata {
    /// The link the metadata was fetched for
    pub url: String,
    /// Account that owns the share
    pub owner_identity: IdentityKey,
    /// Root entity of the share
    pub root_record_id: RecordId,
    /// Public permission of the share
    pub permission: Permission,
}

/// Outcome of a successful invitation accept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptResult {
    /// Always true when returned; rejections are errors
    pub accepted: bool,
    /// Root entity the device can now expect to see
    pub root_record_id: RecordId,
}

/// A record as exchanged with the backend, with its outgoing edges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// The record
    pub record: Record,
    /// Edges whose source is this record
    pub edges: Vec<Edge>,
}

impl RemoteRecord {
    /// Pair a record with its outgoing edges
    pub fn new(record: Record, edges: Vec<Edge>) -> Self {
        Self { record, edges }
    }
}
