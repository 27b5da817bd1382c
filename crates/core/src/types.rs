//! Core types for Hearthshare
//!
//! This module defines the foundational identifiers and closed enums:
//! - RecordId: Unique identifier for every record in the arena
//! - Partition: Physical replica a record lives in (Private or Shared)
//! - RecordKind: Discriminates between record payloads
//! - EdgeKind: Typed relationship between two records
//! - Role: Canonical contributor role
//! - Permission: Public permission of a share
//! - IdentityKey: Authenticated cloud account identifier

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a record
///
/// A RecordId is a wrapper around a UUID. Fresh records get a v4 UUID;
/// records that must be identical across devices and runs (materialized
/// default contributors) get a v5 UUID derived from a stable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Create a new random RecordId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a deterministic RecordId from a stable name (UUID v5)
    pub fn derived(name: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
    }

    /// Create a RecordId from raw bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Parse a RecordId from a string representation
    ///
    /// Returns None if the string is not a valid UUID.
    pub fn from_string(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Get the raw bytes of this RecordId
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Physical storage replica a record belongs to
///
/// Every record is in exactly one partition at any instant, and both ends of
/// an edge must be in the same one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Partition {
    /// Owner-only replica
    Private,
    /// Replica visible to every participant of a share
    Shared,
}

impl Partition {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Private => "private",
            Partition::Shared => "shared",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Partition selector for remote listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionFilter {
    /// Zones owned by the current account
    Private,
    /// Zones the current account participates in
    Shared,
    /// Both
    All,
}

/// Kind of a record, derived from its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    /// Root entity of a share
    Grandchild,
    /// A captured memory about a grandchild
    Memory,
    /// Durable identity of a person creating records
    Contributor,
    /// Family-tree ancestor
    Ancestor,
    /// Family pet
    FamilyPet,
    /// Photo of an ancestor
    AncestorPhoto,
    /// Photo of a pet
    PetPhoto,
}

impl RecordKind {
    /// All kinds in dependency order (edge targets before sources)
    pub const IMPORT_ORDER: [RecordKind; 7] = [
        RecordKind::Contributor,
        RecordKind::Grandchild,
        RecordKind::Ancestor,
        RecordKind::FamilyPet,
        RecordKind::Memory,
        RecordKind::AncestorPhoto,
        RecordKind::PetPhoto,
    ];

    /// Whether records of this kind anchor a share
    pub fn is_root(&self) -> bool {
        matches!(self, RecordKind::Grandchild)
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Grandchild => "Grandchild",
            RecordKind::Memory => "Memory",
            RecordKind::Contributor => "Contributor",
            RecordKind::Ancestor => "Ancestor",
            RecordKind::FamilyPet => "FamilyPet",
            RecordKind::AncestorPhoto => "AncestorPhoto",
            RecordKind::PetPhoto => "PetPhoto",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Typed relationship between two records
///
/// Ownership is by reference: an edge never implies physical containment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Memory, Ancestor or FamilyPet → Grandchild
    Subject,
    /// AncestorPhoto → Ancestor, PetPhoto → FamilyPet
    Depicts,
    /// Memory → Ancestor or FamilyPet
    Mentions,
    /// Any non-contributor record → Contributor
    CreatedBy,
}

impl EdgeKind {
    /// Classify the edge between two record kinds
    ///
    /// Returns None when the pair is not a valid relationship.
    pub fn between(from: RecordKind, to: RecordKind) -> Option<EdgeKind> {
        use RecordKind::*;
        match (from, to) {
            (Contributor, _) => None,
            (_, Contributor) => Some(EdgeKind::CreatedBy),
            (Memory | Ancestor | FamilyPet, Grandchild) => Some(EdgeKind::Subject),
            (AncestorPhoto, Ancestor) | (PetPhoto, FamilyPet) => Some(EdgeKind::Depicts),
            (Memory, Ancestor | FamilyPet) => Some(EdgeKind::Mentions),
            _ => None,
        }
    }
}

/// Directed, typed edge in the record arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Source record
    pub from: RecordId,
    /// Target record
    pub to: RecordId,
    /// Relationship type
    pub kind: EdgeKind,
}

impl Edge {
    /// Create a new edge
    pub fn new(from: RecordId, to: RecordId, kind: EdgeKind) -> Self {
        Self { from, to, kind }
    }

    /// Same edge with a different target
    pub fn retarget(&self, to: RecordId) -> Self {
        Self {
            from: self.from,
            to,
            kind: self.kind,
        }
    }

    /// Whether the edge touches the given record
    pub fn touches(&self, id: RecordId) -> bool {
        self.from == id || self.to == id
    }
}

/// Canonical contributor role
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// First canonical role
    A,
    /// Second canonical role
    B,
}

impl Role {
    /// The other canonical role
    pub fn other(&self) -> Role {
        match self {
            Role::A => Role::B,
            Role::B => Role::A,
        }
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::A => "A",
            Role::B => "B",
        }
    }

    /// Parse a persisted role string; empty or unknown strings are None
    pub fn parse(s: &str) -> Option<Role> {
        match s.trim() {
            "A" | "a" => Some(Role::A),
            "B" | "b" => Some(Role::B),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Public permission of a share
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Closed share: only explicitly added participants
    None,
    /// Anyone with the link can read
    ReadOnly,
    /// Anyone with the link can read and write
    ReadWrite,
}

impl Permission {
    /// Whether participants may add records
    pub fn allows_write(&self) -> bool {
        matches!(self, Permission::ReadWrite)
    }
}

/// Authenticated cloud account identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// Wrap an account identifier
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for IdentityKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
