//! Record payloads and the arena record type
//!
//! A `Record` is one node of the replicated dataset. Its kind is derived from
//! the payload variant, so the two can never disagree. Relationships are not
//! stored on the record; they live in the store's edge list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{IdentityKey, Partition, RecordId, RecordKind, Role};

/// Reference to captured media held outside this system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Opaque asset identifier
    pub asset: String,
    /// MIME type, e.g. "image/heic"
    pub mime: String,
}

/// Identity fields of a contributor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorProfile {
    /// Name shown to every participant
    pub display_name: String,
    /// Canonical role
    pub role: Role,
    /// UI color tag
    pub color_tag: String,
    /// Authenticated cloud account, when known
    pub remote_identity_key: Option<IdentityKey>,
}

/// Typed content of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordPayload {
    /// Root entity of a share
    Grandchild {
        /// Name
        name: String,
        /// Birth date, if recorded
        birth_date: Option<chrono::NaiveDate>,
    },
    /// Captured memory
    Memory {
        /// Title
        title: String,
        /// Free-form note
        note: String,
        /// Attached media
        media: Option<MediaRef>,
    },
    /// Durable identity
    Contributor(ContributorProfile),
    /// Family-tree ancestor
    Ancestor {
        /// Name
        name: String,
        /// Relation to the grandchild, e.g. "great-grandmother"
        relation: String,
    },
    /// Family pet
    FamilyPet {
        /// Name
        name: String,
        /// Species
        species: String,
    },
    /// Ancestor photo
    AncestorPhoto {
        /// Caption
        caption: String,
        /// Image
        media: MediaRef,
    },
    /// Pet photo
    PetPhoto {
        /// Caption
        caption: String,
        /// Image
        media: MediaRef,
    },
}

impl RecordPayload {
    /// Kind of record this payload produces
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordPayload::Grandchild { .. } => RecordKind::Grandchild,
            RecordPayload::Memory { .. } => RecordKind::Memory,
            RecordPayload::Contributor(_) => RecordKind::Contributor,
            RecordPayload::Ancestor { .. } => RecordKind::Ancestor,
            RecordPayload::FamilyPet { .. } => RecordKind::FamilyPet,
            RecordPayload::AncestorPhoto { .. } => RecordKind::AncestorPhoto,
            RecordPayload::PetPhoto { .. } => RecordKind::PetPhoto,
        }
    }

    /// Human-facing label used for stable ordering
    pub fn label(&self) -> &str {
        match self {
            RecordPayload::Grandchild { name, .. }
            | RecordPayload::Ancestor { name, .. }
            | RecordPayload::FamilyPet { name, .. } => name,
            RecordPayload::Memory { title, .. } => title,
            RecordPayload::Contributor(profile) => &profile.display_name,
            RecordPayload::AncestorPhoto { caption, .. } | RecordPayload::PetPhoto { caption, .. } => {
                caption
            }
        }
    }

    /// Convenience constructor for a grandchild
    pub fn grandchild(name: impl Into<String>) -> Self {
        RecordPayload::Grandchild {
            name: name.into(),
            birth_date: None,
        }
    }

    /// Convenience constructor for a text memory
    pub fn memory(title: impl Into<String>) -> Self {
        RecordPayload::Memory {
            title: title.into(),
            note: String::new(),
            media: None,
        }
    }

    /// Convenience constructor for an ancestor
    pub fn ancestor(name: impl Into<String>, relation: impl Into<String>) -> Self {
        RecordPayload::Ancestor {
            name: name.into(),
            relation: relation.into(),
        }
    }
}

/// One node of the dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Globally unique identifier
    pub id: RecordId,
    /// Current partition membership
    pub partition: Partition,
    /// Typed content
    pub payload: RecordPayload,
    /// Contributor that created this record (None for contributors)
    pub created_by: Option<RecordId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Record {
    /// Create a new Private record with a fresh id
    pub fn new(payload: RecordPayload) -> Self {
        Self::with_id(RecordId::new(), payload)
    }

    /// Create a new Private record with a caller-chosen id
    pub fn with_id(id: RecordId, payload: RecordPayload) -> Self {
        Self {
            id,
            partition: Partition::Private,
            payload,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    /// Kind of this record
    pub fn kind(&self) -> RecordKind {
        self.payload.kind()
    }

    /// Human-facing label
    pub fn label(&self) -> &str {
        self.payload.label()
    }

    /// View this record as a contributor, if it is one
    pub fn as_contributor(&self) -> Option<Contributor> {
        match &self.payload {
            RecordPayload::Contributor(profile) => Some(Contributor {
                id: self.id,
                partition: self.partition,
                profile: profile.clone(),
            }),
            _ => None,
        }
    }
}

/// Durable identity of a person who creates records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    /// Record id of this contributor copy
    pub id: RecordId,
    /// Partition of this copy
    pub partition: Partition,
    /// Identity fields
    pub profile: ContributorProfile,
}

impl Contributor {
    /// Whether this contributor's name matches `name` ignoring case and
    /// surrounding or repeated whitespace
    pub fn name_matches(&self, name: &str) -> bool {
        let ours = normalize_name(&self.profile.display_name);
        !ours.is_empty() && ours == normalize_name(name)
    }

    /// Build the arena record for this contributor
    pub fn to_record(&self) -> Record {
        let mut record = Record::with_id(self.id, RecordPayload::Contributor(self.profile.clone()));
        record.partition = self.partition;
        record
    }
}

/// Lower-case a display name and collapse its whitespace
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
