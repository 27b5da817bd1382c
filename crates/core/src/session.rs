//! Device-local session state
//!
//! `SessionState` is passed explicitly into identity resolution and routing.
//! It is only read from and written to durable storage at process boundaries
//! (see the engine's `SessionStore`); the persisted layout is a flat
//! key-value map where unset values are empty strings.

use serde::{Deserialize, Serialize};

use crate::record::Contributor;
use crate::types::{IdentityKey, RecordId, Role};

/// Process-wide, device-local session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Contributor last resolved for this device
    pub active_contributor_id: Option<RecordId>,
    /// Role the current user acts as
    pub current_role: Option<Role>,
    /// Role of the primary owner
    pub primary_role: Option<Role>,
    /// Device joined someone else's share
    pub is_co_owner_device: bool,
    /// Device belongs to the primary owner
    pub is_primary_device: bool,
    /// Authenticated cloud account of this device
    pub remote_identity_key: Option<IdentityKey>,
    /// Locally-known display name of the user
    pub display_name: Option<String>,
}

impl SessionState {
    /// Session of a primary device acting as `role`
    pub fn primary(role: Role) -> Self {
        Self {
            current_role: Some(role),
            primary_role: Some(role),
            is_primary_device: true,
            ..Self::default()
        }
    }

    /// Set the remote identity key
    pub fn with_identity(mut self, key: impl Into<IdentityKey>) -> Self {
        self.remote_identity_key = Some(key.into());
        self
    }

    /// Set the display name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Store the outcome of a successful identity resolution
    pub fn record_resolution(&mut self, contributor: &Contributor) {
        self.active_contributor_id = Some(contributor.id);
        self.current_role = Some(contributor.profile.role);
    }

    /// Reset every key to empty/false
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// On-disk key-value layout of `SessionState`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    /// Active contributor id, empty when unset
    #[serde(rename = "activeContributorID", default)]
    pub active_contributor_id: String,
    /// Current role, empty when unset
    #[serde(rename = "currentContributorRole", default)]
    pub current_contributor_role: String,
    /// Primary role, empty when unset
    #[serde(rename = "primaryContributorRole", default)]
    pub primary_contributor_role: String,
    /// Co-owner flag
    #[serde(rename = "isCoGrandparentDevice", default)]
    pub is_co_grandparent_device: bool,
    /// Primary flag
    #[serde(rename = "isPrimaryDevice", default)]
    pub is_primary_device: bool,
    /// Remote identity, empty when unset
    #[serde(rename = "remoteIdentityKey", default)]
    pub remote_identity_key: String,
    /// Display name, empty when unset
    #[serde(rename = "displayName", default)]
    pub display_name: String,
}

impl From<&SessionState> for PersistedSession {
    fn from(state: &SessionState) -> Self {
        Self {
            active_contributor_id: state
                .active_contributor_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            current_contributor_role: state
                .current_role
                .map(|r| r.as_str().to_string())
                .unwrap_or_default(),
            primary_contributor_role: state
                .primary_role
                .map(|r| r.as_str().to_string())
                .unwrap_or_default(),
            is_co_grandparent_device: state.is_co_owner_device,
            is_primary_device: state.is_primary_device,
            remote_identity_key: state
                .remote_identity_key
                .as_ref()
                .map(|k| k.as_str().to_string())
                .unwrap_or_default(),
            display_name: state.display_name.clone().unwrap_or_default(),
        }
    }
}

impl From<PersistedSession> for SessionState {
    fn from(p: PersistedSession) -> Self {
        let non_empty = |s: String| {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        };
        Self {
            active_contributor_id: RecordId::from_string(p.active_contributor_id.trim()),
            current_role: Role::parse(&p.current_contributor_role),
            primary_role: Role::parse(&p.primary_contributor_role),
            is_co_owner_device: p.is_co_grandparent_device,
            is_primary_device: p.is_primary_device,
            remote_identity_key: non_empty(p.remote_identity_key).map(IdentityKey::new),
            display_name: non_empty(p.display_name),
        }
    }
}
