//! Remote collaborator boundaries
//!
//! The cloud backend and the share-code service are outside this system.
//! They are reached only through these traits; every call may suspend.

use async_trait::async_trait;

use hearthshare_core::{
    IdentityKey, InvitationMetadata, PartitionFilter, RecordId, RecordKind, RemoteError,
    RemoteRecord, RemoteShare, ShareHandle,
};

/// Result type for remote calls
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Replicated-zone cloud backend, as seen by one signed-in account
///
/// Implementations must tolerate duplicate accepts of an already-accepted
/// share and duplicate records in `extend_share`.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Resolve an invitation link into its metadata
    async fn fetch_invitation_metadata(&self, url: &str) -> RemoteResult<InvitationMetadata>;

    /// Join the share described by `metadata`
    async fn accept_invitation(&self, metadata: &InvitationMetadata) -> RemoteResult<()>;

    /// Create a share rooted at `root` holding `records`
    async fn create_share(&self, root: RecordId, records: Vec<RemoteRecord>) -> RemoteResult<ShareHandle>;

    /// Add `records` to an existing share
    async fn extend_share(&self, handle: &ShareHandle, records: Vec<RemoteRecord>) -> RemoteResult<ShareHandle>;

    /// The share anchored at `root`, or else the share carrying `root`
    ///
    /// Only shares visible to this account, as owner or participant, are
    /// reported. `None` when no such share exists.
    async fn fetch_share(&self, root: RecordId) -> RemoteResult<Option<RemoteShare>>;

    /// Account identifier of the signed-in user
    async fn current_user_identity(&self) -> RemoteResult<IdentityKey>;

    /// Records of `kind` visible to this account
    async fn list_records(&self, kind: RecordKind, filter: PartitionFilter) -> RemoteResult<Vec<RemoteRecord>>;
}

/// External service mapping 6-character share codes to invitation links
#[async_trait]
pub trait ShareCodeLookup: Send + Sync {
    /// Look up the link behind a code
    async fn lookup_share_url(&self, code: &str) -> RemoteResult<String>;
}
