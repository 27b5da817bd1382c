//! Share lifecycle
//!
//! Tracks one state machine per root entity:
//!
//! ```text
//! Unshared ──create──▶ Pending ──ok──▶ Shared ──extend──▶ Shared
//!     ▲                   │
//!     └──────remote err───┘
//! ```
//!
//! The registry is a `DashMap`; no entry guard is ever held across a remote
//! call. Concurrent extensions of one share merge their record sets.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use tracing::{debug, info, warn};

use hearthshare_core::{
    AcceptResult, Error, IdentityKey, InvitationMetadata, Partition, Permission, RecordId,
    RemoteRecord, RemoteShare, Result, ShareHandle, ShareState,
};
use hearthshare_storage::{RecordStore, UpsertOutcome};

use crate::remote::RemoteBackend;

/// Counts from importing remote records into the local store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Records that were new locally
    pub inserted: usize,
    /// Records whose payload changed
    pub updated: usize,
    /// Records already up to date
    pub unchanged: usize,
    /// Edges written
    pub edges_linked: usize,
    /// Edges skipped because an endpoint was missing or misplaced
    pub edges_skipped: usize,
    /// Share handles registered again from the backend
    pub shares_restored: usize,
}

impl ImportSummary {
    /// Records seen in total
    pub fn records(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }

    /// Add another summary's counts to this one
    pub fn absorb(&mut self, other: ImportSummary) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.edges_linked += other.edges_linked;
        self.edges_skipped += other.edges_skipped;
        self.shares_restored += other.shares_restored;
    }
}

/// Creates, extends, looks up and accepts shares
pub struct ShareLifecycleManager {
    remote: Arc<dyn RemoteBackend>,
    states: DashMap<RecordId, ShareState>,
    /// Roots this device created shares for
    owned: DashSet<RecordId>,
}

impl ShareLifecycleManager {
    /// Manager talking to `remote`
    pub fn new(remote: Arc<dyn RemoteBackend>) -> Self {
        Self {
            remote,
            states: DashMap::new(),
            owned: DashSet::new(),
        }
    }

    /// Current state of a root's share
    pub fn state(&self, root: &RecordId) -> ShareState {
        self.states
            .get(root)
            .map(|s| s.value().clone())
            .unwrap_or(ShareState::Unshared)
    }

    /// Active share for a root, if any; never creates one
    pub fn fetch_existing_share(&self, root: &RecordId) -> Option<ShareHandle> {
        match self.states.get(root)?.value() {
            ShareState::Shared(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    /// Whether this device created the share for `root`
    pub fn is_owner(&self, root: &RecordId) -> bool {
        self.owned.contains(root)
    }

    /// Create a share for `root` holding `initial_records`
    ///
    /// # Errors
    /// - `InvalidShareState` unless the root is Unshared
    /// - `Remote` if the backend fails; the state reverts to Unshared
    pub async fn create_share(
        &self,
        root: RecordId,
        initial_records: Vec<RemoteRecord>,
    ) -> Result<ShareHandle> {
        match self.states.entry(root) {
            Entry::Occupied(mut occupied) => {
                if *occupied.get() != ShareState::Unshared {
                    return Err(Error::InvalidShareState {
                        root,
                        state: occupied.get().as_str(),
                    });
                }
                occupied.insert(ShareState::Pending);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(ShareState::Pending);
            }
        }

        debug!(target: "hearthshare::share", root = %root, records = initial_records.len(), "creating share");
        match self.remote.create_share(root, initial_records).await {
            Ok(handle) => {
                self.owned.insert(root);
                self.states.insert(root, ShareState::Shared(handle.clone()));
                info!(target: "hearthshare::share", root = %root, permission = ?handle.permission, "share created");
                Ok(handle)
            }
            Err(e) => {
                self.states.remove(&root);
                warn!(target: "hearthshare::share", root = %root, error = %e, "share creation failed");
                Err(Error::remote("create_share", e))
            }
        }
    }

    /// Add records to an active share
    ///
    /// Records the share already covers are dropped first; if nothing new
    /// remains the stored handle is returned without a remote call.
    ///
    /// # Errors
    /// - `InvalidShareState` unless the root is Shared
    /// - `ShareReadOnly` when a joined share does not allow writes
    /// - `Remote` if the backend fails
    pub async fn extend_share(
        &self,
        handle: &ShareHandle,
        additional: Vec<RemoteRecord>,
    ) -> Result<ShareHandle> {
        let root = handle.root_entity_id;
        let Some(mut current) = self.fetch_existing_share(&root) else {
            return Err(Error::InvalidShareState {
                root,
                state: self.state(&root).as_str(),
            });
        };
        current.merge(handle);

        let fresh: Vec<RemoteRecord> = additional
            .into_iter()
            .filter(|r| !current.covers(&r.record.id))
            .collect();
        if fresh.is_empty() {
            debug!(target: "hearthshare::share", root = %root, "nothing new to share");
            return Ok(current);
        }
        if !current.permission.allows_write() && !self.is_owner(&root) {
            return Err(Error::ShareReadOnly(root));
        }

        let count = fresh.len();
        let updated = self
            .remote
            .extend_share(&current, fresh)
            .await
            .map_err(|e| Error::remote("extend_share", e))?;

        let merged = match self.states.entry(root) {
            Entry::Occupied(mut occupied) => match occupied.get_mut() {
                ShareState::Shared(stored) => {
                    stored.merge(&updated);
                    stored.clone()
                }
                other => {
                    let mut merged = updated;
                    merged.merge(&current);
                    *other = ShareState::Shared(merged.clone());
                    merged
                }
            },
            Entry::Vacant(vacant) => {
                let mut merged = updated;
                merged.merge(&current);
                vacant.insert(ShareState::Shared(merged.clone()));
                merged
            }
        };
        debug!(target: "hearthshare::share", root = %root, added = count, covered = merged.records.len(), "share extended");
        Ok(merged)
    }

    /// Join a share from its invitation metadata
    ///
    /// Validation happens before the backend is contacted.
    ///
    /// # Errors
    /// - `PrivateShareNotSupported` when the share has no public permission
    /// - `SelfInviteNotAllowed` when the device owns the share
    /// - `Remote` if the backend rejects the accept
    pub async fn accept_invitation(
        &self,
        metadata: &InvitationMetadata,
        device_identity: Option<&IdentityKey>,
    ) -> Result<AcceptResult> {
        if metadata.permission == Permission::None {
            return Err(Error::PrivateShareNotSupported);
        }
        if device_identity == Some(&metadata.owner_identity) {
            return Err(Error::SelfInviteNotAllowed);
        }

        self.remote
            .accept_invitation(metadata)
            .await
            .map_err(|e| Error::remote("accept_invitation", e))?;

        let root = metadata.root_record_id;
        self.register(ShareHandle::new(root, metadata.url.clone(), metadata.permission));
        info!(target: "hearthshare::share", root = %root, permission = ?metadata.permission, "invitation accepted");
        Ok(AcceptResult {
            accepted: true,
            root_record_id: root,
        })
    }

    /// Record a known active share, merging with any stored handle
    ///
    /// Returns the handle as stored after the merge.
    pub fn register(&self, handle: ShareHandle) -> ShareHandle {
        let root = handle.root_entity_id;
        match self.states.entry(root) {
            Entry::Occupied(mut occupied) => match occupied.get_mut() {
                ShareState::Shared(stored) => {
                    stored.merge(&handle);
                    stored.clone()
                }
                other => {
                    *other = ShareState::Shared(handle.clone());
                    handle
                }
            },
            Entry::Vacant(vacant) => {
                vacant.insert(ShareState::Shared(handle.clone()));
                handle
            }
        }
    }

    /// Register a share reported by the backend
    ///
    /// Marks the root as owned when the share's owner is `device_identity`,
    /// so an owner keeps writing to a share that is read-only for others.
    pub fn restore(&self, share: RemoteShare, device_identity: Option<&IdentityKey>) -> ShareHandle {
        let root = share.handle.root_entity_id;
        if device_identity.is_some_and(|id| share.is_owned_by(id)) {
            self.owned.insert(root);
        }
        self.register(share.handle)
    }

    /// Ask the backend for the share anchored at or carrying `root`
    ///
    /// Registers and returns it when one is visible to this account.
    ///
    /// # Errors
    /// `Remote` if the backend fails.
    pub async fn recover_share(
        &self,
        root: RecordId,
        device_identity: Option<&IdentityKey>,
    ) -> Result<Option<ShareHandle>> {
        let fetched = self
            .remote
            .fetch_share(root)
            .await
            .map_err(|e| Error::remote("fetch_share", e))?;
        let Some(share) = fetched else {
            debug!(target: "hearthshare::share", root = %root, "backend knows no share for root");
            return Ok(None);
        };
        let owner = device_identity.is_some_and(|id| share.is_owned_by(id));
        let handle = self.restore(share, device_identity);
        info!(target: "hearthshare::share", root = %handle.root_entity_id, covered = handle.records.len(), owner, "share recovered");
        Ok(Some(handle))
    }

    /// Upsert remote records into the local store
    ///
    /// New records keep the partition the backend reports; existing records
    /// keep their local partition. Edges are linked only when both endpoints
    /// are present in the same partition; the rest are skipped.
    pub fn import_records(&self, store: &RecordStore, records: &[RemoteRecord]) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        for remote in records {
            match store.upsert(remote.record.clone())? {
                UpsertOutcome::Inserted => summary.inserted += 1,
                UpsertOutcome::Updated => summary.updated += 1,
                UpsertOutcome::Unchanged => summary.unchanged += 1,
            }
        }
        for edge in records.iter().flat_map(|r| r.edges.iter()) {
            let from = store.partition_of(&edge.from);
            let to = store.partition_of(&edge.to);
            if from.is_none() || to.is_none() || from != to {
                debug!(target: "hearthshare::share", from = %edge.from, to = %edge.to, kind = ?edge.kind, "skipping edge with missing or misplaced endpoint");
                summary.edges_skipped += 1;
                continue;
            }
            match store.link(*edge) {
                Ok(true) => summary.edges_linked += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(target: "hearthshare::share", from = %edge.from, to = %edge.to, error = %e, "skipping invalid remote edge");
                    summary.edges_skipped += 1;
                }
            }
        }
        debug!(
            target: "hearthshare::share",
            inserted = summary.inserted,
            updated = summary.updated,
            linked = summary.edges_linked,
            skipped = summary.edges_skipped,
            "import finished"
        );
        Ok(summary)
    }

    /// Active shares covering `record`, found through its roots
    ///
    /// A root counts as covered when it anchors a share or when another
    /// share already carries it.
    pub fn shares_for(&self, store: &RecordStore, record: &RecordId) -> Vec<ShareHandle> {
        if store.partition_of(record) != Some(Partition::Shared) {
            return Vec::new();
        }
        let roots = store.roots_of(record);
        let mut handles: Vec<ShareHandle> = self
            .states
            .iter()
            .filter_map(|entry| match entry.value() {
                ShareState::Shared(handle)
                    if roots
                        .iter()
                        .any(|r| handle.root_entity_id == *r || handle.covers(r)) =>
                {
                    Some(handle.clone())
                }
                _ => None,
            })
            .collect();
        handles.sort_by_key(|h| h.root_entity_id);
        handles
    }

    /// Forget every share
    pub fn clear(&self) {
        self.states.clear();
        self.owned.clear();
    }
}

impl std::fmt::Debug for ShareLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareLifecycleManager")
            .field("shares", &self.states.len())
            .field("owned", &self.owned.len())
            .finish()
    }
}
