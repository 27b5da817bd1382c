//! SyncOrchestrator: the façade
//!
//! Wires identity resolution, partition routing, the share lifecycle and the
//! poller into the operations callers use: capture a record, share a root,
//! join a share, keep the local replica current, and delete.
//!
//! ## Write ordering in `add_record`
//!
//! 1. resolve the acting contributor
//! 2. normalize relationship targets to one partition
//! 3. choose the partition
//! 4. find or plan the author's twin in that partition
//! 5. verify every planned edge
//! 6. insert the record and its edges
//! 7. extend every share covering a target
//!
//! Apart from a first-use default contributor, nothing is written before
//! step 6. If step 7 fails, the writes of step 6
//! are undone, so the call either fully succeeds or leaves the store as it
//! was.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use hearthshare_core::{
    Contributor, ContributorProfile, Edge, EdgeKind, Error, IdentityKey, Partition,
    PartitionFilter, Record, RecordId, RecordKind, RecordPayload, RemoteRecord, Result,
    SessionState, ShareHandle, ShareState,
};
use hearthshare_storage::{RecordStore, RelocationPlan};

use crate::config::{SyncConfig, CONFIG_FILE_NAME};
use crate::identity::{IdentityResolver, IdentitySignals};
use crate::poller::{PollOptions, SyncPoller};
use crate::remote::{RemoteBackend, ShareCodeLookup};
use crate::router::{PartitionRouter, TwinPlan};
use crate::session::SessionStore;
use crate::share::{ImportSummary, ShareLifecycleManager};

/// Length of a share code
pub const SHARE_CODE_LEN: usize = 6;

/// What the user typed or tapped to join a share
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvitationInput {
    /// Six-character share code, upper-cased
    Code(String),
    /// Invitation link
    Link(String),
}

impl InvitationInput {
    /// Classify raw input
    ///
    /// Six ASCII alphanumerics are a code; any other non-blank input is
    /// treated as a link.
    ///
    /// # Errors
    /// `InvalidInvitation` for blank input.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInvitation(
                "enter a share code or paste an invitation link".to_string(),
            ));
        }
        if trimmed.len() == SHARE_CODE_LEN && trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Ok(InvitationInput::Code(trimmed.to_ascii_uppercase()));
        }
        Ok(InvitationInput::Link(trimmed.to_string()))
    }
}

/// Local writes made by one call, so they can be undone
#[derive(Debug, Default)]
struct WriteLog {
    inserted: Vec<RecordId>,
    refreshed: Vec<(RecordId, RecordPayload)>,
}

impl WriteLog {
    fn insert(&mut self, store: &RecordStore, record: Record) -> Result<()> {
        let id = record.id;
        store.insert(record)?;
        self.inserted.push(id);
        Ok(())
    }

    fn apply_twin(&mut self, store: &RecordStore, twin: &TwinPlan) -> Result<()> {
        match twin {
            TwinPlan::Existing(_) => Ok(()),
            TwinPlan::Create(contributor) => self.insert(store, contributor.to_record()),
            TwinPlan::Refresh(contributor) => {
                let previous = store
                    .get(&contributor.id)
                    .ok_or(Error::RecordNotFound(contributor.id))?
                    .payload;
                store.update_payload(
                    &contributor.id,
                    RecordPayload::Contributor(contributor.profile.clone()),
                )?;
                self.refreshed.push((contributor.id, previous));
                Ok(())
            }
        }
    }

    fn rollback(self, store: &RecordStore) {
        for id in self.inserted.iter().rev() {
            if let Err(e) = store.remove(id) {
                error!(target: "hearthshare::sync", id = %id, error = %e, "rollback could not remove record");
            }
        }
        for (id, payload) in self.refreshed.into_iter().rev() {
            if let Err(e) = store.update_payload(&id, payload) {
                error!(target: "hearthshare::sync", id = %id, error = %e, "rollback could not restore contributor");
            }
        }
    }
}

/// Entry point for every sync and sharing operation
pub struct SyncOrchestrator {
    config: SyncConfig,
    store: Arc<RecordStore>,
    router: PartitionRouter,
    resolver: IdentityResolver,
    shares: ShareLifecycleManager,
    poller: SyncPoller,
    remote: Arc<dyn RemoteBackend>,
    codes: Arc<dyn ShareCodeLookup>,
    session: RwLock<SessionState>,
    session_store: SessionStore,
}

impl SyncOrchestrator {
    /// Open the engine over a data directory
    ///
    /// Creates the directory and a default `hearthshare.toml` when missing,
    /// then loads configuration and the persisted session.
    pub fn open(
        dir: impl AsRef<Path>,
        remote: Arc<dyn RemoteBackend>,
        codes: Arc<dyn ShareCodeLookup>,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let config_path = dir.join(CONFIG_FILE_NAME);
        SyncConfig::write_default_if_missing(&config_path)?;
        let config = SyncConfig::from_file(&config_path)?;
        info!(target: "hearthshare::sync", path = %dir.display(), "opening engine");
        Self::build(config, remote, codes, SessionStore::open(dir))
    }

    /// Engine with nothing on disk
    pub fn ephemeral(
        config: SyncConfig,
        remote: Arc<dyn RemoteBackend>,
        codes: Arc<dyn ShareCodeLookup>,
    ) -> Result<Self> {
        config.validate()?;
        Self::build(config, remote, codes, SessionStore::ephemeral())
    }

    fn build(
        config: SyncConfig,
        remote: Arc<dyn RemoteBackend>,
        codes: Arc<dyn ShareCodeLookup>,
        session_store: SessionStore,
    ) -> Result<Self> {
        let session = session_store.load()?;
        let store = Arc::new(RecordStore::new());
        Ok(Self {
            router: PartitionRouter::new(store.clone()),
            resolver: IdentityResolver::new(&config),
            shares: ShareLifecycleManager::new(remote.clone()),
            poller: SyncPoller::new(remote.clone()),
            config,
            store,
            remote,
            codes,
            session: RwLock::new(session),
            session_store,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Local replica
    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Share registry
    pub fn shares(&self) -> &ShareLifecycleManager {
        &self.shares
    }

    /// Poller, for callers that run background polls themselves
    pub fn poller(&self) -> &SyncPoller {
        &self.poller
    }

    /// Snapshot of the session
    pub fn session(&self) -> SessionState {
        self.session.read().clone()
    }

    /// Replace the session and persist it
    pub fn set_session(&self, state: SessionState) -> Result<()> {
        *self.session.write() = state.clone();
        self.session_store.save(&state)
    }

    /// Change the session in place, persisting only if it changed
    pub fn update_session(&self, f: impl FnOnce(&mut SessionState)) -> Result<()> {
        let changed = {
            let mut session = self.session.write();
            let before = session.clone();
            f(&mut session);
            (*session != before).then(|| session.clone())
        };
        match changed {
            Some(state) => self.session_store.save(&state),
            None => Ok(()),
        }
    }

    /// Contributor acting on this device, creating one if none exists
    pub fn current_contributor(&self) -> Result<Contributor> {
        let session = self.session();
        let resolution = match self.resolver.resolve(&session, &self.store.contributors(None)) {
            Ok(resolution) => resolution,
            Err(Error::NoContributorAvailable) => {
                let created = self.create_default_contributor(&session)?;
                info!(target: "hearthshare::identity", id = %created.id, role = %created.profile.role, "created default contributor");
                self.resolver.resolve(&session, &self.store.contributors(None))?
            }
            Err(e) => return Err(e),
        };

        let mut contributor = resolution.contributor;
        if resolution.materialized && !self.store.contains(&contributor.id) {
            self.store.insert(contributor.to_record())?;
            info!(target: "hearthshare::identity", id = %contributor.id, role = %contributor.profile.role, "materialized co-owner contributor");
        }
        if let Some(key) = resolution.backfill_identity {
            contributor.profile.remote_identity_key = Some(key);
            self.store.update_payload(
                &contributor.id,
                RecordPayload::Contributor(contributor.profile.clone()),
            )?;
            debug!(target: "hearthshare::identity", id = %contributor.id, "backfilled remote identity");
        }
        self.update_session(|s| s.record_resolution(&contributor))?;
        Ok(contributor)
    }

    fn create_default_contributor(&self, session: &SessionState) -> Result<Contributor> {
        let role = session
            .current_role
            .or(session.primary_role)
            .unwrap_or(if session.is_co_owner_device {
                self.config.co_owner_role
            } else {
                self.config.primary_role
            });
        let defaults = self.config.role_defaults(role);
        let display_name = session
            .display_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| defaults.display_name.clone());
        let record = Record::new(RecordPayload::Contributor(ContributorProfile {
            display_name,
            role,
            color_tag: defaults.color_tag.clone(),
            remote_identity_key: session.remote_identity_key.clone(),
        }));
        let contributor = record.as_contributor().ok_or_else(|| {
            Error::InvalidOperation("default contributor record has no profile".to_string())
        })?;
        self.store.insert(record)?;
        Ok(contributor)
    }

    /// Capture a record related to `targets`
    ///
    /// The record lands in the partition its targets live in and is added to
    /// every share covering them.
    pub async fn add_record(&self, payload: RecordPayload, targets: &[RecordId]) -> Result<Record> {
        let author = self.current_contributor()?;
        let resolved = self.router.resolve_targets(targets)?;
        let partition = PartitionRouter::choose_partition(&resolved.records)?;
        let author_twin = self.router.contributor_in(partition, &author);

        let mut record = Record::new(payload);
        PartitionRouter::assign(&mut record, partition);

        let mut twins: BTreeMap<RecordId, TwinPlan> = BTreeMap::new();
        for twin in resolved.twins.iter().chain(std::iter::once(&author_twin)) {
            if twin.needs_write() {
                twins.entry(twin.contributor().id).or_insert_with(|| twin.clone());
            }
        }

        let mut edges = Vec::with_capacity(resolved.records.len() + 1);
        for target in &resolved.records {
            let kind = EdgeKind::between(record.kind(), target.kind()).ok_or(
                Error::InvalidRelationship {
                    from: record.kind(),
                    to: target.kind(),
                },
            )?;
            edges.push(Edge::new(record.id, target.id, kind));
        }
        if record.kind() != RecordKind::Contributor {
            let author_id = author_twin.contributor().id;
            record.created_by = Some(author_id);
            let authored = Edge::new(record.id, author_id, EdgeKind::CreatedBy);
            if !edges.contains(&authored) {
                edges.push(authored);
            }
        }

        let mut planned = vec![record.clone()];
        planned.extend(
            twins
                .values()
                .filter(|t| matches!(t, TwinPlan::Create(_)))
                .map(|t| t.contributor().to_record()),
        );
        self.router.verify_edges(&planned, &edges)?;

        let mut log = WriteLog::default();
        let written = self.write_record(&mut log, &record, twins.values(), &edges);
        if let Err(e) = written {
            log.rollback(&self.store);
            return Err(e);
        }
        debug!(target: "hearthshare::sync", id = %record.id, kind = %record.kind(), partition = %partition, edges = edges.len(), "record added");

        if partition == Partition::Shared {
            if let Err(e) = self.extend_covering_shares(&record, twins.values()).await {
                warn!(target: "hearthshare::sync", id = %record.id, error = %e, "share extension failed, rolling back");
                log.rollback(&self.store);
                return Err(e);
            }
        }
        Ok(record)
    }

    fn write_record<'a>(
        &self,
        log: &mut WriteLog,
        record: &Record,
        twins: impl Iterator<Item = &'a TwinPlan>,
        edges: &[Edge],
    ) -> Result<()> {
        for twin in twins {
            log.apply_twin(&self.store, twin)?;
        }
        log.insert(&self.store, record.clone())?;
        for edge in edges {
            self.store.link(*edge)?;
        }
        Ok(())
    }

    async fn extend_covering_shares<'a>(
        &self,
        record: &Record,
        twins: impl Iterator<Item = &'a TwinPlan>,
    ) -> Result<()> {
        let mut handles = self.shares.shares_for(&self.store, &record.id);
        if handles.is_empty() {
            debug!(target: "hearthshare::sync", id = %record.id, "no known share covers record, asking backend");
            let identity = self.device_identity().await.ok();
            for root in self.store.roots_of(&record.id) {
                self.shares.recover_share(root, identity.as_ref()).await?;
            }
            handles = self.shares.shares_for(&self.store, &record.id);
        }
        if handles.is_empty() {
            return Err(Error::ShareUnavailable(record.id));
        }
        let mut batch = Vec::new();
        batch.extend(self.store.remote_record(&record.id));
        batch.extend(twins.filter_map(|t| self.store.remote_record(&t.contributor().id)));
        for handle in handles {
            self.shares.extend_share(&handle, batch.clone()).await?;
        }
        Ok(())
    }

    /// Share a root entity, or return its existing share
    ///
    /// The root's component moves to Shared only after the backend has
    /// created the share.
    pub async fn create_share(&self, root: RecordId) -> Result<ShareHandle> {
        let record = self.store.get(&root).ok_or(Error::RecordNotFound(root))?;
        if let Some(existing) = self.shares.fetch_existing_share(&root) {
            debug!(target: "hearthshare::share", root = %root, "share already exists");
            return Ok(existing);
        }
        if record.partition == Partition::Shared {
            let identity = self.device_identity().await.ok();
            if let Some(recovered) = self.shares.recover_share(root, identity.as_ref()).await? {
                return Ok(recovered);
            }
            return Err(Error::InvalidOperation(format!(
                "root {} is already shared but its share is unknown on this device",
                root
            )));
        }

        let plan = self.router.plan_promotion(&root)?;
        self.store.check_relocation(&plan)?;
        let initial = self.planned_remote_records(&plan);
        let handle = self.shares.create_share(root, initial).await?;

        // Re-plan so records attached while the share was pending move too
        let plan = self.router.plan_promotion(&root)?;
        if let Err(e) = self.store.apply_relocation(&plan) {
            error!(target: "hearthshare::share", root = %root, error = %e, "share created remotely but local promotion failed");
            return Err(e);
        }
        let mut carried = plan.affected();
        carried.extend(plan.retarget_targets());
        let missed: Vec<RemoteRecord> = carried
            .iter()
            .filter(|id| !handle.covers(id))
            .filter_map(|id| self.store.remote_record(id))
            .collect();
        let handle = if missed.is_empty() {
            handle
        } else {
            self.shares.extend_share(&handle, missed).await?
        };
        info!(target: "hearthshare::share", root = %root, records = handle.records.len(), "root shared");
        Ok(handle)
    }

    /// Records as they will look once `plan` is applied
    fn planned_remote_records(&self, plan: &RelocationPlan) -> Vec<RemoteRecord> {
        let retargets: BTreeMap<Edge, RecordId> = plan.retargets.iter().copied().collect();
        let mut records = Vec::with_capacity(plan.moves.len() + plan.new_records.len());
        for id in &plan.moves {
            let Some(mut record) = self.store.get(id) else {
                continue;
            };
            record.partition = plan.target;
            let edges: Vec<Edge> = self
                .store
                .edges_from(id)
                .into_iter()
                .map(|edge| match retargets.get(&edge) {
                    Some(twin) => {
                        if edge.kind == EdgeKind::CreatedBy {
                            record.created_by = Some(*twin);
                        }
                        edge.retarget(*twin)
                    }
                    None => edge,
                })
                .collect();
            records.push(RemoteRecord::new(record, edges));
        }
        records.extend(
            plan.new_records
                .iter()
                .chain(&plan.refreshes)
                .map(|r| RemoteRecord::new(r.clone(), Vec::new())),
        );
        // Twins that already exist in Shared still have to travel with the share
        let included: BTreeSet<RecordId> = records.iter().map(|r| r.record.id).collect();
        for twin in plan.retarget_targets() {
            if !included.contains(&twin) {
                records.extend(self.store.remote_record(&twin));
            }
        }
        records
    }

    /// Join a share by code or link
    ///
    /// Returns the imported root once the shared data is visible, or `None`
    /// if it does not show up within the interactive budget or `cancel`
    /// fires.
    pub async fn accept_invitation(
        &self,
        code_or_link: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Record>> {
        let url = match InvitationInput::parse(code_or_link)? {
            InvitationInput::Link(url) => url,
            InvitationInput::Code(code) => self.lookup_code(&code).await?,
        };
        let metadata = self
            .remote
            .fetch_invitation_metadata(&url)
            .await
            .map_err(|e| Error::remote("fetch_invitation_metadata", e))?;
        let device_identity = self.device_identity().await?;
        let accepted = self
            .shares
            .accept_invitation(&metadata, Some(&device_identity))
            .await?;
        let root = accepted.root_record_id;

        let options = PollOptions::interactive_from(&self.config.poll).with_expected_root(root);
        let Some(found) = self
            .poller
            .await_shared_import(RecordKind::Grandchild, &options, cancel)
            .await
        else {
            info!(target: "hearthshare::sync", root = %root, "shared data not visible yet");
            return Ok(None);
        };

        let mut batch = Vec::new();
        for kind in RecordKind::IMPORT_ORDER {
            let listed = self
                .remote
                .list_records(kind, PartitionFilter::Shared)
                .await
                .map_err(|e| Error::remote("list_records", e))?;
            batch.extend(listed);
        }
        batch.push(found);
        let summary = self.shares.import_records(&self.store, &batch)?;

        self.update_session(|s| s.is_co_owner_device = true)?;
        info!(target: "hearthshare::sync", root = %root, imported = summary.records(), "joined share");
        Ok(self.store.get(&root))
    }

    async fn lookup_code(&self, code: &str) -> Result<String> {
        let attempts = self.config.code_lookup.attempts.max(1);
        let mut last = None;
        for attempt in 1..=attempts {
            match self.codes.lookup_share_url(code).await {
                Ok(url) => return Ok(url),
                Err(e) => {
                    warn!(target: "hearthshare::sync", code, attempt, attempts, error = %e, "share code lookup failed");
                    last = Some(e);
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.code_lookup.retry_delay()).await;
            }
        }
        match last {
            Some(e) => Err(Error::remote("lookup_share_url", e)),
            None => Err(Error::InvalidInvitation(format!("share code {} could not be resolved", code))),
        }
    }

    async fn device_identity(&self) -> Result<IdentityKey> {
        match self.session().remote_identity_key {
            Some(key) => Ok(key),
            None => self.refresh_remote_identity().await,
        }
    }

    /// Ask the backend who is signed in and remember it
    pub async fn refresh_remote_identity(&self) -> Result<IdentityKey> {
        let key = self
            .remote
            .current_user_identity()
            .await
            .map_err(|e| Error::remote("current_user_identity", e))?;
        self.update_session(|s| s.remote_identity_key = Some(key.clone()))?;
        debug!(target: "hearthshare::sync", identity = %key, "remote identity refreshed");
        Ok(key)
    }

    /// Bring the local replica up to date with everything this account sees
    pub async fn ensure_current(&self) -> Result<ImportSummary> {
        if self.session().remote_identity_key.is_none() {
            if let Err(e) = self.refresh_remote_identity().await {
                warn!(target: "hearthshare::sync", error = %e, "remote identity unavailable");
            }
        }
        let mut summary = ImportSummary::default();
        for kind in RecordKind::IMPORT_ORDER {
            let listed = self
                .remote
                .list_records(kind, PartitionFilter::All)
                .await
                .map_err(|e| Error::remote("list_records", e))?;
            summary.absorb(self.shares.import_records(&self.store, &listed)?);
        }
        summary.shares_restored = self.restore_shares().await;
        info!(
            target: "hearthshare::sync",
            inserted = summary.inserted,
            updated = summary.updated,
            unchanged = summary.unchanged,
            shares_restored = summary.shares_restored,
            "replica current"
        );
        Ok(summary)
    }

    /// Register a handle for every Shared root this device has no share for
    ///
    /// Failures are logged; `add_record` asks the backend again before it
    /// gives up on a shared capture.
    async fn restore_shares(&self) -> usize {
        let identity = self.session().remote_identity_key;
        let mut restored = 0;
        for root in self
            .store
            .records_of_kind(RecordKind::Grandchild, Some(Partition::Shared))
        {
            let known = self.shares.fetch_existing_share(&root.id).is_some()
                || !self.shares.shares_for(&self.store, &root.id).is_empty();
            if known {
                continue;
            }
            match self.shares.recover_share(root.id, identity.as_ref()).await {
                Ok(Some(_)) => restored += 1,
                Ok(None) => warn!(target: "hearthshare::sync", root = %root.id, "shared root has no share visible to this account"),
                Err(e) => warn!(target: "hearthshare::sync", root = %root.id, error = %e, "could not restore share"),
            }
        }
        restored
    }

    /// Whether this device's user may delete `id`
    pub fn can_delete(&self, id: &RecordId) -> Result<bool> {
        self.can_delete_as(id, &self.session())
    }

    /// Whether the user behind `session` may delete `id`
    ///
    /// Allowed when the deleter matches the record's creator by remote
    /// identity, role or display name. Records without a creator cannot be
    /// deleted.
    pub fn can_delete_as(&self, id: &RecordId, session: &SessionState) -> Result<bool> {
        let record = self.store.get(id).ok_or(Error::RecordNotFound(*id))?;
        let creator_id = record.created_by.or_else(|| {
            self.store
                .edges_from(id)
                .into_iter()
                .find(|e| e.kind == EdgeKind::CreatedBy)
                .map(|e| e.to)
        });
        let Some(creator) = creator_id
            .and_then(|c| self.store.get(&c))
            .and_then(|r| r.as_contributor())
        else {
            debug!(target: "hearthshare::sync", id = %id, "record has no known creator");
            return Ok(false);
        };

        let creator_signals = IdentitySignals::from(&creator);
        let deleter = self
            .resolver
            .signals_for(session, &self.store.contributors(None));
        let same_account = matches!(
            (&session.remote_identity_key, &creator.profile.remote_identity_key),
            (Some(ours), Some(theirs)) if ours == theirs
        );
        Ok(same_account || deleter.matches(&creator_signals))
    }

    /// Check that a root entity may be deleted
    ///
    /// # Errors
    /// `SharedRootDeletionBlocked` when the root is in Shared or has a
    /// pending or active share, whatever the device or role.
    pub fn can_delete_root(&self, root: &RecordId) -> Result<()> {
        let record = self.store.get(root).ok_or(Error::RecordNotFound(*root))?;
        let state = self.shares.state(root);
        if record.partition == Partition::Shared || state != ShareState::Unshared {
            return Err(Error::SharedRootDeletionBlocked(*root));
        }
        Ok(())
    }

    /// Delete a Private record and every edge touching it
    pub fn delete_record(&self, id: &RecordId) -> Result<Record> {
        let record = self.store.get(id).ok_or(Error::RecordNotFound(*id))?;
        if record.kind().is_root() {
            self.can_delete_root(id)?;
        }
        if record.partition == Partition::Shared {
            return Err(Error::SharedRecordDeletionBlocked(*id));
        }
        if !self.can_delete(id)? {
            return Err(Error::DeletionNotAuthorized(*id));
        }
        let (removed, edges) = self.store.remove(id)?;
        info!(target: "hearthshare::sync", id = %id, kind = %removed.kind(), edges = edges.len(), "record deleted");
        Ok(removed)
    }

    /// Wipe every record, share and session key on this device
    pub fn fresh_install(&self) -> Result<()> {
        self.store.clear();
        self.shares.clear();
        let mut session = self.session.write();
        self.session_store.reset(&mut session)?;
        info!(target: "hearthshare::sync", "fresh install");
        Ok(())
    }
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("records", &self.store.len())
            .field("shares", &self.shares)
            .finish_non_exhaustive()
    }
}
