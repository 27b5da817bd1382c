//! In-process stand-ins for the remote collaborators
//!
//! `SimulatedCloud` models a replicated-zone backend shared by several
//! accounts: each share is a zone owned by one account, with participants
//! that joined through its link. `SimulatedAccount` is one signed-in view of
//! it and implements `RemoteBackend`. Failures can be injected per
//! operation and every call is counted.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use hearthshare_core::{
    IdentityKey, InvitationMetadata, Partition, PartitionFilter, Permission, RecordId, RecordKind,
    RemoteError, RemoteRecord, RemoteShare, ShareHandle,
};

use crate::remote::{RemoteBackend, RemoteResult, ShareCodeLookup};

#[derive(Debug)]
struct Zone {
    owner: IdentityKey,
    root: RecordId,
    permission: Permission,
    /// Participant → listings left before the zone becomes visible
    participants: BTreeMap<IdentityKey, u32>,
    records: BTreeMap<RecordId, RemoteRecord>,
}

#[derive(Debug)]
struct CloudState {
    zones: BTreeMap<String, Zone>,
    failures: HashMap<&'static str, VecDeque<RemoteError>>,
    calls: HashMap<&'static str, u32>,
    default_permission: Permission,
    publish_after: u32,
    next_zone: u64,
}

impl CloudState {
    fn enter(&mut self, operation: &'static str) -> RemoteResult<()> {
        *self.calls.entry(operation).or_insert(0) += 1;
        match self.failures.get_mut(operation).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn visible_to(&self, identity: &IdentityKey) -> impl Iterator<Item = (&String, &Zone)> + '_ {
        let identity = identity.clone();
        self.zones
            .iter()
            .filter(move |(_, z)| z.owner == identity || z.participants.contains_key(&identity))
    }

    fn zone(&mut self, token: &str) -> RemoteResult<&mut Zone> {
        self.zones
            .get_mut(token)
            .ok_or_else(|| RemoteError::NotFound(format!("no share at {}", token)))
    }
}

/// Shared in-memory backend
#[derive(Debug, Clone)]
pub struct SimulatedCloud {
    state: Arc<Mutex<CloudState>>,
}

impl Default for SimulatedCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedCloud {
    /// Empty backend; new shares are ReadWrite and visible immediately
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(CloudState {
                zones: BTreeMap::new(),
                failures: HashMap::new(),
                calls: HashMap::new(),
                default_permission: Permission::ReadWrite,
                publish_after: 0,
                next_zone: 1,
            })),
        }
    }

    /// Signed-in view for `identity`
    pub fn account(&self, identity: &str) -> Arc<SimulatedAccount> {
        Arc::new(SimulatedAccount {
            cloud: self.clone(),
            identity: IdentityKey::new(identity),
        })
    }

    /// Make the next call of `operation` fail with `error`
    ///
    /// Failures queue up; each call consumes one.
    pub fn fail_next(&self, operation: &'static str, error: RemoteError) {
        self.state
            .lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// How many times `operation` was called, across all accounts
    pub fn calls(&self, operation: &str) -> u32 {
        self.state.lock().calls.get(operation).copied().unwrap_or(0)
    }

    /// Permission given to shares created from now on
    pub fn set_default_permission(&self, permission: Permission) {
        self.state.lock().default_permission = permission;
    }

    /// Change the permission of an existing share
    pub fn set_permission(&self, token: &str, permission: Permission) {
        if let Some(zone) = self.state.lock().zones.get_mut(token) {
            zone.permission = permission;
        }
    }

    /// Hide a share from a new participant for its first `listings` listings
    pub fn set_publish_after(&self, listings: u32) {
        self.state.lock().publish_after = listings;
    }

    /// Records a share currently holds
    pub fn share_records(&self, token: &str) -> BTreeSet<RecordId> {
        self.state
            .lock()
            .zones
            .get(token)
            .map(|z| z.records.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Links of every share, oldest first
    pub fn share_tokens(&self) -> Vec<String> {
        self.state.lock().zones.keys().cloned().collect()
    }
}

/// One account's view of the simulated backend
#[derive(Debug)]
pub struct SimulatedAccount {
    cloud: SimulatedCloud,
    identity: IdentityKey,
}

impl SimulatedAccount {
    /// Account identity
    pub fn identity(&self) -> &IdentityKey {
        &self.identity
    }
}

fn stamp_shared(mut remote: RemoteRecord) -> RemoteRecord {
    remote.record.partition = Partition::Shared;
    remote
}

#[async_trait]
impl RemoteBackend for SimulatedAccount {
    async fn fetch_invitation_metadata(&self, url: &str) -> RemoteResult<InvitationMetadata> {
        let mut state = self.cloud.state.lock();
        state.enter("fetch_invitation_metadata")?;
        let zone = state.zone(url)?;
        Ok(InvitationMetadata {
            url: url.to_string(),
            owner_identity: zone.owner.clone(),
            root_record_id: zone.root,
            permission: zone.permission,
        })
    }

    async fn accept_invitation(&self, metadata: &InvitationMetadata) -> RemoteResult<()> {
        let mut state = self.cloud.state.lock();
        state.enter("accept_invitation")?;
        let publish_after = state.publish_after;
        let zone = state.zone(&metadata.url)?;
        if zone.permission == Permission::None {
            return Err(RemoteError::Rejected("share is private".to_string()));
        }
        if zone.owner == self.identity {
            return Err(RemoteError::Rejected("owner cannot join own share".to_string()));
        }
        zone.participants
            .entry(self.identity.clone())
            .or_insert(publish_after);
        Ok(())
    }

    async fn create_share(&self, root: RecordId, records: Vec<RemoteRecord>) -> RemoteResult<ShareHandle> {
        let mut state = self.cloud.state.lock();
        state.enter("create_share")?;
        let token = format!("https://share.example/{}", state.next_zone);
        state.next_zone += 1;

        let mut handle = ShareHandle::new(root, token.clone(), state.default_permission);
        let mut zone = Zone {
            owner: self.identity.clone(),
            root,
            permission: state.default_permission,
            participants: BTreeMap::new(),
            records: BTreeMap::new(),
        };
        for remote in records {
            handle.records.insert(remote.record.id);
            zone.records.insert(remote.record.id, stamp_shared(remote));
        }
        state.zones.insert(token, zone);
        Ok(handle)
    }

    async fn extend_share(&self, handle: &ShareHandle, records: Vec<RemoteRecord>) -> RemoteResult<ShareHandle> {
        let mut state = self.cloud.state.lock();
        state.enter("extend_share")?;
        let zone = state.zone(&handle.share_token)?;
        let is_owner = zone.owner == self.identity;
        if !is_owner && !zone.participants.contains_key(&self.identity) {
            return Err(RemoteError::Rejected("not a participant".to_string()));
        }
        if !is_owner && zone.permission != Permission::ReadWrite {
            return Err(RemoteError::Rejected("share is read-only".to_string()));
        }

        let mut updated = handle.clone();
        updated.permission = zone.permission;
        for remote in records {
            updated.records.insert(remote.record.id);
            zone.records.insert(remote.record.id, stamp_shared(remote));
        }
        updated.records.extend(zone.records.keys().copied());
        Ok(updated)
    }

    async fn fetch_share(&self, root: RecordId) -> RemoteResult<Option<RemoteShare>> {
        let mut state = self.cloud.state.lock();
        state.enter("fetch_share")?;
        let found = state
            .visible_to(&self.identity)
            .find(|(_, z)| z.root == root)
            .or_else(|| {
                state
                    .visible_to(&self.identity)
                    .find(|(_, z)| z.records.contains_key(&root))
            });
        Ok(found.map(|(token, zone)| {
            let mut handle = ShareHandle::new(zone.root, token.clone(), zone.permission);
            handle.records.extend(zone.records.keys().copied());
            RemoteShare {
                handle,
                owner_identity: zone.owner.clone(),
            }
        }))
    }

    async fn current_user_identity(&self) -> RemoteResult<IdentityKey> {
        self.cloud.state.lock().enter("current_user_identity")?;
        Ok(self.identity.clone())
    }

    async fn list_records(&self, kind: RecordKind, filter: PartitionFilter) -> RemoteResult<Vec<RemoteRecord>> {
        let mut state = self.cloud.state.lock();
        state.enter("list_records")?;
        let mut found = Vec::new();
        for zone in state.zones.values_mut() {
            let owned = zone.owner == self.identity;
            let joined = match zone.participants.get_mut(&self.identity) {
                Some(0) => true,
                Some(remaining) => {
                    *remaining -= 1;
                    false
                }
                None => false,
            };
            let visible = match filter {
                PartitionFilter::Private => owned,
                PartitionFilter::Shared => joined,
                PartitionFilter::All => owned || joined,
            };
            if visible {
                found.extend(zone.records.values().filter(|r| r.record.kind() == kind).cloned());
            }
        }
        Ok(found)
    }
}

/// Code lookup service backed by a fixed table
#[derive(Debug, Default)]
pub struct StaticCodeLookup {
    codes: Mutex<HashMap<String, String>>,
    failures_left: Mutex<u32>,
    calls: Mutex<u32>,
}

impl StaticCodeLookup {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `code` to `url`
    pub fn with_code(self, code: &str, url: &str) -> Self {
        self.insert(code, url);
        self
    }

    /// Map `code` to `url` on a shared instance
    pub fn insert(&self, code: &str, url: &str) {
        self.codes.lock().insert(code.to_ascii_uppercase(), url.to_string());
    }

    /// Fail the next `count` lookups with a network error
    pub fn failing_first(self, count: u32) -> Self {
        *self.failures_left.lock() = count;
        self
    }

    /// Lookups made so far
    pub fn calls(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait]
impl ShareCodeLookup for StaticCodeLookup {
    async fn lookup_share_url(&self, code: &str) -> RemoteResult<String> {
        *self.calls.lock() += 1;
        {
            let mut failures = self.failures_left.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(RemoteError::Network("code service unavailable".to_string()));
            }
        }
        self.codes
            .lock()
            .get(&code.to_ascii_uppercase())
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(format!("unknown share code {}", code)))
    }
}
