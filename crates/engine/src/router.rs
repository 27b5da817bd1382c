//! Partition routing
//!
//! Decides which partition a new record lands in, finds or plans the
//! partition-local copy ("twin") of a contributor, and computes the
//! relocation that sharing a root entity requires. Everything here is
//! synchronous and read-only against the store; writes are returned as plans
//! for the orchestrator to apply.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;

use hearthshare_core::{
    Contributor, Edge, EdgeKind, Error, Partition, Record, RecordId, RecordKind, Result,
};
use hearthshare_storage::{RecordStore, RelocationPlan};

/// What it takes to have a contributor copy in some partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TwinPlan {
    /// A matching copy exists and is up to date
    Existing(Contributor),
    /// A copy exists but its profile must be refreshed
    Refresh(Contributor),
    /// No copy exists; this one must be inserted
    Create(Contributor),
}

impl TwinPlan {
    /// The contributor copy, as it will look once the plan is applied
    pub fn contributor(&self) -> &Contributor {
        match self {
            TwinPlan::Existing(c) | TwinPlan::Refresh(c) | TwinPlan::Create(c) => c,
        }
    }

    /// Whether applying the plan writes anything
    pub fn needs_write(&self) -> bool {
        !matches!(self, TwinPlan::Existing(_))
    }
}

/// Relationship targets after partition normalization
#[derive(Debug, Clone, Default)]
pub struct ResolvedTargets {
    /// Target records, all in one partition once `twins` are applied
    pub records: Vec<Record>,
    /// Contributor twins that stand in for Private contributor targets
    pub twins: Vec<TwinPlan>,
}

/// Routes records to partitions and keeps edges co-resident
#[derive(Debug, Clone)]
pub struct PartitionRouter {
    store: Arc<RecordStore>,
}

impl PartitionRouter {
    /// Router over `store`
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Partition a new record must go to, given its relationship targets
    ///
    /// # Errors
    /// `PartitionMismatch` when the targets span both partitions.
    pub fn choose_partition(targets: &[Record]) -> Result<Partition> {
        let Some(first) = targets.first() else {
            return Ok(Partition::Private);
        };
        if let Some(other) = targets.iter().find(|t| t.partition != first.partition) {
            return Err(Error::PartitionMismatch {
                from: first.id,
                from_partition: first.partition,
                to: other.id,
                to_partition: other.partition,
            });
        }
        Ok(first.partition)
    }

    /// Stamp the partition on a record before it is inserted
    pub fn assign(record: &mut Record, partition: Partition) {
        record.partition = partition;
    }

    /// Load targets and normalize them to a single partition
    ///
    /// When any target is Shared, Private contributor targets are replaced by
    /// their Shared twins. Other Private targets cannot follow and make the
    /// batch a `PartitionMismatch`.
    pub fn resolve_targets(&self, ids: &[RecordId]) -> Result<ResolvedTargets> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            records.push(self.store.get(id).ok_or(Error::RecordNotFound(*id))?);
        }
        let Some(shared) = records.iter().find(|r| r.partition == Partition::Shared).map(|r| r.id)
        else {
            return Ok(ResolvedTargets {
                records,
                twins: Vec::new(),
            });
        };

        let mut resolved = ResolvedTargets::default();
        for record in records {
            if record.partition == Partition::Shared {
                resolved.records.push(record);
                continue;
            }
            let Some(contributor) = record.as_contributor() else {
                return Err(Error::PartitionMismatch {
                    from: shared,
                    from_partition: Partition::Shared,
                    to: record.id,
                    to_partition: record.partition,
                });
            };
            let twin = self.contributor_in(Partition::Shared, &contributor);
            debug!(target: "hearthshare::router", contributor = %contributor.id, twin = %twin.contributor().id, "swapped contributor target for shared twin");
            resolved.records.push(twin.contributor().to_record());
            if twin.needs_write() {
                resolved.twins.push(twin);
            }
        }
        Ok(resolved)
    }

    /// Check planned edges for co-residency before anything is written
    ///
    /// Endpoint partitions come from `planned` when present there, otherwise
    /// from the store.
    ///
    /// # Errors
    /// Fails fast on the first `PartitionMismatch`, `InvalidRelationship` or
    /// `RecordNotFound`.
    pub fn verify_edges(&self, planned: &[Record], edges: &[Edge]) -> Result<()> {
        let planned: HashMap<RecordId, (RecordKind, Partition)> = planned
            .iter()
            .map(|r| (r.id, (r.kind(), r.partition)))
            .collect();
        let lookup = |id: &RecordId| -> Result<(RecordKind, Partition)> {
            if let Some(entry) = planned.get(id) {
                return Ok(*entry);
            }
            self.store
                .get(id)
                .map(|r| (r.kind(), r.partition))
                .ok_or(Error::RecordNotFound(*id))
        };
        for edge in edges {
            let (from_kind, from_partition) = lookup(&edge.from)?;
            let (to_kind, to_partition) = lookup(&edge.to)?;
            if EdgeKind::between(from_kind, to_kind) != Some(edge.kind) {
                return Err(Error::InvalidRelationship {
                    from: from_kind,
                    to: to_kind,
                });
            }
            if from_partition != to_partition {
                return Err(Error::PartitionMismatch {
                    from: edge.from,
                    from_partition,
                    to: edge.to,
                    to_partition,
                });
            }
        }
        Ok(())
    }

    /// Copy of `acting` that lives in `partition`
    ///
    /// Twins are matched by remote identity key first, then by role. A
    /// missing twin gets a deterministic id derived from the acting
    /// contributor, so planning the same twin twice yields the same record.
    pub fn contributor_in(&self, partition: Partition, acting: &Contributor) -> TwinPlan {
        if acting.partition == partition {
            return TwinPlan::Existing(acting.clone());
        }
        let candidates = self.store.contributors(Some(partition));
        match find_twin(&candidates, acting) {
            Some(found) => {
                let mut mirrored = found.clone();
                mirrored.profile.display_name = acting.profile.display_name.clone();
                mirrored.profile.role = acting.profile.role;
                mirrored.profile.color_tag = acting.profile.color_tag.clone();
                if acting.profile.remote_identity_key.is_some() {
                    mirrored.profile.remote_identity_key = acting.profile.remote_identity_key.clone();
                }
                if mirrored == *found {
                    TwinPlan::Existing(mirrored)
                } else {
                    TwinPlan::Refresh(mirrored)
                }
            }
            None => TwinPlan::Create(Contributor {
                id: twin_id(acting.id, partition),
                partition,
                profile: acting.profile.clone(),
            }),
        }
    }

    /// Relocation needed to share `root`
    ///
    /// Moves the root's component of non-contributor records to Shared and
    /// re-points their `CreatedBy` edges from Private contributors to Shared
    /// twins. Missing twins are planned as new records; stale ones get their
    /// profile mirrored from the Private contributor.
    pub fn plan_promotion(&self, root: &RecordId) -> Result<RelocationPlan> {
        let record = self.store.get(root).ok_or(Error::RecordNotFound(*root))?;
        if !record.kind().is_root() {
            return Err(Error::InvalidOperation(format!(
                "only a grandchild can anchor a share, {} is a {}",
                root,
                record.kind()
            )));
        }

        let mut plan = RelocationPlan::new(Partition::Shared);
        plan.moves = self
            .store
            .component_of(root)
            .into_iter()
            .filter(|id| self.store.partition_of(id) == Some(Partition::Private))
            .collect();

        let mut twins: BTreeMap<RecordId, RecordId> = BTreeMap::new();
        for id in &plan.moves {
            for edge in self.store.edges_from(id) {
                if edge.kind != EdgeKind::CreatedBy {
                    continue;
                }
                let Some(author) = self.store.get(&edge.to).and_then(|r| r.as_contributor()) else {
                    continue;
                };
                if author.partition == Partition::Shared {
                    continue;
                }
                let twin = match twins.get(&author.id) {
                    Some(twin) => *twin,
                    None => {
                        let twin = match self.contributor_in(Partition::Shared, &author) {
                            TwinPlan::Create(c) => {
                                let id = c.id;
                                plan.new_records.push(c.to_record());
                                id
                            }
                            TwinPlan::Refresh(c) => {
                                let id = c.id;
                                plan.refreshes.push(c.to_record());
                                id
                            }
                            TwinPlan::Existing(c) => c.id,
                        };
                        twins.insert(author.id, twin);
                        twin
                    }
                };
                plan.retargets.push((edge, twin));
            }
        }

        debug!(
            target: "hearthshare::router",
            root = %root,
            moves = plan.moves.len(),
            twins = plan.new_records.len(),
            refreshes = plan.refreshes.len(),
            retargets = plan.retargets.len(),
            "planned promotion"
        );
        Ok(plan)
    }
}

/// Stable id of `contributor`'s copy in `partition`
pub fn twin_id(contributor: RecordId, partition: Partition) -> RecordId {
    RecordId::derived(&format!("hearthshare:twin:{}:{}", contributor, partition))
}

fn find_twin<'a>(candidates: &'a [Contributor], acting: &Contributor) -> Option<&'a Contributor> {
    let by_key = acting.profile.remote_identity_key.as_ref().and_then(|key| {
        candidates
            .iter()
            .filter(|c| c.profile.remote_identity_key.as_ref() == Some(key))
            .min_by_key(|c| c.id)
    });
    by_key.or_else(|| {
        candidates
            .iter()
            .filter(|c| c.profile.role == acting.profile.role)
            .filter(|c| match (&c.profile.remote_identity_key, &acting.profile.remote_identity_key) {
                (Some(theirs), Some(ours)) => theirs == ours,
                _ => true,
            })
            .min_by_key(|c| c.id)
    })
}
