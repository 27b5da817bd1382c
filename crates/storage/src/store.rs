//! RecordStore: the record arena
//!
//! This module implements the local replica using:
//! - `BTreeMap<RecordId, Record>` as the arena (the store owns every record)
//! - an explicit typed edge list (`EdgeIndex`) instead of object references
//! - secondary indices by partition and by kind
//! - a single `parking_lot::RwLock` so each operation updates the arena and
//!   all indices atomically
//! - `AtomicU64` change counter
//!
//! # Co-residency
//!
//! Every write that creates or moves an edge endpoint checks that both ends
//! of the edge are in the same partition and fails with `PartitionMismatch`
//! otherwise. The router checks the same rule earlier, against planned
//! partitions; this is the last gate before the arena changes.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, warn};

use hearthshare_core::{
    Contributor, Edge, EdgeKind, Error, Partition, Record, RecordId, RecordKind, RecordPayload,
    RemoteRecord, Result,
};

use crate::index::{EdgeIndex, KindIndex, PartitionIndex};
use crate::relocation::RelocationPlan;

/// Result of an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Record was new
    Inserted,
    /// Record existed and its payload changed
    Updated,
    /// Record existed with an identical payload
    Unchanged,
}

#[derive(Debug, Default)]
struct StoreInner {
    records: BTreeMap<RecordId, Record>,
    partitions: PartitionIndex,
    kinds: KindIndex,
    edges: EdgeIndex,
}

impl StoreInner {
    fn get(&self, id: &RecordId) -> Result<&Record> {
        self.records.get(id).ok_or(Error::RecordNotFound(*id))
    }

    fn insert(&mut self, record: Record) {
        self.partitions.insert(record.partition, record.id);
        self.kinds.insert(record.kind(), record.id);
        self.records.insert(record.id, record);
    }

    fn remove(&mut self, id: &RecordId) -> Option<(Record, Vec<Edge>)> {
        let record = self.records.remove(id)?;
        self.partitions.remove(record.partition, id);
        self.kinds.remove(record.kind(), id);
        let edges = self.edges.remove_record(id);
        Some((record, edges))
    }

    /// Validate an edge against current partitions
    fn check_edge(&self, edge: &Edge) -> Result<()> {
        let from = self.get(&edge.from)?;
        let to = self.get(&edge.to)?;
        check_pair(edge, from.kind(), from.partition, to.kind(), to.partition)
    }
}

fn check_pair(
    edge: &Edge,
    from_kind: RecordKind,
    from_partition: Partition,
    to_kind: RecordKind,
    to_partition: Partition,
) -> Result<()> {
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
    Ok(())
}

/// Local replica of both partitions
///
/// Thread-safe through `parking_lot::RwLock`. Mutation is expected to come
/// from a single owner at a time; the lock only keeps readers consistent.
#[derive(Debug, Default)]
pub struct RecordStore {
    inner: RwLock<StoreInner>,
    version: AtomicU64,
}

impl RecordStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Change counter; incremented by every successful write
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Insert a new record
    ///
    /// # Errors
    /// `DuplicateRecord` if the id is already in use.
    pub fn insert(&self, record: Record) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.records.contains_key(&record.id) {
            return Err(Error::DuplicateRecord(record.id));
        }
        debug!(target: "hearthshare::store", id = %record.id, kind = %record.kind(), partition = %record.partition, "insert");
        inner.insert(record);
        drop(inner);
        self.bump();
        Ok(())
    }

    /// Insert a record or refresh the payload of an existing one
    ///
    /// An existing record keeps its partition; only content is mirrored.
    pub fn upsert(&self, record: Record) -> Result<UpsertOutcome> {
        let mut inner = self.inner.write();
        let outcome = match inner.records.get_mut(&record.id) {
            None => {
                inner.insert(record);
                UpsertOutcome::Inserted
            }
            Some(existing) => {
                if existing.kind() != record.kind() {
                    return Err(Error::InvalidOperation(format!(
                        "record {} cannot change kind from {} to {}",
                        record.id,
                        existing.kind(),
                        record.kind()
                    )));
                }
                if existing.partition != record.partition {
                    warn!(target: "hearthshare::store", id = %record.id, local = %existing.partition, incoming = %record.partition, "upsert keeps local partition");
                }
                if existing.payload == record.payload {
                    UpsertOutcome::Unchanged
                } else {
                    existing.payload = record.payload;
                    UpsertOutcome::Updated
                }
            }
        };
        drop(inner);
        if outcome != UpsertOutcome::Unchanged {
            self.bump();
        }
        Ok(outcome)
    }

    /// Replace a record's payload; the kind must not change
    pub fn update_payload(&self, id: &RecordId, payload: RecordPayload) -> Result<()> {
        let mut inner = self.inner.write();
        let record = inner
            .records
            .get_mut(id)
            .ok_or(Error::RecordNotFound(*id))?;
        if record.kind() != payload.kind() {
            return Err(Error::InvalidOperation(format!(
                "record {} cannot change kind from {} to {}",
                id,
                record.kind(),
                payload.kind()
            )));
        }
        record.payload = payload;
        drop(inner);
        self.bump();
        Ok(())
    }

    /// Get a copy of a record
    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.inner.read().records.get(id).cloned()
    }

    /// Whether a record exists
    pub fn contains(&self, id: &RecordId) -> bool {
        self.inner.read().records.contains_key(id)
    }

    /// Partition a record currently lives in
    pub fn partition_of(&self, id: &RecordId) -> Option<Partition> {
        self.inner.read().records.get(id).map(|r| r.partition)
    }

    /// Persist an edge
    ///
    /// Returns `Ok(false)` if the edge already existed.
    ///
    /// # Errors
    /// - `RecordNotFound` if either endpoint is missing
    /// - `InvalidRelationship` if the edge kind does not fit the endpoint kinds
    /// - `PartitionMismatch` if the endpoints are in different partitions
    pub fn link(&self, edge: Edge) -> Result<bool> {
        let mut inner = self.inner.write();
        inner.check_edge(&edge)?;
        let added = inner.edges.insert(edge);
        drop(inner);
        if added {
            self.bump();
        }
        Ok(added)
    }

    /// Check an edge without writing it
    pub fn check_edge(&self, edge: &Edge) -> Result<()> {
        self.inner.read().check_edge(edge)
    }

    /// Remove a record and every edge touching it
    pub fn remove(&self, id: &RecordId) -> Result<(Record, Vec<Edge>)> {
        let mut inner = self.inner.write();
        let removed = inner.remove(id).ok_or(Error::RecordNotFound(*id))?;
        drop(inner);
        debug!(target: "hearthshare::store", id = %id, edges = removed.1.len(), "remove");
        self.bump();
        Ok(removed)
    }

    /// Edges whose source is `id`
    pub fn edges_from(&self, id: &RecordId) -> Vec<Edge> {
        self.inner.read().edges.outgoing(id)
    }

    /// Edges whose target is `id`
    pub fn edges_to(&self, id: &RecordId) -> Vec<Edge> {
        self.inner.read().edges.incoming(id)
    }

    /// Every edge in the store
    pub fn edges(&self) -> Vec<Edge> {
        self.inner.read().edges.iter().copied().collect()
    }

    /// All records in a partition, in id order
    pub fn records_in(&self, partition: Partition) -> Vec<Record> {
        let inner = self.inner.read();
        inner
            .partitions
            .get(&partition)
            .map(|ids| ids.iter().filter_map(|id| inner.records.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    /// All records of a kind, optionally restricted to one partition
    pub fn records_of_kind(&self, kind: RecordKind, partition: Option<Partition>) -> Vec<Record> {
        let inner = self.inner.read();
        inner
            .kinds
            .get(&kind)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.records.get(id))
                    .filter(|r| partition.map_or(true, |p| r.partition == p))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All contributors, optionally restricted to one partition
    pub fn contributors(&self, partition: Option<Partition>) -> Vec<Contributor> {
        self.records_of_kind(RecordKind::Contributor, partition)
            .iter()
            .filter_map(Record::as_contributor)
            .collect()
    }

    /// A record with its outgoing edges, as exchanged with the backend
    pub fn remote_record(&self, id: &RecordId) -> Option<RemoteRecord> {
        let inner = self.inner.read();
        let record = inner.records.get(id)?.clone();
        Some(RemoteRecord::new(record, inner.edges.outgoing(id)))
    }

    /// Share roots (Grandchildren) a record hangs off
    ///
    /// Follows outgoing non-`CreatedBy` edges. A root is its own root.
    pub fn roots_of(&self, id: &RecordId) -> BTreeSet<RecordId> {
        let inner = self.inner.read();
        let mut roots = BTreeSet::new();
        let mut seen = BTreeSet::new();
        let mut stack = vec![*id];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            match inner.records.get(&current) {
                Some(record) if record.kind().is_root() => {
                    roots.insert(current);
                }
                Some(_) => stack.extend(
                    inner
                        .edges
                        .outgoing(&current)
                        .into_iter()
                        .filter(|e| e.kind != EdgeKind::CreatedBy)
                        .map(|e| e.to),
                ),
                None => {}
            }
        }
        roots
    }

    /// Connected component of non-contributor records around `id`
    ///
    /// Edges are followed in both directions; contributors are boundary
    /// nodes and are neither included nor traversed through.
    pub fn component_of(&self, id: &RecordId) -> BTreeSet<RecordId> {
        let inner = self.inner.read();
        let mut component = BTreeSet::new();
        let mut stack = vec![*id];
        while let Some(current) = stack.pop() {
            let is_member = inner
                .records
                .get(&current)
                .is_some_and(|r| r.kind() != RecordKind::Contributor);
            if !is_member || !component.insert(current) {
                continue;
            }
            for edge in inner.edges.touching(&current) {
                stack.push(if edge.from == current { edge.to } else { edge.from });
            }
        }
        component
    }

    /// Dry-run a relocation plan
    ///
    /// # Errors
    /// Fails with the first problem found; the arena is never modified.
    pub fn check_relocation(&self, plan: &RelocationPlan) -> Result<()> {
        let inner = self.inner.read();
        Self::check_plan(&inner, plan)
    }

    fn check_plan(inner: &StoreInner, plan: &RelocationPlan) -> Result<()> {
        let mut planned: HashMap<RecordId, (RecordKind, Partition)> = HashMap::new();
        for record in &plan.new_records {
            if inner.records.contains_key(&record.id) {
                return Err(Error::DuplicateRecord(record.id));
            }
            if record.partition != plan.target {
                return Err(Error::InvalidOperation(format!(
                    "new record {} is stamped {} but the plan targets {}",
                    record.id, record.partition, plan.target
                )));
            }
            planned.insert(record.id, (record.kind(), plan.target));
        }
        for id in &plan.moves {
            let record = inner.get(id)?;
            planned.insert(*id, (record.kind(), plan.target));
        }
        for record in &plan.refreshes {
            let existing = inner.get(&record.id)?;
            if existing.kind() != record.kind() || existing.partition != plan.target {
                return Err(Error::InvalidOperation(format!(
                    "cannot refresh {} {} in {} as a {} in {}",
                    existing.kind(),
                    record.id,
                    existing.partition,
                    record.kind(),
                    plan.target
                )));
            }
        }

        let lookup = |id: &RecordId| -> Result<(RecordKind, Partition)> {
            match planned.get(id) {
                Some(entry) => Ok(*entry),
                None => inner.get(id).map(|r| (r.kind(), r.partition)),
            }
        };

        // Final edge set touching anything the plan changes
        let mut removed: BTreeSet<Edge> = BTreeSet::new();
        let mut edges: BTreeSet<Edge> = BTreeSet::new();
        for (old, new_target) in &plan.retargets {
            if !inner.edges.contains(old) {
                return Err(Error::InvalidOperation(format!(
                    "cannot re-point missing edge {} -> {}",
                    old.from, old.to
                )));
            }
            removed.insert(*old);
            edges.insert(old.retarget(*new_target));
        }
        for id in &plan.moves {
            edges.extend(inner.edges.touching(id).into_iter().filter(|e| !removed.contains(e)));
        }

        for edge in &edges {
            let (from_kind, from_partition) = lookup(&edge.from)?;
            let (to_kind, to_partition) = lookup(&edge.to)?;
            check_pair(edge, from_kind, from_partition, to_kind, to_partition)?;
        }
        Ok(())
    }

    /// Apply a relocation plan atomically
    ///
    /// The plan is checked under the same write lock it is applied under.
    pub fn apply_relocation(&self, plan: &RelocationPlan) -> Result<()> {
        let mut inner = self.inner.write();
        Self::check_plan(&inner, plan)?;

        for record in &plan.new_records {
            inner.insert(record.clone());
        }
        for id in &plan.moves {
            let Some(record) = inner.records.get_mut(id) else {
                continue;
            };
            let from = record.partition;
            record.partition = plan.target;
            inner.partitions.relocate(from, plan.target, *id);
        }
        for refreshed in &plan.refreshes {
            if let Some(record) = inner.records.get_mut(&refreshed.id) {
                record.payload = refreshed.payload.clone();
            }
        }
        for (old, new_target) in &plan.retargets {
            inner.edges.remove(old);
            inner.edges.insert(old.retarget(*new_target));
            if old.kind == EdgeKind::CreatedBy {
                if let Some(record) = inner.records.get_mut(&old.from) {
                    record.created_by = Some(*new_target);
                }
            }
        }
        drop(inner);

        debug!(
            target: "hearthshare::store",
            target_partition = %plan.target,
            moved = plan.moves.len(),
            created = plan.new_records.len(),
            retargeted = plan.retargets.len(),
            refreshed = plan.refreshes.len(),
            "relocation applied"
        );
        self.bump();
        Ok(())
    }

    /// Edges whose endpoints are in different partitions
    ///
    /// Always empty unless the arena has been corrupted; used by tests and
    /// self-checks.
    pub fn co_residency_violations(&self) -> Vec<Edge> {
        let inner = self.inner.read();
        inner
            .edges
            .iter()
            .filter(|e| {
                let from = inner.records.get(&e.from).map(|r| r.partition);
                let to = inner.records.get(&e.to).map(|r| r.partition);
                from.is_none() || from != to
            })
            .copied()
            .collect()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Whether the store holds no records
    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.inner.read().edges.len()
    }

    /// Drop every record and edge
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        *inner = StoreInner::default();
        drop(inner);
        self.bump();
    }
}
