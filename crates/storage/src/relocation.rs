//! Relocation plans
//!
//! Moving records between partitions is the only way a record's partition
//! changes. A plan is built up front (by the router), dry-run checked by the
//! store, and only then applied, so a plan that would leave an edge spanning
//! two partitions never touches the arena.

use hearthshare_core::{Edge, Partition, Record, RecordId};
use std::collections::BTreeSet;

/// A batch of partition moves plus the edge rewrites they require
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocationPlan {
    /// Partition every moved record ends up in
    pub target: Partition,
    /// Existing records to move
    pub moves: BTreeSet<RecordId>,
    /// New records (already stamped with `target`) to insert
    pub new_records: Vec<Record>,
    /// Existing edges to re-point: (old edge, new target)
    pub retargets: Vec<(Edge, RecordId)>,
    /// Existing records, already in `target`, whose payload is replaced
    pub refreshes: Vec<Record>,
}

impl RelocationPlan {
    /// Create an empty plan towards `target`
    pub fn new(target: Partition) -> Self {
        Self {
            target,
            moves: BTreeSet::new(),
            new_records: Vec::new(),
            retargets: Vec::new(),
            refreshes: Vec::new(),
        }
    }

    /// Whether the plan does nothing
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
            && self.new_records.is_empty()
            && self.retargets.is_empty()
            && self.refreshes.is_empty()
    }

    /// Every record id the plan creates or moves
    pub fn affected(&self) -> BTreeSet<RecordId> {
        let mut ids = self.moves.clone();
        ids.extend(self.new_records.iter().map(|r| r.id));
        ids
    }

    /// Records that re-pointed edges end up targeting
    pub fn retarget_targets(&self) -> BTreeSet<RecordId> {
        self.retargets.iter().map(|(_, to)| *to).collect()
    }

    /// Whether a record is created by this plan
    pub fn creates(&self, id: &RecordId) -> bool {
        self.new_records.iter().any(|r| r.id == *id)
    }
}
