//! Secondary indices for efficient query patterns
//!
//! These let the store answer partition- and kind-scoped queries without
//! scanning the whole arena:
//! - PartitionIndex: Partition → Set<RecordId>
//! - KindIndex: RecordKind → Set<RecordId>
//! - EdgeIndex: RecordId → Set<Edge> touching that record

use hearthshare_core::{Edge, Partition, RecordId, RecordKind};
use std::collections::{BTreeSet, HashMap};

/// Secondary index: Partition → record ids
#[derive(Debug, Default)]
pub struct PartitionIndex {
    index: HashMap<Partition, BTreeSet<RecordId>>,
}

impl PartitionIndex {
    /// Create a new empty PartitionIndex
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record to a partition's set
    pub fn insert(&mut self, partition: Partition, id: RecordId) {
        self.index.entry(partition).or_default().insert(id);
    }

    /// Remove a record from a partition's set
    ///
    /// Empty sets are dropped so the index does not accumulate them.
    pub fn remove(&mut self, partition: Partition, id: &RecordId) {
        if let Some(ids) = self.index.get_mut(&partition) {
            ids.remove(id);
            if ids.is_empty() {
                self.index.remove(&partition);
            }
        }
    }

    /// Move a record between partitions
    pub fn relocate(&mut self, from: Partition, to: Partition, id: RecordId) {
        if from != to {
            self.remove(from, &id);
            self.insert(to, id);
        }
    }

    /// All record ids in a partition, in id order
    pub fn get(&self, partition: &Partition) -> Option<&BTreeSet<RecordId>> {
        self.index.get(partition)
    }

    /// Number of records in a partition
    pub fn count(&self, partition: &Partition) -> usize {
        self.index.get(partition).map_or(0, BTreeSet::len)
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.index.clear();
    }
}

/// Secondary index: RecordKind → record ids
#[derive(Debug, Default)]
pub struct KindIndex {
    index: HashMap<RecordKind, BTreeSet<RecordId>>,
}

impl KindIndex {
    /// Create a new empty KindIndex
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record to a kind's set
    pub fn insert(&mut self, kind: RecordKind, id: RecordId) {
        self.index.entry(kind).or_default().insert(id);
    }

    /// Remove a record from a kind's set
    pub fn remove(&mut self, kind: RecordKind, id: &RecordId) {
        if let Some(ids) = self.index.get_mut(&kind) {
            ids.remove(id);
            if ids.is_empty() {
                self.index.remove(&kind);
            }
        }
    }

    /// All record ids of a kind, in id order
    pub fn get(&self, kind: &RecordKind) -> Option<&BTreeSet<RecordId>> {
        self.index.get(kind)
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.index.clear();
    }
}

/// Adjacency index: every edge is filed under both of its endpoints
#[derive(Debug, Default)]
pub struct EdgeIndex {
    edges: BTreeSet<Edge>,
    touching: HashMap<RecordId, BTreeSet<Edge>>,
}

impl EdgeIndex {
    /// Create a new empty EdgeIndex
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an edge; returns false if it was already present
    pub fn insert(&mut self, edge: Edge) -> bool {
        if !self.edges.insert(edge) {
            return false;
        }
        self.touching.entry(edge.from).or_default().insert(edge);
        self.touching.entry(edge.to).or_default().insert(edge);
        true
    }

    /// Remove an edge; returns false if it was absent
    pub fn remove(&mut self, edge: &Edge) -> bool {
        if !self.edges.remove(edge) {
            return false;
        }
        for endpoint in [edge.from, edge.to] {
            if let Some(set) = self.touching.get_mut(&endpoint) {
                set.remove(edge);
                if set.is_empty() {
                    self.touching.remove(&endpoint);
                }
            }
        }
        true
    }

    /// Remove every edge touching a record and return them
    pub fn remove_record(&mut self, id: &RecordId) -> Vec<Edge> {
        let edges = self.touching(id);
        for edge in &edges {
            self.remove(edge);
        }
        edges
    }

    /// Edges with `id` as source or target
    pub fn touching(&self, id: &RecordId) -> Vec<Edge> {
        self.touching
            .get(id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Edges with `id` as source
    pub fn outgoing(&self, id: &RecordId) -> Vec<Edge> {
        self.touching
            .get(id)
            .map(|set| set.iter().filter(|e| e.from == *id).copied().collect())
            .unwrap_or_default()
    }

    /// Edges with `id` as target
    pub fn incoming(&self, id: &RecordId) -> Vec<Edge> {
        self.touching
            .get(id)
            .map(|set| set.iter().filter(|e| e.to == *id).copied().collect())
            .unwrap_or_default()
    }

    /// Whether the edge is present
    pub fn contains(&self, edge: &Edge) -> bool {
        self.edges.contains(edge)
    }

    /// Every edge, in order
    pub fn iter(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Number of edges
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether there are no edges
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.edges.clear();
        self.touching.clear();
    }
}
