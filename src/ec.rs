//! Parallel, alpha-indexed arrays holding the state of every equivalence class.

use crate::geometry::HyperRectangle;
use crate::rule::Rule;
use num::BigUint;
use petgraph::graph::NodeIndex;
use std::collections::HashMap;

/// Which EC representation the engine maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Live ECs partition the full space; every header maps to exactly one EC.
    Classic,
    /// Difference-of-cubes: a region is a rectangle minus the union of descendant rectangles.
    Doc,
}

/// Per-EC state, keyed by alpha-index. Entities are only ever appended; EC indices are stable
/// and monotonically increasing for the lifetime of the engine.
#[derive(Debug, Clone)]
pub struct EcStore {
    backend: Backend,
    rects: Vec<HyperRectangle>,
    owners: Vec<HashMap<NodeIndex, Rule>>,
    /// difference-of-cubes DAG children; always empty in `Backend::Classic`.
    doc_children: Vec<Vec<usize>>,
    /// difference-of-cubes assigned volume; unused (left at zero) in `Backend::Classic`.
    doc_assigned_volume: Vec<BigUint>,
}

impl EcStore {
    /// A fresh store with a single EC (index 0) spanning `full_space`.
    pub fn new(full_space: HyperRectangle, backend: Backend) -> Self {
        let vol = full_space.volume();
        Self {
            backend,
            rects: vec![full_space.with_ec(0)],
            owners: vec![HashMap::new()],
            doc_children: vec![Vec::new()],
            doc_assigned_volume: vec![vol],
        }
    }

    /// Which representation this store maintains.
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Number of live ECs.
    pub fn len(&self) -> usize {
        self.rects.len()
    }

    /// Whether the store holds no ECs (never true after construction).
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Allocate a fresh EC with rectangle `rect` (re-tagged with the new index), an empty owner
    /// map, and (for DoC) assigned volume `assigned_volume`. Returns the new alpha-index.
    pub fn alloc(&mut self, rect: HyperRectangle, assigned_volume: BigUint) -> usize {
        let idx = self.rects.len();
        self.rects.push(rect.with_ec(idx));
        self.owners.push(HashMap::new());
        self.doc_children.push(Vec::new());
        self.doc_assigned_volume.push(assigned_volume);
        idx
    }

    /// The rectangle of EC `idx`.
    pub fn rect(&self, idx: usize) -> &HyperRectangle {
        &self.rects[idx]
    }

    /// Overwrite the rectangle of EC `idx` in place (used when an existing EC's slot is reused
    /// for a new, smaller sub-rectangle during classic splitting).
    pub fn set_rect(&mut self, idx: usize, rect: HyperRectangle) {
        self.rects[idx] = rect.with_ec(idx);
    }

    /// The owner map of EC `idx`: node -> highest-priority rule currently matching it there.
    pub fn owner_map(&self, idx: usize) -> &HashMap<NodeIndex, Rule> {
        &self.owners[idx]
    }

    /// Mutable access to the owner map of EC `idx`.
    pub fn owner_map_mut(&mut self, idx: usize) -> &mut HashMap<NodeIndex, Rule> {
        &mut self.owners[idx]
    }

    /// Overwrite the owner map of EC `idx` wholesale (used to duplicate a parent's owner map into
    /// a freshly split-off child).
    pub fn set_owner_map(&mut self, idx: usize, map: HashMap<NodeIndex, Rule>) {
        self.owners[idx] = map;
    }

    /// (DoC) Children of EC `idx` in the containment DAG.
    pub fn children(&self, idx: usize) -> &[usize] {
        &self.doc_children[idx]
    }

    /// (DoC) Record that `child` is a child of `parent` in the containment DAG.
    pub fn add_child(&mut self, parent: usize, child: usize) {
        self.doc_children[parent].push(child);
    }

    /// (DoC) Assigned volume of EC `idx`.
    pub fn assigned_volume(&self, idx: usize) -> &BigUint {
        &self.doc_assigned_volume[idx]
    }

    /// (DoC) Overwrite the assigned volume of EC `idx`.
    pub fn set_assigned_volume(&mut self, idx: usize, v: BigUint) {
        self.doc_assigned_volume[idx] = v;
    }

    /// Indices of every live EC.
    pub fn all_indices(&self) -> std::ops::Range<usize> {
        0..self.rects.len()
    }
}
