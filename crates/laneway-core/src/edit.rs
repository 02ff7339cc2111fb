//! Edit-step recording.
//!
//! Every structural edit operation on [`RoadNetwork`](crate::network::RoadNetwork)
//! records what it replaced, created, and deleted into an [`EditStep`].
//! Topology sync consumes the step to keep stored overrides pointed at the
//! surviving edges. Steps live for one edit and are never persisted.

use std::collections::{HashMap, HashSet};

use crate::composition::LaneComposition;
use crate::id::{EdgeId, NodeId};

/// Snapshot of an edge at the moment it was replaced. The edge itself is
/// gone from the network by the time sync runs, so the snapshot carries
/// everything the equivalence check needs.
#[derive(Debug, Clone)]
pub struct ReplacedEdge {
    pub id: EdgeId,
    pub start: NodeId,
    pub end: NodeId,
    pub composition: LaneComposition,
}

/// What one edit step did to the network.
///
/// `originals` is keyed by the NEW edge id: a split maps both halves back
/// to the same original, which a map keyed the other way around could not
/// represent.
#[derive(Debug, Clone, Default)]
pub struct EditStep {
    originals: HashMap<EdgeId, ReplacedEdge>,
    created_nodes: HashSet<NodeId>,
    deleted_edges: HashSet<EdgeId>,
}

impl EditStep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_replacement(&mut self, new_edge: EdgeId, original: ReplacedEdge) {
        self.originals.insert(new_edge, original);
    }

    pub fn record_created_node(&mut self, node: NodeId) {
        self.created_nodes.insert(node);
    }

    pub fn record_deleted_edge(&mut self, edge: EdgeId) {
        self.deleted_edges.insert(edge);
    }

    /// The edge a replacement superseded, if `new_edge` came from one.
    pub fn original_of(&self, new_edge: EdgeId) -> Option<&ReplacedEdge> {
        self.originals.get(&new_edge)
    }

    /// Iterates `(new edge, original)` replacement pairs.
    pub fn replacements(&self) -> impl Iterator<Item = (EdgeId, &ReplacedEdge)> + '_ {
        self.originals.iter().map(|(id, r)| (*id, r))
    }

    pub fn is_created(&self, node: NodeId) -> bool {
        self.created_nodes.contains(&node)
    }

    pub fn is_deleted(&self, edge: EdgeId) -> bool {
        self.deleted_edges.contains(&edge)
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty() && self.created_nodes.is_empty() && self.deleted_edges.is_empty()
    }
}
