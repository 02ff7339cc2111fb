//! Recompute tracking.
//!
//! Every override mutation records the nodes and edges whose derived state
//! (node lanes, render caches) must be rebuilt. The set is drained by
//! whoever owns the recompute loop; the engine only fills it.

use std::collections::HashSet;

use laneway_core::{EdgeId, NodeId, RoadNetwork};

/// Nodes and edges awaiting recomputation.
#[derive(Debug, Clone, Default)]
pub struct DirtySet {
    nodes: HashSet<NodeId>,
    edges: HashSet<EdgeId>,
}

impl DirtySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_node(&mut self, node: NodeId) {
        self.nodes.insert(node);
    }

    pub fn mark_edge(&mut self, edge: EdgeId) {
        self.edges.insert(edge);
    }

    /// Marks a node, every edge touching it, and those edges' opposite
    /// nodes. A node no longer in the network still marks itself.
    pub fn mark_around(&mut self, net: &RoadNetwork, node: NodeId) {
        self.nodes.insert(node);
        let Ok(edges) = net.connected_edges(node) else {
            return;
        };
        for edge in edges {
            self.edges.insert(edge);
            if let Ok(opposite) = net.opposite_end(edge, node) {
                self.nodes.insert(opposite);
            }
        }
    }

    pub fn merge(&mut self, other: DirtySet) {
        self.nodes.extend(other.nodes);
        self.edges.extend(other.edges);
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    pub fn contains_edge(&self, edge: EdgeId) -> bool {
        self.edges.contains(&edge)
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.iter().copied()
    }

    pub fn is_clean(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn total(&self) -> usize {
        self.nodes.len() + self.edges.len()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use laneway_core::LaneComposition;

    #[test]
    fn mark_around_spreads_to_neighbors() {
        let mut net = RoadNetwork::new();
        let a = net.add_node(Vec3::ZERO);
        let b = net.add_node(Vec3::new(60.0, 0.0, 0.0));
        let c = net.add_node(Vec3::new(120.0, 0.0, 0.0));
        let e1 = net.add_edge(a, b, LaneComposition::two_way(1)).unwrap();
        let e2 = net.add_edge(b, c, LaneComposition::two_way(1)).unwrap();
        let mut dirty = DirtySet::new();
        dirty.mark_around(&net, b);
        assert!(dirty.contains_node(a) && dirty.contains_node(b) && dirty.contains_node(c));
        assert!(dirty.contains_edge(e1) && dirty.contains_edge(e2));
        assert_eq!(dirty.total(), 5);
    }

    #[test]
    fn missing_node_still_marks_itself() {
        let net = RoadNetwork::new();
        let mut dirty = DirtySet::new();
        dirty.mark_around(&net, laneway_core::NodeId(9));
        assert!(dirty.contains_node(laneway_core::NodeId(9)));
        assert_eq!(dirty.total(), 1);
    }
}
