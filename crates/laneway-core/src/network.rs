//! RoadNetwork: the road-graph container.
//!
//! [`RoadNetwork`] is the single entry point for constructing and querying
//! the road graph. Nodes are intersections, edges are road segments carrying
//! a [`LaneComposition`]. The graph is a petgraph `StableGraph`; typed ids
//! are mapped to graph indices internally and ids are never reused, so a
//! structural replacement always yields an edge id distinct from every id
//! the network has ever handed out.
//!
//! Structural edit operations (`replace_edge`, `invert_edge`, `split_edge`,
//! `merge_edges`, `delete_edge`) record what they superseded into an
//! [`EditStep`], which is what keeps stored overrides attached to the right
//! edges after an edit.

use std::collections::HashMap;

use glam::Vec3;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableGraph;
use petgraph::Directed;
use serde::{Deserialize, Serialize};

use crate::composition::{end_lanes, EndLane, LaneComposition};
use crate::edit::{EditStep, ReplacedEdge};
use crate::error::CoreError;
use crate::geometry::{edge_right, Bezier};
use crate::id::{EdgeId, NodeId};
use crate::lane::{GeneralFlags, LaneFlags, PathMethod};

/// Identity of one lane end: an edge and a lane index into its composition.
/// Which end of the edge is meant is implicit from the node in whose
/// context the value is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LaneEnd {
    pub edge: EdgeId,
    pub lane_index: u32,
}

impl LaneEnd {
    pub fn new(edge: EdgeId, lane_index: u32) -> Self {
        LaneEnd { edge, lane_index }
    }
}

/// A runtime lane derived from one composition row when its edge is
/// created. The curve runs start to end in the edge's frame; `flags` have
/// composition-level inversion already folded in, so INVERT and the
/// DISCONNECTED bits can be read without consulting the composition flags.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeLane {
    pub flags: LaneFlags,
    pub curve: Bezier,
}

impl EdgeLane {
    /// Curve endpoint at the given end of the edge.
    pub fn end_position(&self, is_end: bool) -> Vec3 {
        if is_end {
            self.curve.d
        } else {
            self.curve.a
        }
    }

    /// Travel direction at the given end, oriented the way traffic moves.
    pub fn travel_direction(&self, is_end: bool) -> Vec3 {
        let t = if is_end { 1.0 } else { 0.0 };
        let tangent = self.curve.tangent(t);
        if self.flags.intersects(LaneFlags::INVERT) {
            -tangent
        } else {
            tangent
        }
    }
}

/// One materialized intersection lane: the curve traffic follows from an
/// arriving lane end to a departing one across the node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeLane {
    pub source: LaneEnd,
    pub target: LaneEnd,
    pub curve: Bezier,
    pub method: PathMethod,
    pub is_unsafe: bool,
    pub is_forbidden: bool,
}

/// An intersection node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadNode {
    pub id: NodeId,
    pub position: Vec3,
    /// Current intersection lane set, rebuilt by routing after changes.
    pub lanes: Vec<NodeLane>,
}

/// A road segment between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadEdge {
    pub id: EdgeId,
    pub composition: LaneComposition,
    /// Runtime lanes, one per composition row, derived on creation.
    pub lanes: Vec<EdgeLane>,
}

/// The road-graph container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadNetwork {
    graph: StableGraph<RoadNode, RoadEdge, Directed, u32>,
    node_indices: HashMap<NodeId, NodeIndex<u32>>,
    edge_indices: HashMap<EdgeId, EdgeIndex<u32>>,
    next_node_id: u32,
    next_edge_id: u32,
}

impl Default for RoadNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl RoadNetwork {
    pub fn new() -> Self {
        RoadNetwork {
            graph: StableGraph::new(),
            node_indices: HashMap::new(),
            edge_indices: HashMap::new(),
            next_node_id: 0,
            next_edge_id: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> Option<&RoadNode> {
        let idx = self.node_indices.get(&id)?;
        self.graph.node_weight(*idx)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&RoadEdge> {
        let idx = self.edge_indices.get(&id)?;
        self.graph.edge_weight(*idx)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node_indices.contains_key(&id)
    }

    pub fn contains_edge(&self, id: EdgeId) -> bool {
        self.edge_indices.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Iterates node ids in unspecified order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_weights().map(|n| n.id)
    }

    /// Iterates edge ids in unspecified order.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.graph.edge_weights().map(|e| e.id)
    }

    /// Start and end nodes of an edge, in edge direction.
    pub fn edge_endpoints(&self, edge: EdgeId) -> Result<(NodeId, NodeId), CoreError> {
        let idx = self.edge_index(edge)?;
        let (s, e) = self
            .graph
            .edge_endpoints(idx)
            .ok_or(CoreError::EdgeNotFound { id: edge })?;
        Ok((self.graph[s].id, self.graph[e].id))
    }

    /// Whether `node` is the end node of `edge` (false: the start node).
    pub fn is_end(&self, edge: EdgeId, node: NodeId) -> Result<bool, CoreError> {
        let (start, end) = self.edge_endpoints(edge)?;
        if node == end {
            Ok(true)
        } else if node == start {
            Ok(false)
        } else {
            Err(CoreError::EdgeNotConnected { edge, node })
        }
    }

    /// The node at the other end of `edge` from `node`.
    pub fn opposite_end(&self, edge: EdgeId, node: NodeId) -> Result<NodeId, CoreError> {
        let (start, end) = self.edge_endpoints(edge)?;
        if node == start {
            Ok(end)
        } else if node == end {
            Ok(start)
        } else {
            Err(CoreError::EdgeNotConnected { edge, node })
        }
    }

    /// Every edge touching `node`, sorted by id for deterministic
    /// iteration downstream.
    pub fn connected_edges(&self, node: NodeId) -> Result<Vec<EdgeId>, CoreError> {
        let idx = self.node_index(node)?;
        let mut edges: Vec<EdgeId> = self
            .graph
            .edges_directed(idx, petgraph::Direction::Outgoing)
            .chain(self.graph.edges_directed(idx, petgraph::Direction::Incoming))
            .map(|e| e.weight().id)
            .collect();
        edges.sort_unstable();
        edges.dedup();
        Ok(edges)
    }

    pub fn node_position(&self, node: NodeId) -> Result<Vec3, CoreError> {
        Ok(self
            .node(node)
            .ok_or(CoreError::NodeNotFound { id: node })?
            .position)
    }

    /// Classifies every composition lane of `edge` at the `node` end.
    pub fn lanes_at(&self, edge: EdgeId, node: NodeId) -> Result<Vec<EndLane>, CoreError> {
        let is_end = self.is_end(edge, node)?;
        let e = self.edge(edge).ok_or(CoreError::EdgeNotFound { id: edge })?;
        Ok(end_lanes(&e.composition, is_end))
    }

    pub fn node_lanes(&self, node: NodeId) -> Result<&[NodeLane], CoreError> {
        Ok(&self
            .node(node)
            .ok_or(CoreError::NodeNotFound { id: node })?
            .lanes)
    }

    /// Replaces a node's materialized intersection lane set.
    pub fn set_node_lanes(&mut self, node: NodeId, lanes: Vec<NodeLane>) -> Result<(), CoreError> {
        let idx = self.node_index(node)?;
        self.graph[idx].lanes = lanes;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    pub fn add_node(&mut self, position: Vec3) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        let idx = self.graph.add_node(RoadNode {
            id,
            position,
            lanes: Vec::new(),
        });
        self.node_indices.insert(id, idx);
        id
    }

    /// Adds an edge from `start` to `end` with the given composition and
    /// derives its runtime lanes.
    pub fn add_edge(
        &mut self,
        start: NodeId,
        end: NodeId,
        composition: LaneComposition,
    ) -> Result<EdgeId, CoreError> {
        let id = self.insert_edge(start, end, composition)?;

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Structural edits
    // -----------------------------------------------------------------------

    /// Replaces an edge's composition in place. The edge keeps its
    /// endpoints but gets a fresh id; the old edge is recorded in `step`.
    pub fn replace_edge(
        &mut self,
        edge: EdgeId,
        composition: LaneComposition,
        step: &mut EditStep,
    ) -> Result<EdgeId, CoreError> {
        let (snapshot, start, end) = self.take_edge(edge)?;
        let new_id = self.insert_edge(start, end, composition)?;
        step.record_replacement(new_id, snapshot);

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(new_id)
    }

    /// Reverses an edge's direction, keeping its composition.
    pub fn invert_edge(&mut self, edge: EdgeId, step: &mut EditStep) -> Result<EdgeId, CoreError> {
        let (snapshot, start, end) = self.take_edge(edge)?;
        let composition = snapshot.composition.clone();
        let new_id = self.insert_edge(end, start, composition)?;
        step.record_replacement(new_id, snapshot);

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(new_id)
    }

    /// Splits an edge by inserting a node at `at`. Both halves carry the
    /// original composition and both map back to the original edge in
    /// `step`; the new middle node is recorded as created.
    pub fn split_edge(
        &mut self,
        edge: EdgeId,
        at: Vec3,
        step: &mut EditStep,
    ) -> Result<(NodeId, [EdgeId; 2]), CoreError> {
        let (snapshot, start, end) = self.take_edge(edge)?;
        let mid = self.add_node(at);
        step.record_created_node(mid);
        let first = self.insert_edge(start, mid, snapshot.composition.clone())?;
        let second = self.insert_edge(mid, end, snapshot.composition.clone())?;
        step.record_replacement(first, snapshot.clone());
        step.record_replacement(second, snapshot);

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok((mid, [first, second]))
    }

    /// Merges two edges that meet at a degree-two node, removing the node.
    /// The merged edge keeps `a`'s composition and direction sense and maps
    /// back to `a`; `b` is recorded as deleted.
    pub fn merge_edges(
        &mut self,
        a: EdgeId,
        b: EdgeId,
        step: &mut EditStep,
    ) -> Result<EdgeId, CoreError> {
        let (a_start, a_end) = self.edge_endpoints(a)?;
        let (b_start, b_end) = self.edge_endpoints(b)?;
        let shared = [a_start, a_end]
            .into_iter()
            .find(|n| *n == b_start || *n == b_end)
            .ok_or_else(|| CoreError::InvalidEdge {
                reason: format!("edges {a} and {b} share no node"),
            })?;
        if self.connected_edges(shared)?.len() != 2 {
            return Err(CoreError::InvalidEdge {
                reason: format!("node {shared} has other edges"),
            });
        }
        let b_outer = self.opposite_end(b, shared)?;
        let (snapshot, a_start, a_end) = self.take_edge(a)?;
        self.take_edge(b)?;
        step.record_deleted_edge(b);
        let composition = snapshot.composition.clone();
        let new_id = if a_end == shared {
            self.insert_edge(a_start, b_outer, composition)?
        } else {
            self.insert_edge(b_outer, a_end, composition)?
        };
        step.record_replacement(new_id, snapshot);
        self.remove_node(shared)?;

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(new_id)
    }

    /// Removes an edge outright and records the deletion in `step`.
    pub fn delete_edge(&mut self, edge: EdgeId, step: &mut EditStep) -> Result<(), CoreError> {
        self.take_edge(edge)?;
        step.record_deleted_edge(edge);

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn node_index(&self, id: NodeId) -> Result<NodeIndex<u32>, CoreError> {
        self.node_indices
            .get(&id)
            .copied()
            .ok_or(CoreError::NodeNotFound { id })
    }

    fn edge_index(&self, id: EdgeId) -> Result<EdgeIndex<u32>, CoreError> {
        self.edge_indices
            .get(&id)
            .copied()
            .ok_or(CoreError::EdgeNotFound { id })
    }

    fn insert_edge(
        &mut self,
        start: NodeId,
        end: NodeId,
        composition: LaneComposition,
    ) -> Result<EdgeId, CoreError> {
        if start == end {
            return Err(CoreError::InvalidEdge {
                reason: format!("edge would loop on node {start}"),
            });
        }
        let start_idx = self.node_index(start)?;
        let end_idx = self.node_index(end)?;
        let id = EdgeId(self.next_edge_id);
        self.next_edge_id += 1;
        let lanes = build_edge_lanes(
            self.graph[start_idx].position,
            self.graph[end_idx].position,
            &composition,
        );
        let idx = self.graph.add_edge(
            start_idx,
            end_idx,
            RoadEdge {
                id,
                composition,
                lanes,
            },
        );
        self.edge_indices.insert(id, idx);
        Ok(id)
    }

    /// Removes an edge, returning a replacement snapshot of it.
    fn take_edge(&mut self, edge: EdgeId) -> Result<(ReplacedEdge, NodeId, NodeId), CoreError> {
        let idx = self.edge_index(edge)?;
        let (s, e) = self
            .graph
            .edge_endpoints(idx)
            .ok_or(CoreError::EdgeNotFound { id: edge })?;
        let (start, end) = (self.graph[s].id, self.graph[e].id);
        let weight = self
            .graph
            .remove_edge(idx)
            .ok_or(CoreError::EdgeNotFound { id: edge })?;
        self.edge_indices.remove(&edge);
        let snapshot = ReplacedEdge {
            id: weight.id,
            start,
            end,
            composition: weight.composition,
        };
        Ok((snapshot, start, end))
    }

    fn remove_node(&mut self, node: NodeId) -> Result<(), CoreError> {
        let idx = self.node_index(node)?;
        self.graph.remove_node(idx);
        self.node_indices.remove(&node);
        Ok(())
    }

    /// Verifies the id maps and counters agree with the graph. Debug
    /// builds only.
    #[cfg(debug_assertions)]
    fn assert_consistency(&self) {
        assert_eq!(self.node_indices.len(), self.graph.node_count());
        assert_eq!(self.edge_indices.len(), self.graph.edge_count());
        for (id, idx) in &self.node_indices {
            let weight = self.graph.node_weight(*idx).expect("dangling node index");
            assert_eq!(weight.id, *id, "node id map out of sync");
            assert!(id.0 < self.next_node_id, "node counter behind live id");
        }
        for (id, idx) in &self.edge_indices {
            let weight = self.graph.edge_weight(*idx).expect("dangling edge index");
            assert_eq!(weight.id, *id, "edge id map out of sync");
            assert!(id.0 < self.next_edge_id, "edge counter behind live id");
        }
    }
}

/// Derives runtime lanes from a composition for an edge between the given
/// node positions.
fn build_edge_lanes(start: Vec3, end: Vec3, composition: &LaneComposition) -> Vec<EdgeLane> {
    let general_invert = composition
        .flags
        .general
        .intersects(GeneralFlags::INVERT);
    let right = edge_right(start, end);
    composition
        .lanes
        .iter()
        .map(|lane| {
            let offset = if general_invert {
                -lane.position.x
            } else {
                lane.position.x
            };
            let lift = Vec3::new(0.0, lane.position.y, 0.0);
            let a = start + right * offset + lift;
            let d = end + right * offset + lift;
            EdgeLane {
                flags: resolve_lane_flags(lane.flags, general_invert),
                curve: Bezier::line(a, d),
            }
        })
        .collect()
}

/// Folds a composition-level inversion into per-lane flags: the INVERT bit
/// flips and the DISCONNECTED bits swap ends.
fn resolve_lane_flags(flags: LaneFlags, general_invert: bool) -> LaneFlags {
    if !general_invert {
        return flags;
    }
    let mut resolved = flags.without(
        LaneFlags::INVERT | LaneFlags::DISCONNECTED_START | LaneFlags::DISCONNECTED_END,
    );
    if !flags.intersects(LaneFlags::INVERT) {
        resolved |= LaneFlags::INVERT;
    }
    if flags.intersects(LaneFlags::DISCONNECTED_START) {
        resolved |= LaneFlags::DISCONNECTED_END;
    }
    if flags.intersects(LaneFlags::DISCONNECTED_END) {
        resolved |= LaneFlags::DISCONNECTED_START;
    }
    resolved
}
