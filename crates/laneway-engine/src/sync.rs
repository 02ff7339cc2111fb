//! Topology sync: keeps stored overrides attached across structural edits.
//!
//! Runs once per edit step. For every override-owning node the step could
//! have touched, an old-to-new edge remap is built over the node's current
//! edges; entries and connections are rewritten through it, and anything
//! that cannot be remapped is dropped. Replacement only carries an
//! override when the new edge is composition-equivalent to the old one at
//! this node; a recomposition that changes the lane table, the orientation
//! or the restriction flags invalidates the stored indexes, so the
//! override goes instead of silently pointing at the wrong lane.

use std::collections::HashMap;

use laneway_core::{
    EditStep, EdgeId, GeneratedConnection, LaneEnd, LaneOverrides, NodeId, ReplacedEdge,
    RoadNetwork,
};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::commands::{CommandBuffer, OverrideCommand};
use crate::dirty::DirtySet;

/// What one sync run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncOutcome {
    /// Nodes whose stored overrides changed.
    pub affected: Vec<NodeId>,
    pub remapped_entries: usize,
    pub dropped_entries: usize,
    pub dropped_connections: usize,
    pub mutations: usize,
}

#[derive(Debug, Default)]
struct NodePlan {
    commands: Vec<OverrideCommand>,
    remapped_entries: usize,
    dropped_entries: usize,
    dropped_connections: usize,
}

/// Re-synchronizes stored overrides with the network after an edit step.
pub fn run_sync(
    net: &RoadNetwork,
    overrides: &mut LaneOverrides,
    step: &EditStep,
    dirty: &mut DirtySet,
) -> SyncOutcome {
    let mut outcome = SyncOutcome::default();
    if step.is_empty() {
        return outcome;
    }

    let mut nodes: Vec<NodeId> = overrides
        .nodes()
        .filter(|n| !step.is_created(*n))
        .collect();
    nodes.sort_unstable();

    let plans: Vec<(NodeId, NodePlan)> = nodes
        .par_iter()
        .map(|&node| (node, plan_node(net, overrides, step, node)))
        .collect();

    let mut buffer = CommandBuffer::new();
    for (node, plan) in plans {
        if plan.commands.is_empty() {
            continue;
        }
        outcome.remapped_entries += plan.remapped_entries;
        outcome.dropped_entries += plan.dropped_entries;
        outcome.dropped_connections += plan.dropped_connections;
        buffer.extend(plan.commands);
        let applied = buffer.apply(overrides);
        if applied > 0 {
            outcome.mutations += applied;
            outcome.affected.push(node);
            dirty.mark_around(net, node);
        }
    }

    if !outcome.affected.is_empty() {
        info!(
            nodes = outcome.affected.len(),
            remapped = outcome.remapped_entries,
            dropped_entries = outcome.dropped_entries,
            dropped_connections = outcome.dropped_connections,
            "override sync finished"
        );
    }
    outcome
}

fn plan_node(
    net: &RoadNetwork,
    overrides: &LaneOverrides,
    step: &EditStep,
    node: NodeId,
) -> NodePlan {
    let mut plan = NodePlan::default();

    if !net.contains_node(node) {
        plan.dropped_entries = overrides.entries(node).len();
        plan.commands.push(OverrideCommand::ResetNode { node });
        debug!(node = %node, "node gone, overrides reset");
        return plan;
    }

    let remap = build_remap(net, step, node);

    for entry in overrides.entries(node) {
        let Some(&new_edge) = remap.get(&entry.edge) else {
            debug!(node = %node, edge = %entry.edge, "entry edge unmapped, dropping");
            plan.dropped_entries += 1;
            plan.commands.push(OverrideCommand::DeleteEntry {
                node,
                end: entry.lane_end(),
            });
            continue;
        };

        let Some(holder) = overrides.holder(entry.holder) else {
            // Dangling holder reference; validation owns that case.
            continue;
        };

        let mut connections: Vec<GeneratedConnection> = Vec::with_capacity(holder.connections.len());
        let mut connections_changed = false;
        for stored in &holder.connections {
            let Some(&target_edge) = remap.get(&stored.target_edge) else {
                connections_changed = true;
                plan.dropped_connections += 1;
                debug!(node = %node, edge = %stored.target_edge, "connection target unmapped, dropping");
                continue;
            };
            // The source follows the entry's remap unconditionally; the
            // connections belong to this entry.
            let mut rewritten = *stored;
            rewritten.source_edge = new_edge;
            rewritten.target_edge = target_edge;
            if rewritten != *stored {
                connections_changed = true;
            }
            connections.push(rewritten);
        }

        let entry_changed = new_edge != entry.edge;
        if entry_changed {
            plan.remapped_entries += 1;
            plan.commands.push(OverrideCommand::RewriteEntry {
                node,
                old: entry.lane_end(),
                new: LaneEnd::new(new_edge, entry.lane_index),
            });
        }
        if connections_changed {
            plan.commands.push(OverrideCommand::ReplaceConnections {
                holder: entry.holder,
                connections,
            });
        }
    }

    plan
}

/// Old-to-new edge map at `node`: every current edge maps to itself, and
/// each replacement's original maps to its successor when the equivalence
/// check passes.
fn build_remap(net: &RoadNetwork, step: &EditStep, node: NodeId) -> HashMap<EdgeId, EdgeId> {
    let mut remap = HashMap::new();
    let Ok(connected) = net.connected_edges(node) else {
        return remap;
    };
    for edge in connected {
        remap.insert(edge, edge);
        if let Some(original) = step.original_of(edge) {
            if composition_equivalent(net, node, edge, original) {
                remap.insert(original.id, edge);
            }
        }
    }
    remap
}

/// Whether a replacement edge may inherit overrides the original held at
/// `node`: same side of the node, same general flags, same turn and track
/// side flags, identical lane table.
fn composition_equivalent(
    net: &RoadNetwork,
    node: NodeId,
    new_edge: EdgeId,
    original: &ReplacedEdge,
) -> bool {
    let old_side = if original.end == node {
        true
    } else if original.start == node {
        false
    } else {
        return false;
    };
    let Ok(new_side) = net.is_end(new_edge, node) else {
        return false;
    };
    if old_side != new_side {
        return false;
    }
    let Some(new) = net.edge(new_edge) else {
        return false;
    };
    let old_flags = &original.composition.flags;
    let new_flags = &new.composition.flags;
    old_flags.general == new_flags.general
        && old_flags.left.turns() == new_flags.left.turns()
        && old_flags.left.tracks() == new_flags.left.tracks()
        && old_flags.right.turns() == new_flags.right.turns()
        && old_flags.right.tracks() == new_flags.right.tracks()
        && original.composition.lanes == new.composition.lanes
}
