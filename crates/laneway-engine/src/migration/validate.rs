//! Structural validation of stored overrides against the live network.
//!
//! Fail-fast per node, fail-soft across nodes: the first unrecoverable
//! finding resets the whole node's override set and validation moves on to
//! the next node. One repair is attempted before rejecting: an unsafe
//! connection that still carries TRACK against a lane that lost its track
//! gets the TRACK bit stripped, because that is a composition downgrade
//! the player meant to survive, not a stale reference.

use laneway_core::{LaneOverrides, NodeId, PathMethod, RoadNetwork};
use rayon::prelude::*;
use tracing::debug;

use crate::commands::{CommandBuffer, OverrideCommand};
use crate::dirty::DirtySet;
use crate::migration::report::{LoadIssue, LoadReport};

enum NodePlan {
    /// Nothing to do, or repairs to apply in place.
    Keep(Vec<OverrideCommand>),
    /// Unrecoverable; reset the node and record the issue.
    Reset(LoadIssue),
    /// Empty buffer left behind by unchecked loading; silent cleanup.
    Scrub,
}

pub(crate) fn run(
    net: &RoadNetwork,
    overrides: &mut LaneOverrides,
    report: &mut LoadReport,
    dirty: &mut DirtySet,
) {
    let mut nodes: Vec<NodeId> = overrides.nodes().collect();
    nodes.sort_unstable();

    let plans: Vec<(NodeId, NodePlan)> = nodes
        .par_iter()
        .map(|&node| (node, check_node(net, overrides, node)))
        .collect();

    let mut buffer = CommandBuffer::new();
    for (node, plan) in plans {
        match plan {
            NodePlan::Keep(commands) => {
                if commands.is_empty() {
                    continue;
                }
                let repairs = commands.len();
                buffer.extend(commands);
                report.mutations += buffer.apply(overrides);
                debug!(node = %node, repairs, "override methods repaired");
            }
            NodePlan::Reset(issue) => {
                buffer.push(OverrideCommand::ResetNode { node });
                report.mutations += buffer.apply(overrides);
                report.reset_nodes += 1;
                debug!(node = %node, issue = %issue, "override validation failed, node reset");
                report.record(issue);
                dirty.mark_around(net, node);
            }
            NodePlan::Scrub => {
                buffer.push(OverrideCommand::ResetNode { node });
                buffer.apply(overrides);
            }
        }
    }
}

fn check_node(net: &RoadNetwork, overrides: &LaneOverrides, node: NodeId) -> NodePlan {
    let entries = overrides.entries(node);
    let Some(first) = entries.first() else {
        return NodePlan::Scrub;
    };
    if !net.contains_node(node) {
        return NodePlan::Reset(LoadIssue::StaleReference {
            node,
            edge: first.edge,
        });
    }

    let mut repairs = Vec::new();
    for entry in entries {
        let Some(holder) = overrides.holder(entry.holder) else {
            return NodePlan::Reset(LoadIssue::BrokenBackReference {
                holder: entry.holder,
                node: Some(node),
            });
        };
        // Entry edge must exist, touch this node, and resolve the lane.
        let stale = || LoadIssue::StaleReference {
            node,
            edge: entry.edge,
        };
        let Some(edge) = net.edge(entry.edge) else {
            return NodePlan::Reset(stale());
        };
        if net.is_end(entry.edge, node).is_err() {
            return NodePlan::Reset(stale());
        }
        if edge.composition.lane(entry.lane_index).is_none() {
            return NodePlan::Reset(stale());
        }

        for (index, stored) in holder.connections.iter().enumerate() {
            if stored.source_edge != entry.edge || stored.lane_indexes.0 != entry.lane_index {
                return NodePlan::Reset(LoadIssue::StaleReference {
                    node,
                    edge: stored.source_edge,
                });
            }
            let target_stale = || LoadIssue::StaleReference {
                node,
                edge: stored.target_edge,
            };
            let Some(target) = net.edge(stored.target_edge) else {
                return NodePlan::Reset(target_stale());
            };
            if net.is_end(stored.target_edge, node).is_err() {
                return NodePlan::Reset(target_stale());
            }
            let Some(target_row) = target.composition.lane(stored.lane_indexes.1) else {
                return NodePlan::Reset(target_stale());
            };

            if !stored.method.compatible_with(target_row.flags) {
                let stripped = stored.method.without(PathMethod::TRACK);
                let track_loss = stored.is_unsafe
                    && stored.method.intersects(PathMethod::TRACK)
                    && stripped.compatible_with(target_row.flags);
                if track_loss {
                    repairs.push(OverrideCommand::PatchMethod {
                        holder: entry.holder,
                        index,
                        method: stripped,
                    });
                } else {
                    return NodePlan::Reset(LoadIssue::IncompatibleComposition {
                        node,
                        source_edge: stored.source_edge,
                        target_edge: stored.target_edge,
                    });
                }
            }
        }
    }
    NodePlan::Keep(repairs)
}
