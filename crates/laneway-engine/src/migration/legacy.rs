//! Legacy repair: upgrades pre-descriptor save data.
//!
//! Data versions before cached descriptors stored connections with the
//! all-ones sentinel. This pass recomputes each sentinel descriptor from
//! the current compositions. A connection that cannot be recomputed means
//! the save and the network have diverged beyond repair for that node, so
//! the whole node is reset rather than loading half an override set.

use laneway_core::{LaneOverrides, NodeId, RoadNetwork};
use rayon::prelude::*;
use tracing::debug;

use crate::apply::descriptor_for;
use crate::commands::{CommandBuffer, OverrideCommand};
use crate::dirty::DirtySet;
use crate::migration::report::{LoadIssue, LoadReport};

struct NodePlan {
    node: NodeId,
    commands: Vec<OverrideCommand>,
    patched: usize,
    failed: bool,
}

pub(crate) fn run(
    net: &RoadNetwork,
    overrides: &mut LaneOverrides,
    report: &mut LoadReport,
    dirty: &mut DirtySet,
) {
    let mut nodes: Vec<NodeId> = overrides.nodes().collect();
    nodes.sort_unstable();

    let plans: Vec<NodePlan> = nodes
        .par_iter()
        .map(|&node| plan_node(net, overrides, node))
        .collect();

    let mut buffer = CommandBuffer::new();
    for plan in plans {
        if plan.commands.is_empty() {
            continue;
        }
        buffer.extend(plan.commands);
        report.mutations += buffer.apply(overrides);
        if plan.failed {
            report.reset_nodes += 1;
            report.record(LoadIssue::LegacySentinelData { node: plan.node });
            dirty.mark_around(net, plan.node);
            debug!(node = %plan.node, "legacy data unresolvable, node reset");
        } else {
            report.repaired_descriptors += plan.patched;
        }
    }
}

fn plan_node(net: &RoadNetwork, overrides: &LaneOverrides, node: NodeId) -> NodePlan {
    let mut plan = NodePlan {
        node,
        commands: Vec::new(),
        patched: 0,
        failed: false,
    };
    'entries: for entry in overrides.entries(node) {
        let Some(holder) = overrides.holder(entry.holder) else {
            continue;
        };
        for (index, stored) in holder.connections.iter().enumerate() {
            if stored.descriptor.is_valid() {
                continue;
            }
            match descriptor_for(net, stored.source_end(), stored.target_end()) {
                Ok(descriptor) => {
                    plan.patched += 1;
                    plan.commands.push(OverrideCommand::PatchDescriptor {
                        holder: entry.holder,
                        index,
                        descriptor,
                    });
                }
                Err(_) => {
                    plan.commands = vec![OverrideCommand::ResetNode { node }];
                    plan.patched = 0;
                    plan.failed = true;
                    break 'entries;
                }
            }
        }
    }
    plan
}
