//! Back-reference validation of override holders.
//!
//! Holders and entry buffers reference each other both ways. This pass
//! rebuilds the forward map (who lists whom) and audits every holder
//! against it: a holder nobody lists, or whose recorded owner disagrees
//! with the listing node, is deleted with its references scrubbed. A
//! holder that only lost its owner field or sentinel tag while the
//! forward reference is intact is repaired in place instead.

use laneway_core::{HolderId, LaneOverrides, NodeId, RoadNetwork};
use rayon::prelude::*;
use tracing::debug;

use crate::commands::{CommandBuffer, OverrideCommand};
use crate::dirty::DirtySet;
use crate::migration::report::{LoadIssue, LoadReport};

enum HolderPlan {
    Keep,
    Repair { owner: NodeId },
    Delete { node: Option<NodeId> },
}

pub(crate) fn run(
    net: &RoadNetwork,
    overrides: &mut LaneOverrides,
    report: &mut LoadReport,
    dirty: &mut DirtySet,
) {
    let listed = overrides.holders_listed();
    let mut holder_ids = overrides.holder_ids();
    holder_ids.sort_unstable();

    let plans: Vec<(HolderId, HolderPlan)> = holder_ids
        .par_iter()
        .map(|&id| {
            let plan = plan_holder(net, overrides, listed.get(&id).copied(), id);
            (id, plan)
        })
        .collect();

    let mut buffer = CommandBuffer::new();
    for (id, plan) in plans {
        match plan {
            HolderPlan::Keep => {}
            HolderPlan::Repair { owner } => {
                buffer.push(OverrideCommand::RepairHolder { holder: id, owner });
                let applied = buffer.apply(overrides);
                report.mutations += applied;
                report.repaired_holders += applied;
                debug!(holder = %id, owner = %owner, "holder back-reference repaired");
            }
            HolderPlan::Delete { node } => {
                buffer.push(OverrideCommand::DeleteHolder { holder: id });
                report.mutations += buffer.apply(overrides);
                report.deleted_holders += 1;
                report.record(LoadIssue::BrokenBackReference { holder: id, node });
                if let Some(node) = node {
                    dirty.mark_around(net, node);
                }
                debug!(holder = %id, "holder back-reference broken, deleted");
            }
        }
    }
}

fn plan_holder(
    net: &RoadNetwork,
    overrides: &LaneOverrides,
    listed: Option<NodeId>,
    id: HolderId,
) -> HolderPlan {
    let Some(holder) = overrides.holder(id) else {
        return HolderPlan::Keep;
    };
    match (holder.owner, listed) {
        (Some(owner), Some(node)) if owner == node && net.contains_node(owner) => {
            if holder.tagged {
                HolderPlan::Keep
            } else {
                HolderPlan::Repair { owner }
            }
        }
        // Owner lost but the forward reference is intact.
        (None, Some(node)) if net.contains_node(node) => HolderPlan::Repair { owner: node },
        (owner, node) => HolderPlan::Delete { node: node.or(owner) },
    }
}
