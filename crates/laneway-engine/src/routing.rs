//! Node routing: materializes an intersection's lane set.
//!
//! Default connectivity joins every arriving lane end to every departing
//! lane end on a different edge that shares a travel method. A stored
//! override suppresses default generation for its lane end and materializes
//! the holder's connection list instead. Turn restrictions never remove a
//! default lane, they mark it forbidden; the pathfinder upstream weighs
//! that, the tool renders it.

use laneway_core::{
    classify_turn, Bezier, LaneEnd, LaneOverrides, NodeId, NodeLane, PathMethod, RoadNetwork,
    SideFlags, Turn,
};
use tracing::trace;

use crate::connectors::{generate_connectors, Connector};
use crate::error::EngineError;

/// Rebuilds `node`'s lane set from its connectors and the stored
/// overrides. Returns the number of lanes materialized.
pub fn rebuild_node_lanes(
    net: &mut RoadNetwork,
    overrides: &LaneOverrides,
    node: NodeId,
) -> Result<usize, EngineError> {
    let connectors = generate_connectors(net, node)?;
    let lanes = build_lanes(net, overrides, node, &connectors)?;
    let count = lanes.len();
    net.set_node_lanes(node, lanes)?;
    trace!(node = %node, lanes = count, "rebuilt node lanes");
    Ok(count)
}

fn build_lanes(
    net: &RoadNetwork,
    overrides: &LaneOverrides,
    node: NodeId,
    connectors: &[Connector],
) -> Result<Vec<NodeLane>, EngineError> {
    let mut lanes = Vec::new();
    for source in connectors.iter().filter(|c| c.role.is_source()) {
        if let Some(entry) = overrides.entry(node, source.lane_end()) {
            let Some(holder) = overrides.holder(entry.holder) else {
                continue;
            };
            for stored in &holder.connections {
                if stored.source_end() != source.lane_end() {
                    continue;
                }
                let Some(target) = find_target(connectors, stored.target_end()) else {
                    // Stale target; validation owns the cleanup.
                    continue;
                };
                lanes.push(NodeLane {
                    source: stored.source_end(),
                    target: stored.target_end(),
                    curve: curve(source, target),
                    method: stored.method,
                    is_unsafe: stored.is_unsafe,
                    is_forbidden: false,
                });
            }
            continue;
        }

        let restrictions = arriving_restrictions(net, node, source)?;
        for target in connectors.iter().filter(|c| c.role.is_target()) {
            if target.edge == source.edge {
                continue;
            }
            let method = PathMethod::between(source.class, target.class);
            if method.is_empty() {
                continue;
            }
            let turn = classify_turn(source.direction, target.direction);
            lanes.push(NodeLane {
                source: source.lane_end(),
                target: target.lane_end(),
                curve: curve(source, target),
                method,
                is_unsafe: false,
                is_forbidden: forbids(restrictions, turn),
            });
        }
    }
    Ok(lanes)
}

fn curve(source: &Connector, target: &Connector) -> Bezier {
    Bezier::connect(
        source.position,
        source.direction,
        target.position,
        target.direction,
    )
}

fn find_target(connectors: &[Connector], end: LaneEnd) -> Option<&Connector> {
    connectors
        .iter()
        .find(|c| c.lane_end() == end && c.role.is_target())
}

/// Turn-restriction flags governing an arriving lane end: the right side
/// of the composition when the node is the edge's end, the left side when
/// it is the start.
fn arriving_restrictions(
    net: &RoadNetwork,
    node: NodeId,
    source: &Connector,
) -> Result<SideFlags, EngineError> {
    let edge = net
        .edge(source.edge)
        .ok_or(laneway_core::CoreError::EdgeNotFound { id: source.edge })?;
    let flags = &edge.composition.flags;
    Ok(if net.is_end(source.edge, node)? {
        flags.right.turns()
    } else {
        flags.left.turns()
    })
}

fn forbids(restrictions: SideFlags, turn: Turn) -> bool {
    match turn {
        Turn::Left => restrictions.intersects(SideFlags::FORBID_LEFT),
        Turn::Straight => restrictions.intersects(SideFlags::FORBID_STRAIGHT),
        Turn::Right => restrictions.intersects(SideFlags::FORBID_RIGHT),
        Turn::UTurn => false,
    }
}
