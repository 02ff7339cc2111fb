//! Override apply: resolving tool requests into staged commands.
//!
//! Requests validate against the live connector set, derive the persisted
//! method flags and descriptor, and stage commands; nothing mutates until
//! the buffer is applied. Removal requests are deliberately lenient: a
//! triple that no longer exists applies as a no-op instead of erroring,
//! because the tool may race a concurrent edit.

use laneway_core::{
    GeneratedConnection, LaneDescriptor, LaneEnd, LaneOverrides, NodeId, PathMethod, RoadNetwork,
};
use tracing::debug;

use crate::commands::{CommandBuffer, OverrideCommand};
use crate::connectors::{generate_connectors, Connector};
use crate::dirty::DirtySet;
use crate::error::EngineError;

/// Tool modifier state accompanying an add request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestModifiers {
    /// Store the connection as unsafe (yield-everything).
    pub make_unsafe: bool,
    /// Force road-only method flags.
    pub road_only: bool,
    /// Force track-only method flags.
    pub track_only: bool,
}

/// Stages an add of `source -> target` at `node`.
pub fn request_add(
    net: &RoadNetwork,
    node: NodeId,
    source: LaneEnd,
    target: LaneEnd,
    modifiers: RequestModifiers,
    buffer: &mut CommandBuffer,
) -> Result<(), EngineError> {
    let connectors = generate_connectors(net, node)?;
    let source_connector = find(&connectors, source, true).ok_or(EngineError::UnknownLaneEnd {
        node,
        edge: source.edge,
        lane_index: source.lane_index,
    })?;
    let target_connector = find(&connectors, target, false).ok_or(EngineError::UnknownLaneEnd {
        node,
        edge: target.edge,
        lane_index: target.lane_index,
    })?;

    let method = if modifiers.road_only {
        PathMethod::ROAD
    } else if modifiers.track_only {
        PathMethod::TRACK
    } else {
        PathMethod::between(source_connector.class, target_connector.class)
    };
    let target_modes = lane_modes(net, target)?;
    if method.is_empty() || !method.compatible_with(target_modes) {
        return Err(EngineError::IncompatibleLaneEnds {
            source_edge: source.edge,
            source_lane: source.lane_index,
            target_edge: target.edge,
            target_lane: target.lane_index,
        });
    }

    let connection = GeneratedConnection {
        source_edge: source.edge,
        target_edge: target.edge,
        lane_indexes: (source.lane_index, target.lane_index),
        method,
        is_unsafe: modifiers.make_unsafe,
        descriptor: descriptor_for(net, source, target)?,
    };
    debug!(node = %node, %method, "staged override add");
    buffer.push(OverrideCommand::Upsert {
        node,
        source,
        connection,
    });
    Ok(())
}

/// Stages a removal of `source -> target` at `node`.
pub fn request_remove(
    net: &RoadNetwork,
    node: NodeId,
    source: LaneEnd,
    target: LaneEnd,
    buffer: &mut CommandBuffer,
) -> Result<(), EngineError> {
    if net.node(node).is_none() {
        return Err(laneway_core::CoreError::NodeNotFound { id: node }.into());
    }
    buffer.push(OverrideCommand::RemoveConnection {
        node,
        source,
        target,
    });
    Ok(())
}

/// Stages a full reset of a node's overrides.
pub fn request_reset(node: NodeId, buffer: &mut CommandBuffer) {
    buffer.push(OverrideCommand::ResetNode { node });
}

/// Applies a staged buffer and marks the blast radius of every touched
/// node dirty. Returns the number of mutations applied.
pub fn apply_and_mark(
    net: &RoadNetwork,
    overrides: &mut LaneOverrides,
    buffer: &mut CommandBuffer,
    dirty: &mut DirtySet,
) -> usize {
    let mut touched: Vec<NodeId> = Vec::new();
    for command in buffer.commands() {
        let node = command.node_hint().or_else(|| match command {
            OverrideCommand::ReplaceConnections { holder, .. }
            | OverrideCommand::DeleteHolder { holder }
            | OverrideCommand::PatchDescriptor { holder, .. }
            | OverrideCommand::PatchMethod { holder, .. } => overrides
                .holder(*holder)
                .and_then(|h| h.owner)
                .or_else(|| overrides.holders_listed().get(holder).copied()),
            _ => None,
        });
        if let Some(node) = node {
            touched.push(node);
        }
    }
    let mutations = buffer.apply(overrides);
    if mutations > 0 {
        for node in touched {
            dirty.mark_around(net, node);
        }
    }
    mutations
}

/// Computes the cached composition descriptor for a connection.
pub(crate) fn descriptor_for(
    net: &RoadNetwork,
    source: LaneEnd,
    target: LaneEnd,
) -> Result<LaneDescriptor, EngineError> {
    let source_row = composition_row(net, source)?;
    let target_row = composition_row(net, target)?;
    Ok(LaneDescriptor {
        source_group: source_row.0,
        source_carriageway: source_row.1,
        target_group: target_row.0,
        target_carriageway: target_row.1,
    })
}

fn composition_row(net: &RoadNetwork, end: LaneEnd) -> Result<(u8, u8), EngineError> {
    let edge = net
        .edge(end.edge)
        .ok_or(laneway_core::CoreError::EdgeNotFound { id: end.edge })?;
    let row = edge
        .composition
        .lane(end.lane_index)
        .ok_or(laneway_core::CoreError::LaneOutOfRange {
            edge: end.edge,
            lane_index: end.lane_index,
            lane_count: edge.composition.lane_count(),
        })?;
    Ok((row.group, row.carriageway))
}

fn lane_modes(net: &RoadNetwork, end: LaneEnd) -> Result<laneway_core::LaneFlags, EngineError> {
    let edge = net
        .edge(end.edge)
        .ok_or(laneway_core::CoreError::EdgeNotFound { id: end.edge })?;
    let row = edge
        .composition
        .lane(end.lane_index)
        .ok_or(laneway_core::CoreError::LaneOutOfRange {
            edge: end.edge,
            lane_index: end.lane_index,
            lane_count: edge.composition.lane_count(),
        })?;
    Ok(row.flags.modes())
}

fn find(connectors: &[Connector], end: LaneEnd, as_source: bool) -> Option<&Connector> {
    connectors.iter().find(|c| {
        c.lane_end() == end
            && if as_source {
                c.role.is_source()
            } else {
                c.role.is_target()
            }
    })
}
