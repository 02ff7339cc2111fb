//! Connection-view generation.
//!
//! The view is what the tool and renderer read: every connection currently
//! in effect at a node, keyed by its source lane end, cross-referenced
//! against stored overrides. Connections whose lane ends do not both
//! resolve to a currently-connected edge are filtered out; stored override
//! connections missing from the node's (possibly stale) lane set are
//! carried in so the tool always shows what would be persisted.

use std::collections::HashSet;

use indexmap::IndexMap;
use laneway_core::{
    Bezier, LaneEnd, LaneOverrides, NodeId, PathMethod, RoadNetwork,
};
use serde::{Deserialize, Serialize};

use crate::connectors::Connector;
use crate::error::EngineError;

/// One directed lane connection at a node. Ephemeral view data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub source: LaneEnd,
    pub target: LaneEnd,
    /// Multimap key the connection is filed under; equals `source`.
    pub owner: LaneEnd,
    pub curve: Bezier,
    pub method: PathMethod,
    pub is_unsafe: bool,
    pub is_forbidden: bool,
}

/// The generated connection graph of one node.
#[derive(Debug, Clone)]
pub struct ConnectionView {
    node: NodeId,
    connectors: Vec<Connector>,
    connections: IndexMap<LaneEnd, Vec<Connection>>,
    overridden: HashSet<LaneEnd>,
}

impl ConnectionView {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn connectors(&self) -> &[Connector] {
        &self.connectors
    }

    pub fn connector_at(&self, end: LaneEnd, as_source: bool) -> Option<&Connector> {
        self.connectors.iter().find(|c| {
            c.lane_end() == end
                && if as_source {
                    c.role.is_source()
                } else {
                    c.role.is_target()
                }
        })
    }

    /// All connections, grouped by source lane end in generation order.
    pub fn connections(&self) -> impl Iterator<Item = &Connection> + '_ {
        self.connections.values().flatten()
    }

    /// Connections leaving one lane end.
    pub fn connections_from(&self, source: LaneEnd) -> &[Connection] {
        self.connections
            .get(&source)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn connection_count(&self) -> usize {
        self.connections.values().map(Vec::len).sum()
    }

    /// Whether this lane end's connections come from a stored override.
    pub fn is_overridden(&self, end: LaneEnd) -> bool {
        self.overridden.contains(&end)
    }

    pub fn has_connection(&self, source: LaneEnd, target: LaneEnd) -> bool {
        self.connections_from(source)
            .iter()
            .any(|c| c.target == target)
    }
}

/// Builds the connection view of `node` from its materialized lane set and
/// the stored overrides.
pub fn generate_connections(
    net: &RoadNetwork,
    overrides: &LaneOverrides,
    node: NodeId,
    connectors: Vec<Connector>,
) -> Result<ConnectionView, EngineError> {
    let known: HashSet<_> = net.connected_edges(node)?.into_iter().collect();
    let mut connections: IndexMap<LaneEnd, Vec<Connection>> = IndexMap::new();

    for lane in net.node_lanes(node)? {
        if !known.contains(&lane.source.edge) || !known.contains(&lane.target.edge) {
            continue;
        }
        connections
            .entry(lane.source)
            .or_default()
            .push(Connection {
                source: lane.source,
                target: lane.target,
                owner: lane.source,
                curve: lane.curve,
                method: lane.method,
                is_unsafe: lane.is_unsafe,
                is_forbidden: lane.is_forbidden,
            });
    }

    let mut overridden = HashSet::new();
    let mut carried: Vec<Connection> = Vec::new();
    for entry in overrides.entries(node) {
        overridden.insert(entry.lane_end());
        let Some(holder) = overrides.holder(entry.holder) else {
            continue;
        };
        for stored in &holder.connections {
            let source = stored.source_end();
            let target = stored.target_end();
            let present = connections
                .get(&source)
                .map(|bucket| bucket.iter().any(|c| c.target == target))
                .unwrap_or(false);
            if present {
                continue;
            }
            // Stale node-lane set: surface the stored connection anyway.
            let curve = curve_between(&connectors, node, net, source, target);
            carried.push(Connection {
                source,
                target,
                owner: source,
                curve,
                method: stored.method,
                is_unsafe: stored.is_unsafe,
                is_forbidden: false,
            });
        }
    }
    for c in carried {
        connections.entry(c.owner).or_default().push(c);
    }

    Ok(ConnectionView {
        node,
        connectors,
        connections,
        overridden,
    })
}

/// Curve for a carried-in connection: routed between connectors when both
/// resolve, collapsed to the node point otherwise.
fn curve_between(
    connectors: &[Connector],
    node: NodeId,
    net: &RoadNetwork,
    source: LaneEnd,
    target: LaneEnd,
) -> Bezier {
    let find = |end: LaneEnd, as_source: bool| {
        connectors.iter().find(|c| {
            c.lane_end() == end
                && if as_source {
                    c.role.is_source()
                } else {
                    c.role.is_target()
                }
        })
    };
    match (find(source, true), find(target, false)) {
        (Some(s), Some(t)) => Bezier::connect(s.position, s.direction, t.position, t.direction),
        _ => {
            let at = net.node_position(node).unwrap_or_default();
            Bezier::line(at, at)
        }
    }
}
