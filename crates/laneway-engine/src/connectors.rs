//! Connector generation.
//!
//! A connector is the grabbable handle the tool shows at one lane end of an
//! intersection. Generation walks every edge touching the node, classifies
//! each runtime lane's role at this end, and pairs the lane with a row of
//! the edge's composition by claiming the row whose lateral offset is
//! closest to the lane's. Runtime lanes and composition rows line up
//! index-for-index on healthy data, but the claim goes through the offset
//! match anyway because the two sets come from different sources and the
//! engine inherits saves where they disagree.

use glam::Vec3;
use laneway_core::{
    edge_right, ConnectorClass, EdgeId, EndLane, LaneEnd, LaneFlags, NodeId, RoadNetwork,
};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Which way traffic moves through a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorRole {
    /// Traffic arrives at the node here; connections start from it.
    Source,
    /// Traffic departs the node here; connections end at it.
    Target,
    /// A two-way lane end acting as both.
    TwoWay,
}

impl ConnectorRole {
    pub fn is_source(self) -> bool {
        matches!(self, ConnectorRole::Source | ConnectorRole::TwoWay)
    }

    pub fn is_target(self) -> bool {
        matches!(self, ConnectorRole::Target | ConnectorRole::TwoWay)
    }
}

/// One lane-end handle at an intersection. Ephemeral: regenerated from the
/// network whenever the node is looked at, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    pub edge: EdgeId,
    pub node: NodeId,
    /// Claimed composition row.
    pub lane_index: u32,
    pub position: Vec3,
    /// Travel direction at the node: inward for sources, outward for
    /// targets, edge direction for two-way ends.
    pub direction: Vec3,
    pub role: ConnectorRole,
    pub class: ConnectorClass,
}

impl Connector {
    pub fn lane_end(&self) -> LaneEnd {
        LaneEnd::new(self.edge, self.lane_index)
    }
}

/// Lane flags a connector can be generated for.
const SUPPORTED_MODES: LaneFlags =
    LaneFlags(LaneFlags::ROAD.0 | LaneFlags::TRACK.0 | LaneFlags::BICYCLE.0);

/// Generates the connector set of `node`.
pub fn generate_connectors(
    net: &RoadNetwork,
    node: NodeId,
) -> Result<Vec<Connector>, EngineError> {
    let mut connectors = Vec::new();
    for edge_id in net.connected_edges(node)? {
        let edge = match net.edge(edge_id) {
            Some(e) => e,
            None => continue,
        };
        let is_end = net.is_end(edge_id, node)?;
        let rows = net.lanes_at(edge_id, node)?;
        let (start, end) = net.edge_endpoints(edge_id)?;
        let right = edge_right(net.node_position(start)?, net.node_position(end)?);
        let node_position = net.node_position(node)?;

        // One claim per composition row per direction.
        let mut claimed_source = vec![false; rows.len()];
        let mut claimed_target = vec![false; rows.len()];

        for lane in &edge.lanes {
            if lane.flags.intersects(LaneFlags::MASTER) {
                continue;
            }
            if !lane.flags.intersects(SUPPORTED_MODES) {
                continue;
            }
            if lane.flags.disconnected_at(is_end) {
                continue;
            }
            let two_way = lane.flags.intersects(LaneFlags::TWO_WAY);
            let inverted = lane.flags.intersects(LaneFlags::INVERT);
            let role = if two_way {
                ConnectorRole::TwoWay
            } else if is_end != inverted {
                ConnectorRole::Source
            } else {
                ConnectorRole::Target
            };

            let position = lane.end_position(is_end);
            let candidate_offset = (position - node_position).dot(right);
            let claimed = match role {
                ConnectorRole::Source => claim_row(&rows, candidate_offset, &mut claimed_source),
                ConnectorRole::Target => claim_row(&rows, candidate_offset, &mut claimed_target),
                ConnectorRole::TwoWay => {
                    let row = claim_row(&rows, candidate_offset, &mut claimed_source);
                    if let Some(idx) = row {
                        claimed_target[idx as usize] = true;
                    }
                    row
                }
            };
            let Some(row_index) = claimed else {
                continue;
            };

            connectors.push(Connector {
                edge: edge_id,
                node,
                lane_index: row_index,
                position,
                direction: lane.travel_direction(is_end),
                role,
                class: ConnectorClass::from_lane(rows[row_index as usize].flags),
            });
        }
    }
    Ok(connectors)
}

/// Claims the unclaimed row whose offset is closest to `offset`. Strict
/// less-than keeps the first-found row on equal distances.
fn claim_row(rows: &[EndLane], offset: f32, claimed: &mut [bool]) -> Option<u32> {
    let mut best: Option<(u32, f32)> = None;
    for row in rows {
        if claimed[row.lane_index as usize] {
            continue;
        }
        let distance = (row.offset - offset).abs();
        let closer = match best {
            Some((_, best_distance)) => distance < best_distance,
            None => true,
        };
        if closer {
            best = Some((row.lane_index, distance));
        }
    }
    let (index, _) = best?;
    claimed[index as usize] = true;
    Some(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use laneway_core::LaneComposition;

    fn t_junction() -> (RoadNetwork, NodeId) {
        let mut net = RoadNetwork::new();
        let center = net.add_node(Vec3::ZERO);
        let south = net.add_node(Vec3::new(0.0, 0.0, -60.0));
        let north = net.add_node(Vec3::new(0.0, 0.0, 60.0));
        let east = net.add_node(Vec3::new(60.0, 0.0, 0.0));
        net.add_edge(south, center, LaneComposition::two_way(1))
            .unwrap();
        net.add_edge(center, north, LaneComposition::two_way(1))
            .unwrap();
        net.add_edge(center, east, LaneComposition::two_way(1))
            .unwrap();
        (net, center)
    }

    #[test]
    fn two_way_road_yields_one_source_one_target_per_edge() {
        let (net, center) = t_junction();
        let connectors = generate_connectors(&net, center).unwrap();
        assert_eq!(connectors.len(), 6);
        for edge in net.connected_edges(center).unwrap() {
            let of_edge: Vec<_> = connectors.iter().filter(|c| c.edge == edge).collect();
            assert_eq!(of_edge.len(), 2);
            assert_eq!(of_edge.iter().filter(|c| c.role.is_source()).count(), 1);
            assert_eq!(of_edge.iter().filter(|c| c.role.is_target()).count(), 1);
        }
    }

    #[test]
    fn master_and_unsupported_lanes_are_skipped() {
        let mut net = RoadNetwork::new();
        let a = net.add_node(Vec3::ZERO);
        let b = net.add_node(Vec3::new(0.0, 0.0, 60.0));
        let mut comp = LaneComposition::two_way(1);
        comp.lanes[0].flags |= LaneFlags::MASTER;
        comp.lanes[1].flags = comp.lanes[1]
            .flags
            .without(LaneFlags::MODES)
            .with(LaneFlags::PEDESTRIAN);
        net.add_edge(a, b, comp).unwrap();
        let connectors = generate_connectors(&net, a).unwrap();
        assert!(connectors.is_empty());
    }

    #[test]
    fn disconnected_lane_end_has_no_connector() {
        let mut net = RoadNetwork::new();
        let a = net.add_node(Vec3::ZERO);
        let b = net.add_node(Vec3::new(0.0, 0.0, 60.0));
        let mut comp = LaneComposition::one_way(2);
        comp.lanes[0].flags |= LaneFlags::DISCONNECTED_END;
        net.add_edge(a, b, comp).unwrap();
        assert_eq!(generate_connectors(&net, b).unwrap().len(), 1);
        assert_eq!(generate_connectors(&net, a).unwrap().len(), 2);
    }

    #[test]
    fn two_way_lane_claims_both_directions() {
        let mut net = RoadNetwork::new();
        let a = net.add_node(Vec3::ZERO);
        let b = net.add_node(Vec3::new(0.0, 0.0, 60.0));
        let mut comp = LaneComposition::one_way(1);
        comp.lanes[0].flags |= LaneFlags::TWO_WAY;
        net.add_edge(a, b, comp).unwrap();
        let connectors = generate_connectors(&net, b).unwrap();
        assert_eq!(connectors.len(), 1);
        assert_eq!(connectors[0].role, ConnectorRole::TwoWay);
        assert!(connectors[0].role.is_source() && connectors[0].role.is_target());
    }

    #[test]
    fn claims_resolve_to_nearest_row() {
        let (net, center) = t_junction();
        let connectors = generate_connectors(&net, center).unwrap();
        // Every claim lands on the row the runtime lane was derived from.
        for c in &connectors {
            let edge = net.edge(c.edge).unwrap();
            let row = edge.composition.lane(c.lane_index).unwrap();
            let lane = edge.lanes[c.lane_index as usize];
            assert_eq!(
                row.flags.intersects(LaneFlags::INVERT),
                lane.flags.intersects(LaneFlags::INVERT)
            );
        }
    }

    #[test]
    fn classes_come_from_the_claimed_row() {
        let mut net = RoadNetwork::new();
        let a = net.add_node(Vec3::ZERO);
        let b = net.add_node(Vec3::new(0.0, 0.0, 60.0));
        let comp = LaneComposition::two_way(1).with_mode(LaneFlags::ROAD | LaneFlags::TRACK);
        net.add_edge(a, b, comp).unwrap();
        let connectors = generate_connectors(&net, b).unwrap();
        assert!(connectors
            .iter()
            .all(|c| c.class == (ConnectorClass::ROAD | ConnectorClass::TRACK)));
    }
}
