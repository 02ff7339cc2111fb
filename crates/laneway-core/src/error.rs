//! Error types for network and override container operations.

use crate::id::{EdgeId, HolderId, NodeId};
use thiserror::Error;

/// Errors produced by [`RoadNetwork`](crate::network::RoadNetwork) and
/// [`LaneOverrides`](crate::overrides::LaneOverrides) operations.
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("node {id} not found")]
    NodeNotFound { id: NodeId },

    #[error("edge {id} not found")]
    EdgeNotFound { id: EdgeId },

    #[error("holder {id} not found")]
    HolderNotFound { id: HolderId },

    #[error("edge {edge} does not touch node {node}")]
    EdgeNotConnected { edge: EdgeId, node: NodeId },

    #[error("lane index {lane_index} out of range for edge {edge} ({lane_count} lanes)")]
    LaneOutOfRange {
        edge: EdgeId,
        lane_index: u32,
        lane_count: usize,
    },

    #[error("invalid edge: {reason}")]
    InvalidEdge { reason: String },
}
