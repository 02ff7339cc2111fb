//! Engine error types.

use laneway_core::{CoreError, EdgeId, NodeId};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The lane end is not part of the node's connector set in the role
    /// the request needs it in.
    #[error("lane end {edge}:{lane_index} is not available at node {node}")]
    UnknownLaneEnd {
        node: NodeId,
        edge: EdgeId,
        lane_index: u32,
    },

    /// Source and target share no travel method, or the requested method
    /// cannot ride the target lane.
    #[error("no usable travel method from {source_edge}:{source_lane} to {target_edge}:{target_lane}")]
    IncompatibleLaneEnds {
        source_edge: EdgeId,
        source_lane: u32,
        target_edge: EdgeId,
        target_lane: u32,
    },
}
