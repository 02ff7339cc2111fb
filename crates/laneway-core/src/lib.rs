pub mod composition;
pub mod edit;
pub mod error;
pub mod geometry;
pub mod id;
pub mod lane;
pub mod network;
pub mod overrides;

// Re-export commonly used types
pub use composition::{end_lanes, CompositionFlags, CompositionLane, EndLane, LaneComposition};
pub use edit::{EditStep, ReplacedEdge};
pub use error::CoreError;
pub use geometry::{classify_turn, edge_right, Bezier, Turn};
pub use id::{EdgeId, HolderId, NodeId};
pub use lane::{ConnectorClass, GeneralFlags, LaneFlags, PathMethod, SideFlags};
pub use network::{EdgeLane, LaneEnd, NodeLane, RoadEdge, RoadNetwork, RoadNode};
pub use overrides::{
    GeneratedConnection, LaneDescriptor, LaneOverrides, ModifiedConnection, OverrideHolder,
};
