//! Typed identifiers for network entities.
//!
//! All identifiers are allocated from monotonic counters owned by
//! [`RoadNetwork`](crate::network::RoadNetwork) and are never reused within
//! the lifetime of a network, even after the entity they named is removed.
//! Structural edits rely on this: an edit step maps replacement edge ids back
//! to the ids they superseded, which only works if the two can never collide.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an intersection node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Unique identifier for a road edge between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

/// Unique identifier for an override holder.
///
/// Holder ids are allocated by [`LaneOverrides`](crate::overrides::LaneOverrides),
/// not by the network, but follow the same no-reuse rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HolderId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}
