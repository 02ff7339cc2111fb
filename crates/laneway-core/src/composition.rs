//! Lane compositions.
//!
//! A composition is the per-edge lane table: which lanes the edge carries,
//! their lateral placement, and the flags that orient them. The network
//! derives runtime lanes from it when an edge is created; the override
//! engine reads it back when classifying lane ends at a node.

use crate::lane::{GeneralFlags, LaneFlags, SideFlags};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Nominal lane width used by the stock composition builders.
pub const LANE_WIDTH: f32 = 3.5;

/// Whole-composition flag block: general flags plus one flag set per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CompositionFlags {
    pub general: GeneralFlags,
    pub left: SideFlags,
    pub right: SideFlags,
}

/// One row of the lane table.
///
/// `position.x` is the lateral offset along the edge's right axis,
/// `position.y` the height above the surface. `group` and `carriageway`
/// locate the lane within the composition and are what override
/// descriptors cache.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositionLane {
    pub flags: LaneFlags,
    pub position: Vec3,
    pub group: u8,
    pub carriageway: u8,
}

/// An edge's lane table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneComposition {
    pub flags: CompositionFlags,
    pub lanes: SmallVec<[CompositionLane; 8]>,
}

impl LaneComposition {
    pub fn new(flags: CompositionFlags, lanes: SmallVec<[CompositionLane; 8]>) -> Self {
        LaneComposition { flags, lanes }
    }

    /// One-way road, all lanes running start to end. Lanes are laid out
    /// left to right across the edge, carriageway 0.
    pub fn one_way(lane_count: usize) -> Self {
        let mut lanes = SmallVec::new();
        let half = lane_count as f32 / 2.0;
        for i in 0..lane_count {
            lanes.push(CompositionLane {
                flags: LaneFlags::ROAD,
                position: Vec3::new((i as f32 - half + 0.5) * LANE_WIDTH, 0.0, 0.0),
                group: i as u8,
                carriageway: 0,
            });
        }
        LaneComposition {
            flags: CompositionFlags {
                general: GeneralFlags::ONE_WAY,
                ..Default::default()
            },
            lanes,
        }
    }

    /// Two-way road with `per_direction` lanes each way. The backward
    /// (inverted) carriageway 0 sits left of the centerline, the forward
    /// carriageway 1 to the right.
    pub fn two_way(per_direction: usize) -> Self {
        let mut lanes = SmallVec::new();
        for i in 0..per_direction {
            lanes.push(CompositionLane {
                flags: LaneFlags::ROAD | LaneFlags::INVERT,
                position: Vec3::new(-(i as f32 + 0.5) * LANE_WIDTH, 0.0, 0.0),
                group: i as u8,
                carriageway: 0,
            });
        }
        for i in 0..per_direction {
            lanes.push(CompositionLane {
                flags: LaneFlags::ROAD,
                position: Vec3::new((i as f32 + 0.5) * LANE_WIDTH, 0.0, 0.0),
                group: i as u8,
                carriageway: 1,
            });
        }
        LaneComposition {
            flags: CompositionFlags::default(),
            lanes,
        }
    }

    /// Replace the mode bits of every non-master lane.
    pub fn with_mode(mut self, mode: LaneFlags) -> Self {
        for lane in &mut self.lanes {
            if !lane.flags.intersects(LaneFlags::MASTER) {
                lane.flags = lane.flags.without(LaneFlags::MODES).with(mode.modes());
            }
        }
        self
    }

    pub fn with_general(mut self, general: GeneralFlags) -> Self {
        self.flags.general = self.flags.general.with(general);
        self
    }

    pub fn with_left(mut self, left: SideFlags) -> Self {
        self.flags.left = self.flags.left.with(left);
        self
    }

    pub fn with_right(mut self, right: SideFlags) -> Self {
        self.flags.right = self.flags.right.with(right);
        self
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn lane(&self, index: u32) -> Option<&CompositionLane> {
        self.lanes.get(index as usize)
    }
}

/// A composition lane classified at one end of its edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndLane {
    pub lane_index: u32,
    pub flags: LaneFlags,
    /// Lateral offset at this end, in the edge's own right-axis frame.
    pub offset: f32,
    pub group: u8,
    pub carriageway: u8,
    /// Traffic on this lane arrives at the node from the edge.
    pub arrives: bool,
    /// Traffic on this lane departs the node into the edge.
    pub departs: bool,
    /// The lane physically reaches the intersection at this end.
    pub connected: bool,
}

/// Classify every lane of `comp` at one end of its edge.
///
/// `is_end` selects the edge's end node (true) or start node (false). A
/// composition-level INVERT swaps which physical end the lane table's
/// start refers to, flips each lane's travel direction and mirrors the
/// lateral axis.
pub fn end_lanes(comp: &LaneComposition, is_end: bool) -> Vec<EndLane> {
    let general_invert = comp.flags.general.intersects(GeneralFlags::INVERT);
    let effective_end = is_end != general_invert;
    comp.lanes
        .iter()
        .enumerate()
        .map(|(i, lane)| {
            let two_way = lane.flags.intersects(LaneFlags::TWO_WAY);
            let lane_invert = lane.flags.intersects(LaneFlags::INVERT);
            let offset = if general_invert {
                -lane.position.x
            } else {
                lane.position.x
            };
            EndLane {
                lane_index: i as u32,
                flags: lane.flags,
                offset,
                group: lane.group,
                carriageway: lane.carriageway,
                arrives: two_way || (effective_end != lane_invert),
                departs: two_way || (effective_end == lane_invert),
                connected: !lane.flags.disconnected_at(effective_end),
            }
        })
        .collect()
}
