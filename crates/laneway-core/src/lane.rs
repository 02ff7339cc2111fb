//! Lane flag bitsets.
//!
//! Flags are newtypes over small integers with `const` bit values. The set
//! of bits is closed: these types classify lanes and connections, they are
//! not extensible at runtime.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

macro_rules! bitset_ops {
    ($name:ident, $repr:ty) => {
        impl $name {
            pub const NONE: $name = $name(0);

            /// True when every bit of `other` is set in `self`.
            pub const fn contains(self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }

            /// True when at least one bit of `other` is set in `self`.
            pub const fn intersects(self, other: $name) -> bool {
                self.0 & other.0 != 0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            pub const fn with(self, other: $name) -> $name {
                $name(self.0 | other.0)
            }

            pub const fn without(self, other: $name) -> $name {
                $name(self.0 & !other.0)
            }

            pub const fn intersection(self, other: $name) -> $name {
                $name(self.0 & other.0)
            }

            pub const fn bits(self) -> $repr {
                self.0
            }
        }

        impl BitOr for $name {
            type Output = $name;
            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: $name) {
                self.0 |= rhs.0;
            }
        }
    };
}

/// Per-lane flags carried by every composition lane.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct LaneFlags(pub u16);

impl LaneFlags {
    pub const ROAD: LaneFlags = LaneFlags(1 << 0);
    pub const TRACK: LaneFlags = LaneFlags(1 << 1);
    pub const UTILITY: LaneFlags = LaneFlags(1 << 2);
    pub const BICYCLE: LaneFlags = LaneFlags(1 << 3);
    pub const PEDESTRIAN: LaneFlags = LaneFlags(1 << 4);
    pub const PARKING: LaneFlags = LaneFlags(1 << 5);
    /// Aggregate lane grouping a carriageway; carries no traffic itself.
    pub const MASTER: LaneFlags = LaneFlags(1 << 6);
    /// Lane runs against the edge direction (end toward start).
    pub const INVERT: LaneFlags = LaneFlags(1 << 7);
    /// Lane carries traffic in both directions.
    pub const TWO_WAY: LaneFlags = LaneFlags(1 << 8);
    /// Lane does not reach the intersection at the edge's start node.
    pub const DISCONNECTED_START: LaneFlags = LaneFlags(1 << 9);
    /// Lane does not reach the intersection at the edge's end node.
    pub const DISCONNECTED_END: LaneFlags = LaneFlags(1 << 10);

    /// All transport-mode bits.
    pub const MODES: LaneFlags =
        LaneFlags(Self::ROAD.0 | Self::TRACK.0 | Self::UTILITY.0 | Self::BICYCLE.0);

    /// The transport-mode subset of these flags.
    pub const fn modes(self) -> LaneFlags {
        self.intersection(Self::MODES)
    }

    /// Whether the lane is cut off at the given end of its edge.
    pub const fn disconnected_at(self, is_end: bool) -> bool {
        if is_end {
            self.intersects(Self::DISCONNECTED_END)
        } else {
            self.intersects(Self::DISCONNECTED_START)
        }
    }
}

bitset_ops!(LaneFlags, u16);

/// Whole-composition flags.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GeneralFlags(pub u8);

impl GeneralFlags {
    /// The composition as a whole runs end toward start.
    pub const INVERT: GeneralFlags = GeneralFlags(1 << 0);
    pub const ONE_WAY: GeneralFlags = GeneralFlags(1 << 1);
}

bitset_ops!(GeneralFlags, u8);

/// Per-side composition flags (left/right relative to edge direction).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SideFlags(pub u8);

impl SideFlags {
    pub const FORBID_LEFT: SideFlags = SideFlags(1 << 0);
    pub const FORBID_STRAIGHT: SideFlags = SideFlags(1 << 1);
    pub const FORBID_RIGHT: SideFlags = SideFlags(1 << 2);
    pub const PRIMARY_TRACK: SideFlags = SideFlags(1 << 3);
    pub const SECONDARY_TRACK: SideFlags = SideFlags(1 << 4);

    pub const TURNS: SideFlags =
        SideFlags(Self::FORBID_LEFT.0 | Self::FORBID_STRAIGHT.0 | Self::FORBID_RIGHT.0);
    pub const TRACKS: SideFlags = SideFlags(Self::PRIMARY_TRACK.0 | Self::SECONDARY_TRACK.0);

    /// The turn-restriction subset.
    pub const fn turns(self) -> SideFlags {
        self.intersection(Self::TURNS)
    }

    /// The track-placement subset.
    pub const fn tracks(self) -> SideFlags {
        self.intersection(Self::TRACKS)
    }
}

bitset_ops!(SideFlags, u8);

/// Transport classification of a connector handle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ConnectorClass(pub u8);

impl ConnectorClass {
    pub const ROAD: ConnectorClass = ConnectorClass(1 << 0);
    pub const TRACK: ConnectorClass = ConnectorClass(1 << 1);
    pub const UTILITY: ConnectorClass = ConnectorClass(1 << 2);
    pub const BICYCLE: ConnectorClass = ConnectorClass(1 << 3);

    /// Classification of a lane from its mode flags.
    pub const fn from_lane(flags: LaneFlags) -> ConnectorClass {
        let mut class = ConnectorClass::NONE;
        if flags.intersects(LaneFlags::ROAD) {
            class = class.with(Self::ROAD);
        }
        if flags.intersects(LaneFlags::TRACK) {
            class = class.with(Self::TRACK);
        }
        if flags.intersects(LaneFlags::UTILITY) {
            class = class.with(Self::UTILITY);
        }
        if flags.intersects(LaneFlags::BICYCLE) {
            class = class.with(Self::BICYCLE);
        }
        class
    }
}

bitset_ops!(ConnectorClass, u8);

/// Travel methods a connection permits. Persisted with each override.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PathMethod(pub u8);

impl PathMethod {
    pub const ROAD: PathMethod = PathMethod(1 << 0);
    pub const TRACK: PathMethod = PathMethod(1 << 1);
    pub const BICYCLE: PathMethod = PathMethod(1 << 2);

    /// Methods shared by two connector classes.
    pub const fn between(source: ConnectorClass, target: ConnectorClass) -> PathMethod {
        let shared = source.intersection(target);
        let mut method = PathMethod::NONE;
        if shared.intersects(ConnectorClass::ROAD) {
            method = method.with(Self::ROAD);
        }
        if shared.intersects(ConnectorClass::TRACK) {
            method = method.with(Self::TRACK);
        }
        if shared.intersects(ConnectorClass::BICYCLE) {
            method = method.with(Self::BICYCLE);
        }
        method
    }

    /// Lane modes required to carry this method.
    pub const fn required_modes(self) -> LaneFlags {
        let mut modes = LaneFlags::NONE;
        if self.intersects(Self::ROAD) {
            modes = modes.with(LaneFlags::ROAD);
        }
        if self.intersects(Self::TRACK) {
            modes = modes.with(LaneFlags::TRACK);
        }
        if self.intersects(Self::BICYCLE) {
            modes = modes.with(LaneFlags::BICYCLE);
        }
        modes
    }

    /// Whether a lane with the given flags can carry every method bit.
    pub const fn compatible_with(self, lane: LaneFlags) -> bool {
        lane.contains(self.required_modes())
    }
}

bitset_ops!(PathMethod, u8);

impl fmt::Display for PathMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let mut sep = "";
        for (bit, name) in [
            (Self::ROAD, "road"),
            (Self::TRACK, "track"),
            (Self::BICYCLE, "bicycle"),
        ] {
            if self.intersects(bit) {
                write!(f, "{sep}{name}")?;
                sep = "+";
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_and_intersects() {
        let f = LaneFlags::ROAD | LaneFlags::TWO_WAY;
        assert!(f.contains(LaneFlags::ROAD));
        assert!(!f.contains(LaneFlags::ROAD | LaneFlags::TRACK));
        assert!(f.intersects(LaneFlags::ROAD | LaneFlags::TRACK));
        assert!(!f.intersects(LaneFlags::MASTER));
    }

    #[test]
    fn mode_subset() {
        let f = LaneFlags::ROAD | LaneFlags::BICYCLE | LaneFlags::INVERT;
        assert_eq!(f.modes(), LaneFlags::ROAD | LaneFlags::BICYCLE);
    }

    #[test]
    fn disconnected_is_per_side() {
        let f = LaneFlags::ROAD | LaneFlags::DISCONNECTED_END;
        assert!(f.disconnected_at(true));
        assert!(!f.disconnected_at(false));
    }

    #[test]
    fn class_from_lane_flags() {
        let c = ConnectorClass::from_lane(LaneFlags::ROAD | LaneFlags::TRACK | LaneFlags::MASTER);
        assert_eq!(c, ConnectorClass::ROAD | ConnectorClass::TRACK);
    }

    #[test]
    fn method_between_classes_is_the_shared_subset() {
        let car = ConnectorClass::ROAD;
        let mixed = ConnectorClass::ROAD | ConnectorClass::TRACK;
        assert_eq!(PathMethod::between(car, mixed), PathMethod::ROAD);
        assert_eq!(
            PathMethod::between(mixed, mixed),
            PathMethod::ROAD | PathMethod::TRACK
        );
        assert_eq!(
            PathMethod::between(car, ConnectorClass::TRACK),
            PathMethod::NONE
        );
    }

    #[test]
    fn method_compatibility_requires_every_bit() {
        let m = PathMethod::ROAD | PathMethod::TRACK;
        assert!(m.compatible_with(LaneFlags::ROAD | LaneFlags::TRACK));
        assert!(!m.compatible_with(LaneFlags::ROAD));
        assert!(PathMethod::NONE.compatible_with(LaneFlags::NONE));
    }

    #[test]
    fn method_display_lists_bits() {
        assert_eq!(PathMethod::NONE.to_string(), "none");
        assert_eq!((PathMethod::ROAD | PathMethod::BICYCLE).to_string(), "road+bicycle");
    }

    #[test]
    fn side_flag_subsets() {
        let s = SideFlags::FORBID_LEFT | SideFlags::PRIMARY_TRACK;
        assert_eq!(s.turns(), SideFlags::FORBID_LEFT);
        assert_eq!(s.tracks(), SideFlags::PRIMARY_TRACK);
    }
}
