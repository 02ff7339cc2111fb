//! Curve and direction helpers shared by lane layout and connector routing.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// A cubic Bezier curve in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bezier {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
    pub d: Vec3,
}

impl Bezier {
    /// Straight segment from `a` to `d` with evenly spaced control points.
    pub fn line(a: Vec3, d: Vec3) -> Self {
        Bezier {
            a,
            b: a.lerp(d, 1.0 / 3.0),
            c: a.lerp(d, 2.0 / 3.0),
            d,
        }
    }

    /// Curve that leaves `start` along `start_dir` and arrives at `end`
    /// along `end_dir`. Control arms reach a third of the chord length.
    pub fn connect(start: Vec3, start_dir: Vec3, end: Vec3, end_dir: Vec3) -> Self {
        let reach = start.distance(end) / 3.0;
        Bezier {
            a: start,
            b: start + start_dir.normalize_or_zero() * reach,
            c: end - end_dir.normalize_or_zero() * reach,
            d: end,
        }
    }

    /// Position at parameter `t` in `[0, 1]`.
    pub fn position(&self, t: f32) -> Vec3 {
        let u = 1.0 - t;
        self.a * (u * u * u)
            + self.b * (3.0 * u * u * t)
            + self.c * (3.0 * u * t * t)
            + self.d * (t * t * t)
    }

    /// Normalized travel direction at parameter `t`.
    pub fn tangent(&self, t: f32) -> Vec3 {
        let u = 1.0 - t;
        let d = (self.b - self.a) * (3.0 * u * u)
            + (self.c - self.b) * (6.0 * u * t)
            + (self.d - self.c) * (3.0 * t * t);
        d.normalize_or_zero()
    }

    /// The same curve traversed in the opposite direction.
    pub fn reversed(&self) -> Self {
        Bezier {
            a: self.d,
            b: self.c,
            c: self.b,
            d: self.a,
        }
    }
}

/// Ground-plane lateral axis for an edge running `start -> end`.
///
/// Lane offsets in a composition are measured along this axis: positive
/// offsets sit to the right of the direction of travel, looking down the
/// edge with y up.
pub fn edge_right(start: Vec3, end: Vec3) -> Vec3 {
    let dir = flatten(end - start);
    Vec3::new(dir.z, 0.0, -dir.x)
}

/// Coarse turn classification between an arrival and a departure direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Turn {
    Left,
    Straight,
    Right,
    UTurn,
}

// Split angles: straight within 22.5 degrees of dead ahead, u-turn beyond
// 135 degrees. Matches how sharp a connector curve gets before drivers
// treat it as a reversal.
const TURN_SIN: f32 = 0.382_683_43;
const UTURN_COS: f32 = -0.707_106_77;

/// Classify the turn from travel direction `incoming` onto `outgoing`.
///
/// Directions are flattened to the ground plane first; vertical grade does
/// not influence the classification.
pub fn classify_turn(incoming: Vec3, outgoing: Vec3) -> Turn {
    let a = flatten(incoming);
    let b = flatten(outgoing);
    let dot = a.dot(b);
    // Positive when `b` lies clockwise of `a` seen from above, which with
    // the `edge_right` convention is a right turn.
    let swing = a.z * b.x - a.x * b.z;
    if dot <= UTURN_COS {
        Turn::UTurn
    } else if swing >= TURN_SIN {
        Turn::Right
    } else if swing <= -TURN_SIN {
        Turn::Left
    } else {
        Turn::Straight
    }
}

fn flatten(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z).normalize_or_zero()
}
