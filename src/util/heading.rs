use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

use crate::util::vec2::Vec2;

/// Unit heading direction with angle measured from +X.
///
/// A heading is a unit polar vector; the radial component is always 1,
/// so only the angle is stored, kept normalized to `[0, 2π)`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Heading {
    theta: f64,
}

impl Heading {
    /// Create a heading from an angle in radians, normalizing into `[0, 2π)`
    pub fn new(theta: f64) -> Self {
        Self {
            theta: normalize_angle(theta),
        }
    }

    #[inline]
    pub fn theta(&self) -> f64 {
        self.theta
    }

    /// Unit direction vector of this heading
    #[inline]
    pub fn to_vec(&self) -> Vec2 {
        Vec2::from_angle(self.theta)
    }

    /// Shortest signed rotation from this heading to the target angle,
    /// in `[-π, π)`. Positive is counter-clockwise.
    pub fn signed_arc_to(&self, target: f64) -> f64 {
        (target - self.theta + 3.0 * PI).rem_euclid(TAU) - PI
    }

    /// Magnitude of the shortest rotation to the target angle
    pub fn arc_to(&self, target: f64) -> f64 {
        self.signed_arc_to(target).abs()
    }
}

/// Normalize an angle in radians into `[0, 2π)`
pub fn normalize_angle(theta: f64) -> f64 {
    let t = theta.rem_euclid(TAU);
    // rem_euclid can return TAU itself for inputs just below a multiple of TAU
    if t >= TAU {
        0.0
    } else {
        t
    }
}
