//! Collision predicates
//!
//! Narrow-phase filters applied to broad-phase candidates. These decide
//! whether two bodies physically conflict; they never mutate anything.

use crate::entity::{Agent, Feature};
use crate::flags::Flags;
use crate::geometry;

/// True when two distinct agents physically overlap.
///
/// Projectiles never collide. An airborne body and a non-airborne body
/// pass over and under each other; two airborne bodies do collide.
pub fn collides(a: &Agent, b: &Agent) -> bool {
    if a.id() == b.id() {
        return false;
    }
    if a.is_projectile() || b.is_projectile() {
        return false;
    }
    if a.flags().contains(Flags::OCCUPY_AIR) != b.flags().contains(Flags::OCCUPY_AIR) {
        return false;
    }
    let r = a.radius() + b.radius();
    a.position().distance_sq_to(b.position()) <= r * r
}

/// True when `a` overlaps `b` and must yield to it.
///
/// The smaller body gives way; a larger body ignores the overlap and
/// squishes through, so only the yielding side resolves the collision.
pub fn squish_collides(a: &Agent, b: &Agent) -> bool {
    collides(a, b) && a.flags().size_class() <= b.flags().size_class()
}

/// True when the feature blocks the agent: same air/ground layer, boxes
/// overlap, and the body circle truly reaches the rectangle.
pub fn feature_blocks(a: &Agent, f: &Feature) -> bool {
    if a.flags().contains(Flags::OCCUPY_AIR) != f.flags().contains(Flags::OCCUPY_AIR) {
        return false;
    }
    if !a.bounds().intersects(&f.aabb()) {
        return false;
    }
    geometry::circle_intersects(&f.aabb(), a.position(), a.radius())
}
