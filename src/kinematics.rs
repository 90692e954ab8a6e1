//! Velocity-clamping primitives
//!
//! Pure functions that reshape a candidate velocity in place. Collision
//! handling clamps the velocity component along the contact normal; this
//! deliberately does not model momentum transfer, friction, or
//! restitution. A resolution pass for one agent chains these over every
//! conflicting neighbor and feature, then applies the kinematic limits.
//!
//! Iterated soft projections are not order-invariant: clearing the normal
//! toward one neighbor can push the velocity back into the forbidden
//! half-space of an earlier one. The strict variants run as a second pass
//! and collapse any remaining violation to a full stop.

use crate::entity::{Agent, Feature};
use crate::geometry;
use crate::util::heading::Heading;
use crate::util::vec2::Vec2;

/// Slip tolerance absorbing floating-point residue when agents slide
/// past feature corners
pub const TOLERANCE: f64 = 1e-5;

/// Zero the component of `v` pointing from `a` toward `b`.
///
/// Call iteratively over all conflicting neighbors to accumulate a final
/// velocity for `a`; follow with the strict pass to catch flip-flops.
pub fn set_collision_velocity(a: &Agent, b: &Agent, v: &mut Vec2) {
    let n = (b.position() - a.position()).normalize();
    let c = n.dot(*v);
    if c > TOLERANCE {
        *v -= n * c;
    }
}

/// Strict variant: if `v` still points toward `b`, stop entirely.
///
/// Motion is sacrificed for the guarantee that `a` cannot be driven
/// deeper into `b` no matter what order the soft pass visited neighbors.
pub fn set_collision_velocity_strict(a: &Agent, b: &Agent, v: &mut Vec2) {
    let d = b.position() - a.position();
    if d.dot(*v) > TOLERANCE {
        *v = Vec2::ZERO;
    }
}

/// Zero the component of `v` that pushes `a` into the feature
pub fn set_feature_collision_velocity(a: &Agent, f: &Feature, v: &mut Vec2) {
    let n_in = -geometry::outward_normal(&f.aabb(), a.position());
    let c = n_in.dot(*v);
    if c > TOLERANCE {
        *v -= n_in * c;
    }
}

/// Strict variant: stop entirely if `v` still pushes into the feature
pub fn set_feature_collision_velocity_strict(a: &Agent, f: &Feature, v: &mut Vec2) {
    let n_in = -geometry::outward_normal(&f.aabb(), a.position());
    if n_in.dot(*v) > TOLERANCE {
        *v = Vec2::ZERO;
    }
}

/// Cap the speed at the agent's maximum velocity
pub fn clamp_velocity(a: &Agent, v: &mut Vec2) {
    *v = v.clamp_length(a.max_velocity());
}

/// Bound the speed change relative to last tick's realized velocity.
///
/// Only the scalar speed is constrained here; the turn rate is bounded
/// separately by [`clamp_heading`], so controllers can reason about spin
/// and speed-up independently. When the candidate is (near) zero the
/// previous direction is kept and only the speed decays.
pub fn clamp_acceleration(a: &Agent, v: &mut Vec2, dt: f64) {
    let prev = a.velocity().length();
    let target = v.length();

    let mut delta = prev - target;
    let limit = dt * a.max_acceleration();
    if delta.abs() > limit {
        delta = delta.signum() * limit;
    }
    let speed = prev - delta;

    if target <= TOLERANCE {
        *v = a.velocity().normalize() * speed;
    } else {
        *v = *v * (speed / target);
    }
}

/// Bound the heading change, rotating the velocity with it.
///
/// `h` must arrive initialized to the agent's current heading; a (near)
/// zero candidate leaves both outputs untouched. When the requested turn
/// exceeds `max_angular_velocity * dt` the heading advances by the cap
/// and `v` is rotated onto the new heading with its magnitude preserved.
pub fn clamp_heading(a: &Agent, dt: f64, v: &mut Vec2, h: &mut Heading) {
    let speed = v.length();
    if speed <= TOLERANCE {
        return;
    }

    let omega = a.max_angular_velocity() * dt;
    let mut dtheta = a.heading().signed_arc_to(v.angle());
    if dtheta.abs() > omega {
        dtheta = dtheta.signum() * omega;
        *h = Heading::new(a.heading().theta() + dtheta);
        *v = h.to_vec() * speed;
    } else {
        *h = Heading::new(a.heading().theta() + dtheta);
    }
}
