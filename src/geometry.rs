//! Circle-vs-rectangle narrow phase
//!
//! The broad phase only compares bounding boxes; these helpers decide
//! whether a body circle truly reaches a rectangle and which way the
//! rectangle pushes back.

use crate::util::aabb::Aabb;
use crate::util::vec2::Vec2;

/// Coincidence threshold for an agent center sitting exactly on a corner
const CORNER_EPSILON: f64 = 1e-10;

/// True when the circle at `center` with `radius` intersects the box
/// (closest-point-on-rectangle distance within the radius)
pub fn circle_intersects(aabb: &Aabb, center: Vec2, radius: f64) -> bool {
    aabb.closest_point(center).distance_sq_to(center) <= radius * radius
}

/// Outward unit normal of `aabb` toward the point `p`.
///
/// Face regions yield the axis-aligned unit normal; corner regions point
/// from the corner to `p`, falling back to the unit diagonal when `p`
/// coincides with the corner. A point strictly inside the box resolves to
/// the nearest face (N/E/S/W priority on exact ties), so the result is
/// always a finite unit vector.
pub fn outward_normal(aabb: &Aabb, p: Vec2) -> Vec2 {
    let north = p.y >= aabb.max.y;
    let south = p.y <= aabb.min.y;
    let east = p.x >= aabb.max.x;
    let west = p.x <= aabb.min.x;

    match (north, east, south, west) {
        (true, false, false, false) => Vec2::new(0.0, 1.0),
        (false, true, false, false) => Vec2::new(1.0, 0.0),
        (false, false, true, false) => Vec2::new(0.0, -1.0),
        (false, false, false, true) => Vec2::new(-1.0, 0.0),
        (true, true, false, false) => {
            corner_normal(p, Vec2::new(aabb.max.x, aabb.max.y), Vec2::new(1.0, 1.0))
        }
        (false, true, true, false) => {
            corner_normal(p, Vec2::new(aabb.max.x, aabb.min.y), Vec2::new(1.0, -1.0))
        }
        (false, false, true, true) => {
            corner_normal(p, Vec2::new(aabb.min.x, aabb.min.y), Vec2::new(-1.0, -1.0))
        }
        (true, false, false, true) => {
            corner_normal(p, Vec2::new(aabb.min.x, aabb.max.y), Vec2::new(-1.0, 1.0))
        }
        _ => nearest_face_normal(aabb, p),
    }
}

fn corner_normal(p: Vec2, corner: Vec2, diagonal: Vec2) -> Vec2 {
    let d = p - corner;
    if d.is_zero(CORNER_EPSILON) {
        diagonal.normalize()
    } else {
        d.normalize()
    }
}

/// Fallback for a point inside the rectangle (or degenerate boxes where
/// opposite faces coincide): push toward the nearest face.
fn nearest_face_normal(aabb: &Aabb, p: Vec2) -> Vec2 {
    let faces = [
        (aabb.max.y - p.y, Vec2::new(0.0, 1.0)),
        (aabb.max.x - p.x, Vec2::new(1.0, 0.0)),
        (p.y - aabb.min.y, Vec2::new(0.0, -1.0)),
        (p.x - aabb.min.x, Vec2::new(-1.0, 0.0)),
    ];
    let mut best = faces[0];
    for face in &faces[1..] {
        if face.0 < best.0 {
            best = *face;
        }
    }
    best.1
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Aabb {
        Aabb::new(Vec2::new(min_x, min_y), Vec2::new(max_x, max_y))
    }

    #[test]
    fn test_circle_intersects_face() {
        let r = rect(2.0, 0.0, 10.0, 10.0);
        assert!(circle_intersects(&r, Vec2::new(1.0, 5.0), 1.5));
        assert!(!circle_intersects(&r, Vec2::new(0.0, 5.0), 1.5));
    }

    #[test]
    fn test_circle_intersects_corner() {
        let r = rect(2.0, 2.0, 10.0, 10.0);
        // Corner at (2, 2); diagonal distance from (1, 1) is sqrt(2)
        assert!(circle_intersects(&r, Vec2::new(1.0, 1.0), 1.5));
        assert!(!circle_intersects(&r, Vec2::new(1.0, 1.0), 1.0));
    }

    #[test]
    fn test_circle_intersects_center_inside() {
        let r = rect(0.0, 0.0, 10.0, 10.0);
        assert!(circle_intersects(&r, Vec2::new(5.0, 5.0), 0.1));
    }

    #[test]
    fn test_normal_faces() {
        let r = rect(1.0, 0.0, 2.0, 10.0);
        assert!(outward_normal(&r, Vec2::new(0.0, 5.0)).approx_eq(Vec2::new(-1.0, 0.0), EPSILON));
        assert!(outward_normal(&r, Vec2::new(3.0, 5.0)).approx_eq(Vec2::new(1.0, 0.0), EPSILON));
        assert!(outward_normal(&r, Vec2::new(1.5, 11.0)).approx_eq(Vec2::new(0.0, 1.0), EPSILON));
        assert!(outward_normal(&r, Vec2::new(1.5, -1.0)).approx_eq(Vec2::new(0.0, -1.0), EPSILON));
    }

    #[test]
    fn test_normal_corner_points_from_corner() {
        let r = rect(1.0, 0.0, 2.0, 10.0);
        // Above and left of the NW corner (1, 10)
        let n = outward_normal(&r, Vec2::new(0.0, 11.0));
        assert!(n.approx_eq(Vec2::new(-1.0, 1.0).normalize(), EPSILON));
    }

    #[test]
    fn test_normal_corner_coincident_uses_diagonal() {
        let r = rect(1.0, 0.0, 2.0, 10.0);
        let n = outward_normal(&r, Vec2::new(2.0, 10.0));
        assert!(n.approx_eq(Vec2::new(1.0, 1.0).normalize(), EPSILON));
        assert!((n.length() - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_normal_inside_nearest_face() {
        let r = rect(0.0, 0.0, 10.0, 10.0);
        assert!(outward_normal(&r, Vec2::new(9.0, 5.0)).approx_eq(Vec2::new(1.0, 0.0), EPSILON));
        assert!(outward_normal(&r, Vec2::new(5.0, 1.0)).approx_eq(Vec2::new(0.0, -1.0), EPSILON));
        // Dead center ties every face; north wins by priority
        assert!(outward_normal(&r, Vec2::new(5.0, 5.0)).approx_eq(Vec2::new(0.0, 1.0), EPSILON));
    }

    #[test]
    fn test_normal_is_always_finite_unit() {
        let r = rect(0.0, 0.0, 4.0, 4.0);
        for p in [
            Vec2::new(2.0, 2.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(4.0, 4.0),
            Vec2::new(-3.0, 7.0),
            Vec2::new(2.0, 4.0),
        ] {
            let n = outward_normal(&r, p);
            assert!(n.x.is_finite() && n.y.is_finite());
            assert!((n.length() - 1.0).abs() < EPSILON, "|n| = {}", n.length());
        }
    }
}
