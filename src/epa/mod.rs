//! Penetration depth using the Expanding Polytope Algorithm.
//!
//! Implementation of EPA as described in "Proximity Queries and Penetration
//! Depth Computation on 3D Game Objects" - Gino van den Bergen. Instead of
//! splitting triangles at each edge as in the article, a convex hull is
//! built (removing any triangles that face the new point), which avoids the
//! oblong triangles the article mentions.
//!
//! The algorithm roughly works like:
//!
//! - Start with the simplex of the Minkowski difference returned by GJK;
//!   it contains the origin or GJK would have reported no collision.
//! - With fewer than 4 simplex points, sample extra support points to reach
//!   a tetrahedron of non-zero volume that includes the origin.
//! - Turn the points into a convex hull, then repeatedly take the hull
//!   triangle closest to the origin, sample a new support point along its
//!   normal and insert it (removing the triangles that face it) until no
//!   closer point is found.
//! - The closest point indicates the position and direction of least
//!   penetration.

use crate::gjk::{AddConvexRadius, GjkClosestPoint, SupportMap, TransformedSupport};
use crate::math::{Isometry, Point, Real, Rotation, Vector};

pub use self::hull_builder::{HullBuilder, MAX_POINTS, MAX_TRIANGLES};

pub mod hull_builder;

use hull_builder::NewTriangles;

/// Number of support points EPA may sample while trying to get the origin
/// inside the initial hull; deeper than this means the penetration is too
/// shallow to resolve and no collision is reported.
const MAX_POINTS_TO_INCLUDE_ORIGIN_IN_HULL: usize = 32;

/// Return code for [`PenetrationDepth::step_gjk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The objects don't collide; the contact outputs are invalid.
    NotColliding,
    /// The objects penetrate within their combined convex radius; the
    /// contact points are already known.
    Colliding,
    /// The objects penetrate further than their combined convex radius; call
    /// [`PenetrationDepth::step_epa`] to get the actual penetration depth.
    Indeterminate,
}

/// List of support points sampled during an EPA run, keeping the individual
/// points on A and B so contact points can be reconstructed.
struct SupportPoints {
    y: Vec<Vector>,
    p: Vec<Point>,
    q: Vec<Point>,
}

impl SupportPoints {
    fn new() -> Self {
        SupportPoints {
            y: Vec::with_capacity(MAX_POINTS),
            p: Vec::with_capacity(MAX_POINTS),
            q: Vec::with_capacity(MAX_POINTS),
        }
    }

    /// Samples the Minkowski difference A - B along `direction` and stores
    /// the new point. Returns the difference point and its index.
    fn add<A, B>(&mut self, a: &A, b: &B, direction: Vector) -> (Vector, usize)
    where
        A: ?Sized + SupportMap,
        B: ?Sized + SupportMap,
    {
        let p = a.support_point(&direction);
        let q = b.support_point(&-direction);
        let w = p - q;

        let index = self.y.len();
        self.y.push(w);
        self.p.push(p);
        self.q.push(q);
        (w, index)
    }
}

/// Calculates the penetration depth between two convex objects in two steps:
/// a cheap GJK step on the shapes shrunk by their convex radii, and, when
/// the overlap is deeper than those radii, a full EPA run on the inflated
/// shapes.
#[derive(Default)]
pub struct PenetrationDepth {
    /// The GJK run seeds EPA with its terminal simplex.
    gjk: GjkClosestPoint,
}

impl PenetrationDepth {
    /// Creates a new instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// First step: GJK on the objects excluding their convex radii.
    ///
    /// `io_v` must be a non-zero initial axis guess (pass the previous
    /// frame's value or the x axis); on return it is the direction to move B
    /// out of collision along the shortest path (magnitude meaningless).
    /// With [`Status::Colliding`], `out_a`/`out_b` hold the contact points;
    /// use `|out_b - out_a|` for the penetration distance.
    pub fn step_gjk<A, B>(
        &mut self,
        a_excluding_radius: &A,
        convex_radius_a: Real,
        b_excluding_radius: &B,
        convex_radius_b: Real,
        tolerance: Real,
        io_v: &mut Vector,
        out_a: &mut Point,
        out_b: &mut Point,
    ) -> Status
    where
        A: ?Sized + SupportMap,
        B: ?Sized + SupportMap,
    {
        // A zero io_v would sample interior points of the Minkowski sum
        // instead of its hull. If this triggers, the caller is most likely
        // feeding in a degenerate (sliver) triangle.
        debug_assert!(io_v.norm_squared() > 1.0e-12);

        let combined_radius = convex_radius_a + convex_radius_b;
        let combined_radius_sqr = combined_radius * combined_radius;
        let closest_dist_sqr = self.gjk.closest_points(
            a_excluding_radius,
            b_excluding_radius,
            tolerance,
            combined_radius_sqr,
            io_v,
            out_a,
            out_b,
        );

        if closest_dist_sqr > combined_radius_sqr {
            return Status::NotColliding;
        }
        if closest_dist_sqr > 0.0 {
            // Collision within the convex radii, adjust the points for them.
            // closest_points returned |io_v|^2 = closest_dist_sqr here.
            let v_len = closest_dist_sqr.sqrt();
            *out_a += *io_v * (convex_radius_a / v_len);
            *out_b -= *io_v * (convex_radius_b / v_len);
            return Status::Colliding;
        }

        Status::Indeterminate
    }

    /// Second step: EPA on the objects including their convex radii.
    ///
    /// `tolerance` determines the accuracy: iteration stops when the change
    /// of squared distance drops below `tolerance * penetration_depth^2`. It
    /// should be at least machine epsilon. Returns false if the objects
    /// don't collide (in which case the outputs are invalid); on success
    /// `out_v` is the direction to move B out of collision and
    /// `out_a`/`out_b` are the deepest contact points.
    pub fn step_epa<A, B>(
        &mut self,
        a_including_radius: &A,
        b_including_radius: &B,
        tolerance: Real,
        out_v: &mut Vector,
        out_a: &mut Point,
        out_b: &mut Point,
    ) -> bool
    where
        A: ?Sized + SupportMap,
        B: ?Sized + SupportMap,
    {
        debug_assert!(tolerance >= Real::EPSILON);

        // Fetch the terminal simplex from the GJK step.
        let mut support_points = SupportPoints::new();
        {
            let (y, p, q) = self.gjk.simplex();
            support_points.y.extend_from_slice(y);
            support_points.p.extend_from_slice(p);
            support_points.q.extend_from_slice(q);
        }

        let a = a_including_radius;
        let b = b_including_radius;

        // Fill the support points up to at least a tetrahedron.
        match support_points.y.len() {
            1 => {
                // A single vertex must be at the origin, which is useless
                // here; replace it with a tetrahedron around the origin.
                support_points.y.clear();
                support_points.p.clear();
                support_points.q.clear();
                let _ = support_points.add(a, b, Vector::new(0.0, 1.0, 0.0));
                let _ = support_points.add(a, b, Vector::new(-1.0, -1.0, -1.0));
                let _ = support_points.add(a, b, Vector::new(1.0, -1.0, -1.0));
                let _ = support_points.add(a, b, Vector::new(0.0, -1.0, 1.0));
            }
            2 => {
                // Two vertices: create 3 extra by rotating a perpendicular
                // axis in 120 degree increments.
                let axis = (support_points.y[1] - support_points.y[0]).normalize();
                let rotation = Rotation::from_axis_angle(
                    &na::Unit::new_normalize(axis),
                    120.0f32.to_radians(),
                );
                let dir1 = normalized_perpendicular(axis);
                let dir2 = rotation * dir1;
                let dir3 = rotation * dir2;
                let _ = support_points.add(a, b, dir1);
                let _ = support_points.add(a, b, dir2);
                let _ = support_points.add(a, b, dir3);
            }
            3 | 4 => {
                // Already enough points.
            }
            _ => {
                debug_assert!(false, "invalid GJK simplex");
                return false;
            }
        }

        // Create the hull out of the initial points.
        debug_assert!(support_points.y.len() >= 3);
        let mut hull = HullBuilder::new();
        hull.initialize(&support_points.y, 0, 1, 2);
        for i in 3..support_points.y.len() {
            let mut dist_sqr = 0.0;
            if let Some(tri) = hull.find_facing_triangle(support_points.y[i], &mut dist_sqr) {
                let mut new_triangles = NewTriangles::new();
                if !hull.add_point(&support_points.y, tri, i, Real::MAX, &mut new_triangles) {
                    // There is no recovering from a failed insertion since
                    // the old triangles have been unlinked already. This
                    // happens when the shapes touch in a single point and
                    // the hull is degenerate; report no collision.
                    return false;
                }
            }
        }

        // Loop until we are sure that the origin is inside the hull.
        loop {
            let tri_id = match hull.peek_closest_triangle() {
                Some(id) => id,
                None => return false,
            };

            if hull.triangle(tri_id).removed {
                // Removed triangles are not processed, only recycled once
                // they leave the heap.
                let _ = hull.pop_closest_triangle();

                // Out of triangles: the origin could not be included in the
                // hull, so the penetration is too small to resolve.
                if !hull.has_next_triangle() {
                    return false;
                }

                hull.free_triangle(tri_id);
                continue;
            }

            // A non-negative closest distance means the origin is inside the
            // hull and the main algorithm can start.
            if hull.triangle(tri_id).closest_len_sqr >= 0.0 {
                break;
            }

            // Remove the triangle from the queue before adding new ones,
            // which may produce a new closest triangle at the front.
            let _ = hull.pop_closest_triangle();

            // Add a support point to get the origin inside the hull.
            let normal = hull.triangle(tri_id).normal;
            let (w, new_index) = support_points.add(a, b, normal);

            let facing = hull.triangle(tri_id).is_facing(w);
            let mut new_triangles = NewTriangles::new();
            if !facing
                || !hull.add_point(&support_points.y, tri_id, new_index, Real::MAX, &mut new_triangles)
            {
                return false;
            }

            // The triangle faced the support point, so it is removed now and
            // can be recycled.
            debug_assert!(hull.triangle(tri_id).removed);
            hull.free_triangle(tri_id);

            if !hull.has_next_triangle()
                || support_points.y.len() >= MAX_POINTS_TO_INCLUDE_ORIGIN_IN_HULL
            {
                return false;
            }
        }

        // Current closest distance to the origin.
        let mut closest_dist_sqr = Real::MAX;

        // Last good triangle.
        let mut last: Option<hull_builder::TriangleId> = None;

        // Whether the penetration sign needs to be flipped, see below.
        let mut flip_v_sign = false;

        // Expand until no closer point is found.
        loop {
            let tri_id = match hull.pop_closest_triangle() {
                Some(id) => id,
                None => break,
            };

            if hull.triangle(tri_id).removed {
                // Recycle tombstoned triangles as they surface in the heap.
                hull.free_triangle(tri_id);
                if !(hull.has_next_triangle() && support_points.y.len() < MAX_POINTS) {
                    break;
                }
                continue;
            }

            // If the next closest triangle is further away than the closest
            // point found so far, that closest point is the answer.
            if hull.triangle(tri_id).closest_len_sqr >= closest_dist_sqr {
                break;
            }

            // Replace the last good triangle with this one.
            if let Some(prev) = last {
                hull.free_triangle(prev);
            }
            last = Some(tri_id);

            // Add a support point in the direction of the plane normal. The
            // article uses the closest point between origin and plane, but
            // that has the exact same direction as the normal (when the
            // origin is behind the plane) with fewer calculations and less
            // precision loss.
            let normal = hull.triangle(tri_id).normal;
            let (w, new_index) = support_points.add(a, b, normal);

            // Project w onto the triangle normal.
            let dot = normal.dot(&w);

            // A negative projection is a separating axis: the shape shrunk
            // by its convex radius and expanded again ended up bigger than
            // the original due to inaccuracies in the shrinking.
            if dot < 0.0 {
                return false;
            }

            // Squared distance along the normal to the support point.
            let dist_sqr = dot * dot / normal.norm_squared();

            // If the error became small enough, we've converged.
            let closest_len_sqr = hull.triangle(tri_id).closest_len_sqr;
            if dist_sqr - closest_len_sqr < closest_len_sqr * tolerance {
                break;
            }

            closest_dist_sqr = closest_dist_sqr.min(dist_sqr);

            // If the triangle thinks this point is not front facing, we've
            // reached numerical precision and we're done.
            if !hull.triangle(tri_id).is_facing(w) {
                break;
            }

            let mut new_triangles = NewTriangles::new();
            if !hull.add_point(
                &support_points.y,
                tri_id,
                new_index,
                closest_dist_sqr,
                &mut new_triangles,
            ) {
                break;
            }

            // If the hull is starting to form defects we're reaching
            // numerical precision and have to stop.
            let has_defect = new_triangles
                .iter()
                .any(|id| hull.triangle(*id).is_facing_origin());
            if has_defect {
                // With a defective hull the origin may have been classified
                // on the wrong side of the triangle. Probe the opposite
                // direction and flip the sign of the penetration depth if the
                // reverse penetration is smaller. This is a heuristic for a
                // degenerate hull, not a proven property.
                let w2 = a.support_point(&-normal) - b.support_point(&normal);
                let dot2 = -normal.dot(&w2);
                if dot2 < dot {
                    flip_v_sign = true;
                }
                break;
            }

            if !(hull.has_next_triangle() && support_points.y.len() < MAX_POINTS) {
                break;
            }
        }

        // If last is still empty the hull was a plane: no penetration.
        let Some(last) = last else {
            log::debug!("EPA: hull collapsed to a plane, reporting no collision");
            return false;
        };
        let tri = hull.triangle(last);

        // Penetration vector from the origin to the closest point on the
        // triangle: distance = (centroid - origin) . normal / |normal|,
        // closest = origin + distance * normal / |normal|.
        *out_v = (tri.centroid.dot(&tri.normal) / tri.normal.norm_squared()) * tri.normal;

        // A near-zero penetration has no usable normal; treat it as a
        // non-collision.
        if out_v.norm_squared() < 1.0e-12 {
            return false;
        }

        if flip_v_sign {
            *out_v = -*out_v;
        }

        // Use the barycentric coordinates of the closest point to the origin
        // to find the contact points on A and B.
        let i0 = tri.edges[0].start_idx;
        let i1 = tri.edges[1].start_idx;
        let i2 = tri.edges[2].start_idx;

        let p0 = support_points.p[i0].coords;
        let p1 = support_points.p[i1].coords;
        let p2 = support_points.p[i2].coords;

        let q0 = support_points.q[i0].coords;
        let q1 = support_points.q[i1].coords;
        let q2 = support_points.q[i2].coords;

        if tri.lambda_relative_to_0 {
            // y0 was the reference vertex.
            *out_a = Point::from(p0 + tri.lambda[0] * (p1 - p0) + tri.lambda[1] * (p2 - p0));
            *out_b = Point::from(q0 + tri.lambda[0] * (q1 - q0) + tri.lambda[1] * (q2 - q0));
        } else {
            // y1 was the reference vertex.
            *out_a = Point::from(p1 + tri.lambda[0] * (p0 - p1) + tri.lambda[1] * (p2 - p1));
            *out_b = Point::from(q1 + tri.lambda[0] * (q0 - q1) + tri.lambda[1] * (q2 - q1));
        }

        true
    }

    /// Convenience function combining the GJK and EPA steps.
    ///
    /// Less performant since all four support objects have to be provided up
    /// front. `io_v` must be initialized, see [`Self::step_gjk`].
    pub fn penetration_depth<AE, AI, BE, BI>(
        &mut self,
        a_excluding_radius: &AE,
        a_including_radius: &AI,
        convex_radius_a: Real,
        b_excluding_radius: &BE,
        b_including_radius: &BI,
        convex_radius_b: Real,
        collision_tolerance: Real,
        penetration_tolerance: Real,
        io_v: &mut Vector,
        out_a: &mut Point,
        out_b: &mut Point,
    ) -> bool
    where
        AE: ?Sized + SupportMap,
        AI: ?Sized + SupportMap,
        BE: ?Sized + SupportMap,
        BI: ?Sized + SupportMap,
    {
        match self.step_gjk(
            a_excluding_radius,
            convex_radius_a,
            b_excluding_radius,
            convex_radius_b,
            collision_tolerance,
            io_v,
            out_a,
            out_b,
        ) {
            Status::Colliding => true,
            Status::NotColliding => false,
            Status::Indeterminate => self.step_epa(
                a_including_radius,
                b_including_radius,
                penetration_tolerance,
                io_v,
                out_a,
                out_b,
            ),
        }
    }

    /// Tests if the shape `a`, moving from `start` along
    /// `lambda * direction` with `lambda e [0, lambda)`, intersects `b`.
    ///
    /// Combines the GJK cast with an EPA run at the start pose when the cast
    /// lands at fraction 0 and the contact normal cannot be trusted (too
    /// small, or no convex radius to pad the separation).
    ///
    /// On a hit, `lambda` is the collision fraction, `out_a`/`out_b` the
    /// contact points and `out_contact_normal` either the contact normal or
    /// the penetration axis when the shapes overlap at the start of the
    /// sweep (pointing from A to B, not normalized).
    pub fn cast_shape<A, B>(
        &mut self,
        start: &Isometry,
        direction: &Vector,
        collision_tolerance: Real,
        penetration_tolerance: Real,
        a: &A,
        b: &B,
        convex_radius_a: Real,
        convex_radius_b: Real,
        return_deepest_point: bool,
        lambda: &mut Real,
        out_a: &mut Point,
        out_b: &mut Point,
        out_contact_normal: &mut Vector,
    ) -> bool
    where
        A: ?Sized + SupportMap,
        B: ?Sized + SupportMap,
    {
        // First determine if there's a collision at all.
        if !self.gjk.cast_shape_with_contact(
            start,
            direction,
            collision_tolerance,
            a,
            b,
            convex_radius_a,
            convex_radius_b,
            lambda,
            out_a,
            out_b,
            out_contact_normal,
        ) {
            return false;
        }

        // When the contact normal is too small the result is not accurate.
        let contact_normal_invalid =
            out_contact_normal.norm_squared() <= collision_tolerance * collision_tolerance;

        if return_deepest_point
            // Only at lambda == 0 can the bodies overlap.
            && *lambda == 0.0
            // Without a convex radius, contact points at lambda = 0 can
            // never be trusted.
            && (convex_radius_a + convex_radius_b == 0.0 || contact_normal_invalid)
        {
            // Initially intersecting: run EPA to find the deepest contact.
            let add_convex_a = AddConvexRadius::new(a, convex_radius_a);
            let add_convex_b = AddConvexRadius::new(b, convex_radius_b);
            let transformed_a = TransformedSupport::new(*start, &add_convex_a);
            if !self.step_epa(
                &transformed_a,
                &add_convex_b,
                penetration_tolerance,
                out_contact_normal,
                out_a,
                out_b,
            ) {
                return false;
            }
        } else if contact_normal_invalid {
            // No usable contact normal; use the cast direction instead.
            *out_contact_normal = *direction;
        }

        true
    }
}

/// An arbitrary unit vector perpendicular to `v` (`v` must be normalized).
fn normalized_perpendicular(v: Vector) -> Vector {
    if v.x.abs() > v.y.abs() {
        let len = (v.x * v.x + v.z * v.z).sqrt();
        Vector::new(v.z, 0.0, -v.x) / len
    } else {
        let len = (v.y * v.y + v.z * v.z).sqrt();
        Vector::new(0.0, v.z, -v.y) / len
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Sphere {
        center: Point,
        radius: Real,
    }

    impl SupportMap for Sphere {
        fn support_point(&self, dir: &Vector) -> Point {
            match dir.try_normalize(0.0) {
                Some(n) => self.center + n * self.radius,
                None => self.center,
            }
        }
    }

    #[test]
    fn deep_spheres_penetration_depth() {
        // Spheres of radius 1 with centers 1 apart: penetration 1.
        let a = Sphere { center: Point::origin(), radius: 1.0 };
        let b = Sphere { center: Point::new(1.0, 0.0, 0.0), radius: 1.0 };

        let mut pen = PenetrationDepth::new();
        let mut v = Vector::x();
        let mut on_a = Point::origin();
        let mut on_b = Point::origin();
        let status = pen.step_gjk(&a, 0.0, &b, 0.0, 1.0e-4, &mut v, &mut on_a, &mut on_b);
        assert_eq!(status, Status::Indeterminate);

        assert!(pen.step_epa(&a, &b, 1.0e-4, &mut v, &mut on_a, &mut on_b));
        let depth = (on_b - on_a).norm();
        assert_relative_eq!(depth, 1.0, epsilon = 0.05);
        // v points from A to B along the shortest exit path.
        assert!(v.x > 0.0);
    }

    #[test]
    fn separated_spheres_not_colliding() {
        let a = Sphere { center: Point::origin(), radius: 1.0 };
        let b = Sphere { center: Point::new(5.0, 0.0, 0.0), radius: 1.0 };

        let mut pen = PenetrationDepth::new();
        let mut v = Vector::x();
        let mut on_a = Point::origin();
        let mut on_b = Point::origin();
        let status = pen.step_gjk(&a, 0.0, &b, 0.0, 1.0e-4, &mut v, &mut on_a, &mut on_b);
        assert_eq!(status, Status::NotColliding);
    }

    #[test]
    fn touching_within_convex_radius_is_colliding() {
        // Cores are 3 apart, radii of 1.6 each overlap by 0.2.
        let a = Sphere { center: Point::origin(), radius: 0.0 };
        let b = Sphere { center: Point::new(3.0, 0.0, 0.0), radius: 0.0 };

        let mut pen = PenetrationDepth::new();
        let mut v = Vector::x();
        let mut on_a = Point::origin();
        let mut on_b = Point::origin();
        let status = pen.step_gjk(&a, 1.6, &b, 1.6, 1.0e-4, &mut v, &mut on_a, &mut on_b);
        assert_eq!(status, Status::Colliding);
        assert_relative_eq!(on_a, Point::new(1.6, 0.0, 0.0), epsilon = 1.0e-3);
        assert_relative_eq!(on_b, Point::new(1.4, 0.0, 0.0), epsilon = 1.0e-3);
    }
}
