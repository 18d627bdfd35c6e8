//! The Gilbert-Johnson-Keerthi distance algorithm.
//!
//! Used for convex vs convex collision detection: GJK maintains a simplex of
//! at most 4 points of the Minkowski difference `A - B` and iteratively
//! refines it toward the point of the difference closest to the origin. The
//! shapes overlap iff the difference contains the origin.
//!
//! Based on: "A Fast and Robust GJK Implementation for Collision Detection of
//! Convex Objects" - Gino van den Bergen, and "Ray Casting against General
//! Convex Objects with Application to Continuous Collision Detection" by the
//! same author for the ray / shape cast variants.

use crate::math::{Isometry, Point, Real, Vector};

pub use self::support::{
    AddConvexRadius, MinkowskiDifference, PointSupport, PolygonSupport, SupportMap,
    TransformedSupport, TriangleSupport,
};

pub mod closest_point;
mod support;

use closest_point as cp;

/// The GJK closest point algorithm.
///
/// The struct owns the working simplex so a single instance can chain a
/// closest-points query into an EPA run (see [`crate::epa`]) without
/// recomputing the simplex.
#[derive(Default)]
pub struct GjkClosestPoint {
    /// Support points on A - B.
    y: [Vector; 4],
    /// Support points on A.
    p: [Point; 4],
    /// Support points on B.
    q: [Point; 4],
    /// Number of valid entries in `y`, `p` and `q`.
    num_points: usize,
}

impl GjkClosestPoint {
    /// Creates a new instance with an empty simplex.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tests if `a` and `b` intersect.
    ///
    /// `separating_axis` is used as the initial axis guess (pass a zero
    /// vector if unknown). On a miss it is updated to an axis pointing from
    /// A to B (its magnitude is meaningless); on a hit it is set to zero.
    ///
    /// `tolerance` is the minimal distance between the objects at which they
    /// are still considered colliding.
    pub fn intersects<A, B>(
        &mut self,
        a: &A,
        b: &B,
        tolerance: Real,
        separating_axis: &mut Vector,
    ) -> bool
    where
        A: ?Sized + SupportMap,
        B: ?Sized + SupportMap,
    {
        // `separating_axis` is `v` in the comments below; for most of the
        // loop it is just a direction.
        let tolerance_sqr = tolerance * tolerance;

        self.num_points = 0;

        // Previous length^2 of v.
        let mut prev_len_sqr = Real::MAX;

        loop {
            // Support point of the Minkowski difference A - B along v.
            let p = a.support_point(separating_axis);
            let q = b.support_point(&-*separating_axis);
            let w = p - q;

            // If the support point is on the opposite side of v, we have
            // found a separating axis and there is no intersection.
            if separating_axis.dot(&w) < 0.0 {
                return false;
            }

            // Store the point for later use.
            self.y[self.num_points] = w;
            self.num_points += 1;

            // Determine the new closest point.
            let mut v_len_sqr = 0.0;
            let mut set = 0;
            if !self.get_closest::<true>(prev_len_sqr, separating_axis, &mut v_len_sqr, &mut set) {
                return false;
            }

            // If there are 4 points, the origin is inside the tetrahedron.
            if set == 0xf {
                *separating_axis = Vector::zeros();
                return true;
            }

            // If v is very close to zero, we consider this a collision.
            if v_len_sqr <= tolerance_sqr {
                *separating_axis = Vector::zeros();
                return true;
            }

            // If v is very small compared to the length of y, we also
            // consider this a collision.
            if v_len_sqr <= Real::EPSILON * self.max_y_length_sqr() {
                *separating_axis = Vector::zeros();
                return true;
            }

            // The next axis to test is the negative of the closest point of
            // the Minkowski difference to the origin. This must happen before
            // the convergence test below since the separating axis is -v.
            *separating_axis = -*separating_axis;

            // If the squared length of v is not changing enough, we have
            // converged and there is no collision.
            debug_assert!(prev_len_sqr >= v_len_sqr);
            if prev_len_sqr - v_len_sqr <= Real::EPSILON * prev_len_sqr {
                // v is a separating axis.
                return false;
            }
            prev_len_sqr = v_len_sqr;

            // Prune the simplex.
            self.update_point_set_y(set);
        }
    }

    /// Computes the closest points between `a` and `b`.
    ///
    /// Returns the squared distance between the objects:
    /// - `0.0`: the objects are colliding; `separating_axis` is zero and the
    ///   output points are invalid.
    /// - `(0, Real::MAX)`: `separating_axis` points from A to B and its
    ///   squared length is the returned distance; `out_a`/`out_b` are the
    ///   witness points on A and B.
    /// - `Real::MAX`: the objects are further apart than `max_dist_sqr`; the
    ///   outputs are invalid (the axis still points from A to B).
    ///
    /// `separating_axis` must be a non-zero initial guess.
    pub fn closest_points<A, B>(
        &mut self,
        a: &A,
        b: &B,
        tolerance: Real,
        max_dist_sqr: Real,
        separating_axis: &mut Vector,
        out_a: &mut Point,
        out_b: &mut Point,
    ) -> Real
    where
        A: ?Sized + SupportMap,
        B: ?Sized + SupportMap,
    {
        let tolerance_sqr = tolerance * tolerance;

        self.num_points = 0;

        // Length^2 of v and of the previous iteration's v.
        let mut v_len_sqr = separating_axis.norm_squared();
        let mut prev_len_sqr = Real::MAX;

        loop {
            // Support point of the Minkowski difference A - B along v.
            let p = a.support_point(separating_axis);
            let q = b.support_point(&-*separating_axis);
            let w = p - q;

            let dot = separating_axis.dot(&w);

            // Test if we have a separation of more than max_dist_sqr, in
            // which case we terminate early.
            if dot < 0.0 && dot * dot > v_len_sqr * max_dist_sqr {
                return Real::MAX;
            }

            // Store the points for later use.
            self.y[self.num_points] = w;
            self.p[self.num_points] = p;
            self.q[self.num_points] = q;
            self.num_points += 1;

            let mut set = 0;
            if !self.get_closest::<true>(prev_len_sqr, separating_axis, &mut v_len_sqr, &mut set) {
                // Undo the last point and terminate with the previous state.
                self.num_points -= 1;
                break;
            }

            // If there are 4 points, the origin is inside the tetrahedron.
            if set == 0xf {
                *separating_axis = Vector::zeros();
                v_len_sqr = 0.0;
                break;
            }

            // Prune the simplex.
            self.update_point_set_ypq(set);

            // If v is very close to zero, we consider this a collision.
            if v_len_sqr <= tolerance_sqr {
                *separating_axis = Vector::zeros();
                v_len_sqr = 0.0;
                break;
            }

            // If v is very small compared to the length of y, we also
            // consider this a collision.
            if v_len_sqr <= Real::EPSILON * self.max_y_length_sqr() {
                *separating_axis = Vector::zeros();
                v_len_sqr = 0.0;
                break;
            }

            // The next axis to test is the negative of the closest point of
            // the Minkowski difference to the origin. This must happen before
            // the convergence test below since the separating axis is -v.
            *separating_axis = -*separating_axis;

            // If the squared length of v is not changing enough, we have
            // converged and there is no collision.
            debug_assert!(prev_len_sqr >= v_len_sqr);
            if prev_len_sqr - v_len_sqr <= Real::EPSILON * prev_len_sqr {
                // v is a separating axis.
                break;
            }
            prev_len_sqr = v_len_sqr;
        }

        let (point_a, point_b) = self.calculate_points_a_and_b();
        *out_a = point_a;
        *out_b = point_b;
        v_len_sqr
    }

    /// The simplex left behind by [`Self::closest_points`], for handoff to
    /// EPA. If the query returned a squared distance of zero, the origin is
    /// contained in the simplex.
    pub fn simplex(&self) -> (&[Vector], &[Point], &[Point]) {
        (
            &self.y[..self.num_points],
            &self.p[..self.num_points],
            &self.q[..self.num_points],
        )
    }

    /// Tests if the ray `origin + lambda * direction` with
    /// `lambda e [0, lambda)` intersects `a`.
    ///
    /// `direction` includes the length of the ray; on a hit, `lambda` is
    /// updated with the collision fraction. `tolerance` is the minimal
    /// distance between the ray and `a` at which they are considered
    /// colliding.
    pub fn cast_ray<A>(
        &mut self,
        origin: &Point,
        direction: &Vector,
        tolerance: Real,
        a: &A,
        lambda: &mut Real,
    ) -> bool
    where
        A: ?Sized + SupportMap,
    {
        let tolerance_sqr = tolerance * tolerance;

        self.num_points = 0;

        let mut current_lambda: Real = 0.0;
        let mut x = *origin;
        let mut v = x - a.support_point(&Vector::zeros());
        let mut v_len_sqr = v.norm_squared();
        let mut allow_restart = false;

        loop {
            // Get a new support point.
            let p = a.support_point(&v);
            let w = x - p;

            let v_dot_w = v.dot(&w);
            if v_dot_w > 0.0 {
                // If the ray and normal are in the same direction, we have
                // passed A and there is no collision.
                let v_dot_r = v.dot(direction);

                // Instead of checking >= 0, check with epsilon so the
                // division below cannot overflow to infinity.
                if v_dot_r >= -1.0e-18 {
                    return false;
                }

                // Update the lower bound for lambda.
                let delta = v_dot_w / v_dot_r;
                let old_lambda = current_lambda;
                current_lambda -= delta;

                // If lambda didn't change, we cannot converge any further and
                // we assume a hit.
                if old_lambda == current_lambda {
                    break;
                }

                // If lambda is bigger or equal than the max, there is no hit.
                if current_lambda >= *lambda {
                    return false;
                }

                // Update x to the new closest point on the ray.
                x = *origin + current_lambda * direction;

                // We've shifted x, so reset v_len_sqr so that it is not used
                // as an early out for get_closest.
                v_len_sqr = Real::MAX;

                // We allow rebuilding the simplex once after x changes
                // because the simplex was built for another x and numerical
                // round off builds up as you keep adding points to an
                // existing simplex.
                allow_restart = true;
            }

            // Add p to the set P.
            self.p[self.num_points] = p;
            self.num_points += 1;

            // Calculate Y = {x} - P.
            for i in 0..self.num_points {
                self.y[i] = x - self.p[i];
            }

            // Determine the new closest point from Y to the origin.
            let mut set = 0;
            if !self.get_closest::<false>(v_len_sqr, &mut v, &mut v_len_sqr, &mut set) {
                // Failed to converge. Only allow 1 restart; if we still can't
                // get a closest point we're so close that we return a hit.
                if !allow_restart {
                    break;
                }

                allow_restart = false;
                self.p[0] = p;
                self.num_points = 1;
                v = x - p;
                v_len_sqr = Real::MAX;
                continue;
            } else if set == 0xf {
                // We're inside the tetrahedron, we have a hit.
                debug_assert!(v_len_sqr == 0.0);
                break;
            }

            // Prune the point set P. Y is not updated since it shifts with x
            // and is recalculated every iteration.
            self.update_point_set_p(set);

            // Check if x is close enough to a.
            if v_len_sqr <= tolerance_sqr {
                break;
            }
        }

        *lambda = current_lambda;
        true
    }

    /// Tests if the shape `a`, moving from `start` along
    /// `lambda * direction` with `lambda e [0, lambda)`, intersects `b`.
    ///
    /// On a hit, `lambda` is updated with the collision fraction.
    pub fn cast_shape<A, B>(
        &mut self,
        start: &Isometry,
        direction: &Vector,
        tolerance: Real,
        a: &A,
        b: &B,
        lambda: &mut Real,
    ) -> bool
    where
        A: ?Sized + SupportMap,
        B: ?Sized + SupportMap,
    {
        // Transform the shape to be cast to its starting position.
        let transformed_a = TransformedSupport::new(*start, a);

        // A is moving, so the ray hits the front of B with the back of A:
        // cast a ray through the Minkowski difference B - A.
        let difference = MinkowskiDifference::new(b, &transformed_a);
        self.cast_ray(&Point::origin(), direction, tolerance, &difference, lambda)
    }

    /// Tests if the shape `a`, moving from `start` along
    /// `lambda * direction` with `lambda e [0, lambda)`, intersects `b`,
    /// inflating both shapes by their convex radii.
    ///
    /// On a hit, `lambda` is updated with the collision fraction,
    /// `out_a`/`out_b` receive the contact points (when the separating axis
    /// is near zero these may not be the deepest points), and
    /// `out_separating_axis` points from A to B along the smallest
    /// separation excluding the convex radii. When the axis is near zero the
    /// bodies overlap at `lambda = 0` and the direction may be inaccurate.
    pub fn cast_shape_with_contact<A, B>(
        &mut self,
        start: &Isometry,
        direction: &Vector,
        tolerance: Real,
        a: &A,
        b: &B,
        convex_radius_a: Real,
        convex_radius_b: Real,
        lambda: &mut Real,
        out_a: &mut Point,
        out_b: &mut Point,
        out_separating_axis: &mut Vector,
    ) -> bool
    where
        A: ?Sized + SupportMap,
        B: ?Sized + SupportMap,
    {
        let mut tolerance_sqr = tolerance * tolerance;

        // How close A and B (without their convex radii) need to be for us to
        // consider this a collision.
        let sum_convex_radius = convex_radius_a + convex_radius_b;

        // Transform the shape to be cast to its starting position.
        let transformed_a = TransformedSupport::new(*start, a);

        self.num_points = 0;

        let mut current_lambda: Real = 0.0;

        // Since A is already transformed we can start the cast from zero.
        let mut x = Vector::zeros();

        // See cast_ray: v = x - support(0) of the difference B - A, with x
        // at zero.
        let mut v =
            -b.support_point(&Vector::zeros()).coords + transformed_a.support_point(&Vector::zeros()).coords;
        let mut v_len_sqr = v.norm_squared();
        let mut allow_restart = false;

        // Separating axis of the previous iteration; zero because we don't
        // know yet whether the first v actually separates.
        let mut prev_v = Vector::zeros();

        loop {
            // Support points of the Minkowski difference B - A. The support
            // points on A and B are kept separate so a contact point can be
            // computed at the end.
            let p = transformed_a.support_point(&-v);
            let q = b.support_point(&v);
            let w = x - (q - p);

            // The convex radii were not included in p and q so a good
            // separating axis can be computed, but moving along `direction`
            // has to keep A and B separated by the sum of their radii:
            // to w we would add -(radius_a + radius_b) * v / |v|, so to
            // v . w we add -(radius_a + radius_b) * |v|.
            let v_dot_w = v.dot(&w) - sum_convex_radius * v.norm();

            if v_dot_w > 0.0 {
                // If the ray and normal are in the same direction, we have
                // passed A and there is no collision.
                let v_dot_r = v.dot(direction);

                // Instead of checking >= 0, check with epsilon so the
                // division below cannot overflow to infinity.
                if v_dot_r >= -1.0e-18 {
                    return false;
                }

                // Update the lower bound for lambda.
                let delta = v_dot_w / v_dot_r;
                let old_lambda = current_lambda;
                current_lambda -= delta;

                // If lambda didn't change, we cannot converge any further and
                // we assume a hit.
                if old_lambda == current_lambda {
                    break;
                }

                // If lambda is bigger or equal than the max, there is no hit.
                if current_lambda >= *lambda {
                    return false;
                }

                // Update x to the new closest point on the ray.
                x = current_lambda * direction;

                // We've shifted x, so reset v_len_sqr so that it is not used
                // as an early out when get_closest fails.
                v_len_sqr = Real::MAX;

                // Now that we've moved, A and B are not intersecting at this
                // lambda, so iteration can stop as soon as they are
                // sum_convex_radius apart.
                let t = tolerance + sum_convex_radius;
                tolerance_sqr = t * t;

                // We allow rebuilding the simplex once after x changes, see
                // cast_ray.
                allow_restart = true;
            }

            // Add p to set P, q to set Q.
            self.p[self.num_points] = p;
            self.q[self.num_points] = q;
            self.num_points += 1;

            // Calculate Y = {x} - (Q - P).
            for i in 0..self.num_points {
                self.y[i] = x - (self.q[i] - self.p[i]);
            }

            // Determine the new closest point from Y to the origin.
            let mut set = 0;
            if !self.get_closest::<false>(v_len_sqr, &mut v, &mut v_len_sqr, &mut set) {
                // Only allow 1 restart; if we still can't get a closest point
                // we're so close that we return a hit.
                if !allow_restart {
                    break;
                }

                allow_restart = false;
                self.p[0] = p;
                self.q[0] = q;
                self.num_points = 1;
                v = x - q.coords;
                v_len_sqr = Real::MAX;
                continue;
            } else if set == 0xf {
                // We're inside the tetrahedron, we have a hit.
                debug_assert!(v_len_sqr == 0.0);
                break;
            }

            // Prune the point sets P and Q. Y is not updated since it shifts
            // with x and is recalculated every iteration.
            self.update_point_set_pq(set);

            // Check if A and B are touching according to our tolerance.
            if v_len_sqr <= tolerance_sqr {
                break;
            }

            // Store v to return as a separating axis.
            prev_v = v;
        }

        // Calculate Y = {x} - (Q - P) again for the contact points.
        for i in 0..self.num_points {
            self.y[i] = x - (self.q[i] - self.p[i]);
        }

        // Offset to apply to A and B to correct for the convex radii.
        let normalized_v = v.try_normalize(0.0).unwrap_or_else(Vector::zeros);
        let convex_radius_a = convex_radius_a * normalized_v;
        let convex_radius_b = convex_radius_b * normalized_v;

        // A and B coincide when lambda > 0; in that case only B is
        // calculated since it is more accurate (it contains fewer terms).
        match self.num_points {
            1 => {
                *out_b = self.q[0] + convex_radius_b;
                *out_a = if current_lambda > 0.0 {
                    *out_b
                } else {
                    self.p[0] - convex_radius_a
                };
            }
            2 => {
                let (bu, bv, _) = cp::barycentric_coordinates_line(self.y[0], self.y[1]);
                *out_b = Point::from(bu * self.q[0].coords + bv * self.q[1].coords + convex_radius_b);
                *out_a = if current_lambda > 0.0 {
                    *out_b
                } else {
                    Point::from(bu * self.p[0].coords + bv * self.p[1].coords - convex_radius_a)
                };
            }
            // A full simplex: a contact point can't properly be determined,
            // use the closest point of the previous iteration.
            3 | 4 => {
                let (bu, bv, bw, _) =
                    cp::barycentric_coordinates_triangle(self.y[0], self.y[1], self.y[2]);
                *out_b = Point::from(
                    bu * self.q[0].coords + bv * self.q[1].coords + bw * self.q[2].coords
                        + convex_radius_b,
                );
                *out_a = if current_lambda > 0.0 {
                    *out_b
                } else {
                    Point::from(
                        bu * self.p[0].coords + bv * self.p[1].coords + bw * self.p[2].coords
                            - convex_radius_a,
                    )
                };
            }
            _ => {}
        }

        // If there is a convex radius v is usable as a separating axis;
        // otherwise v is very small, so the previous v approximates it.
        *out_separating_axis = if sum_convex_radius > 0.0 { -v } else { -prev_v };

        *lambda = current_lambda;
        true
    }

    /// New closest point to the origin given the simplex `y` of `num_points`
    /// points.
    ///
    /// If `LAST_POINT_RELEVANT` is true, the last point added is assumed to
    /// be part of the closest feature and the function does less work.
    ///
    /// `prev_len_sqr` is `|v|^2` from the previous iteration, used as an
    /// upper bound when selecting the new closest point. Returns false if no
    /// closer point was found; the outputs are untouched in that case.
    fn get_closest<const LAST_POINT_RELEVANT: bool>(
        &self,
        prev_len_sqr: Real,
        out_v: &mut Vector,
        out_v_len_sqr: &mut Real,
        out_set: &mut u32,
    ) -> bool {
        let mut set = 0;
        let v = match self.num_points {
            1 => {
                set = 0b0001;
                self.y[0]
            }
            2 => cp::closest_point_on_segment(self.y[0], self.y[1], &mut set),
            3 => cp::closest_point_on_triangle::<LAST_POINT_RELEVANT>(
                self.y[0], self.y[1], self.y[2], &mut set,
            ),
            4 => cp::closest_point_on_tetrahedron::<LAST_POINT_RELEVANT>(
                self.y[0], self.y[1], self.y[2], self.y[3], &mut set,
            ),
            _ => {
                debug_assert!(false, "invalid simplex size");
                return false;
            }
        };

        // The comparison order is important: if v_len_sqr is NaN the
        // expression is false and we fail to converge rather than propagate
        // garbage.
        let v_len_sqr = v.norm_squared();
        if v_len_sqr < prev_len_sqr {
            *out_v = v;
            *out_v_len_sqr = v_len_sqr;
            *out_set = set;
            true
        } else {
            // The new closest point is further away, failed to converge.
            false
        }
    }

    /// The largest squared length among the valid points of `y`.
    fn max_y_length_sqr(&self) -> Real {
        let mut max = 0.0;
        for y in &self.y[..self.num_points] {
            max = y.norm_squared().max(max);
        }
        max
    }

    /// Removes points not in `set`, updating `y` only.
    fn update_point_set_y(&mut self, set: u32) {
        let mut num = 0;
        for i in 0..self.num_points {
            if set & (1 << i) != 0 {
                self.y[num] = self.y[i];
                num += 1;
            }
        }
        self.num_points = num;
    }

    /// Removes points not in `set`, updating `p` only.
    fn update_point_set_p(&mut self, set: u32) {
        let mut num = 0;
        for i in 0..self.num_points {
            if set & (1 << i) != 0 {
                self.p[num] = self.p[i];
                num += 1;
            }
        }
        self.num_points = num;
    }

    /// Removes points not in `set`, updating `p` and `q` only.
    fn update_point_set_pq(&mut self, set: u32) {
        let mut num = 0;
        for i in 0..self.num_points {
            if set & (1 << i) != 0 {
                self.p[num] = self.p[i];
                self.q[num] = self.q[i];
                num += 1;
            }
        }
        self.num_points = num;
    }

    /// Removes points not in `set`, updating `y`, `p`, and `q`.
    fn update_point_set_ypq(&mut self, set: u32) {
        let mut num = 0;
        for i in 0..self.num_points {
            if set & (1 << i) != 0 {
                self.y[num] = self.y[i];
                self.p[num] = self.p[i];
                self.q[num] = self.q[i];
                num += 1;
            }
        }
        self.num_points = num;
    }

    /// Witness points on A and B reconstructed from the current simplex by
    /// barycentric interpolation.
    fn calculate_points_a_and_b(&self) -> (Point, Point) {
        match self.num_points {
            1 => (self.p[0], self.q[0]),
            2 => {
                let (u, v, _) = cp::barycentric_coordinates_line(self.y[0], self.y[1]);
                (
                    Point::from(u * self.p[0].coords + v * self.p[1].coords),
                    Point::from(u * self.q[0].coords + v * self.q[1].coords),
                )
            }
            3 => {
                let (u, v, w, _) =
                    cp::barycentric_coordinates_triangle(self.y[0], self.y[1], self.y[2]);
                (
                    Point::from(u * self.p[0].coords + v * self.p[1].coords + w * self.p[2].coords),
                    Point::from(u * self.q[0].coords + v * self.q[1].coords + w * self.q[2].coords),
                )
            }
            // With a full simplex the origin is enclosed: the distance is
            // zero and the witness points carry no information.
            _ => (Point::origin(), Point::origin()),
        }
    }
}
