//! Closest point to the origin on simplex features.
//!
//! These are the sub-algorithms the GJK kernel dispatches to for simplices of
//! 1 to 4 points. Each returns the closest point together with a bitmask of
//! the simplex vertices spanning the closest feature (bit 0 = first vertex,
//! bit 1 = second, ...), which the caller uses to prune the simplex before
//! the next iteration.
//!
//! Based on "Real-Time Collision Detection" by Christer Ericson (closest
//! point on triangle/tetrahedron), adjusted to always include the shortest
//! edge in the computations to preserve accuracy, see
//! <https://box2d.org/posts/2014/01/troublesome-triangle/>.

use crate::math::{Real, Vector};

/// Barycentric coordinates `(u, v)` of the closest point to the origin on the
/// infinite line through `a` and `b`; the closest point is `u * a + v * b`.
/// Returns `false` if `a` and `b` do not form a line, in which case the
/// coordinates select the closer of the two points.
pub fn barycentric_coordinates_line(a: Vector, b: Vector) -> (Real, Real, bool) {
    let ab = b - a;
    let denominator = ab.norm_squared();
    if denominator < Real::EPSILON * Real::EPSILON {
        // Degenerate line segment, fall back to the closest point.
        if a.norm_squared() < b.norm_squared() {
            (1.0, 0.0, false)
        } else {
            (0.0, 1.0, false)
        }
    } else {
        let v = -a.dot(&ab) / denominator;
        (1.0 - v, v, true)
    }
}

/// Barycentric coordinates `(u, v, w)` of the closest point to the origin on
/// the plane through `a`, `b`, `c`; the closest point is
/// `u * a + v * b + w * c`. Returns `false` if the points do not form a
/// plane, in which case the coordinates are computed along the longest edge.
pub fn barycentric_coordinates_triangle(a: Vector, b: Vector, c: Vector) -> (Real, Real, Real, bool) {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = c - b;

    // Make sure the shortest edge is included in the calculation to keep the
    // products (a * b) - (c * d) as small as possible.
    let d00 = v0.norm_squared();
    let d11 = v1.norm_squared();
    let d22 = v2.norm_squared();
    if d00 <= d22 {
        let d01 = v0.dot(&v1);

        // |v0|^2 * |v1|^2 - (v0 . v1)^2 >= 0 always, zero when degenerate.
        let determinant = d00 * d11 - d01 * d01;
        if determinant < 1.0e-12 {
            // Degenerate triangle, coordinates along the longest edge.
            if d00 > d11 {
                let (u, v, _) = barycentric_coordinates_line(a, b);
                (u, v, 0.0, false)
            } else {
                let (u, w, _) = barycentric_coordinates_line(a, c);
                (u, 0.0, w, false)
            }
        } else {
            let a0 = a.dot(&v0);
            let a1 = a.dot(&v1);
            let v = (d01 * a1 - d11 * a0) / determinant;
            let w = (d01 * a0 - d00 * a1) / determinant;
            (1.0 - v - w, v, w, true)
        }
    } else {
        let d12 = v1.dot(&v2);

        let determinant = d11 * d22 - d12 * d12;
        if determinant < 1.0e-12 {
            if d11 > d22 {
                let (u, w, _) = barycentric_coordinates_line(a, c);
                (u, 0.0, w, false)
            } else {
                let (v, w, _) = barycentric_coordinates_line(b, c);
                (0.0, v, w, false)
            }
        } else {
            let c1 = c.dot(&v1);
            let c2 = c.dot(&v2);
            let v = (d22 * c1 - d12 * c2) / determinant;
            let w = (d11 * c2 - d12 * c1) / determinant;
            (1.0 - v - w, v, w, true)
        }
    }
}

/// Closest point to the origin on segment `(a, b)`. The returned set has
/// bit 0 set if `a` is part of the closest feature and bit 1 for `b`.
pub fn closest_point_on_segment(a: Vector, b: Vector, out_set: &mut u32) -> Vector {
    let (u, v, _) = barycentric_coordinates_line(a, b);
    if v <= 0.0 {
        *out_set = 0b0001;
        a
    } else if u <= 0.0 {
        *out_set = 0b0010;
        b
    } else {
        *out_set = 0b0011;
        u * a + v * b
    }
}

/// Closest point to the origin on triangle `(a, b, c)`. The set describes the
/// closest feature: 1 = a, 2 = b, 4 = c, 5 = edge ac, 7 = interior, etc.
///
/// If `MUST_INCLUDE_C` is true, the function assumes `c` is part of the
/// closest feature and does less work; if the assumption does not hold the
/// closest point of the remaining features is returned.
pub fn closest_point_on_triangle<const MUST_INCLUDE_C: bool>(
    in_a: Vector,
    in_b: Vector,
    in_c: Vector,
    out_set: &mut u32,
) -> Vector {
    // The most accurate normal uses the two shortest edges; if bc is shorter
    // than ac, swap a and c so that a is always on the shortest edge.
    let swap_ac = {
        let ac = in_c - in_a;
        let bc = in_c - in_b;
        bc.norm_squared() < ac.norm_squared()
    };
    let a = if swap_ac { in_c } else { in_a };
    let c = if swap_ac { in_a } else { in_c };

    let mut ab = in_b - a;
    let ac = c - a;
    let n = ab.cross(&ac);
    let normal_len_sqr = n.norm_squared();

    // Square(EPSILON) was too small and caused numerical problems here.
    if normal_len_sqr < 1.0e-10 {
        // Degenerate triangle, fall back to vertices and edges.
        let mut closest_set: u32 = 0b0100;
        let mut closest_point = in_c;
        let mut best_dist_sqr = closest_point.norm_squared();

        // If the closest point must include c then a or b cannot be closest.
        if !MUST_INCLUDE_C {
            let a_len_sqr = in_a.norm_squared();
            if a_len_sqr < best_dist_sqr {
                closest_set = 0b0001;
                closest_point = in_a;
                best_dist_sqr = a_len_sqr;
            }

            let b_len_sqr = in_b.norm_squared();
            if b_len_sqr < best_dist_sqr {
                closest_set = 0b0010;
                closest_point = in_b;
                best_dist_sqr = b_len_sqr;
            }
        }

        // Edge ac.
        let ac_len_sqr = ac.norm_squared();
        if ac_len_sqr > Real::EPSILON * Real::EPSILON {
            let v = (-a.dot(&ac) / ac_len_sqr).clamp(0.0, 1.0);
            let q = a + v * ac;
            let dist_sqr = q.norm_squared();
            if dist_sqr < best_dist_sqr {
                closest_set = 0b0101;
                closest_point = q;
                best_dist_sqr = dist_sqr;
            }
        }

        // Edge bc.
        let bc = in_c - in_b;
        let bc_len_sqr = bc.norm_squared();
        if bc_len_sqr > Real::EPSILON * Real::EPSILON {
            let v = (-in_b.dot(&bc) / bc_len_sqr).clamp(0.0, 1.0);
            let q = in_b + v * bc;
            let dist_sqr = q.norm_squared();
            if dist_sqr < best_dist_sqr {
                closest_set = 0b0110;
                closest_point = q;
                best_dist_sqr = dist_sqr;
            }
        }

        // If the closest point must include c then ab cannot be closest.
        if !MUST_INCLUDE_C {
            ab = in_b - in_a;
            let ab_len_sqr = ab.norm_squared();
            if ab_len_sqr > Real::EPSILON * Real::EPSILON {
                let v = (-in_a.dot(&ab) / ab_len_sqr).clamp(0.0, 1.0);
                let q = in_a + v * ab;
                let dist_sqr = q.norm_squared();
                if dist_sqr < best_dist_sqr {
                    closest_set = 0b0011;
                    closest_point = q;
                }
            }
        }

        *out_set = closest_set;
        return closest_point;
    }

    // Check if the origin is in the vertex region outside a.
    let ap = -a;
    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        *out_set = if swap_ac { 0b0100 } else { 0b0001 };
        return a; // Barycentric coordinates (1, 0, 0).
    }

    // Check if the origin is in the vertex region outside b.
    let bp = -in_b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        *out_set = 0b0010;
        return in_b; // Barycentric coordinates (0, 1, 0).
    }

    // Edge region of ab: project the origin onto ab.
    if d1 * d4 <= d3 * d2 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        *out_set = if swap_ac { 0b0110 } else { 0b0011 };
        return a + v * ab; // Barycentric coordinates (1-v, v, 0).
    }

    // Check if the origin is in the vertex region outside c.
    let cp = -c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        *out_set = if swap_ac { 0b0001 } else { 0b0100 };
        return c; // Barycentric coordinates (0, 0, 1).
    }

    // Edge region of ac: project the origin onto ac.
    if d5 * d2 <= d1 * d6 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        *out_set = 0b0101;
        return a + w * ac; // Barycentric coordinates (1-w, 0, w).
    }

    // Edge region of bc: project the origin onto bc.
    let d4_d3 = d4 - d3;
    let d5_d6 = d5 - d6;
    if d3 * d6 <= d5 * d4 && d4_d3 >= 0.0 && d5_d6 >= 0.0 {
        let w = d4_d3 / (d4_d3 + d5_d6);
        *out_set = if swap_ac { 0b0011 } else { 0b0110 };
        return in_b + w * (c - in_b); // Barycentric coordinates (0, 1-w, w).
    }

    // The origin projects inside the face. Deviating from Ericson here:
    // distance = (centroid - origin) . normal / |normal| is much more
    // accurate than going through barycentric coordinates first.
    *out_set = 0b0111;
    n * (a + in_b + c).dot(&n) / (3.0 * normal_len_sqr)
}

/// For each face of tetrahedron `(a, b, c, d)`, whether the origin is on its
/// outside. A degenerate tetrahedron reports the origin outside every face.
fn origin_outside_of_tetrahedron_planes(a: Vector, b: Vector, c: Vector, d: Vector) -> [bool; 4] {
    let ab = b - a;
    let ac = c - a;
    let ad = d - a;
    let bd = d - b;
    let bc = c - b;

    let ab_cross_ac = ab.cross(&ac);
    let ac_cross_ad = ac.cross(&ad);
    let ad_cross_ab = ad.cross(&ab);
    let bd_cross_bc = bd.cross(&bc);

    // For each plane, the side the origin is on.
    let sign_p = [
        a.dot(&ab_cross_ac), // abc
        a.dot(&ac_cross_ad), // acd
        a.dot(&ad_cross_ab), // adb
        b.dot(&bd_cross_bc), // bdc
    ];

    // For each plane, the side that is outside (determined by the 4th point).
    let sign_d = [
        ad.dot(&ab_cross_ac),  // d
        ab.dot(&ac_cross_ad),  // b
        ac.dot(&ad_cross_ab),  // c
        -ab.dot(&bd_cross_bc), // a
    ];

    // The winding has been chosen so that all components of sign_d have the
    // same sign; mixed signs mean a degenerate tetrahedron.
    if sign_d.iter().all(|s| *s > 0.0) {
        [
            sign_p[0] >= -Real::EPSILON,
            sign_p[1] >= -Real::EPSILON,
            sign_p[2] >= -Real::EPSILON,
            sign_p[3] >= -Real::EPSILON,
        ]
    } else if sign_d.iter().all(|s| *s < 0.0) {
        [
            sign_p[0] <= Real::EPSILON,
            sign_p[1] <= Real::EPSILON,
            sign_p[2] <= Real::EPSILON,
            sign_p[3] <= Real::EPSILON,
        ]
    } else {
        [true; 4]
    }
}

/// Closest point to the origin on tetrahedron `(a, b, c, d)`. The set
/// describes the closest feature: 1 = a, 2 = b, 4 = c, 8 = d; edges have two
/// bits set, faces three, and all four when the origin is interior.
///
/// If `MUST_INCLUDE_D` is true, the function assumes `d` is part of the
/// closest feature and does less work.
pub fn closest_point_on_tetrahedron<const MUST_INCLUDE_D: bool>(
    a: Vector,
    b: Vector,
    c: Vector,
    d: Vector,
    out_set: &mut u32,
) -> Vector {
    // Start assuming the origin is inside all half-spaces, so closest to
    // itself.
    let mut closest_set: u32 = 0b1111;
    let mut closest_point = Vector::zeros();
    let mut best_dist_sqr = Real::MAX;

    let origin_out_of_planes = origin_outside_of_tetrahedron_planes(a, b, c, d);

    // Face abc.
    if origin_out_of_planes[0] {
        if MUST_INCLUDE_D {
            // abc cannot be closest, but the closest point cannot be interior
            // either, so pick a as a representative.
            closest_set = 0b0001;
            closest_point = a;
        } else {
            closest_point = closest_point_on_triangle::<false>(a, b, c, &mut closest_set);
        }
        best_dist_sqr = closest_point.norm_squared();
    }

    // Face acd.
    if origin_out_of_planes[1] {
        let mut set = 0;
        let q = closest_point_on_triangle::<MUST_INCLUDE_D>(a, c, d, &mut set);
        let dist_sqr = q.norm_squared();
        if dist_sqr < best_dist_sqr {
            best_dist_sqr = dist_sqr;
            closest_point = q;
            closest_set = (set & 0b0001) + ((set & 0b0110) << 1);
        }
    }

    // Face abd. The original vertex order is kept (facing direction does not
    // matter here) to improve consistency for GJK, which always adds the new
    // vertex as d and keeps the previous closest feature in abc.
    if origin_out_of_planes[2] {
        let mut set = 0;
        let q = closest_point_on_triangle::<MUST_INCLUDE_D>(a, b, d, &mut set);
        let dist_sqr = q.norm_squared();
        if dist_sqr < best_dist_sqr {
            best_dist_sqr = dist_sqr;
            closest_point = q;
            closest_set = (set & 0b0011) + ((set & 0b0100) << 1);
        }
    }

    // Face bcd.
    if origin_out_of_planes[3] {
        let mut set = 0;
        let q = closest_point_on_triangle::<MUST_INCLUDE_D>(b, c, d, &mut set);
        let dist_sqr = q.norm_squared();
        if dist_sqr < best_dist_sqr {
            closest_point = q;
            closest_set = set << 1;
        }
    }

    *out_set = closest_set;
    closest_point
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn segment_interior_point() {
        let mut set = 0;
        let closest = closest_point_on_segment(Vector::new(-1.0, 1.0, 0.0), Vector::new(1.0, 1.0, 0.0), &mut set);
        assert_eq!(set, 0b0011);
        assert_relative_eq!(closest, Vector::new(0.0, 1.0, 0.0), epsilon = 1.0e-6);
    }

    #[test]
    fn segment_vertex_region() {
        let mut set = 0;
        let closest = closest_point_on_segment(Vector::new(2.0, 0.0, 0.0), Vector::new(3.0, 0.0, 0.0), &mut set);
        assert_eq!(set, 0b0001);
        assert_eq!(closest, Vector::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn triangle_face_region() {
        let mut set = 0;
        let closest = closest_point_on_triangle::<false>(
            Vector::new(-1.0, 2.0, -1.0),
            Vector::new(1.0, 2.0, -1.0),
            Vector::new(0.0, 2.0, 1.0),
            &mut set,
        );
        assert_eq!(set, 0b0111);
        assert_relative_eq!(closest, Vector::new(0.0, 2.0, 0.0), epsilon = 1.0e-5);
    }

    #[test]
    fn triangle_edge_region() {
        // Origin projects onto edge ab.
        let mut set = 0;
        let closest = closest_point_on_triangle::<false>(
            Vector::new(-1.0, 1.0, 0.0),
            Vector::new(1.0, 1.0, 0.0),
            Vector::new(0.0, 3.0, 0.0),
            &mut set,
        );
        assert_eq!(set, 0b0011);
        assert_relative_eq!(closest, Vector::new(0.0, 1.0, 0.0), epsilon = 1.0e-6);
    }

    #[test]
    fn tetrahedron_contains_origin() {
        let mut set = 0;
        let closest = closest_point_on_tetrahedron::<false>(
            Vector::new(-1.0, -1.0, -1.0),
            Vector::new(1.0, -1.0, -1.0),
            Vector::new(0.0, -1.0, 1.0),
            Vector::new(0.0, 1.0, 0.0),
            &mut set,
        );
        assert_eq!(set, 0b1111);
        assert_eq!(closest, Vector::zeros());
    }

    #[test]
    fn tetrahedron_closest_face() {
        let mut set = 0;
        let closest = closest_point_on_tetrahedron::<false>(
            Vector::new(-1.0, 1.0, -1.0),
            Vector::new(1.0, 1.0, -1.0),
            Vector::new(0.0, 1.0, 1.0),
            Vector::new(0.0, 2.0, 0.0),
            &mut set,
        );
        // The bottom face (a, b, c) is closest.
        assert_relative_eq!(closest.y, 1.0, epsilon = 1.0e-5);
        assert_eq!(set & 0b1000, 0);
    }
}
