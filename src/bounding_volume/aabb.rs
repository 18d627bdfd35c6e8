//! Axis-aligned bounding boxes.

use crate::math::{Isometry, Point, Real, Vector};
use na::Matrix3;

/// An axis-aligned bounding box.
#[derive(Debug, PartialEq, Copy, Clone)]
pub struct Aabb {
    /// The minimum coordinates of the box.
    pub mins: Point,
    /// The maximum coordinates of the box.
    pub maxs: Point,
}

impl Aabb {
    /// Creates a new box from its extremal points.
    #[inline]
    pub fn new(mins: Point, maxs: Point) -> Aabb {
        Aabb { mins, maxs }
    }

    /// An invalid box, such that growing it to contain any point yields the
    /// box of that single point.
    #[inline]
    pub fn new_invalid() -> Aabb {
        Aabb {
            mins: Point::new(Real::MAX, Real::MAX, Real::MAX),
            maxs: Point::new(-Real::MAX, -Real::MAX, -Real::MAX),
        }
    }

    /// A box centered at the origin with the given half-extents.
    #[inline]
    pub fn from_half_extents(half_extents: Vector) -> Aabb {
        Aabb {
            mins: Point::from(-half_extents),
            maxs: Point::from(half_extents),
        }
    }

    /// The center of this box.
    #[inline]
    pub fn center(&self) -> Point {
        na::center(&self.mins, &self.maxs)
    }

    /// The half-extents of this box.
    #[inline]
    pub fn half_extents(&self) -> Vector {
        (self.maxs - self.mins) * 0.5
    }

    /// Grows this box so it contains `point`.
    #[inline]
    pub fn take_point(&mut self, point: Point) {
        self.mins = self.mins.inf(&point);
        self.maxs = self.maxs.sup(&point);
    }

    /// The smallest box containing both `self` and `other`.
    #[inline]
    pub fn merged(&self, other: &Aabb) -> Aabb {
        Aabb {
            mins: self.mins.inf(&other.mins),
            maxs: self.maxs.sup(&other.maxs),
        }
    }

    /// Enlarges this box by `amount` on all sides.
    #[inline]
    pub fn expand_by(&mut self, amount: Real) {
        let amount = Vector::repeat(amount);
        self.mins -= amount;
        self.maxs += amount;
    }

    /// This box scaled componentwise. Negative scales flip the corresponding
    /// extremal points, the result stays well ordered.
    #[inline]
    pub fn scaled(&self, scale: &Vector) -> Aabb {
        let a = self.mins.coords.component_mul(scale);
        let b = self.maxs.coords.component_mul(scale);
        Aabb {
            mins: Point::from(a.inf(&b)),
            maxs: Point::from(a.sup(&b)),
        }
    }

    /// The smallest box containing this box transformed by `m`.
    pub fn transform_by(&self, m: &Isometry) -> Aabb {
        let center = m * self.center();
        let abs_rot: Matrix3<Real> = m
            .rotation
            .to_rotation_matrix()
            .into_inner()
            .map(|e| e.abs());
        let ws_half_extents = abs_rot * self.half_extents();
        Aabb {
            mins: center - ws_half_extents,
            maxs: center + ws_half_extents,
        }
    }

    /// Tests whether `point` is inside this box (boundary included).
    #[inline]
    pub fn contains_local_point(&self, point: &Point) -> bool {
        na::partial_le(&self.mins, point) && na::partial_ge(&self.maxs, point)
    }

    /// Tests whether this box intersects `other` (touching counts).
    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        na::partial_le(&self.mins, &other.maxs) && na::partial_ge(&self.maxs, &other.mins)
    }

    /// Casts a ray against this box using the slab test. Returns the entry
    /// fraction in `[0, max_fraction]`, treating the box as solid (a ray
    /// starting inside hits at fraction 0).
    pub fn cast_local_ray(&self, origin: &Point, dir: &Vector, max_fraction: Real) -> Option<Real> {
        let mut t_min: Real = 0.0;
        let mut t_max = max_fraction;

        for i in 0..3 {
            if dir[i].abs() < Real::EPSILON {
                // Ray parallel to the slab, miss if the origin is outside it.
                if origin[i] < self.mins[i] || origin[i] > self.maxs[i] {
                    return None;
                }
            } else {
                let inv_d = 1.0 / dir[i];
                let mut t1 = (self.mins[i] - origin[i]) * inv_d;
                let mut t2 = (self.maxs[i] - origin[i]) * inv_d;
                if t1 > t2 {
                    core::mem::swap(&mut t1, &mut t2);
                }
                t_min = t_min.max(t1);
                t_max = t_max.min(t2);
                if t_min > t_max {
                    return None;
                }
            }
        }

        Some(t_min)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::Rotation;

    #[test]
    fn scaled_flips_negative_axes() {
        let aabb = Aabb::new(Point::new(-1.0, 0.0, 2.0), Point::new(1.0, 1.0, 3.0));
        let scaled = aabb.scaled(&Vector::new(1.0, -2.0, 1.0));
        assert_eq!(scaled.mins, Point::new(-1.0, -2.0, 2.0));
        assert_eq!(scaled.maxs, Point::new(1.0, 0.0, 3.0));
    }

    #[test]
    fn transform_by_is_conservative() {
        let aabb = Aabb::from_half_extents(Vector::new(1.0, 2.0, 3.0));
        let m = Isometry::from_parts(
            na::Translation3::new(10.0, 0.0, 0.0),
            Rotation::from_axis_angle(&Vector::y_axis(), 0.3),
        );
        let transformed = aabb.transform_by(&m);

        // Every transformed corner must be inside the transformed box.
        for ix in [-1.0f32, 1.0] {
            for iy in [-1.0f32, 1.0] {
                for iz in [-1.0f32, 1.0] {
                    let corner = m * Point::new(ix * 1.0, iy * 2.0, iz * 3.0);
                    assert!(transformed.contains_local_point(&corner));
                }
            }
        }
    }

    #[test]
    fn ray_hits_box_from_above() {
        let aabb = Aabb::from_half_extents(Vector::new(1.0, 1.0, 1.0));
        let fraction = aabb
            .cast_local_ray(&Point::new(0.0, 5.0, 0.0), &Vector::new(0.0, -10.0, 0.0), 1.0)
            .unwrap();
        assert_relative_eq!(fraction, 0.4, epsilon = 1.0e-6);
    }
}
