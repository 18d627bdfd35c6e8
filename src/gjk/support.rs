//! The support mapping trait and its composable adapters.

use crate::math::{Isometry, Point, Real, Vector};

/// Trait of convex objects representable by a support mapping function.
///
/// A support function maps a direction to the shape point which maximizes
/// their dot product. This is the sole primitive the GJK and EPA kernels
/// require from a shape.
pub trait SupportMap {
    /// Evaluates the support function of this shape. The direction does not
    /// need to be normalized and the result is relative to the shape's
    /// center of mass.
    fn support_point(&self, dir: &Vector) -> Point;
}

/// Applies a rigid transform to a support-mapped object.
pub struct TransformedSupport<'a, S: ?Sized> {
    /// The transform applied to the object.
    pub transform: Isometry,
    /// The object being transformed.
    pub object: &'a S,
}

impl<S: ?Sized + SupportMap> SupportMap for TransformedSupport<'_, S> {
    #[inline]
    fn support_point(&self, dir: &Vector) -> Point {
        let local_dir = self.transform.inverse_transform_vector(dir);
        self.transform * self.object.support_point(&local_dir)
    }
}

impl<'a, S: ?Sized> TransformedSupport<'a, S> {
    /// Creates the adapter from a transform and an object.
    pub fn new(transform: Isometry, object: &'a S) -> Self {
        TransformedSupport { transform, object }
    }
}

/// Inflates a support-mapped object by a uniform radius.
pub struct AddConvexRadius<'a, S: ?Sized> {
    /// The object being inflated.
    pub object: &'a S,
    /// The inflation radius.
    pub radius: Real,
}

impl<'a, S: ?Sized> AddConvexRadius<'a, S> {
    /// Creates the adapter from an object and a radius.
    pub fn new(object: &'a S, radius: Real) -> Self {
        AddConvexRadius { object, radius }
    }
}

impl<S: ?Sized + SupportMap> SupportMap for AddConvexRadius<'_, S> {
    #[inline]
    fn support_point(&self, dir: &Vector) -> Point {
        let length = dir.norm();
        if length > 0.0 {
            self.object.support_point(dir) + (self.radius / length) * dir
        } else {
            self.object.support_point(dir)
        }
    }
}

/// The Minkowski difference `A - B` of two support-mapped objects.
pub struct MinkowskiDifference<'a, A: ?Sized, B: ?Sized> {
    /// The first object.
    pub object_a: &'a A,
    /// The second object, subtracted from the first.
    pub object_b: &'a B,
}

impl<'a, A: ?Sized, B: ?Sized> MinkowskiDifference<'a, A, B> {
    /// Creates the difference object.
    pub fn new(object_a: &'a A, object_b: &'a B) -> Self {
        MinkowskiDifference { object_a, object_b }
    }
}

impl<A: ?Sized + SupportMap, B: ?Sized + SupportMap> SupportMap for MinkowskiDifference<'_, A, B> {
    #[inline]
    fn support_point(&self, dir: &Vector) -> Point {
        let p = self.object_a.support_point(dir);
        let q = self.object_b.support_point(&-dir);
        Point::from(p - q)
    }
}

/// Wraps a single point so it can be used with convex collision detection.
pub struct PointSupport {
    /// The wrapped point.
    pub point: Point,
}

impl SupportMap for PointSupport {
    #[inline]
    fn support_point(&self, _dir: &Vector) -> Point {
        self.point
    }
}

/// Wraps a triangle so it can be used with convex collision detection.
pub struct TriangleSupport {
    /// The three vertices of the triangle.
    pub vertices: [Point; 3],
}

impl SupportMap for TriangleSupport {
    fn support_point(&self, dir: &Vector) -> Point {
        let d1 = self.vertices[0].coords.dot(dir);
        let d2 = self.vertices[1].coords.dot(dir);
        let d3 = self.vertices[2].coords.dot(dir);

        if d1 > d2 {
            if d1 > d3 {
                self.vertices[0]
            } else {
                self.vertices[2]
            }
        } else if d2 > d3 {
            self.vertices[1]
        } else {
            self.vertices[2]
        }
    }
}

/// Wraps a convex polygon (as a vertex list) so it can be used with convex
/// collision detection.
pub struct PolygonSupport<'a> {
    /// The vertices of the polygon.
    pub vertices: &'a [Point],
}

impl SupportMap for PolygonSupport<'_> {
    fn support_point(&self, dir: &Vector) -> Point {
        let mut best = self.vertices[0];
        let mut best_dot = best.coords.dot(dir);

        for vertex in &self.vertices[1..] {
            let dot = vertex.coords.dot(dir);
            if dot > best_dot {
                best_dot = dot;
                best = *vertex;
            }
        }

        best
    }
}
