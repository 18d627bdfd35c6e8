//! Spheres, the simplest convex shape.

use crate::bounding_volume::Aabb;
use crate::collision::{
    BackFaceMode, CollidePointResult, CollisionCollector, RayCast, RayCastResult, RayCastSettings,
    ShapeFilter, TransformedShape,
};
use crate::gjk::SupportMap;
use crate::math::{Point, Real, Rotation, Vector};
use crate::shape::convex_shape::{ConvexShape, Support, SupportBuffer, SupportMode};
use crate::shape::shape::collect_leaf_transformed_shape;
use crate::shape::{
    convex_shape, scale_helpers, Shape, ShapeError, ShapeRef, ShapeSubType, ShapeType, SubShapeId,
    SubShapeIdCreator, TrianglesContext,
};
use std::sync::Arc;

/// Settings to build a [`Sphere`].
#[derive(Debug, Clone, Copy)]
pub struct SphereShapeSettings {
    /// Radius of the sphere.
    pub radius: Real,
}

impl SphereShapeSettings {
    /// Creates settings for a sphere with the given radius.
    pub fn new(radius: Real) -> SphereShapeSettings {
        SphereShapeSettings { radius }
    }

    /// Builds the sphere.
    pub fn build(&self) -> Result<ShapeRef, ShapeError> {
        if !(self.radius > 0.0) {
            return Err(ShapeError::InvalidRadius(self.radius));
        }
        Ok(Arc::new(Sphere {
            radius: self.radius,
        }))
    }
}

/// A sphere centered around the origin.
///
/// Only uniform scales are valid: a sphere cannot represent an ellipsoid.
pub struct Sphere {
    radius: Real,
}

impl Sphere {
    /// Radius of the sphere.
    #[inline]
    pub fn radius(&self) -> Real {
        self.radius
    }

    /// The radius after applying `scale` (which must be uniform).
    #[inline]
    fn scaled_radius(&self, scale: &Vector) -> Real {
        debug_assert!(self.is_valid_scale(scale));
        scale.x.abs() * self.radius
    }

    /// Entry and exit fractions of a ray against this sphere, solving
    /// `|origin + t * direction|^2 = r^2`. `None` when the ray misses.
    fn ray_fractions(&self, origin: &Point, direction: &Vector) -> Option<(Real, Real)> {
        let a = direction.norm_squared();
        let b = origin.coords.dot(direction);
        let c = origin.coords.norm_squared() - self.radius * self.radius;
        if a < Real::EPSILON {
            // Degenerate ray: a hit iff the origin is inside.
            return if c <= 0.0 { Some((0.0, 0.0)) } else { None };
        }

        let discriminant = b * b - a * c;
        if discriminant < 0.0 {
            return None;
        }
        let sqrt_d = discriminant.sqrt();
        Some(((-b - sqrt_d) / a, (-b + sqrt_d) / a))
    }
}

/// Support object of a [`Sphere`].
///
/// The sphere is a point inflated by its radius, so excluding the convex
/// radius collapses the support to the center: the exact shape GJK converges
/// on fastest.
pub struct SphereSupport {
    radius: Real,
    convex_radius: Real,
}

impl SupportMap for SphereSupport {
    #[inline]
    fn support_point(&self, dir: &Vector) -> Point {
        match dir.try_normalize(0.0) {
            Some(n) => Point::from(n * self.radius),
            None => Point::origin(),
        }
    }
}

impl Support for SphereSupport {
    #[inline]
    fn convex_radius(&self) -> Real {
        self.convex_radius
    }
}

impl ConvexShape for Sphere {
    fn support_function<'a>(
        &self,
        mode: SupportMode,
        buffer: &'a mut SupportBuffer,
        scale: &Vector,
    ) -> &'a dyn Support {
        let scaled_radius = self.scaled_radius(scale);
        *buffer = match mode {
            SupportMode::ExcludeConvexRadius | SupportMode::Default => {
                SupportBuffer::Sphere(SphereSupport {
                    radius: 0.0,
                    convex_radius: scaled_radius,
                })
            }
            SupportMode::IncludeConvexRadius => SupportBuffer::Sphere(SphereSupport {
                radius: scaled_radius,
                convex_radius: 0.0,
            }),
        };
        match buffer {
            SupportBuffer::Sphere(support) => support,
            _ => unreachable!(),
        }
    }
}

impl Shape for Sphere {
    fn shape_type(&self) -> ShapeType {
        ShapeType::Convex
    }

    fn sub_type(&self) -> ShapeSubType {
        ShapeSubType::Sphere
    }

    fn local_bounds(&self) -> Aabb {
        Aabb::from_half_extents(Vector::repeat(self.radius))
    }

    fn sub_shape_id_bits_recursive(&self) -> u32 {
        0
    }

    fn inner_radius(&self) -> Real {
        self.radius
    }

    fn surface_normal(&self, sub_shape_id: SubShapeId, local_surface_position: &Point) -> Vector {
        debug_assert!(sub_shape_id.is_empty());
        local_surface_position
            .coords
            .try_normalize(0.0)
            .unwrap_or_else(Vector::y)
    }

    fn cast_ray(
        &self,
        ray: &RayCast,
        sub_shape_id_creator: SubShapeIdCreator,
        hit: &mut RayCastResult,
    ) -> bool {
        if let Some((t_min, t_max)) = self.ray_fractions(&ray.origin, &ray.direction) {
            let fraction = t_min.max(0.0);
            if t_max >= 0.0 && fraction < hit.fraction {
                hit.fraction = fraction;
                hit.sub_shape_id2 = sub_shape_id_creator.id();
                return true;
            }
        }
        false
    }

    fn cast_ray_with_collector(
        &self,
        ray: &RayCast,
        settings: &RayCastSettings,
        sub_shape_id_creator: SubShapeIdCreator,
        collector: &mut dyn CollisionCollector<RayCastResult>,
        shape_filter: &dyn ShapeFilter,
    ) {
        if !shape_filter.should_collide(self, sub_shape_id_creator.id()) {
            return;
        }

        if let Some((t_min, t_max)) = self.ray_fractions(&ray.origin, &ray.direction) {
            if t_max >= 0.0 && t_min.max(0.0) < collector.early_out_fraction() {
                let mut hit = RayCastResult {
                    body_id: TransformedShape::body_id_from_context(collector.context()),
                    fraction: 0.0,
                    sub_shape_id2: sub_shape_id_creator.id(),
                };

                // Front side.
                if settings.treat_convex_as_solid || t_min > 0.0 {
                    hit.fraction = t_min.max(0.0);
                    collector.add_hit(hit);
                }

                // Back side.
                if settings.back_face_mode_convex == BackFaceMode::CollideWithBackFaces
                    && t_max < collector.early_out_fraction()
                {
                    hit.fraction = t_max;
                    collector.add_hit(hit);
                }
            }
        }
    }

    fn collide_point(
        &self,
        point: &Point,
        sub_shape_id_creator: SubShapeIdCreator,
        collector: &mut dyn CollisionCollector<CollidePointResult>,
        shape_filter: &dyn ShapeFilter,
    ) {
        if !shape_filter.should_collide(self, sub_shape_id_creator.id()) {
            return;
        }

        if point.coords.norm_squared() <= self.radius * self.radius {
            collector.add_hit(CollidePointResult {
                body_id: TransformedShape::body_id_from_context(collector.context()),
                sub_shape_id2: sub_shape_id_creator.id(),
            });
        }
    }

    fn collect_transformed_shapes(
        &self,
        bounds: &Aabb,
        transformed_shape: &TransformedShape,
        collector: &mut dyn CollisionCollector<TransformedShape>,
        shape_filter: &dyn ShapeFilter,
    ) {
        collect_leaf_transformed_shape(self, bounds, transformed_shape, collector, shape_filter);
    }

    fn get_triangles_start(
        &self,
        _bounds: &Aabb,
        position_com: &Point,
        rotation: &Rotation,
        scale: &Vector,
    ) -> TrianglesContext {
        convex_shape::convex_triangles_start(self, position_com, rotation, scale)
    }

    fn volume(&self) -> Real {
        4.0 / 3.0 * core::f32::consts::PI * self.radius * self.radius * self.radius
    }

    fn is_valid_scale(&self, scale: &Vector) -> bool {
        scale_helpers::is_uniform_scale(scale) && !scale_helpers::is_zero_scale(scale)
    }

    fn make_scale_valid(&self, scale: &Vector) -> Vector {
        scale_helpers::make_uniform_scale(&scale_helpers::make_non_zero_scale(scale))
    }

    fn as_convex(&self) -> Option<&dyn ConvexShape> {
        Some(self)
    }
}
