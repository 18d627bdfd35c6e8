//! Capsules: a segment along the Y axis inflated by a radius.
//!
//! The capsule deliberately implements no analytic ray or point test: it is
//! the shape that exercises the generic GJK fallbacks, demonstrating that a
//! new convex leaf type only needs a support function to be fully queryable.

use crate::bounding_volume::Aabb;
use crate::collision::{
    CollidePointResult, CollisionCollector, RayCast, RayCastResult, RayCastSettings, ShapeFilter,
    TransformedShape,
};
use crate::gjk::SupportMap;
use crate::math::{Isometry, Point, Real, Rotation, Vector};
use crate::shape::convex_shape::{ConvexShape, Support, SupportBuffer, SupportMode};
use crate::shape::shape::collect_leaf_transformed_shape;
use crate::shape::{
    convex_shape, scale_helpers, Shape, ShapeError, ShapeRef, ShapeSubType, ShapeType, SubShapeId,
    SubShapeIdCreator, SupportingFace, TrianglesContext,
};
use std::sync::Arc;

/// Settings to build a [`Capsule`].
#[derive(Debug, Clone, Copy)]
pub struct CapsuleShapeSettings {
    /// Half the height of the cylindrical part of the capsule.
    pub half_height: Real,
    /// Radius of the capsule.
    pub radius: Real,
}

impl CapsuleShapeSettings {
    /// Creates settings for a capsule with the given cylinder half height
    /// and radius.
    pub fn new(half_height: Real, radius: Real) -> CapsuleShapeSettings {
        CapsuleShapeSettings {
            half_height,
            radius,
        }
    }

    /// Builds the capsule.
    pub fn build(&self) -> Result<ShapeRef, ShapeError> {
        if !(self.radius > 0.0) {
            return Err(ShapeError::InvalidRadius(self.radius));
        }
        if !(self.half_height > 0.0) {
            return Err(ShapeError::InvalidHalfHeight(self.half_height));
        }
        Ok(Arc::new(Capsule {
            half_height: self.half_height,
            radius: self.radius,
        }))
    }
}

/// A capsule centered around the origin with its axis along Y.
///
/// Only uniform scales are valid.
pub struct Capsule {
    half_height: Real,
    radius: Real,
}

impl Capsule {
    /// Half the height of the cylindrical part.
    #[inline]
    pub fn half_height(&self) -> Real {
        self.half_height
    }

    /// Radius of the capsule.
    #[inline]
    pub fn radius(&self) -> Real {
        self.radius
    }
}

/// Support object of a [`Capsule`]: the segment endpoint along the
/// direction, optionally inflated by the radius.
pub struct CapsuleSupport {
    half_height: Real,
    radius: Real,
    convex_radius: Real,
}

impl SupportMap for CapsuleSupport {
    #[inline]
    fn support_point(&self, dir: &Vector) -> Point {
        let endpoint = Vector::new(0.0, self.half_height.copysign(dir.y), 0.0);
        match dir.try_normalize(0.0) {
            Some(n) => Point::from(endpoint + n * self.radius),
            None => Point::from(endpoint),
        }
    }
}

impl Support for CapsuleSupport {
    #[inline]
    fn convex_radius(&self) -> Real {
        self.convex_radius
    }
}

impl ConvexShape for Capsule {
    fn support_function<'a>(
        &self,
        mode: SupportMode,
        buffer: &'a mut SupportBuffer,
        scale: &Vector,
    ) -> &'a dyn Support {
        debug_assert!(self.is_valid_scale(scale));
        let uniform = scale.x.abs();
        let half_height = uniform * self.half_height;
        let radius = uniform * self.radius;

        *buffer = match mode {
            SupportMode::ExcludeConvexRadius | SupportMode::Default => {
                // The segment plus radius is the exact shape, so the core is
                // just the segment.
                SupportBuffer::Capsule(CapsuleSupport {
                    half_height,
                    radius: 0.0,
                    convex_radius: radius,
                })
            }
            SupportMode::IncludeConvexRadius => SupportBuffer::Capsule(CapsuleSupport {
                half_height,
                radius,
                convex_radius: 0.0,
            }),
        };
        match buffer {
            SupportBuffer::Capsule(support) => support,
            _ => unreachable!(),
        }
    }
}

impl Shape for Capsule {
    fn shape_type(&self) -> ShapeType {
        ShapeType::Convex
    }

    fn sub_type(&self) -> ShapeSubType {
        ShapeSubType::Capsule
    }

    fn local_bounds(&self) -> Aabb {
        Aabb::from_half_extents(Vector::new(
            self.radius,
            self.half_height + self.radius,
            self.radius,
        ))
    }

    fn sub_shape_id_bits_recursive(&self) -> u32 {
        0
    }

    fn inner_radius(&self) -> Real {
        self.radius
    }

    fn surface_normal(&self, sub_shape_id: SubShapeId, local_surface_position: &Point) -> Vector {
        debug_assert!(sub_shape_id.is_empty());

        // Normal from the closest point on the core segment.
        let clamped_y = local_surface_position
            .y
            .clamp(-self.half_height, self.half_height);
        (local_surface_position.coords - Vector::new(0.0, clamped_y, 0.0))
            .try_normalize(0.0)
            .unwrap_or_else(Vector::y)
    }

    fn supporting_face(
        &self,
        sub_shape_id: SubShapeId,
        direction: &Vector,
        scale: &Vector,
        center_of_mass_transform: &Isometry,
        out_vertices: &mut SupportingFace,
    ) {
        debug_assert!(sub_shape_id.is_empty());
        debug_assert!(self.is_valid_scale(scale));

        let uniform = scale.x.abs();
        let half_height = uniform * self.half_height;
        let radius = uniform * self.radius;

        // The side of the cylinder hit first when coming along `direction`.
        // A direction along the capsule axis hits a spherical cap, which
        // has no face.
        let perpendicular = direction - direction.y * Vector::y();
        if let Some(towards) = perpendicular.try_normalize(1.0e-6) {
            let offset = -radius * towards;
            out_vertices.push(
                center_of_mass_transform * Point::from(Vector::new(0.0, half_height, 0.0) + offset),
            );
            out_vertices.push(
                center_of_mass_transform * Point::from(Vector::new(0.0, -half_height, 0.0) + offset),
            );
        }
    }

    fn cast_ray(
        &self,
        ray: &RayCast,
        sub_shape_id_creator: SubShapeIdCreator,
        hit: &mut RayCastResult,
    ) -> bool {
        convex_shape::cast_ray_vs_convex(self, ray, sub_shape_id_creator, hit)
    }

    fn cast_ray_with_collector(
        &self,
        ray: &RayCast,
        settings: &RayCastSettings,
        sub_shape_id_creator: SubShapeIdCreator,
        collector: &mut dyn CollisionCollector<RayCastResult>,
        shape_filter: &dyn ShapeFilter,
    ) {
        convex_shape::cast_ray_vs_convex_with_collector(
            self,
            ray,
            settings,
            sub_shape_id_creator,
            collector,
            shape_filter,
        );
    }

    fn collide_point(
        &self,
        point: &Point,
        sub_shape_id_creator: SubShapeIdCreator,
        collector: &mut dyn CollisionCollector<CollidePointResult>,
        shape_filter: &dyn ShapeFilter,
    ) {
        convex_shape::collide_point_vs_convex(
            self,
            point,
            sub_shape_id_creator,
            collector,
            shape_filter,
        );
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
        let pi = core::f32::consts::PI;
        pi * self.radius * self.radius * (2.0 * self.half_height)
            + 4.0 / 3.0 * pi * self.radius * self.radius * self.radius
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
