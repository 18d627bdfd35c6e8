//! Boxes with an optional convex radius.

use crate::bounding_volume::Aabb;
use crate::collision::{
    BackFaceMode, CollidePointResult, CollisionCollector, RayCast, RayCastResult, RayCastSettings,
    ShapeFilter, TransformedShape,
};
use crate::gjk::SupportMap;
use crate::math::{Isometry, Point, Real, Rotation, Translation, Vector};
use crate::shape::convex_shape::{ConvexShape, Support, SupportBuffer, SupportMode};
use crate::shape::shape::collect_leaf_transformed_shape;
use crate::shape::{
    scale_helpers, Shape, ShapeError, ShapeRef, ShapeSubType, ShapeType, SubShapeId,
    SubShapeIdCreator, SupportingFace, TrianglesContext,
};
use std::sync::Arc;

/// Settings to build a [`BoxShape`].
#[derive(Debug, Clone, Copy)]
pub struct BoxShapeSettings {
    /// Half the size of the box, including the convex radius.
    pub half_extents: Vector,
    /// Radius to round the corners with; speeds up collision detection at
    /// the cost of a slightly rounded shape.
    pub convex_radius: Real,
}

impl BoxShapeSettings {
    /// Creates settings for a box with the given half extents and convex
    /// radius.
    pub fn new(half_extents: Vector, convex_radius: Real) -> BoxShapeSettings {
        BoxShapeSettings {
            half_extents,
            convex_radius,
        }
    }

    /// Builds the box.
    pub fn build(&self) -> Result<ShapeRef, ShapeError> {
        let min_half_extent = self.half_extents.min();
        if self.convex_radius < 0.0 || min_half_extent < self.convex_radius {
            return Err(ShapeError::InvalidConvexRadius {
                radius: self.convex_radius,
                min_half_extent,
            });
        }
        Ok(Arc::new(BoxShape {
            half_extents: self.half_extents,
            convex_radius: self.convex_radius,
        }))
    }
}

/// A box centered around the origin. Any scale is valid.
pub struct BoxShape {
    /// Half the size of the box, including the convex radius.
    half_extents: Vector,
    convex_radius: Real,
}

impl BoxShape {
    /// Half the size of the box, including the convex radius.
    #[inline]
    pub fn half_extents(&self) -> Vector {
        self.half_extents
    }

    /// The convex radius of this box.
    #[inline]
    pub fn convex_radius(&self) -> Real {
        self.convex_radius
    }
}

/// Entry and exit fraction of a ray against a box of the given half
/// extents (the slab test, unclamped). `None` when the ray misses.
fn ray_box_fractions(origin: &Point, dir: &Vector, half_extents: &Vector) -> Option<(Real, Real)> {
    let mut t_min = -Real::MAX;
    let mut t_max = Real::MAX;

    for i in 0..3 {
        if dir[i].abs() < Real::EPSILON {
            if origin[i] < -half_extents[i] || origin[i] > half_extents[i] {
                return None;
            }
        } else {
            let inv_d = 1.0 / dir[i];
            let mut t1 = (-half_extents[i] - origin[i]) * inv_d;
            let mut t2 = (half_extents[i] - origin[i]) * inv_d;
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

    Some((t_min, t_max))
}

/// Support object of a [`BoxShape`]: sign-select the half extents.
pub struct BoxSupport {
    half_extents: Vector,
    convex_radius: Real,
}

impl SupportMap for BoxSupport {
    #[inline]
    fn support_point(&self, dir: &Vector) -> Point {
        Point::new(
            self.half_extents.x.copysign(dir.x),
            self.half_extents.y.copysign(dir.y),
            self.half_extents.z.copysign(dir.z),
        )
    }
}

impl Support for BoxSupport {
    #[inline]
    fn convex_radius(&self) -> Real {
        self.convex_radius
    }
}

impl ConvexShape for BoxShape {
    fn support_function<'a>(
        &self,
        mode: SupportMode,
        buffer: &'a mut SupportBuffer,
        scale: &Vector,
    ) -> &'a dyn Support {
        let scaled_half_extents = scale.abs().component_mul(&self.half_extents);
        *buffer = match mode {
            SupportMode::ExcludeConvexRadius => {
                // Shrink the box so the convex radius can be added back by
                // the caller. The radius scales with the smallest component
                // so it still fits the scaled box.
                let scaled_radius = scale.abs().min() * self.convex_radius;
                SupportBuffer::Box(BoxSupport {
                    half_extents: scaled_half_extents - Vector::repeat(scaled_radius),
                    convex_radius: scaled_radius,
                })
            }
            SupportMode::IncludeConvexRadius | SupportMode::Default => {
                SupportBuffer::Box(BoxSupport {
                    half_extents: scaled_half_extents,
                    convex_radius: 0.0,
                })
            }
        };
        match buffer {
            SupportBuffer::Box(support) => support,
            _ => unreachable!(),
        }
    }
}

impl Shape for BoxShape {
    fn shape_type(&self) -> ShapeType {
        ShapeType::Convex
    }

    fn sub_type(&self) -> ShapeSubType {
        ShapeSubType::Box
    }

    fn local_bounds(&self) -> Aabb {
        Aabb::from_half_extents(self.half_extents)
    }

    fn sub_shape_id_bits_recursive(&self) -> u32 {
        0
    }

    fn inner_radius(&self) -> Real {
        self.half_extents.min()
    }

    fn surface_normal(&self, sub_shape_id: SubShapeId, local_surface_position: &Point) -> Vector {
        debug_assert!(sub_shape_id.is_empty());

        // The axis whose face the position is closest to.
        let distances = (local_surface_position.coords.abs() - self.half_extents).abs();
        let axis = distances.imin();

        let mut normal = Vector::zeros();
        normal[axis] = 1.0f32.copysign(local_surface_position[axis]);
        normal
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

        let he = scale.abs().component_mul(&self.half_extents);

        // The face hit first when coming along `direction`: its outward
        // normal points against the direction.
        let axis = direction.abs().imax();
        let sign = if direction[axis] < 0.0 { 1.0f32 } else { -1.0 };
        let a = (axis + 1) % 3;
        let b = (axis + 2) % 3;

        // Wind counter-clockwise as seen from outside the face.
        for (sa, sb) in [(-1.0, -1.0), (-1.0, 1.0), (1.0, 1.0), (1.0, -1.0)] {
            let mut vertex = Vector::zeros();
            vertex[axis] = sign * he[axis];
            vertex[a] = sign * sa * he[a];
            vertex[b] = sb * he[b];
            out_vertices.push(center_of_mass_transform * Point::from(vertex));
        }
    }

    fn cast_ray(
        &self,
        ray: &RayCast,
        sub_shape_id_creator: SubShapeIdCreator,
        hit: &mut RayCastResult,
    ) -> bool {
        if let Some((t_min, t_max)) = ray_box_fractions(&ray.origin, &ray.direction, &self.half_extents)
        {
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

        if let Some((t_min, t_max)) = ray_box_fractions(&ray.origin, &ray.direction, &self.half_extents)
        {
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

        if na::partial_le(&point.coords.abs(), &self.half_extents) {
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
        let transform = Isometry::from_parts(Translation::from(position_com.coords), *rotation);
        let extents = scale.component_mul(&self.half_extents);
        let vertices = UNIT_BOX_TRIANGLES
            .iter()
            .map(|v| transform * Point::from(v.component_mul(&extents)))
            .collect();
        TrianglesContext::new(vertices, scale_helpers::is_inside_out(scale))
    }

    fn volume(&self) -> Real {
        8.0 * self.half_extents.x * self.half_extents.y * self.half_extents.z
    }

    fn as_convex(&self) -> Option<&dyn ConvexShape> {
        Some(self)
    }
}

/// The 12 triangles of a unit box, wound counter-clockwise seen from
/// outside.
const UNIT_BOX_TRIANGLES: [Vector; 36] = [
    Vector::new(-1.0, 1.0, -1.0), Vector::new(-1.0, 1.0, 1.0), Vector::new(1.0, 1.0, 1.0),
    Vector::new(-1.0, 1.0, -1.0), Vector::new(1.0, 1.0, 1.0), Vector::new(1.0, 1.0, -1.0),
    Vector::new(-1.0, -1.0, -1.0), Vector::new(1.0, -1.0, -1.0), Vector::new(1.0, -1.0, 1.0),
    Vector::new(-1.0, -1.0, -1.0), Vector::new(1.0, -1.0, 1.0), Vector::new(-1.0, -1.0, 1.0),
    Vector::new(-1.0, 1.0, -1.0), Vector::new(-1.0, -1.0, -1.0), Vector::new(-1.0, -1.0, 1.0),
    Vector::new(-1.0, 1.0, -1.0), Vector::new(-1.0, -1.0, 1.0), Vector::new(-1.0, 1.0, 1.0),
    Vector::new(1.0, 1.0, 1.0), Vector::new(1.0, -1.0, 1.0), Vector::new(1.0, -1.0, -1.0),
    Vector::new(1.0, 1.0, 1.0), Vector::new(1.0, -1.0, -1.0), Vector::new(1.0, 1.0, -1.0),
    Vector::new(-1.0, 1.0, 1.0), Vector::new(-1.0, -1.0, 1.0), Vector::new(1.0, -1.0, 1.0),
    Vector::new(-1.0, 1.0, 1.0), Vector::new(1.0, -1.0, 1.0), Vector::new(1.0, 1.0, 1.0),
    Vector::new(-1.0, 1.0, -1.0), Vector::new(1.0, 1.0, -1.0), Vector::new(1.0, -1.0, -1.0),
    Vector::new(-1.0, 1.0, -1.0), Vector::new(1.0, -1.0, -1.0), Vector::new(-1.0, -1.0, -1.0),
];
