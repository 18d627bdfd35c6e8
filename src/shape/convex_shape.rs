//! The convex shape trait, its support objects and the generic GJK-based
//! query fallbacks.

use crate::collision::{
    BackFaceMode, CollectFacesMode, CollidePointResult, CollideShapeResult, CollideShapeSettings,
    CollisionCollector, CollisionDispatch, RayCast, RayCastResult, RayCastSettings, ShapeCast,
    ShapeCastResult, ShapeCastSettings, ShapeFilter, TransformedShape, DEFAULT_COLLISION_TOLERANCE,
};
use crate::epa::{PenetrationDepth, Status};
use crate::gjk::{AddConvexRadius, GjkClosestPoint, PointSupport, SupportMap, TransformedSupport};
use crate::math::{Isometry, Point, Real, Rotation, Translation, Vector};
use crate::shape::box_shape::BoxSupport;
use crate::shape::capsule::CapsuleSupport;
use crate::shape::sphere::SphereSupport;
use crate::shape::{scale_helpers, Shape, SubShapeIdCreator, TrianglesContext};
use std::sync::OnceLock;

/// How a support function obtained through
/// [`ConvexShape::support_function`] treats the shape's convex radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportMode {
    /// Match the original shape as accurately and efficiently as possible,
    /// combining [`SupportMap::support_point`] and
    /// [`Support::convex_radius`].
    Default,
    /// Return the shape shrunk by its convex radius;
    /// [`Support::convex_radius`] returns the radius that was removed. GJK
    /// and EPA run on the shrunk core to keep their simplices
    /// well-conditioned.
    ExcludeConvexRadius,
    /// Return the full shape including the convex radius;
    /// [`Support::convex_radius`] returns 0.
    IncludeConvexRadius,
}

/// The interface GJK and EPA consume from a convex shape: a support mapping
/// plus the convex radius split off by the chosen [`SupportMode`].
pub trait Support: SupportMap {
    /// The convex radius not included in the support points. Adding it back
    /// reconstructs the full shape.
    fn convex_radius(&self) -> Real;
}

/// Caller-provided storage for the support object of one query.
///
/// One variant per concrete support type; [`ConvexShape::support_function`]
/// writes the variant for its shape and hands back a borrow, so no query
/// ever allocates.
pub enum SupportBuffer {
    /// No support object written yet.
    Empty,
    /// Support of a [`Sphere`](crate::shape::Sphere).
    Sphere(SphereSupport),
    /// Support of a [`BoxShape`](crate::shape::BoxShape).
    Box(BoxSupport),
    /// Support of a [`Capsule`](crate::shape::Capsule).
    Capsule(CapsuleSupport),
}

impl SupportBuffer {
    /// Creates an empty buffer.
    pub fn new() -> SupportBuffer {
        SupportBuffer::Empty
    }
}

impl Default for SupportBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait of convex leaf shapes.
///
/// A support function is the only thing a new convex shape type must
/// provide: the ray, point and triangle queries all have GJK-based fallbacks
/// built on it (see the `*_vs_convex` helpers in this module).
pub trait ConvexShape: Shape {
    /// Writes the support object for this shape at `scale` into `buffer`
    /// and returns it. The borrow is valid for one query.
    fn support_function<'a>(
        &self,
        mode: SupportMode,
        buffer: &'a mut SupportBuffer,
        scale: &Vector,
    ) -> &'a dyn Support;
}

/// Generic single-hit ray cast against any convex shape, via GJK.
///
/// Fallback routine: shapes with an analytic ray test should override it.
pub(crate) fn cast_ray_vs_convex(
    shape: &dyn ConvexShape,
    ray: &RayCast,
    sub_shape_id_creator: SubShapeIdCreator,
    hit: &mut RayCastResult,
) -> bool {
    let mut buffer = SupportBuffer::new();
    let support =
        shape.support_function(SupportMode::IncludeConvexRadius, &mut buffer, &Vector::repeat(1.0));

    let mut gjk = GjkClosestPoint::new();
    let mut fraction = hit.fraction;
    if gjk.cast_ray(
        &ray.origin,
        &ray.direction,
        DEFAULT_COLLISION_TOLERANCE,
        support,
        &mut fraction,
    ) {
        hit.fraction = fraction;
        hit.sub_shape_id2 = sub_shape_id_creator.id();
        true
    } else {
        false
    }
}

/// Generic collector-based ray cast against any convex shape.
///
/// Front-side hits come from [`cast_ray_vs_convex`]; when back-facing hits
/// are requested, a second ray is cast backwards from the early-out fraction
/// towards the entry point to find where the original ray left the shape.
pub(crate) fn cast_ray_vs_convex_with_collector(
    shape: &dyn ConvexShape,
    ray: &RayCast,
    settings: &RayCastSettings,
    sub_shape_id_creator: SubShapeIdCreator,
    collector: &mut dyn CollisionCollector<RayCastResult>,
    shape_filter: &dyn ShapeFilter,
) {
    if !shape_filter.should_collide(shape as &dyn Shape, sub_shape_id_creator.id()) {
        return;
    }

    // A normal ray cast first, limited to the early-out fraction.
    let mut hit = RayCastResult {
        fraction: collector.early_out_fraction(),
        ..RayCastResult::default()
    };
    if !cast_ray_vs_convex(shape, ray, sub_shape_id_creator, &mut hit) {
        return;
    }

    if settings.treat_convex_as_solid || hit.fraction > 0.0 {
        hit.body_id = TransformedShape::body_id_from_context(collector.context());
        collector.add_hit(hit);
    }

    // Check for a back-facing hit if requested and the collector still
    // accepts one.
    if settings.back_face_mode_convex == crate::collision::BackFaceMode::CollideWithBackFaces
        && !collector.should_early_out()
    {
        // Invert the ray, going from the early-out fraction back to the
        // fraction of the forward hit.
        let start_fraction = collector.early_out_fraction().min(1.0);
        let delta_fraction = hit.fraction - start_fraction;
        if delta_fraction < 0.0 {
            let inverted_ray = RayCast::new(
                ray.origin + start_fraction * ray.direction,
                delta_fraction * ray.direction,
            );

            let mut inverted_hit = RayCastResult {
                fraction: 1.0,
                ..RayCastResult::default()
            };
            // A fraction of 0 means the inverted ray started inside: the
            // original ray ends inside the shape, not a back-facing hit.
            if cast_ray_vs_convex(shape, &inverted_ray, sub_shape_id_creator, &mut inverted_hit)
                && inverted_hit.fraction > 0.0
            {
                // Rescale back to a fraction of the original ray.
                inverted_hit.fraction = hit.fraction + (inverted_hit.fraction - 1.0) * delta_fraction;
                inverted_hit.body_id = TransformedShape::body_id_from_context(collector.context());
                collector.add_hit(inverted_hit);
            }
        }
    }
}

/// Generic point containment test against any convex shape: a GJK
/// intersection between the shape and a single point.
pub(crate) fn collide_point_vs_convex(
    shape: &dyn ConvexShape,
    point: &Point,
    sub_shape_id_creator: SubShapeIdCreator,
    collector: &mut dyn CollisionCollector<CollidePointResult>,
    shape_filter: &dyn ShapeFilter,
) {
    if !shape_filter.should_collide(shape as &dyn Shape, sub_shape_id_creator.id()) {
        return;
    }

    // Cheap bounding box reject first.
    if !shape.local_bounds().contains_local_point(point) {
        return;
    }

    let mut buffer = SupportBuffer::new();
    let support =
        shape.support_function(SupportMode::IncludeConvexRadius, &mut buffer, &Vector::repeat(1.0));
    let convex_point = PointSupport { point: *point };

    let mut gjk = GjkClosestPoint::new();
    let mut separating_axis = point.coords;
    if gjk.intersects(
        support,
        &convex_point,
        DEFAULT_COLLISION_TOLERANCE,
        &mut separating_axis,
    ) {
        collector.add_hit(CollidePointResult {
            body_id: TransformedShape::body_id_from_context(collector.context()),
            sub_shape_id2: sub_shape_id_creator.id(),
        });
    }
}

/// Generic triangle stream for any convex shape: evaluate the support
/// function along a fixed tessellation of the unit sphere.
pub(crate) fn convex_triangles_start(
    shape: &dyn ConvexShape,
    position_com: &Point,
    rotation: &Rotation,
    scale: &Vector,
) -> TrianglesContext {
    let mut buffer = SupportBuffer::new();
    let support =
        shape.support_function(SupportMode::IncludeConvexRadius, &mut buffer, &Vector::repeat(1.0));

    let transform = Isometry::from_parts(Translation::from(position_com.coords), *rotation);
    let vertices = unit_sphere_triangles()
        .iter()
        .map(|dir| {
            let local = support.support_point(dir);
            transform * Point::from(local.coords.component_mul(scale))
        })
        .collect();

    TrianglesContext::new(vertices, scale_helpers::is_inside_out(scale))
}

/// Triangle directions of a unit sphere: an octahedron with each face
/// subdivided twice, 128 triangles.
fn unit_sphere_triangles() -> &'static [Vector] {
    static TRIANGLES: OnceLock<Vec<Vector>> = OnceLock::new();
    TRIANGLES
        .get_or_init(|| {
            let mut vertices = Vec::with_capacity(384);
            for sx in [1.0f32, -1.0] {
                for sy in [1.0f32, -1.0] {
                    for sz in [1.0f32, -1.0] {
                        let x = Vector::new(sx, 0.0, 0.0);
                        let y = Vector::new(0.0, sy, 0.0);
                        let z = Vector::new(0.0, 0.0, sz);
                        // An odd number of reflections flips the winding.
                        if scale_helpers::is_inside_out(&Vector::new(sx, sy, sz)) {
                            subdivide_octant(x, z, y, 2, &mut vertices);
                        } else {
                            subdivide_octant(x, y, z, 2, &mut vertices);
                        }
                    }
                }
            }
            vertices
        })
        .as_slice()
}

/// Collides two convex shapes: a GJK step on the cores excluding the convex
/// radii, followed by EPA on the full shapes when the overlap is deeper than
/// the radii can explain.
pub(crate) fn collide_convex_vs_convex(
    _dispatch: &CollisionDispatch,
    shape1: &dyn Shape,
    shape2: &dyn Shape,
    scale1: &Vector,
    scale2: &Vector,
    center_of_mass_transform1: &Isometry,
    center_of_mass_transform2: &Isometry,
    sub_shape_id_creator1: SubShapeIdCreator,
    sub_shape_id_creator2: SubShapeIdCreator,
    settings: &CollideShapeSettings,
    collector: &mut dyn CollisionCollector<CollideShapeResult>,
    _shape_filter: &dyn ShapeFilter,
) {
    let (Some(convex1), Some(convex2)) = (shape1.as_convex(), shape2.as_convex()) else {
        debug_assert!(false, "collide_convex_vs_convex called on a non-convex pair");
        return;
    };

    // Everything below runs in the space of shape 1.
    let transform_2_to_1 = center_of_mass_transform1.inverse() * center_of_mass_transform2;

    // Conservative bounding box cull before paying for GJK.
    let mut max_separation_distance = settings.max_separation_distance;
    let mut bounds1 = shape1.local_bounds().scaled(scale1);
    bounds1.expand_by(max_separation_distance);
    let bounds2_in_1 = shape2
        .local_bounds()
        .scaled(scale2)
        .transform_by(&transform_2_to_1);
    if !bounds2_in_1.intersects(&bounds1) {
        return;
    }

    // Shape 2 is likely pushed out of collision along the line between the
    // centers of mass, so that is the initial penetration axis guess.
    let mut penetration_axis = transform_2_to_1.translation.vector;
    if penetration_axis.norm_squared() < 1.0e-12 {
        penetration_axis = Vector::x();
    }

    let mut point1 = Point::origin();
    let mut point2 = Point::origin();
    let mut penetration_depth_solver = PenetrationDepth::new();

    let status = {
        let mut buffer1 = SupportBuffer::new();
        let mut buffer2 = SupportBuffer::new();
        let support1 =
            convex1.support_function(SupportMode::ExcludeConvexRadius, &mut buffer1, scale1);
        let support2 =
            convex2.support_function(SupportMode::ExcludeConvexRadius, &mut buffer2, scale2);
        let transformed2 = TransformedSupport::new(transform_2_to_1, support2);

        penetration_depth_solver.step_gjk(
            support1,
            support1.convex_radius() + max_separation_distance,
            &transformed2,
            support2.convex_radius(),
            settings.collision_tolerance,
            &mut penetration_axis,
            &mut point1,
            &mut point2,
        )
    };

    match status {
        Status::Colliding => {}
        Status::NotColliding => return,
        Status::Indeterminate => {
            // GJK may find an overlap that EPA, run on the inflated shapes,
            // narrowly misses. Clamp the extra inflation so the shapes are
            // not blown up excessively while still avoiding that mismatch.
            max_separation_distance = max_separation_distance.min(1.0);

            let mut buffer1 = SupportBuffer::new();
            let mut buffer2 = SupportBuffer::new();
            let support1 =
                convex1.support_function(SupportMode::IncludeConvexRadius, &mut buffer1, scale1);
            let support2 =
                convex2.support_function(SupportMode::IncludeConvexRadius, &mut buffer2, scale2);
            let inflated1 = AddConvexRadius::new(support1, max_separation_distance);
            let transformed2 = TransformedSupport::new(transform_2_to_1, support2);

            if !penetration_depth_solver.step_epa(
                &inflated1,
                &transformed2,
                settings.penetration_tolerance,
                &mut penetration_axis,
                &mut point1,
                &mut point2,
            ) {
                return;
            }
        }
    }

    // Correct the penetration depth and contact point on 1 for the
    // artificial separation distance that was added to shape 1.
    let penetration_depth = (point2 - point1).norm() - max_separation_distance;
    if -penetration_depth >= collector.early_out_fraction() {
        return;
    }
    let penetration_axis_len = penetration_axis.norm();
    if penetration_axis_len > 0.0 {
        point1 -= penetration_axis * (max_separation_distance / penetration_axis_len);
    }

    let mut result = CollideShapeResult {
        contact_point_on1: center_of_mass_transform1 * point1,
        contact_point_on2: center_of_mass_transform1 * point2,
        penetration_axis: center_of_mass_transform1 * penetration_axis,
        penetration_depth,
        sub_shape_id1: sub_shape_id_creator1.id(),
        sub_shape_id2: sub_shape_id_creator2.id(),
        body_id2: TransformedShape::body_id_from_context(collector.context()),
        ..CollideShapeResult::default()
    };

    if settings.collect_faces_mode == CollectFacesMode::CollectFaces {
        shape1.supporting_face(
            crate::shape::SubShapeId::empty(),
            &-penetration_axis,
            scale1,
            center_of_mass_transform1,
            &mut result.shape1_face,
        );
        shape2.supporting_face(
            crate::shape::SubShapeId::empty(),
            &transform_2_to_1.inverse_transform_vector(&penetration_axis),
            scale2,
            center_of_mass_transform2,
            &mut result.shape2_face,
        );
    }

    collector.add_hit(result);
}

/// Casts one convex shape against another through the combined GJK + EPA
/// cast.
pub(crate) fn cast_convex_vs_convex(
    _dispatch: &CollisionDispatch,
    shape_cast: &ShapeCast,
    settings: &ShapeCastSettings,
    shape: &crate::shape::ShapeRef,
    scale: &Vector,
    _shape_filter: &dyn ShapeFilter,
    center_of_mass_transform2: &Isometry,
    sub_shape_id_creator1: SubShapeIdCreator,
    sub_shape_id_creator2: SubShapeIdCreator,
    collector: &mut dyn CollisionCollector<ShapeCastResult>,
) {
    let (Some(cast_convex), Some(target_convex)) =
        (shape_cast.shape.as_convex(), shape.as_convex())
    else {
        debug_assert!(false, "cast_convex_vs_convex called on a non-convex pair");
        return;
    };

    // Shrinking by the convex radius speeds up the cast and sharpens the
    // normal, at the cost of rounding the shape.
    let support_mode = if settings.use_shrunken_shape_and_convex_radius {
        SupportMode::ExcludeConvexRadius
    } else {
        SupportMode::Default
    };

    let mut cast_buffer = SupportBuffer::new();
    let cast_support = cast_convex.support_function(support_mode, &mut cast_buffer, &shape_cast.scale);
    let mut target_buffer = SupportBuffer::new();
    let target_support = target_convex.support_function(support_mode, &mut target_buffer, scale);

    let mut epa = PenetrationDepth::new();
    let mut fraction = collector.early_out_fraction();
    let mut contact_point_a = Point::origin();
    let mut contact_point_b = Point::origin();
    let mut contact_normal = Vector::zeros();

    if !epa.cast_shape(
        &shape_cast.center_of_mass_start,
        &shape_cast.direction,
        settings.collision_tolerance,
        settings.penetration_tolerance,
        cast_support,
        target_support,
        cast_support.convex_radius(),
        target_support.convex_radius(),
        settings.return_deepest_point,
        &mut fraction,
        &mut contact_point_a,
        &mut contact_point_b,
        &mut contact_normal,
    ) {
        return;
    }

    // Reject back-facing hits unless they were asked for.
    if settings.back_face_mode_convex != BackFaceMode::CollideWithBackFaces
        && contact_normal.dot(&shape_cast.direction) <= 0.0
    {
        return;
    }

    // The cast ran in the space of shape 2; convert to world space.
    let mut result = ShapeCastResult::new(
        fraction,
        center_of_mass_transform2 * contact_point_a,
        center_of_mass_transform2 * contact_point_b,
        center_of_mass_transform2 * contact_normal,
        false,
        sub_shape_id_creator1.id(),
        sub_shape_id_creator2.id(),
        TransformedShape::body_id_from_context(collector.context()),
    );

    // A hit at fraction 0 is ordered on penetration depth instead; check it
    // still beats the early-out threshold.
    if fraction == 0.0 && -result.contact.penetration_depth >= collector.early_out_fraction() {
        return;
    }

    if settings.collect_faces_mode == CollectFacesMode::CollectFaces {
        let mut transform_1_to_2 = shape_cast.center_of_mass_start;
        transform_1_to_2.translation.vector += fraction * shape_cast.direction;
        shape_cast.shape.supporting_face(
            crate::shape::SubShapeId::empty(),
            &transform_1_to_2.inverse_transform_vector(&-contact_normal),
            &shape_cast.scale,
            &(center_of_mass_transform2 * transform_1_to_2),
            &mut result.contact.shape1_face,
        );
        shape.supporting_face(
            crate::shape::SubShapeId::empty(),
            &contact_normal,
            scale,
            center_of_mass_transform2,
            &mut result.contact.shape2_face,
        );
    }

    collector.add_hit(result);
}

fn subdivide_octant(v0: Vector, v1: Vector, v2: Vector, level: u32, out: &mut Vec<Vector>) {
    if level == 0 {
        out.extend_from_slice(&[v0, v1, v2]);
        return;
    }

    let m01 = (v0 + v1).normalize();
    let m12 = (v1 + v2).normalize();
    let m20 = (v2 + v0).normalize();
    subdivide_octant(v0, m01, m20, level - 1, out);
    subdivide_octant(m01, v1, m12, level - 1, out);
    subdivide_octant(m20, m12, v2, level - 1, out);
    subdivide_octant(m01, m12, m20, level - 1, out);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unit_sphere_tessellation_is_on_the_sphere() {
        let triangles = unit_sphere_triangles();
        assert_eq!(triangles.len(), 384);
        for dir in triangles {
            assert_relative_eq!(dir.norm(), 1.0, epsilon = 1.0e-6);
        }
    }
}
