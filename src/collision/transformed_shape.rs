//! Lock-independent shape snapshots.

use crate::body::BodyId;
use crate::bounding_volume::Aabb;
use crate::collision::{
    dispatch, CollectResult, CollidePointResult, CollideShapeResult, CollideShapeSettings,
    CollisionCollector, RayCast, RayCastResult, RayCastSettings, ShapeCast, ShapeCastResult,
    ShapeCastSettings, ShapeFilter,
};
use crate::math::{Isometry, Point, Real, Rotation, Translation, Vector};
use crate::shape::{ShapeRef, SubShapeId, SubShapeIdCreator, SupportingFace, TrianglesContext};

/// A shape and its transform, snapshotted from a body.
///
/// The snapshot is taken under the body's read lock (see
/// [`crate::body::BodyLockInterface`]) and holds its own shape reference, so
/// every collision operation on it is safe after the lock has been released.
#[derive(Clone)]
pub struct TransformedShape {
    /// World-space position of the shape's center of mass.
    pub position: Point,
    /// World-space rotation of the shape.
    pub rotation: Rotation,
    /// The shape itself.
    pub shape: ShapeRef,
    /// Scale of the shape in local space, relative to its center of mass.
    pub scale: Vector,
    /// The body this shape belongs to.
    pub body_id: BodyId,
    /// Sub-shape path of this shape inside the body's root shape; non-empty
    /// when the snapshot points at a leaf of a compound.
    pub sub_shape_id_creator: SubShapeIdCreator,
}

impl TransformedShape {
    /// Creates an unscaled snapshot rooted at the body's shape.
    pub fn new(
        position: Point,
        rotation: Rotation,
        shape: ShapeRef,
        body_id: BodyId,
    ) -> TransformedShape {
        TransformedShape {
            position,
            rotation,
            shape,
            scale: Vector::repeat(1.0),
            body_id,
            sub_shape_id_creator: SubShapeIdCreator::new(),
        }
    }

    /// The body id a collector's context refers to, or the invalid id when
    /// no context is set.
    pub fn body_id_from_context(context: Option<&TransformedShape>) -> BodyId {
        context.map_or(BodyId::INVALID, |ts| ts.body_id)
    }

    /// The center-of-mass transform of the shape (excluding scale).
    #[inline]
    pub fn center_of_mass_transform(&self) -> Isometry {
        Isometry::from_parts(Translation::from(self.position.coords), self.rotation)
    }

    /// The world-space bounds of the shape.
    pub fn world_bounds(&self) -> Aabb {
        self.shape
            .world_bounds(&self.center_of_mass_transform(), &self.scale)
    }

    /// A copy of `sub_shape_id` with the path this snapshot already consumed
    /// stripped off, needed when the snapshot points into a compound.
    pub fn make_sub_shape_id_relative_to_shape(&self, sub_shape_id: SubShapeId) -> SubShapeId {
        let (_, remainder) = sub_shape_id.pop_id(self.sub_shape_id_creator.num_bits_written());
        remainder
    }

    /// The ray transformed to the shape's unscaled local space.
    fn local_ray(&self, ray: &RayCast) -> RayCast {
        let local = ray.transformed(&self.center_of_mass_transform().inverse());
        let inverse_scale = self.scale.map(|c| 1.0 / c);
        RayCast {
            origin: Point::from(local.origin.coords.component_mul(&inverse_scale)),
            direction: local.direction.component_mul(&inverse_scale),
        }
    }

    /// Casts a ray and returns the closest hit, treating the shape as
    /// solid. Only hits closer than `hit.fraction` are considered; `hit` is
    /// untouched when none is found.
    pub fn cast_ray(&self, ray: &RayCast, hit: &mut RayCastResult) -> bool {
        let local_ray = self.local_ray(ray);
        if self
            .shape
            .cast_ray(&local_ray, self.sub_shape_id_creator, hit)
        {
            hit.body_id = self.body_id;
            true
        } else {
            false
        }
    }

    /// Casts a ray, feeding every hit to `collector`.
    pub fn cast_ray_with_collector(
        &self,
        ray: &RayCast,
        settings: &RayCastSettings,
        collector: &mut dyn CollisionCollector<RayCastResult>,
        shape_filter: &dyn ShapeFilter,
    ) {
        collector.set_context(Some(self.clone()));
        let local_ray = self.local_ray(ray);
        self.shape.cast_ray_with_collector(
            &local_ray,
            settings,
            self.sub_shape_id_creator,
            collector,
            shape_filter,
        );
    }

    /// Tests if a world-space point is inside the shape, treating it as
    /// solid.
    pub fn collide_point(
        &self,
        point: &Point,
        collector: &mut dyn CollisionCollector<CollidePointResult>,
        shape_filter: &dyn ShapeFilter,
    ) {
        collector.set_context(Some(self.clone()));
        let inverse_scale = self.scale.map(|c| 1.0 / c);
        let local_point = Point::from(
            self.center_of_mass_transform()
                .inverse_transform_point(point)
                .coords
                .component_mul(&inverse_scale),
        );
        self.shape.collide_point(
            &local_point,
            self.sub_shape_id_creator,
            collector,
            shape_filter,
        );
    }

    /// Collides `shape` against this snapshot. All hit results are relative
    /// to `base_offset`; pass a position near the query to keep the results
    /// numerically stable far from the origin.
    pub fn collide_shape(
        &self,
        shape: &dyn crate::shape::Shape,
        shape_scale: &Vector,
        center_of_mass_transform: &Isometry,
        settings: &CollideShapeSettings,
        base_offset: &Vector,
        collector: &mut dyn CollisionCollector<CollideShapeResult>,
        shape_filter: &dyn ShapeFilter,
    ) {
        collector.set_context(Some(self.clone()));

        let mut transform1 = *center_of_mass_transform;
        transform1.translation.vector -= base_offset;
        let mut transform2 = self.center_of_mass_transform();
        transform2.translation.vector -= base_offset;

        dispatch().collide_shape_vs_shape(
            shape,
            self.shape.as_ref(),
            shape_scale,
            &self.scale,
            &transform1,
            &transform2,
            SubShapeIdCreator::new(),
            self.sub_shape_id_creator,
            settings,
            collector,
            shape_filter,
        );
    }

    /// Casts a shape against this snapshot. All hit results are relative to
    /// `base_offset`, see [`Self::collide_shape`].
    pub fn cast_shape(
        &self,
        shape_cast: &ShapeCast,
        settings: &ShapeCastSettings,
        base_offset: &Vector,
        collector: &mut dyn CollisionCollector<ShapeCastResult>,
        shape_filter: &dyn ShapeFilter,
    ) {
        collector.set_context(Some(self.clone()));

        let local_cast = shape_cast.post_translated(&-base_offset);
        let mut transform2 = self.center_of_mass_transform();
        transform2.translation.vector -= base_offset;

        dispatch().cast_shape_vs_shape_world_space(
            &local_cast,
            settings,
            &self.shape,
            &self.scale,
            shape_filter,
            &transform2,
            SubShapeIdCreator::new(),
            self.sub_shape_id_creator,
            collector,
        );
    }

    /// Reports a snapshot for every leaf shape whose world bounds touch
    /// `bounds`.
    pub fn collect_transformed_shapes(
        &self,
        bounds: &Aabb,
        collector: &mut dyn CollisionCollector<TransformedShape>,
        shape_filter: &dyn ShapeFilter,
    ) {
        collector.set_context(Some(self.clone()));
        self.shape
            .collect_transformed_shapes(bounds, self, collector, shape_filter);
    }

    /// Starts streaming the triangles of the shape that fall inside the
    /// world-space `bounds`, relative to `base_offset`.
    pub fn get_triangles_start(&self, bounds: &Aabb, base_offset: &Vector) -> TrianglesContext {
        self.shape.get_triangles_start(
            bounds,
            &(self.position - base_offset),
            &self.rotation,
            &self.scale,
        )
    }

    /// Fetches the next block of triangles, see [`TrianglesContext::next`].
    pub fn get_triangles_next(
        &self,
        context: &mut TrianglesContext,
        max_triangles_requested: usize,
        out_vertices: &mut Vec<Point>,
    ) -> usize {
        self.shape
            .get_triangles_next(context, max_triangles_requested, out_vertices)
    }

    /// The world-space surface normal of a leaf at a world-space position on
    /// its surface.
    pub fn world_space_surface_normal(&self, sub_shape_id: SubShapeId, position: &Point) -> Vector {
        let inverse_scale = self.scale.map(|c| 1.0 / c);
        let local_position = Point::from(
            self.center_of_mass_transform()
                .inverse_transform_point(position)
                .coords
                .component_mul(&inverse_scale),
        );
        let local_normal = self.shape.surface_normal(
            self.make_sub_shape_id_relative_to_shape(sub_shape_id),
            &local_position,
        );
        // Normals transform with the inverse scale.
        (self.rotation * local_normal.component_mul(&inverse_scale)).normalize()
    }

    /// The world-space face of a leaf hit first when coming along
    /// `direction`, relative to `base_offset`.
    pub fn get_supporting_face(
        &self,
        sub_shape_id: SubShapeId,
        direction: &Vector,
        base_offset: &Vector,
        out_vertices: &mut SupportingFace,
    ) {
        let mut transform = self.center_of_mass_transform();
        transform.translation.vector -= base_offset;
        self.shape.supporting_face(
            self.make_sub_shape_id_relative_to_shape(sub_shape_id),
            &self.rotation.inverse_transform_vector(direction),
            &self.scale,
            &transform,
            out_vertices,
        );
    }
}

// Collected transformed shapes have no ordering, every leaf is reported.
impl CollectResult for TransformedShape {
    const INITIAL_EARLY_OUT_FRACTION: Real = Real::MAX;
    const SHOULD_EARLY_OUT_FRACTION: Real = -Real::MAX;

    fn early_out_fraction(&self) -> Real {
        0.0
    }
}
