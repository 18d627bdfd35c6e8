//! The polymorphic shape trait and its type tags.

use crate::bounding_volume::Aabb;
use crate::collision::{
    CollidePointResult, CollisionCollector, RayCast, RayCastResult, RayCastSettings, ShapeFilter,
    TransformedShape,
};
use crate::math::{Isometry, Point, Real, Rotation, Vector};
use crate::shape::convex_shape::ConvexShape;
use crate::shape::{scale_helpers, SubShapeId, SubShapeIdCreator};
use arrayvec::ArrayVec;
use downcast_rs::{impl_downcast, DowncastSync};
use std::sync::Arc;
use thiserror::Error;

/// Broad class of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeType {
    /// A convex leaf shape, usable with GJK/EPA through its support function.
    Convex,
    /// A shape holding transformed child shapes.
    Compound,
}

/// Concrete type of a shape, the key of the collision dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeSubType {
    /// [`Sphere`](crate::shape::Sphere).
    Sphere = 0,
    /// [`BoxShape`](crate::shape::BoxShape).
    Box,
    /// [`Capsule`](crate::shape::Capsule).
    Capsule,
    /// [`StaticCompound`](crate::shape::StaticCompound).
    StaticCompound,
}

/// Number of shape subtypes, the dimension of the dispatch table.
pub const NUM_SUB_SHAPE_TYPES: usize = 4;

/// All shape subtypes.
pub const ALL_SUB_SHAPE_TYPES: [ShapeSubType; NUM_SUB_SHAPE_TYPES] = [
    ShapeSubType::Sphere,
    ShapeSubType::Box,
    ShapeSubType::Capsule,
    ShapeSubType::StaticCompound,
];

/// The convex shape subtypes.
pub const CONVEX_SUB_SHAPE_TYPES: [ShapeSubType; 3] = [
    ShapeSubType::Sphere,
    ShapeSubType::Box,
    ShapeSubType::Capsule,
];

/// The compound shape subtypes.
pub const COMPOUND_SUB_SHAPE_TYPES: [ShapeSubType; 1] = [ShapeSubType::StaticCompound];

/// A shared, immutable reference to a shape. Shapes are built once through
/// their settings object and then shared by any number of transformed
/// instances across threads.
pub type ShapeRef = Arc<dyn Shape>;

/// The contact face of a shape for a query direction, in world space.
/// Empty when the shape has no polygons to return (e.g. a sphere).
pub type SupportingFace = ArrayVec<Point, 32>;

/// Error returned when shape settings describe an invalid shape.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShapeError {
    /// The convex radius is negative or does not fit inside the shape.
    #[error("convex radius {radius} must be non-negative and at most the smallest half extent {min_half_extent}")]
    InvalidConvexRadius {
        /// The rejected convex radius.
        radius: Real,
        /// The smallest half extent the radius must fit inside.
        min_half_extent: Real,
    },
    /// A radius is zero or negative.
    #[error("radius must be positive, got {0}")]
    InvalidRadius(Real),
    /// A capsule's cylinder half height is zero or negative.
    #[error("cylinder half height must be positive, got {0}")]
    InvalidHalfHeight(Real),
    /// A compound shape was given fewer than two children.
    #[error("a compound shape needs at least 2 child shapes, got {0}")]
    TooFewChildren(usize),
    /// The compound hierarchy is too deep or too wide to address.
    #[error("the shape hierarchy needs {0} sub-shape id bits, the id holds at most 32")]
    SubShapeIdBitsExhausted(u32),
}

/// Minimum number of triangles to request per [`Shape::get_triangles_next`]
/// call.
pub const GET_TRIANGLES_MIN_TRIANGLES_REQUESTED: usize = 32;

/// Streaming state for [`Shape::get_triangles_start`] /
/// [`Shape::get_triangles_next`].
///
/// Every shape in this crate streams from a vertex list computed when the
/// iteration starts; compound shapes concatenate the lists of their
/// children.
pub struct TrianglesContext {
    vertices: Vec<Point>,
    current: usize,
}

impl TrianglesContext {
    /// Creates a context from world-space triangle vertices, three per
    /// triangle. `flip_winding` reverses each triangle, needed when an
    /// inside-out scale inverted the faces.
    pub fn new(mut vertices: Vec<Point>, flip_winding: bool) -> TrianglesContext {
        debug_assert!(vertices.len() % 3 == 0);
        if flip_winding {
            for triangle in vertices.chunks_exact_mut(3) {
                triangle.swap(1, 2);
            }
        }
        TrianglesContext {
            vertices,
            current: 0,
        }
    }

    /// Merges another context into this one; used by compound shapes to
    /// chain the streams of their children.
    pub fn append(&mut self, mut other: TrianglesContext) {
        self.vertices.append(&mut other.vertices);
    }

    /// Copies up to `max_triangles_requested` triangles into
    /// `out_vertices` (cleared first). Returns the number of triangles
    /// written; 0 means the stream is exhausted.
    pub fn next(&mut self, max_triangles_requested: usize, out_vertices: &mut Vec<Point>) -> usize {
        debug_assert!(max_triangles_requested >= GET_TRIANGLES_MIN_TRIANGLES_REQUESTED);

        out_vertices.clear();
        let num_vertices = (3 * max_triangles_requested).min(self.vertices.len() - self.current);
        out_vertices.extend_from_slice(&self.vertices[self.current..self.current + num_vertices]);
        self.current += num_vertices;
        num_vertices / 3
    }
}

/// Base trait of all shapes (the collision volume of a body).
///
/// Shapes are immutable and centered around their center of mass; a
/// transform is supplied per query. Ray and point queries take their inputs
/// in the shape's unscaled local space (the caller divides by the scale, see
/// [`TransformedShape`]); the remaining queries receive the scale
/// explicitly.
pub trait Shape: DowncastSync {
    /// The broad class of this shape.
    fn shape_type(&self) -> ShapeType;

    /// The concrete type of this shape, used for collision dispatch.
    fn sub_type(&self) -> ShapeSubType;

    /// The center of mass that was subtracted from the shape at construction
    /// to center it.
    fn center_of_mass(&self) -> Point {
        Point::origin()
    }

    /// The local bounding box including the convex radius, centered around
    /// the center of mass.
    fn local_bounds(&self) -> Aabb;

    /// The world-space bounds of the shape scaled by `scale` in local space
    /// and placed at `center_of_mass_transform`.
    fn world_bounds(&self, center_of_mass_transform: &Isometry, scale: &Vector) -> Aabb {
        self.local_bounds()
            .scaled(scale)
            .transform_by(center_of_mass_transform)
    }

    /// Number of sub-shape id bits needed to address any leaf of this shape.
    /// Must stay within [`SubShapeId::MAX_BITS`].
    fn sub_shape_id_bits_recursive(&self) -> u32;

    /// Radius of the biggest sphere that fits entirely inside the shape. A
    /// measure of how far the shape can move before risking to tunnel
    /// through geometry.
    fn inner_radius(&self) -> Real;

    /// The surface normal of the leaf addressed by `sub_shape_id` at a
    /// position on its surface, all in unscaled local space.
    ///
    /// This returns face normals only; for a contact normal use the
    /// negated, normalized penetration axis of the collision result instead.
    fn surface_normal(&self, sub_shape_id: SubShapeId, local_surface_position: &Point) -> Vector;

    /// The vertices of the face hit first when coming along `direction`
    /// (its outward normal points against the direction), in world space.
    /// Left empty when the leaf has no polygons to return.
    fn supporting_face(
        &self,
        _sub_shape_id: SubShapeId,
        _direction: &Vector,
        _scale: &Vector,
        _center_of_mass_transform: &Isometry,
        _out_vertices: &mut SupportingFace,
    ) {
    }

    /// Casts a ray against this shape, treating it as solid. Returns true
    /// and updates `hit` if a hit closer than `hit.fraction` was found;
    /// `hit` is untouched otherwise.
    fn cast_ray(
        &self,
        ray: &RayCast,
        sub_shape_id_creator: SubShapeIdCreator,
        hit: &mut RayCastResult,
    ) -> bool;

    /// Casts a ray against this shape, feeding every hit to `collector`.
    /// More flexible but slightly slower than [`Self::cast_ray`].
    fn cast_ray_with_collector(
        &self,
        ray: &RayCast,
        settings: &RayCastSettings,
        sub_shape_id_creator: SubShapeIdCreator,
        collector: &mut dyn CollisionCollector<RayCastResult>,
        shape_filter: &dyn ShapeFilter,
    );

    /// Tests if `point` is inside this shape, treating it as solid. Each
    /// containing leaf reports one hit to `collector`.
    fn collide_point(
        &self,
        point: &Point,
        sub_shape_id_creator: SubShapeIdCreator,
        collector: &mut dyn CollisionCollector<CollidePointResult>,
        shape_filter: &dyn ShapeFilter,
    );

    /// Reports a [`TransformedShape`] for every leaf of this shape whose
    /// world bounds touch `bounds`. `transformed_shape` is the snapshot
    /// describing this shape's own placement (and owning its reference).
    fn collect_transformed_shapes(
        &self,
        bounds: &Aabb,
        transformed_shape: &TransformedShape,
        collector: &mut dyn CollisionCollector<TransformedShape>,
        shape_filter: &dyn ShapeFilter,
    );

    /// Starts streaming the triangles of this shape placed at
    /// `position_com`/`rotation` and scaled by `scale`, in world space.
    fn get_triangles_start(
        &self,
        bounds: &Aabb,
        position_com: &Point,
        rotation: &Rotation,
        scale: &Vector,
    ) -> TrianglesContext;

    /// Fetches the next block of triangles, see [`TrianglesContext::next`].
    fn get_triangles_next(
        &self,
        context: &mut TrianglesContext,
        max_triangles_requested: usize,
        out_vertices: &mut Vec<Point>,
    ) -> usize {
        context.next(max_triangles_requested, out_vertices)
    }

    /// The volume of this shape. For compound shapes overlapping children
    /// are not accounted for.
    fn volume(&self) -> Real;

    /// Whether `scale` can be applied to this shape without distorting it in
    /// a way it cannot represent. Scales with a (near) zero component are
    /// never valid.
    fn is_valid_scale(&self, scale: &Vector) -> bool {
        !scale_helpers::is_zero_scale(scale)
    }

    /// The closest scale to `scale` for which [`Self::is_valid_scale`]
    /// holds. Compare with the requested scale to detect major
    /// inconsistencies.
    fn make_scale_valid(&self, scale: &Vector) -> Vector {
        scale_helpers::make_non_zero_scale(scale)
    }

    /// This shape as a convex shape, if it is one.
    fn as_convex(&self) -> Option<&dyn ConvexShape> {
        None
    }
}

impl_downcast!(sync Shape);

/// [`Shape::collect_transformed_shapes`] body shared by the leaf shapes:
/// report the shape itself when its world bounds touch the query box.
pub(crate) fn collect_leaf_transformed_shape(
    shape: &dyn Shape,
    bounds: &Aabb,
    transformed_shape: &TransformedShape,
    collector: &mut dyn CollisionCollector<TransformedShape>,
    shape_filter: &dyn ShapeFilter,
) {
    if shape_filter.should_collide(shape, transformed_shape.sub_shape_id_creator.id())
        && transformed_shape.world_bounds().intersects(bounds)
    {
        collector.add_hit(transformed_shape.clone());
    }
}
