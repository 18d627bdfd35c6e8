//! Swept-shape casts and their results.

use crate::body::BodyId;
use crate::bounding_volume::Aabb;
use crate::collision::{BackFaceMode, CollectFacesMode, CollideShapeResult};
use crate::collision::{CollectResult, DEFAULT_COLLISION_TOLERANCE, DEFAULT_PENETRATION_TOLERANCE};
use crate::math::{Isometry, Point, Real, Vector};
use crate::shape::{ShapeRef, SubShapeId, SupportingFace};

/// A shape swept along a direction.
#[derive(Clone)]
pub struct ShapeCast {
    /// The shape being cast.
    pub shape: ShapeRef,
    /// Local-space scale of the shape (relative to its center of mass).
    pub scale: Vector,
    /// Start position and orientation of the shape's center of mass.
    pub center_of_mass_start: Isometry,
    /// Direction and length of the cast; nothing beyond it is reported.
    pub direction: Vector,
    /// The shape's world bounds over the whole sweep start, cached at
    /// construction.
    pub shape_world_bounds: Aabb,
}

impl ShapeCast {
    /// Creates a shape cast from the center-of-mass start transform.
    pub fn new(
        shape: ShapeRef,
        scale: Vector,
        center_of_mass_start: Isometry,
        direction: Vector,
    ) -> ShapeCast {
        let shape_world_bounds = shape.world_bounds(&center_of_mass_start, &scale);
        ShapeCast {
            shape,
            scale,
            center_of_mass_start,
            direction,
            shape_world_bounds,
        }
    }

    /// Creates a shape cast from a world transform (the space the shape was
    /// created in) instead of its center-of-mass transform.
    pub fn from_world_transform(
        shape: ShapeRef,
        scale: Vector,
        world_transform: Isometry,
        direction: Vector,
    ) -> ShapeCast {
        let com = shape.center_of_mass().coords;
        let start = world_transform * crate::math::Translation::from(com);
        ShapeCast::new(shape, scale, start, direction)
    }

    /// This cast transformed by `transform` (multiplied on the left).
    pub fn post_transformed(&self, transform: &Isometry) -> ShapeCast {
        ShapeCast::new(
            self.shape.clone(),
            self.scale,
            transform * self.center_of_mass_start,
            transform * self.direction,
        )
    }

    /// This cast translated by `translation`.
    pub fn post_translated(&self, translation: &Vector) -> ShapeCast {
        let mut start = self.center_of_mass_start;
        start.translation.vector += translation;
        ShapeCast::new(self.shape.clone(), self.scale, start, self.direction)
    }

    /// The center-of-mass position at `fraction` along the cast.
    #[inline]
    pub fn point_along_ray(&self, fraction: Real) -> Point {
        Point::from(self.center_of_mass_start.translation.vector + fraction * self.direction)
    }
}

/// Settings for a shape cast.
#[derive(Debug, Clone, Copy)]
pub struct ShapeCastSettings {
    /// Whether colliding faces should be collected or only contact points.
    pub collect_faces_mode: CollectFacesMode,
    /// Objects closer than this are considered colliding (used by GJK).
    pub collision_tolerance: Real,
    /// Accuracy factor of the penetration depth calculation, see
    /// [`crate::collision::CollideShapeSettings::penetration_tolerance`].
    pub penetration_tolerance: Real,
    /// How back-facing convex hits are treated.
    pub back_face_mode_convex: BackFaceMode,
    /// Shrink the shape by its convex radius and expand the result again.
    /// Speeds up the cast and gives a more accurate normal at the cost of a
    /// more rounded shape.
    pub use_shrunken_shape_and_convex_radius: bool,
    /// When the shapes already intersect at fraction 0, spend the extra time
    /// to compute the deepest penetration point.
    pub return_deepest_point: bool,
}

impl Default for ShapeCastSettings {
    fn default() -> Self {
        ShapeCastSettings {
            collect_faces_mode: CollectFacesMode::NoFaces,
            collision_tolerance: DEFAULT_COLLISION_TOLERANCE,
            penetration_tolerance: DEFAULT_PENETRATION_TOLERANCE,
            back_face_mode_convex: BackFaceMode::IgnoreBackFaces,
            use_shrunken_shape_and_convex_radius: false,
            return_deepest_point: false,
        }
    }
}

/// Result of a shape cast.
#[derive(Debug, Clone, Default)]
pub struct ShapeCastResult {
    /// The contact data at the hit pose (contact points, penetration axis
    /// and depth, sub-shape paths, optional faces).
    pub contact: CollideShapeResult,
    /// Fraction along the cast where the shapes hit:
    /// `hit = start + fraction * direction`.
    pub fraction: Real,
    /// Whether the shape was hit from its back side.
    pub is_back_face_hit: bool,
}

impl ShapeCastResult {
    /// Assembles a result; the penetration depth is derived from the
    /// distance between the two contact points.
    pub fn new(
        fraction: Real,
        contact_point_on1: Point,
        contact_point_on2: Point,
        contact_normal_or_penetration_axis: Vector,
        is_back_face_hit: bool,
        sub_shape_id1: SubShapeId,
        sub_shape_id2: SubShapeId,
        body_id2: BodyId,
    ) -> ShapeCastResult {
        ShapeCastResult {
            contact: CollideShapeResult {
                contact_point_on1,
                contact_point_on2,
                penetration_axis: contact_normal_or_penetration_axis,
                penetration_depth: (contact_point_on2 - contact_point_on1).norm(),
                sub_shape_id1,
                sub_shape_id2,
                body_id2,
                shape1_face: SupportingFace::new(),
                shape2_face: SupportingFace::new(),
            },
            fraction,
            is_back_face_hit,
        }
    }

    /// The same hit with the roles of the cast and target shapes swapped.
    /// `world_space_cast_direction` is needed to shift the contact points
    /// back to the reversed cast's frame.
    pub fn reversed(&self, world_space_cast_direction: &Vector) -> ShapeCastResult {
        let delta = self.fraction * world_space_cast_direction;

        let mut contact = CollideShapeResult {
            contact_point_on1: self.contact.contact_point_on2 - delta,
            contact_point_on2: self.contact.contact_point_on1 - delta,
            penetration_axis: -self.contact.penetration_axis,
            penetration_depth: self.contact.penetration_depth,
            sub_shape_id1: self.contact.sub_shape_id2,
            sub_shape_id2: self.contact.sub_shape_id1,
            body_id2: self.contact.body_id2,
            shape1_face: SupportingFace::new(),
            shape2_face: SupportingFace::new(),
        };
        for vertex in &self.contact.shape2_face {
            contact.shape1_face.push(vertex - delta);
        }
        for vertex in &self.contact.shape1_face {
            contact.shape2_face.push(vertex - delta);
        }

        ShapeCastResult {
            contact,
            fraction: self.fraction,
            is_back_face_hit: self.is_back_face_hit,
        }
    }
}

impl CollectResult for ShapeCastResult {
    const INITIAL_EARLY_OUT_FRACTION: Real = 1.0 + Real::EPSILON;
    const SHOULD_EARLY_OUT_FRACTION: Real = -Real::MAX;

    /// Fraction and penetration depth combined so that deeper hits at
    /// fraction 0 order first.
    fn early_out_fraction(&self) -> Real {
        if self.fraction > 0.0 {
            self.fraction
        } else {
            -self.contact.penetration_depth
        }
    }
}
