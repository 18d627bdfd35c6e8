//! Shape-vs-shape overlap results and settings.

use crate::body::BodyId;
use crate::collision::{BackFaceMode, CollectFacesMode, CollectResult};
use crate::collision::{DEFAULT_COLLISION_TOLERANCE, DEFAULT_PENETRATION_TOLERANCE};
use crate::math::{Point, Real, Vector};
use crate::shape::{SubShapeId, SupportingFace};

/// All information about two colliding shapes.
#[derive(Debug, Clone)]
pub struct CollideShapeResult {
    /// Contact point on the surface of shape 1.
    pub contact_point_on1: Point,
    /// Contact point on the surface of shape 2. When the penetration depth
    /// is 0 this is the same as `contact_point_on1`.
    pub contact_point_on2: Point,
    /// Direction to move shape 2 out of collision along the shortest path
    /// (in the direction from shape 1 to shape 2; magnitude meaningless).
    /// Use `-penetration_axis.normalize()` as the contact normal.
    pub penetration_axis: Vector,
    /// Distance the shapes interpenetrate along the axis.
    pub penetration_depth: Real,
    /// Path to the leaf shape inside shape 1.
    pub sub_shape_id1: SubShapeId,
    /// Path to the leaf shape inside shape 2.
    pub sub_shape_id2: SubShapeId,
    /// Body owning shape 2.
    pub body_id2: BodyId,
    /// Face on shape 1 that faces the contact, when face collection is on.
    pub shape1_face: SupportingFace,
    /// Face on shape 2 that faces the contact, when face collection is on.
    pub shape2_face: SupportingFace,
}

impl Default for CollideShapeResult {
    fn default() -> Self {
        CollideShapeResult {
            contact_point_on1: Point::origin(),
            contact_point_on2: Point::origin(),
            penetration_axis: Vector::zeros(),
            penetration_depth: 0.0,
            sub_shape_id1: SubShapeId::empty(),
            sub_shape_id2: SubShapeId::empty(),
            body_id2: BodyId::INVALID,
            shape1_face: SupportingFace::new(),
            shape2_face: SupportingFace::new(),
        }
    }
}

impl CollideShapeResult {
    /// The same hit seen from shape 2: contact points and sub-shape paths
    /// swapped, penetration axis negated.
    pub fn reversed(&self) -> CollideShapeResult {
        CollideShapeResult {
            contact_point_on1: self.contact_point_on2,
            contact_point_on2: self.contact_point_on1,
            penetration_axis: -self.penetration_axis,
            penetration_depth: self.penetration_depth,
            sub_shape_id1: self.sub_shape_id2,
            sub_shape_id2: self.sub_shape_id1,
            body_id2: self.body_id2,
            shape1_face: self.shape2_face.clone(),
            shape2_face: self.shape1_face.clone(),
        }
    }
}

impl CollectResult for CollideShapeResult {
    const INITIAL_EARLY_OUT_FRACTION: Real = Real::MAX;
    const SHOULD_EARLY_OUT_FRACTION: Real = -Real::MAX;

    /// Negated penetration depth: the deepest hit is the best hit.
    fn early_out_fraction(&self) -> Real {
        -self.penetration_depth
    }
}

/// Settings for a shape-vs-shape collision query.
#[derive(Debug, Clone, Copy)]
pub struct CollideShapeSettings {
    /// Whether colliding faces should be collected or only contact points.
    pub collect_faces_mode: CollectFacesMode,
    /// Objects closer than this are considered colliding (used by GJK).
    pub collision_tolerance: Real,
    /// Accuracy factor of the penetration depth: EPA terminates when the
    /// change of squared distance drops below
    /// `penetration_tolerance * depth^2`.
    pub penetration_tolerance: Real,
    /// When positive, near-miss contacts up to this distance are found too;
    /// their penetration depth is negative.
    pub max_separation_distance: Real,
    /// How back-facing triangles are treated.
    pub back_face_mode: BackFaceMode,
}

impl Default for CollideShapeSettings {
    fn default() -> Self {
        CollideShapeSettings {
            collect_faces_mode: CollectFacesMode::NoFaces,
            collision_tolerance: DEFAULT_COLLISION_TOLERANCE,
            penetration_tolerance: DEFAULT_PENETRATION_TOLERANCE,
            max_separation_distance: 0.0,
            back_face_mode: BackFaceMode::IgnoreBackFaces,
        }
    }
}
