//! Ray casts and their results.

use crate::body::BodyId;
use crate::collision::{BackFaceMode, CollectResult};
use crate::math::{Isometry, Point, Real, Vector};
use crate::shape::SubShapeId;

/// A ray: origin plus a direction that also encodes the length (fraction 1
/// is at `origin + direction`).
#[derive(Debug, Clone, Copy)]
pub struct RayCast {
    /// Origin of the ray.
    pub origin: Point,
    /// Direction and length of the ray.
    pub direction: Vector,
}

impl RayCast {
    /// Creates a ray.
    pub fn new(origin: Point, direction: Vector) -> RayCast {
        RayCast { origin, direction }
    }

    /// The point at `fraction` along the ray (0 = start, 1 = end).
    #[inline]
    pub fn point_on_ray(&self, fraction: Real) -> Point {
        self.origin + fraction * self.direction
    }

    /// This ray transformed by the inverse of `transform`.
    pub fn transformed(&self, inverse_transform: &Isometry) -> RayCast {
        RayCast {
            origin: inverse_transform * self.origin,
            direction: inverse_transform * self.direction,
        }
    }

    /// This ray translated by `translation`.
    pub fn translated(&self, translation: &Vector) -> RayCast {
        RayCast {
            origin: self.origin + translation,
            direction: self.direction,
        }
    }
}

/// Settings for a collector-based ray cast.
#[derive(Debug, Clone, Copy)]
pub struct RayCastSettings {
    /// How back-facing hits against convex shapes are treated.
    pub back_face_mode_convex: BackFaceMode,
    /// Whether convex shapes are solid: a ray starting inside reports a hit
    /// at fraction 0.
    pub treat_convex_as_solid: bool,
}

impl Default for RayCastSettings {
    fn default() -> Self {
        RayCastSettings {
            back_face_mode_convex: BackFaceMode::IgnoreBackFaces,
            treat_convex_as_solid: true,
        }
    }
}

/// A single ray hit.
#[derive(Debug, Clone, Copy)]
pub struct RayCastResult {
    /// Body that was hit.
    pub body_id: BodyId,
    /// Fraction along the ray where the hit occurred.
    pub fraction: Real,
    /// Path to the leaf shape that was hit.
    pub sub_shape_id2: SubShapeId,
}

impl Default for RayCastResult {
    fn default() -> Self {
        RayCastResult {
            body_id: BodyId::INVALID,
            // Just above 1 so hits at exactly the end of the ray are still
            // accepted against the initial threshold.
            fraction: 1.0 + Real::EPSILON,
            sub_shape_id2: SubShapeId::empty(),
        }
    }
}

impl CollectResult for RayCastResult {
    const INITIAL_EARLY_OUT_FRACTION: Real = 1.0 + Real::EPSILON;
    // A hit at fraction 0 cannot be beaten.
    const SHOULD_EARLY_OUT_FRACTION: Real = 0.0;

    fn early_out_fraction(&self) -> Real {
        self.fraction
    }
}
