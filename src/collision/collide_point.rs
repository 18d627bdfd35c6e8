//! Point containment results.

use crate::body::BodyId;
use crate::collision::CollectResult;
use crate::math::Real;
use crate::shape::SubShapeId;

/// A point-inside-shape hit.
#[derive(Debug, Clone, Copy)]
pub struct CollidePointResult {
    /// Body the point is inside of.
    pub body_id: BodyId,
    /// Path to the leaf shape containing the point.
    pub sub_shape_id2: SubShapeId,
}

impl CollectResult for CollidePointResult {
    const INITIAL_EARLY_OUT_FRACTION: Real = Real::MAX;
    const SHOULD_EARLY_OUT_FRACTION: Real = -Real::MAX;

    /// Point queries have no sensible ordering, all hits are treated equal.
    fn early_out_fraction(&self) -> Real {
        0.0
    }
}
