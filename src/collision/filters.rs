//! Shape-level collision filtering.

use crate::shape::{Shape, SubShapeId};

/// Filter that can selectively disable collisions against (sub) shapes.
///
/// Consulted before any geometric work is done: the one-shape form gates
/// ray/point queries against a leaf, the two-shape form gates shape-vs-shape
/// dispatch.
pub trait ShapeFilter {
    /// Whether a query should test `_shape`.
    fn should_collide(&self, _shape: &dyn Shape, _sub_shape_id: SubShapeId) -> bool {
        true
    }

    /// Whether two shapes should collide with each other.
    fn should_collide_pair(
        &self,
        _shape1: &dyn Shape,
        _sub_shape_id1: SubShapeId,
        _shape2: &dyn Shape,
        _sub_shape_id2: SubShapeId,
    ) -> bool {
        true
    }
}

/// A shape filter that lets everything through.
pub struct DefaultShapeFilter;

impl ShapeFilter for DefaultShapeFilter {}

/// Wraps a caller's filter with the two shapes swapped, used when a query
/// is dispatched through the reversed path so the filter still sees the
/// shapes in the order the caller passed them.
pub struct ReversedShapeFilter<'a> {
    filter: &'a dyn ShapeFilter,
}

impl<'a> ReversedShapeFilter<'a> {
    /// Wraps `filter`.
    pub fn new(filter: &'a dyn ShapeFilter) -> ReversedShapeFilter<'a> {
        ReversedShapeFilter { filter }
    }
}

impl ShapeFilter for ReversedShapeFilter<'_> {
    fn should_collide(&self, shape: &dyn Shape, sub_shape_id: SubShapeId) -> bool {
        self.filter.should_collide(shape, sub_shape_id)
    }

    fn should_collide_pair(
        &self,
        shape1: &dyn Shape,
        sub_shape_id1: SubShapeId,
        shape2: &dyn Shape,
        sub_shape_id2: SubShapeId,
    ) -> bool {
        self.filter
            .should_collide_pair(shape2, sub_shape_id2, shape1, sub_shape_id1)
    }
}
