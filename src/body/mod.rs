//! Body identifiers, snapshots and the locking interface.
//!
//! The body store itself lives outside this crate; queries only consume the
//! interfaces defined here: an id, a read-locked view of a body, and a way
//! to take a lock-independent [`TransformedShape`] snapshot.

use crate::broad_phase::CollisionLayer;
use crate::collision::{CollectResult, TransformedShape};
use crate::math::{Point, Real, Rotation};
use crate::shape::ShapeRef;

/// Identifier of a body inside the body store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u32);

impl BodyId {
    /// The id of a non-existing body.
    pub const INVALID: BodyId = BodyId(u32::MAX);

    /// Whether this id refers to a body at all.
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl Default for BodyId {
    fn default() -> Self {
        Self::INVALID
    }
}

// Broad-phase query collectors receive bare body ids; the id itself carries
// no ordering so the adapter around it drives the early out.
impl CollectResult for BodyId {
    const INITIAL_EARLY_OUT_FRACTION: Real = Real::MAX;
    const SHOULD_EARLY_OUT_FRACTION: Real = -Real::MAX;

    fn early_out_fraction(&self) -> Real {
        Real::MAX
    }
}

/// The data of a body a query can observe while holding a read lock.
pub struct Body {
    id: BodyId,
    position: Point,
    rotation: Rotation,
    shape: ShapeRef,
    layer: CollisionLayer,
    in_broad_phase: bool,
}

impl Body {
    /// Creates a body snapshot value.
    pub fn new(
        id: BodyId,
        position: Point,
        rotation: Rotation,
        shape: ShapeRef,
        layer: CollisionLayer,
    ) -> Body {
        Body {
            id,
            position,
            rotation,
            shape,
            layer,
            in_broad_phase: true,
        }
    }

    /// The id of this body.
    #[inline]
    pub fn id(&self) -> BodyId {
        self.id
    }

    /// World-space position of the shape's center of mass.
    #[inline]
    pub fn center_of_mass_position(&self) -> Point {
        self.position
    }

    /// World-space rotation of the body.
    #[inline]
    pub fn rotation(&self) -> &Rotation {
        &self.rotation
    }

    /// The collision shape of the body.
    #[inline]
    pub fn shape(&self) -> &ShapeRef {
        &self.shape
    }

    /// The collision layer the body belongs to.
    #[inline]
    pub fn layer(&self) -> CollisionLayer {
        self.layer
    }

    /// Whether the body is still registered in the broad phase. A body found
    /// by a broad-phase query may have been removed before it could be
    /// locked; queries re-check this under the lock.
    #[inline]
    pub fn is_in_broad_phase(&self) -> bool {
        self.in_broad_phase
    }

    /// Marks the body as removed from (or re-added to) the broad phase.
    pub fn set_in_broad_phase(&mut self, in_broad_phase: bool) {
        self.in_broad_phase = in_broad_phase;
    }

    /// Takes a lock-independent snapshot of the body's shape and pose. The
    /// snapshot holds its own shape reference, so it remains valid after the
    /// body lock is released.
    pub fn transformed_shape(&self) -> TransformedShape {
        TransformedShape::new(self.position, self.rotation, self.shape.clone(), self.id)
    }

    #[cfg(test)]
    pub(crate) fn default_for_tests() -> Body {
        use crate::shape::SphereShapeSettings;

        Body::new(
            BodyId(0),
            Point::origin(),
            Rotation::identity(),
            SphereShapeSettings::new(1.0).build().unwrap(),
            CollisionLayer(0),
        )
    }
}

/// Filter that can reject bodies before and after they are locked.
pub trait BodyFilter {
    /// Whether a broad-phase candidate should be considered at all.
    fn should_collide(&self, _body_id: BodyId) -> bool {
        true
    }

    /// Whether a body should be considered, called with the body locked.
    fn should_collide_locked(&self, _body: &Body) -> bool {
        true
    }
}

/// A body filter that lets everything through.
pub struct DefaultBodyFilter;

impl BodyFilter for DefaultBodyFilter {}

/// Interface that grants scoped read access to bodies.
///
/// `with_body_read` acquires a read lock, runs the closure and guarantees
/// the lock is released on every exit path. Callers that need data past the
/// lock take an owned snapshot inside the closure (see
/// [`Body::transformed_shape`]).
pub trait BodyLockInterface: Send + Sync {
    /// Runs `f` with the body locked for reading. Returns false (without
    /// calling `f`) when the body does not exist.
    fn with_body_read(&self, body_id: BodyId, f: &mut dyn FnMut(&Body)) -> bool;
}
