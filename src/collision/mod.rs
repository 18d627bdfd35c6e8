//! Collision queries: results, settings, collectors, filters, the
//! shape-pair dispatch table and the scene-level narrow phase.

use crate::math::Real;

pub use self::collector::{
    AllHitCollector, AnyHitCollector, ClosestHitCollector, ClosestHitPerBodyCollector,
    CollectResult, CollectorState, CollisionCollector,
};
pub use self::collide_point::CollidePointResult;
pub use self::collide_shape::{CollideShapeResult, CollideShapeSettings};
pub use self::dispatch::{
    dispatch, reversed_cast_shape, reversed_collide_shape, CastShapeFn, CollideShapeFn,
    CollisionDispatch,
};
pub use self::filters::{DefaultShapeFilter, ReversedShapeFilter, ShapeFilter};
pub use self::narrow_phase::NarrowPhaseQuery;
pub use self::ray_cast::{RayCast, RayCastResult, RayCastSettings};
pub use self::shape_cast::{ShapeCast, ShapeCastResult, ShapeCastSettings};
pub use self::transformed_shape::TransformedShape;

mod collector;
mod collide_point;
mod collide_shape;
mod dispatch;
mod filters;
mod narrow_phase;
mod ray_cast;
mod shape_cast;
mod transformed_shape;

/// How back-facing geometry is treated by a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackFaceMode {
    /// Ignore hits against the back side of a surface.
    IgnoreBackFaces,
    /// Report hits against the back side of a surface too.
    CollideWithBackFaces,
}

/// Whether a collision query gathers the colliding faces besides the
/// contact points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectFacesMode {
    /// Gather the supporting faces of both shapes.
    CollectFaces,
    /// Contact points only.
    NoFaces,
}

/// Objects closer than this distance are considered colliding by GJK.
pub const DEFAULT_COLLISION_TOLERANCE: Real = 1.0e-4;

/// Default accuracy factor of the EPA penetration depth, see
/// [`CollideShapeSettings::penetration_tolerance`].
pub const DEFAULT_PENETRATION_TOLERANCE: Real = 1.0e-4;

/// Default radius shapes round their corners with.
pub const DEFAULT_CONVEX_RADIUS: Real = 0.05;
