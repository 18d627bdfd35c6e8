//! The broad-phase query interface consumed by the narrow phase.
//!
//! The spatial index itself lives outside this crate; narrow-phase queries
//! only need a stream of body-level candidates for a ray, box, sphere or
//! point, filtered by layer.

use crate::body::BodyId;
use crate::bounding_volume::Aabb;
use crate::collision::{CollectResult, CollisionCollector, RayCast};
use crate::math::{Point, Real, Vector};

/// Layer a body is put in for broad-phase bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BroadPhaseLayer(pub u8);

/// Layer a body is put in for collision filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollisionLayer(pub u16);

/// Filter on broad-phase layers.
pub trait BroadPhaseLayerFilter {
    /// Whether candidates in `layer` should be reported.
    fn should_collide(&self, _layer: BroadPhaseLayer) -> bool {
        true
    }
}

/// A broad-phase layer filter that lets everything through.
pub struct DefaultBroadPhaseLayerFilter;

impl BroadPhaseLayerFilter for DefaultBroadPhaseLayerFilter {}

/// Filter on collision layers.
pub trait CollisionLayerFilter {
    /// Whether candidates in `layer` should be reported.
    fn should_collide(&self, _layer: CollisionLayer) -> bool {
        true
    }
}

/// A collision layer filter that lets everything through.
pub struct DefaultCollisionLayerFilter;

impl CollisionLayerFilter for DefaultCollisionLayerFilter {}

/// A broad-phase ray hit: the body whose bounds were hit and the fraction
/// along the ray where that happened.
#[derive(Debug, Clone, Copy)]
pub struct BroadPhaseCastResult {
    /// The body whose bounding volume was hit.
    pub body_id: BodyId,
    /// Fraction along the cast at which the bounding volume was entered.
    pub fraction: Real,
}

impl CollectResult for BroadPhaseCastResult {
    const INITIAL_EARLY_OUT_FRACTION: Real = 1.0 + Real::EPSILON;
    const SHOULD_EARLY_OUT_FRACTION: Real = 0.0;

    fn early_out_fraction(&self) -> Real {
        self.fraction
    }
}

/// An axis-aligned box swept along a direction.
#[derive(Debug, Clone, Copy)]
pub struct AaBoxCast {
    /// Bounds at the start of the sweep.
    pub bounds: Aabb,
    /// Direction and length of the sweep.
    pub direction: Vector,
}

/// Candidate stream of a broad phase: every query reports body identifiers
/// only, narrow-phase detail is up to the caller.
pub trait BroadPhaseQuery: Send + Sync {
    /// Casts a ray, reporting each body whose bounds it hits.
    fn cast_ray(
        &self,
        ray: &RayCast,
        collector: &mut dyn CollisionCollector<BroadPhaseCastResult>,
        broad_phase_layer_filter: &dyn BroadPhaseLayerFilter,
        collision_layer_filter: &dyn CollisionLayerFilter,
    );

    /// Sweeps a box, reporting each body whose bounds it touches.
    fn cast_aabox(
        &self,
        box_cast: &AaBoxCast,
        collector: &mut dyn CollisionCollector<BroadPhaseCastResult>,
        broad_phase_layer_filter: &dyn BroadPhaseLayerFilter,
        collision_layer_filter: &dyn CollisionLayerFilter,
    );

    /// Reports each body whose bounds overlap `bounds`.
    fn collide_aabox(
        &self,
        bounds: &Aabb,
        collector: &mut dyn CollisionCollector<BodyId>,
        broad_phase_layer_filter: &dyn BroadPhaseLayerFilter,
        collision_layer_filter: &dyn CollisionLayerFilter,
    );

    /// Reports each body whose bounds overlap the sphere.
    fn collide_sphere(
        &self,
        center: &Point,
        radius: Real,
        collector: &mut dyn CollisionCollector<BodyId>,
        broad_phase_layer_filter: &dyn BroadPhaseLayerFilter,
        collision_layer_filter: &dyn CollisionLayerFilter,
    );

    /// Reports each body whose bounds contain `point`.
    fn collide_point(
        &self,
        point: &Point,
        collector: &mut dyn CollisionCollector<BodyId>,
        broad_phase_layer_filter: &dyn BroadPhaseLayerFilter,
        collision_layer_filter: &dyn CollisionLayerFilter,
    );

    /// Reports each body whose bounds overlap an oriented box, given as the
    /// box's local bounds and its world transform.
    fn collide_oriented_box(
        &self,
        local_bounds: &Aabb,
        transform: &crate::math::Isometry,
        collector: &mut dyn CollisionCollector<BodyId>,
        broad_phase_layer_filter: &dyn BroadPhaseLayerFilter,
        collision_layer_filter: &dyn CollisionLayerFilter,
    );
}
