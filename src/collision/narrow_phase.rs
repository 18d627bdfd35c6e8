//! Scene-level queries: broad-phase candidates refined into exact hits.
//!
//! Every query follows the same sequence per broad-phase candidate: body
//! filter, scoped read lock, re-check that the body is still in the broad
//! phase (it may have been removed since the broad-phase pass saw it),
//! locked body filter, snapshot into a [`TransformedShape`], release the
//! lock, run the narrow-phase test on the snapshot, and propagate the
//! caller collector's tightened early-out fraction back into the broad
//! phase so later candidates can be skipped.

use crate::body::{Body, BodyFilter, BodyId, BodyLockInterface};
use crate::bounding_volume::Aabb;
use crate::broad_phase::{
    AaBoxCast, BroadPhaseCastResult, BroadPhaseLayerFilter, BroadPhaseQuery, CollisionLayerFilter,
};
use crate::collision::collector::{CollectResult, CollectorState, CollisionCollector};
use crate::collision::{
    CollidePointResult, CollideShapeResult, CollideShapeSettings, RayCast, RayCastResult,
    RayCastSettings, ShapeCast, ShapeCastResult, ShapeCastSettings, ShapeFilter, TransformedShape,
};
use crate::math::{Isometry, Point, Vector};
use crate::shape::Shape;

/// Exact collision queries against a whole scene: a broad-phase candidate
/// stream combined with body locking, shape extraction and narrow-phase
/// dispatch.
pub struct NarrowPhaseQuery<'a> {
    body_lock_interface: &'a dyn BodyLockInterface,
    broad_phase: &'a dyn BroadPhaseQuery,
}

/// Runs the lock-snapshot-unlock sequence for one broad-phase candidate:
/// body filter, scoped read lock, liveness re-check, locked filter,
/// [`CollisionCollector::on_body`], snapshot. Returns the lock-independent
/// snapshot, or `None` when the candidate was rejected. The lock is released
/// when this returns, on every path.
fn snapshot_body<R: CollectResult>(
    body_lock_interface: &dyn BodyLockInterface,
    body_id: BodyId,
    body_filter: &dyn BodyFilter,
    collector: &mut dyn CollisionCollector<R>,
) -> Option<TransformedShape> {
    if !body_filter.should_collide(body_id) {
        return None;
    }

    let mut snapshot = None;
    body_lock_interface.with_body_read(body_id, &mut |body: &Body| {
        // Race condition: the body may have been removed since the broad
        // phase reported it; only proceed while it is verifiably live.
        if body.is_in_broad_phase() && body_filter.should_collide_locked(body) {
            collector.on_body(body);
            snapshot = Some(body.transformed_shape());
        }
    });
    snapshot
}

impl<'a> NarrowPhaseQuery<'a> {
    /// Creates the query interface over a body store and a broad phase.
    pub fn new(
        body_lock_interface: &'a dyn BodyLockInterface,
        broad_phase: &'a dyn BroadPhaseQuery,
    ) -> NarrowPhaseQuery<'a> {
        NarrowPhaseQuery {
            body_lock_interface,
            broad_phase,
        }
    }

    /// Casts a ray and finds the closest hit. Returns true if a hit closer
    /// than `hit.fraction` was found (`hit` is untouched otherwise). Convex
    /// shapes are treated as solid: a ray starting inside hits at fraction
    /// 0.
    pub fn cast_ray(
        &self,
        ray: &RayCast,
        hit: &mut RayCastResult,
        broad_phase_layer_filter: &dyn BroadPhaseLayerFilter,
        collision_layer_filter: &dyn CollisionLayerFilter,
        body_filter: &dyn BodyFilter,
    ) -> bool {
        struct Adapter<'c> {
            state: CollectorState,
            ray: &'c RayCast,
            hit: &'c mut RayCastResult,
            body_lock_interface: &'c dyn BodyLockInterface,
            body_filter: &'c dyn BodyFilter,
        }

        impl CollisionCollector<BroadPhaseCastResult> for Adapter<'_> {
            fn state(&self) -> &CollectorState {
                &self.state
            }

            fn state_mut(&mut self) -> &mut CollectorState {
                &mut self.state
            }

            fn add_hit(&mut self, result: BroadPhaseCastResult) {
                if !self.body_filter.should_collide(result.body_id) {
                    return;
                }

                let body_filter = self.body_filter;
                let mut snapshot = None;
                self.body_lock_interface
                    .with_body_read(result.body_id, &mut |body: &Body| {
                        if body.is_in_broad_phase() && body_filter.should_collide_locked(body) {
                            snapshot = Some(body.transformed_shape());
                        }
                    });

                if let Some(ts) = snapshot {
                    // The narrow phase updates `hit` in place only when it
                    // finds a closer hit.
                    if ts.cast_ray(self.ray, self.hit) {
                        debug_assert!(self.hit.fraction <= self.early_out_fraction());
                        self.update_early_out_fraction(self.hit.fraction);
                    }
                }
            }
        }

        let mut adapter = Adapter {
            state: CollectorState::new::<BroadPhaseCastResult>(),
            ray,
            hit,
            body_lock_interface: self.body_lock_interface,
            body_filter,
        };
        adapter.reset_early_out_fraction(adapter.hit.fraction);

        self.broad_phase.cast_ray(
            ray,
            &mut adapter,
            broad_phase_layer_filter,
            collision_layer_filter,
        );
        hit.fraction <= 1.0
    }

    /// Casts a ray, feeding every hit to `collector`. More flexible but
    /// slightly slower than [`Self::cast_ray`].
    pub fn cast_ray_with_collector(
        &self,
        ray: &RayCast,
        settings: &RayCastSettings,
        collector: &mut dyn CollisionCollector<RayCastResult>,
        broad_phase_layer_filter: &dyn BroadPhaseLayerFilter,
        collision_layer_filter: &dyn CollisionLayerFilter,
        body_filter: &dyn BodyFilter,
        shape_filter: &dyn ShapeFilter,
    ) {
        struct Adapter<'c> {
            state: CollectorState,
            ray: &'c RayCast,
            settings: &'c RayCastSettings,
            collector: &'c mut dyn CollisionCollector<RayCastResult>,
            body_lock_interface: &'c dyn BodyLockInterface,
            body_filter: &'c dyn BodyFilter,
            shape_filter: &'c dyn ShapeFilter,
        }

        impl CollisionCollector<BroadPhaseCastResult> for Adapter<'_> {
            fn state(&self) -> &CollectorState {
                &self.state
            }

            fn state_mut(&mut self) -> &mut CollectorState {
                &mut self.state
            }

            fn add_hit(&mut self, result: BroadPhaseCastResult) {
                if let Some(ts) = snapshot_body(
                    self.body_lock_interface,
                    result.body_id,
                    self.body_filter,
                    self.collector,
                ) {
                    ts.cast_ray_with_collector(
                        self.ray,
                        self.settings,
                        self.collector,
                        self.shape_filter,
                    );

                    // Runs before the early-out fraction is read back, so
                    // the collector can still modify it.
                    self.collector.on_body_end();

                    let fraction = self.collector.early_out_fraction();
                    if fraction < self.early_out_fraction() {
                        self.update_early_out_fraction(fraction);
                    }
                }
            }
        }

        let mut adapter = Adapter {
            state: CollectorState::new::<BroadPhaseCastResult>(),
            ray,
            settings,
            collector,
            body_lock_interface: self.body_lock_interface,
            body_filter,
            shape_filter,
        };

        self.broad_phase.cast_ray(
            ray,
            &mut adapter,
            broad_phase_layer_filter,
            collision_layer_filter,
        );
    }

    /// Tests if a point is inside any shape, treating all shapes as solid.
    /// Each containing leaf reports one hit.
    pub fn collide_point(
        &self,
        point: &Point,
        collector: &mut dyn CollisionCollector<CollidePointResult>,
        broad_phase_layer_filter: &dyn BroadPhaseLayerFilter,
        collision_layer_filter: &dyn CollisionLayerFilter,
        body_filter: &dyn BodyFilter,
        shape_filter: &dyn ShapeFilter,
    ) {
        struct Adapter<'c> {
            state: CollectorState,
            point: &'c Point,
            collector: &'c mut dyn CollisionCollector<CollidePointResult>,
            body_lock_interface: &'c dyn BodyLockInterface,
            body_filter: &'c dyn BodyFilter,
            shape_filter: &'c dyn ShapeFilter,
        }

        impl CollisionCollector<BodyId> for Adapter<'_> {
            fn state(&self) -> &CollectorState {
                &self.state
            }

            fn state_mut(&mut self) -> &mut CollectorState {
                &mut self.state
            }

            fn add_hit(&mut self, body_id: BodyId) {
                if let Some(ts) = snapshot_body(
                    self.body_lock_interface,
                    body_id,
                    self.body_filter,
                    self.collector,
                ) {
                    ts.collide_point(self.point, self.collector, self.shape_filter);
                    self.collector.on_body_end();

                    let fraction = self.collector.early_out_fraction();
                    if fraction < self.early_out_fraction() {
                        self.update_early_out_fraction(fraction);
                    }
                }
            }
        }

        let mut adapter = Adapter {
            state: CollectorState::new::<BodyId>(),
            point,
            collector,
            body_lock_interface: self.body_lock_interface,
            body_filter,
            shape_filter,
        };

        self.broad_phase.collide_point(
            point,
            &mut adapter,
            broad_phase_layer_filter,
            collision_layer_filter,
        );
    }

    /// Collides `shape` against the scene. All hit results are relative to
    /// `base_offset`; pass a position near the query to keep results
    /// numerically stable far from the origin.
    pub fn collide_shape(
        &self,
        shape: &dyn Shape,
        shape_scale: &Vector,
        center_of_mass_transform: &Isometry,
        settings: &CollideShapeSettings,
        base_offset: &Vector,
        collector: &mut dyn CollisionCollector<CollideShapeResult>,
        broad_phase_layer_filter: &dyn BroadPhaseLayerFilter,
        collision_layer_filter: &dyn CollisionLayerFilter,
        body_filter: &dyn BodyFilter,
        shape_filter: &dyn ShapeFilter,
    ) {
        struct Adapter<'c> {
            state: CollectorState,
            shape: &'c dyn Shape,
            shape_scale: &'c Vector,
            center_of_mass_transform: &'c Isometry,
            settings: &'c CollideShapeSettings,
            base_offset: &'c Vector,
            collector: &'c mut dyn CollisionCollector<CollideShapeResult>,
            body_lock_interface: &'c dyn BodyLockInterface,
            body_filter: &'c dyn BodyFilter,
            shape_filter: &'c dyn ShapeFilter,
        }

        impl CollisionCollector<BodyId> for Adapter<'_> {
            fn state(&self) -> &CollectorState {
                &self.state
            }

            fn state_mut(&mut self) -> &mut CollectorState {
                &mut self.state
            }

            fn add_hit(&mut self, body_id: BodyId) {
                if let Some(ts) = snapshot_body(
                    self.body_lock_interface,
                    body_id,
                    self.body_filter,
                    self.collector,
                ) {
                    ts.collide_shape(
                        self.shape,
                        self.shape_scale,
                        self.center_of_mass_transform,
                        self.settings,
                        self.base_offset,
                        self.collector,
                        self.shape_filter,
                    );
                    self.collector.on_body_end();

                    let fraction = self.collector.early_out_fraction();
                    if fraction < self.early_out_fraction() {
                        self.update_early_out_fraction(fraction);
                    }
                }
            }
        }

        // Broad-phase candidates come from the query shape's world bounds
        // inflated by the separation distance.
        let mut bounds = shape.world_bounds(center_of_mass_transform, shape_scale);
        bounds.expand_by(settings.max_separation_distance);

        let mut adapter = Adapter {
            state: CollectorState::new::<BodyId>(),
            shape,
            shape_scale,
            center_of_mass_transform,
            settings,
            base_offset,
            collector,
            body_lock_interface: self.body_lock_interface,
            body_filter,
            shape_filter,
        };

        self.broad_phase.collide_aabox(
            &bounds,
            &mut adapter,
            broad_phase_layer_filter,
            collision_layer_filter,
        );
    }

    /// Sweeps a shape through the scene, feeding every hit to `collector`.
    /// All hit results are relative to `base_offset`, see
    /// [`Self::collide_shape`].
    pub fn cast_shape(
        &self,
        shape_cast: &ShapeCast,
        settings: &ShapeCastSettings,
        base_offset: &Vector,
        collector: &mut dyn CollisionCollector<ShapeCastResult>,
        broad_phase_layer_filter: &dyn BroadPhaseLayerFilter,
        collision_layer_filter: &dyn CollisionLayerFilter,
        body_filter: &dyn BodyFilter,
        shape_filter: &dyn ShapeFilter,
    ) {
        struct Adapter<'c> {
            state: CollectorState,
            shape_cast: &'c ShapeCast,
            settings: &'c ShapeCastSettings,
            base_offset: &'c Vector,
            collector: &'c mut dyn CollisionCollector<ShapeCastResult>,
            body_lock_interface: &'c dyn BodyLockInterface,
            body_filter: &'c dyn BodyFilter,
            shape_filter: &'c dyn ShapeFilter,
        }

        impl CollisionCollector<BroadPhaseCastResult> for Adapter<'_> {
            fn state(&self) -> &CollectorState {
                &self.state
            }

            fn state_mut(&mut self) -> &mut CollectorState {
                &mut self.state
            }

            fn add_hit(&mut self, result: BroadPhaseCastResult) {
                if let Some(ts) = snapshot_body(
                    self.body_lock_interface,
                    result.body_id,
                    self.body_filter,
                    self.collector,
                ) {
                    ts.cast_shape(
                        self.shape_cast,
                        self.settings,
                        self.base_offset,
                        self.collector,
                        self.shape_filter,
                    );
                    self.collector.on_body_end();

                    let fraction = self.collector.early_out_fraction();
                    if fraction < self.early_out_fraction() {
                        self.update_early_out_fraction(fraction);
                    }
                }
            }
        }

        let mut adapter = Adapter {
            state: CollectorState::new::<BroadPhaseCastResult>(),
            shape_cast,
            settings,
            base_offset,
            collector,
            body_lock_interface: self.body_lock_interface,
            body_filter,
            shape_filter,
        };

        self.broad_phase.cast_aabox(
            &AaBoxCast {
                bounds: shape_cast.shape_world_bounds,
                direction: shape_cast.direction,
            },
            &mut adapter,
            broad_phase_layer_filter,
            collision_layer_filter,
        );
    }

    /// Collects a [`TransformedShape`] snapshot for every leaf shape whose
    /// world bounds touch `bounds`.
    pub fn collect_transformed_shapes(
        &self,
        bounds: &Aabb,
        collector: &mut dyn CollisionCollector<TransformedShape>,
        broad_phase_layer_filter: &dyn BroadPhaseLayerFilter,
        collision_layer_filter: &dyn CollisionLayerFilter,
        body_filter: &dyn BodyFilter,
        shape_filter: &dyn ShapeFilter,
    ) {
        struct Adapter<'c> {
            state: CollectorState,
            bounds: &'c Aabb,
            collector: &'c mut dyn CollisionCollector<TransformedShape>,
            body_lock_interface: &'c dyn BodyLockInterface,
            body_filter: &'c dyn BodyFilter,
            shape_filter: &'c dyn ShapeFilter,
        }

        impl CollisionCollector<BodyId> for Adapter<'_> {
            fn state(&self) -> &CollectorState {
                &self.state
            }

            fn state_mut(&mut self) -> &mut CollectorState {
                &mut self.state
            }

            fn add_hit(&mut self, body_id: BodyId) {
                if let Some(ts) = snapshot_body(
                    self.body_lock_interface,
                    body_id,
                    self.body_filter,
                    self.collector,
                ) {
                    ts.collect_transformed_shapes(self.bounds, self.collector, self.shape_filter);
                    self.collector.on_body_end();

                    let fraction = self.collector.early_out_fraction();
                    if fraction < self.early_out_fraction() {
                        self.update_early_out_fraction(fraction);
                    }
                }
            }
        }

        let mut adapter = Adapter {
            state: CollectorState::new::<BodyId>(),
            bounds,
            collector,
            body_lock_interface: self.body_lock_interface,
            body_filter,
            shape_filter,
        };

        self.broad_phase.collide_aabox(
            bounds,
            &mut adapter,
            broad_phase_layer_filter,
            collision_layer_filter,
        );
    }
}
