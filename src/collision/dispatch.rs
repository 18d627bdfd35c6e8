//! The shape-pair dispatch table.
//!
//! A square table of function pointers keyed by the subtypes of the two
//! shapes routes every collide/cast query to the right implementation. The
//! table is built once before the first query and treated as immutable
//! afterwards; use [`CollisionDispatch::new_unregistered`] plus the
//! `register_*` functions to assemble a custom table before handing it out.

use crate::collision::collector::{CollectorState, CollisionCollector};
use crate::collision::filters::{ReversedShapeFilter, ShapeFilter};
use crate::collision::{
    CollideShapeResult, CollideShapeSettings, ShapeCast, ShapeCastResult, ShapeCastSettings,
};
use crate::math::{Isometry, Vector};
use crate::shape::compound::{cast_shape_vs_compound, collide_compound_vs_shape};
use crate::shape::convex_shape::{cast_convex_vs_convex, collide_convex_vs_convex};
use crate::shape::{
    Shape, ShapeRef, ShapeSubType, SubShapeIdCreator, ALL_SUB_SHAPE_TYPES,
    COMPOUND_SUB_SHAPE_TYPES, CONVEX_SUB_SHAPE_TYPES, NUM_SUB_SHAPE_TYPES,
};
use std::sync::OnceLock;

/// Function that collides two shapes, see
/// [`CollisionDispatch::collide_shape_vs_shape`]. The dispatch table is
/// passed back in so implementations (compounds, reversal) can re-dispatch.
pub type CollideShapeFn = fn(
    dispatch: &CollisionDispatch,
    shape1: &dyn Shape,
    shape2: &dyn Shape,
    scale1: &Vector,
    scale2: &Vector,
    center_of_mass_transform1: &Isometry,
    center_of_mass_transform2: &Isometry,
    sub_shape_id_creator1: SubShapeIdCreator,
    sub_shape_id_creator2: SubShapeIdCreator,
    settings: &CollideShapeSettings,
    collector: &mut dyn CollisionCollector<CollideShapeResult>,
    shape_filter: &dyn ShapeFilter,
);

/// Function that casts a shape against another shape, see
/// [`CollisionDispatch::cast_shape_vs_shape_local_space`].
pub type CastShapeFn = fn(
    dispatch: &CollisionDispatch,
    shape_cast: &ShapeCast,
    settings: &ShapeCastSettings,
    shape: &ShapeRef,
    scale: &Vector,
    shape_filter: &dyn ShapeFilter,
    center_of_mass_transform2: &Isometry,
    sub_shape_id_creator1: SubShapeIdCreator,
    sub_shape_id_creator2: SubShapeIdCreator,
    collector: &mut dyn CollisionCollector<ShapeCastResult>,
);

/// Stub for unregistered pairs: a missing registration is a programmer
/// error, not a runtime condition, so it asserts and reports no collision.
fn unregistered_collide_shape(
    _dispatch: &CollisionDispatch,
    shape1: &dyn Shape,
    shape2: &dyn Shape,
    _scale1: &Vector,
    _scale2: &Vector,
    _center_of_mass_transform1: &Isometry,
    _center_of_mass_transform2: &Isometry,
    _sub_shape_id_creator1: SubShapeIdCreator,
    _sub_shape_id_creator2: SubShapeIdCreator,
    _settings: &CollideShapeSettings,
    _collector: &mut dyn CollisionCollector<CollideShapeResult>,
    _shape_filter: &dyn ShapeFilter,
) {
    debug_assert!(
        false,
        "no collide function registered for shape pair ({:?}, {:?})",
        shape1.sub_type(),
        shape2.sub_type()
    );
    let _ = (shape1, shape2);
}

fn unregistered_cast_shape(
    _dispatch: &CollisionDispatch,
    shape_cast: &ShapeCast,
    _settings: &ShapeCastSettings,
    shape: &ShapeRef,
    _scale: &Vector,
    _shape_filter: &dyn ShapeFilter,
    _center_of_mass_transform2: &Isometry,
    _sub_shape_id_creator1: SubShapeIdCreator,
    _sub_shape_id_creator2: SubShapeIdCreator,
    _collector: &mut dyn CollisionCollector<ShapeCastResult>,
) {
    debug_assert!(
        false,
        "no cast function registered for shape pair ({:?}, {:?})",
        shape_cast.shape.sub_type(),
        shape.sub_type()
    );
    let _ = (shape_cast, shape);
}

/// The dispatch table routing collide and cast queries to the
/// implementation registered for the pair of shape subtypes.
pub struct CollisionDispatch {
    collide: [[CollideShapeFn; NUM_SUB_SHAPE_TYPES]; NUM_SUB_SHAPE_TYPES],
    cast: [[CastShapeFn; NUM_SUB_SHAPE_TYPES]; NUM_SUB_SHAPE_TYPES],
}

impl CollisionDispatch {
    /// Creates a table with every pair routed to an asserting stub.
    pub fn new_unregistered() -> CollisionDispatch {
        CollisionDispatch {
            collide: [[unregistered_collide_shape as CollideShapeFn; NUM_SUB_SHAPE_TYPES];
                NUM_SUB_SHAPE_TYPES],
            cast: [[unregistered_cast_shape as CastShapeFn; NUM_SUB_SHAPE_TYPES];
                NUM_SUB_SHAPE_TYPES],
        }
    }

    /// Creates the table with all shape types of this crate registered:
    /// convex pairs go to the GJK/EPA implementation, compounds iterate
    /// their children, and pairs only implemented in one order go through
    /// the reversal adapters.
    pub fn new_default() -> CollisionDispatch {
        let mut dispatch = CollisionDispatch::new_unregistered();

        for &subtype1 in &CONVEX_SUB_SHAPE_TYPES {
            for &subtype2 in &CONVEX_SUB_SHAPE_TYPES {
                dispatch.register_collide(subtype1, subtype2, collide_convex_vs_convex);
                dispatch.register_cast(subtype1, subtype2, cast_convex_vs_convex);
            }
        }

        for &compound in &COMPOUND_SUB_SHAPE_TYPES {
            for &other in &ALL_SUB_SHAPE_TYPES {
                dispatch.register_collide(compound, other, collide_compound_vs_shape);
                dispatch.register_cast(other, compound, cast_shape_vs_compound);
            }
            for &convex in &CONVEX_SUB_SHAPE_TYPES {
                dispatch.register_collide(convex, compound, reversed_collide_shape);
                dispatch.register_cast(compound, convex, reversed_cast_shape);
            }
        }

        dispatch
    }

    /// Registers the collide function for a shape-subtype pair.
    pub fn register_collide(
        &mut self,
        subtype1: ShapeSubType,
        subtype2: ShapeSubType,
        function: CollideShapeFn,
    ) {
        self.collide[subtype1 as usize][subtype2 as usize] = function;
    }

    /// Registers the cast function for a shape-subtype pair.
    pub fn register_cast(
        &mut self,
        subtype1: ShapeSubType,
        subtype2: ShapeSubType,
        function: CastShapeFn,
    ) {
        self.cast[subtype1 as usize][subtype2 as usize] = function;
    }

    /// Collides two shapes, passing every hit to `collector`. The shape
    /// filter is consulted before any geometric work.
    ///
    /// `scale1`/`scale2` scale the shapes in their local space;
    /// `center_of_mass_transform1`/`2` place the centers of mass in world
    /// space.
    pub fn collide_shape_vs_shape(
        &self,
        shape1: &dyn Shape,
        shape2: &dyn Shape,
        scale1: &Vector,
        scale2: &Vector,
        center_of_mass_transform1: &Isometry,
        center_of_mass_transform2: &Isometry,
        sub_shape_id_creator1: SubShapeIdCreator,
        sub_shape_id_creator2: SubShapeIdCreator,
        settings: &CollideShapeSettings,
        collector: &mut dyn CollisionCollector<CollideShapeResult>,
        shape_filter: &dyn ShapeFilter,
    ) {
        if shape_filter.should_collide_pair(
            shape1,
            sub_shape_id_creator1.id(),
            shape2,
            sub_shape_id_creator2.id(),
        ) {
            let function = self.collide[shape1.sub_type() as usize][shape2.sub_type() as usize];
            function(
                self,
                shape1,
                shape2,
                scale1,
                scale2,
                center_of_mass_transform1,
                center_of_mass_transform2,
                sub_shape_id_creator1,
                sub_shape_id_creator2,
                settings,
                collector,
                shape_filter,
            );
        }
    }

    /// Casts a shape against `shape`, with the cast given in the local
    /// space of `shape`'s center of mass. `center_of_mass_transform2`
    /// places that space in the world and is only used to convert the hit
    /// results back.
    pub fn cast_shape_vs_shape_local_space(
        &self,
        shape_cast: &ShapeCast,
        settings: &ShapeCastSettings,
        shape: &ShapeRef,
        scale: &Vector,
        shape_filter: &dyn ShapeFilter,
        center_of_mass_transform2: &Isometry,
        sub_shape_id_creator1: SubShapeIdCreator,
        sub_shape_id_creator2: SubShapeIdCreator,
        collector: &mut dyn CollisionCollector<ShapeCastResult>,
    ) {
        if shape_filter.should_collide_pair(
            shape_cast.shape.as_ref(),
            sub_shape_id_creator1.id(),
            shape.as_ref(),
            sub_shape_id_creator2.id(),
        ) {
            let function =
                self.cast[shape_cast.shape.sub_type() as usize][shape.sub_type() as usize];
            function(
                self,
                shape_cast,
                settings,
                shape,
                scale,
                shape_filter,
                center_of_mass_transform2,
                sub_shape_id_creator1,
                sub_shape_id_creator2,
                collector,
            );
        }
    }

    /// Like [`Self::cast_shape_vs_shape_local_space`], with the cast given
    /// in world space instead.
    pub fn cast_shape_vs_shape_world_space(
        &self,
        shape_cast: &ShapeCast,
        settings: &ShapeCastSettings,
        shape: &ShapeRef,
        scale: &Vector,
        shape_filter: &dyn ShapeFilter,
        center_of_mass_transform2: &Isometry,
        sub_shape_id_creator1: SubShapeIdCreator,
        sub_shape_id_creator2: SubShapeIdCreator,
        collector: &mut dyn CollisionCollector<ShapeCastResult>,
    ) {
        let local_cast = shape_cast.post_transformed(&center_of_mass_transform2.inverse());
        self.cast_shape_vs_shape_local_space(
            &local_cast,
            settings,
            shape,
            scale,
            shape_filter,
            center_of_mass_transform2,
            sub_shape_id_creator1,
            sub_shape_id_creator2,
            collector,
        );
    }
}

/// The process-wide dispatch table with this crate's shapes registered.
/// Built on first use, immutable afterwards.
pub fn dispatch() -> &'static CollisionDispatch {
    static DISPATCH: OnceLock<CollisionDispatch> = OnceLock::new();
    DISPATCH.get_or_init(CollisionDispatch::new_default)
}

/// Collector adapter that reverses every hit before forwarding it, so a
/// query dispatched with the shapes swapped still reports results in the
/// caller's order.
struct ReversedCollideShapeCollector<'a> {
    state: CollectorState,
    inner: &'a mut dyn CollisionCollector<CollideShapeResult>,
}

impl CollisionCollector<CollideShapeResult> for ReversedCollideShapeCollector<'_> {
    fn state(&self) -> &CollectorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CollectorState {
        &mut self.state
    }

    fn add_hit(&mut self, result: CollideShapeResult) {
        self.inner.add_hit(result.reversed());

        // Follow the chained collector's early-out fraction.
        let fraction = self.inner.early_out_fraction();
        if fraction < self.early_out_fraction() {
            self.update_early_out_fraction(fraction);
        }
    }
}

/// A [`CollideShapeFn`] that swaps the two shapes, re-dispatches and
/// reverses the results back. Register it for pairs whose implementation
/// only exists the other way around.
pub fn reversed_collide_shape(
    dispatch: &CollisionDispatch,
    shape1: &dyn Shape,
    shape2: &dyn Shape,
    scale1: &Vector,
    scale2: &Vector,
    center_of_mass_transform1: &Isometry,
    center_of_mass_transform2: &Isometry,
    sub_shape_id_creator1: SubShapeIdCreator,
    sub_shape_id_creator2: SubShapeIdCreator,
    settings: &CollideShapeSettings,
    collector: &mut dyn CollisionCollector<CollideShapeResult>,
    shape_filter: &dyn ShapeFilter,
) {
    let fraction = collector.early_out_fraction();
    let context = collector.context().cloned();
    let mut reversed = ReversedCollideShapeCollector {
        state: CollectorState::new::<CollideShapeResult>(),
        inner: collector,
    };
    reversed.reset_early_out_fraction(fraction);
    reversed.set_context(context);

    let reversed_filter = ReversedShapeFilter::new(shape_filter);
    dispatch.collide_shape_vs_shape(
        shape2,
        shape1,
        scale2,
        scale1,
        center_of_mass_transform2,
        center_of_mass_transform1,
        sub_shape_id_creator2,
        sub_shape_id_creator1,
        settings,
        &mut reversed,
        &reversed_filter,
    );
}

/// See [`ReversedCollideShapeCollector`]; cast results additionally need
/// the world-space cast direction to shift the contact points back into the
/// original cast's frame.
struct ReversedCastShapeCollector<'a> {
    state: CollectorState,
    inner: &'a mut dyn CollisionCollector<ShapeCastResult>,
    world_direction: Vector,
}

impl CollisionCollector<ShapeCastResult> for ReversedCastShapeCollector<'_> {
    fn state(&self) -> &CollectorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CollectorState {
        &mut self.state
    }

    fn add_hit(&mut self, result: ShapeCastResult) {
        self.inner.add_hit(result.reversed(&self.world_direction));

        let fraction = self.inner.early_out_fraction();
        if fraction < self.early_out_fraction() {
            self.update_early_out_fraction(fraction);
        }
    }
}

/// A [`CastShapeFn`] that casts the target shape backwards along the
/// reversed sweep, re-dispatches and reverses the results back. Register it
/// for pairs whose implementation only exists the other way around.
pub fn reversed_cast_shape(
    dispatch: &CollisionDispatch,
    shape_cast: &ShapeCast,
    settings: &ShapeCastSettings,
    shape: &ShapeRef,
    scale: &Vector,
    shape_filter: &dyn ShapeFilter,
    center_of_mass_transform2: &Isometry,
    sub_shape_id_creator1: SubShapeIdCreator,
    sub_shape_id_creator2: SubShapeIdCreator,
    collector: &mut dyn CollisionCollector<ShapeCastResult>,
) {
    // The original cast is local to `shape`; the reversed cast sweeps
    // `shape` backwards through the space of the original cast shape.
    let com_start_inverse = shape_cast.center_of_mass_start.inverse();
    let local_cast = ShapeCast::new(
        shape.clone(),
        *scale,
        com_start_inverse,
        -(com_start_inverse * shape_cast.direction),
    );

    // Center of mass of the original cast shape at the start of the sweep.
    let shape1_com = center_of_mass_transform2 * shape_cast.center_of_mass_start;

    let world_direction = -(center_of_mass_transform2 * shape_cast.direction);

    let fraction = collector.early_out_fraction();
    let context = collector.context().cloned();
    let mut reversed = ReversedCastShapeCollector {
        state: CollectorState::new::<ShapeCastResult>(),
        inner: collector,
        world_direction,
    };
    reversed.reset_early_out_fraction(fraction);
    reversed.set_context(context);

    let reversed_filter = ReversedShapeFilter::new(shape_filter);
    dispatch.cast_shape_vs_shape_local_space(
        &local_cast,
        settings,
        &shape_cast.shape,
        &shape_cast.scale,
        &reversed_filter,
        &shape1_com,
        sub_shape_id_creator2,
        sub_shape_id_creator1,
        &mut reversed,
    );
}
