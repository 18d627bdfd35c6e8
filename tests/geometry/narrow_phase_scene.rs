use approx::assert_relative_eq;
use riposte3d::body::{Body, BodyFilter, BodyId, BodyLockInterface, DefaultBodyFilter};
use riposte3d::bounding_volume::Aabb;
use riposte3d::broad_phase::{
    AaBoxCast, BroadPhaseCastResult, BroadPhaseLayer, BroadPhaseLayerFilter, BroadPhaseQuery,
    CollisionLayer, CollisionLayerFilter, DefaultBroadPhaseLayerFilter,
    DefaultCollisionLayerFilter,
};
use riposte3d::collision::{
    AllHitCollector, AnyHitCollector, ClosestHitCollector, CollisionCollector, DefaultShapeFilter,
    NarrowPhaseQuery, RayCast, RayCastResult, ShapeCast, ShapeCastResult, ShapeCastSettings,
    TransformedShape,
};
use riposte3d::math::{Isometry, Point, Rotation, Vector};
use riposte3d::shape::{
    BoxShapeSettings, ShapeRef, SphereShapeSettings, StaticCompound, StaticCompoundShapeSettings,
};
use std::sync::RwLock;

/// An in-test body store with read locks per body.
struct TestBodyStore {
    bodies: Vec<RwLock<Body>>,
}

impl BodyLockInterface for TestBodyStore {
    fn with_body_read(&self, body_id: BodyId, f: &mut dyn FnMut(&Body)) -> bool {
        match self.bodies.get(body_id.0 as usize) {
            Some(slot) => {
                let body = slot.read().unwrap();
                f(&body);
                true
            }
            None => false,
        }
    }
}

/// A linear-scan broad phase over a fixed list of body bounds.
struct TestBroadPhase {
    entries: Vec<(BodyId, Aabb)>,
}

impl BroadPhaseQuery for TestBroadPhase {
    fn cast_ray(
        &self,
        ray: &RayCast,
        collector: &mut dyn CollisionCollector<BroadPhaseCastResult>,
        broad_phase_layer_filter: &dyn BroadPhaseLayerFilter,
        collision_layer_filter: &dyn CollisionLayerFilter,
    ) {
        for (body_id, bounds) in &self.entries {
            if collector.should_early_out() {
                break;
            }
            if !broad_phase_layer_filter.should_collide(BroadPhaseLayer(0))
                || !collision_layer_filter.should_collide(CollisionLayer(0))
            {
                continue;
            }
            if let Some(fraction) =
                bounds.cast_local_ray(&ray.origin, &ray.direction, collector.early_out_fraction())
            {
                collector.add_hit(BroadPhaseCastResult {
                    body_id: *body_id,
                    fraction,
                });
            }
        }
    }

    fn cast_aabox(
        &self,
        box_cast: &AaBoxCast,
        collector: &mut dyn CollisionCollector<BroadPhaseCastResult>,
        broad_phase_layer_filter: &dyn BroadPhaseLayerFilter,
        collision_layer_filter: &dyn CollisionLayerFilter,
    ) {
        let mut swept = box_cast.bounds;
        let mut shifted = swept;
        shifted.mins += box_cast.direction;
        shifted.maxs += box_cast.direction;
        swept = swept.merged(&shifted);

        for (body_id, bounds) in &self.entries {
            if collector.should_early_out() {
                break;
            }
            if !broad_phase_layer_filter.should_collide(BroadPhaseLayer(0))
                || !collision_layer_filter.should_collide(CollisionLayer(0))
            {
                continue;
            }
            if bounds.intersects(&swept) {
                collector.add_hit(BroadPhaseCastResult {
                    body_id: *body_id,
                    fraction: 0.0,
                });
            }
        }
    }

    fn collide_aabox(
        &self,
        query: &Aabb,
        collector: &mut dyn CollisionCollector<BodyId>,
        broad_phase_layer_filter: &dyn BroadPhaseLayerFilter,
        collision_layer_filter: &dyn CollisionLayerFilter,
    ) {
        for (body_id, bounds) in &self.entries {
            if collector.should_early_out() {
                break;
            }
            if !broad_phase_layer_filter.should_collide(BroadPhaseLayer(0))
                || !collision_layer_filter.should_collide(CollisionLayer(0))
            {
                continue;
            }
            if bounds.intersects(query) {
                collector.add_hit(*body_id);
            }
        }
    }

    fn collide_sphere(
        &self,
        center: &Point,
        radius: f32,
        collector: &mut dyn CollisionCollector<BodyId>,
        broad_phase_layer_filter: &dyn BroadPhaseLayerFilter,
        collision_layer_filter: &dyn CollisionLayerFilter,
    ) {
        let query = Aabb::new(
            center - Vector::repeat(radius),
            center + Vector::repeat(radius),
        );
        self.collide_aabox(
            &query,
            collector,
            broad_phase_layer_filter,
            collision_layer_filter,
        );
    }

    fn collide_point(
        &self,
        point: &Point,
        collector: &mut dyn CollisionCollector<BodyId>,
        broad_phase_layer_filter: &dyn BroadPhaseLayerFilter,
        collision_layer_filter: &dyn CollisionLayerFilter,
    ) {
        for (body_id, bounds) in &self.entries {
            if collector.should_early_out() {
                break;
            }
            if !broad_phase_layer_filter.should_collide(BroadPhaseLayer(0))
                || !collision_layer_filter.should_collide(CollisionLayer(0))
            {
                continue;
            }
            if bounds.contains_local_point(point) {
                collector.add_hit(*body_id);
            }
        }
    }

    fn collide_oriented_box(
        &self,
        local_bounds: &Aabb,
        transform: &Isometry,
        collector: &mut dyn CollisionCollector<BodyId>,
        broad_phase_layer_filter: &dyn BroadPhaseLayerFilter,
        collision_layer_filter: &dyn CollisionLayerFilter,
    ) {
        self.collide_aabox(
            &local_bounds.transform_by(transform),
            collector,
            broad_phase_layer_filter,
            collision_layer_filter,
        );
    }
}

/// Spheres of radius 1 at x = 0 and x = 5, and a unit box at x = 10.
fn test_scene() -> (TestBodyStore, TestBroadPhase) {
    let shapes: Vec<(ShapeRef, Point)> = vec![
        (
            SphereShapeSettings::new(1.0).build().unwrap(),
            Point::origin(),
        ),
        (
            SphereShapeSettings::new(1.0).build().unwrap(),
            Point::new(5.0, 0.0, 0.0),
        ),
        (
            BoxShapeSettings::new(Vector::repeat(1.0), 0.0)
                .build()
                .unwrap(),
            Point::new(10.0, 0.0, 0.0),
        ),
    ];

    let mut bodies = Vec::new();
    let mut entries = Vec::new();
    for (index, (shape, position)) in shapes.into_iter().enumerate() {
        let id = BodyId(index as u32);
        let body = Body::new(id, position, Rotation::identity(), shape, CollisionLayer(0));
        entries.push((id, body.transformed_shape().world_bounds()));
        bodies.push(RwLock::new(body));
    }

    (TestBodyStore { bodies }, TestBroadPhase { entries })
}

struct SkipBody(BodyId);

impl BodyFilter for SkipBody {
    fn should_collide(&self, body_id: BodyId) -> bool {
        body_id != self.0
    }
}

#[test]
fn single_hit_ray_finds_the_closest_body() {
    let (store, broad_phase) = test_scene();
    let query = NarrowPhaseQuery::new(&store, &broad_phase);

    let ray = RayCast::new(Point::new(-5.0, 0.0, 0.0), Vector::new(20.0, 0.0, 0.0));
    let mut hit = RayCastResult::default();
    assert!(query.cast_ray(
        &ray,
        &mut hit,
        &DefaultBroadPhaseLayerFilter,
        &DefaultCollisionLayerFilter,
        &DefaultBodyFilter,
    ));
    assert_eq!(hit.body_id, BodyId(0));
    // Surface of the first sphere at x = -1, 4 units into a 20 unit ray.
    assert_relative_eq!(hit.fraction, 0.2, epsilon = 1.0e-4);
}

#[test]
fn body_filter_skips_candidates_before_locking() {
    let (store, broad_phase) = test_scene();
    let query = NarrowPhaseQuery::new(&store, &broad_phase);

    let ray = RayCast::new(Point::new(-5.0, 0.0, 0.0), Vector::new(20.0, 0.0, 0.0));
    let mut hit = RayCastResult::default();
    assert!(query.cast_ray(
        &ray,
        &mut hit,
        &DefaultBroadPhaseLayerFilter,
        &DefaultCollisionLayerFilter,
        &SkipBody(BodyId(0)),
    ));
    assert_eq!(hit.body_id, BodyId(1));
    // Surface of the second sphere at x = 4, 9 units into the ray.
    assert_relative_eq!(hit.fraction, 0.45, epsilon = 1.0e-4);
}

#[test]
fn multi_hit_ray_reports_every_body_along_the_ray() {
    let (store, broad_phase) = test_scene();
    let query = NarrowPhaseQuery::new(&store, &broad_phase);

    let ray = RayCast::new(Point::new(-5.0, 0.0, 0.0), Vector::new(20.0, 0.0, 0.0));
    let mut collector = AllHitCollector::new();
    query.cast_ray_with_collector(
        &ray,
        &riposte3d::collision::RayCastSettings::default(),
        &mut collector,
        &DefaultBroadPhaseLayerFilter,
        &DefaultCollisionLayerFilter,
        &DefaultBodyFilter,
        &DefaultShapeFilter,
    );
    collector.sort();

    let hits: Vec<(BodyId, f32)> = collector.hits.iter().map(|h| (h.body_id, h.fraction)).collect();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].0, BodyId(0));
    assert_eq!(hits[1].0, BodyId(1));
    assert_eq!(hits[2].0, BodyId(2));
    assert_relative_eq!(hits[0].1, 0.2, epsilon = 1.0e-4);
    assert_relative_eq!(hits[1].1, 0.45, epsilon = 1.0e-4);
    // Box surface at x = 9, 14 units into the ray.
    assert_relative_eq!(hits[2].1, 0.7, epsilon = 1.0e-4);
}

#[test]
fn bodies_removed_from_the_broad_phase_are_skipped() {
    let (store, broad_phase) = test_scene();

    // Simulate the race: the broad phase still lists body 1, but it has
    // been removed by the time the narrow phase locks it.
    store.bodies[1].write().unwrap().set_in_broad_phase(false);

    let query = NarrowPhaseQuery::new(&store, &broad_phase);
    let ray = RayCast::new(Point::new(-5.0, 0.0, 0.0), Vector::new(20.0, 0.0, 0.0));
    let mut collector = AllHitCollector::new();
    query.cast_ray_with_collector(
        &ray,
        &riposte3d::collision::RayCastSettings::default(),
        &mut collector,
        &DefaultBroadPhaseLayerFilter,
        &DefaultCollisionLayerFilter,
        &DefaultBodyFilter,
        &DefaultShapeFilter,
    );

    let ids: Vec<BodyId> = collector.hits.iter().map(|h| h.body_id).collect();
    assert_eq!(ids, vec![BodyId(0), BodyId(2)]);
}

#[test]
fn collide_point_finds_the_containing_body() {
    let (store, broad_phase) = test_scene();
    let query = NarrowPhaseQuery::new(&store, &broad_phase);

    let mut collector = AllHitCollector::new();
    query.collide_point(
        &Point::new(5.5, 0.0, 0.0),
        &mut collector,
        &DefaultBroadPhaseLayerFilter,
        &DefaultCollisionLayerFilter,
        &DefaultBodyFilter,
        &DefaultShapeFilter,
    );

    assert_eq!(collector.hits.len(), 1);
    assert_eq!(collector.hits[0].body_id, BodyId(1));
}

#[test]
fn cast_shape_sweeps_into_the_first_body() {
    let (store, broad_phase) = test_scene();
    let query = NarrowPhaseQuery::new(&store, &broad_phase);

    let sphere = SphereShapeSettings::new(0.5).build().unwrap();
    let shape_cast = ShapeCast::new(
        sphere,
        Vector::repeat(1.0),
        Isometry::translation(-5.0, 0.0, 0.0),
        Vector::new(10.0, 0.0, 0.0),
    );

    let mut collector = ClosestHitCollector::<ShapeCastResult>::new();
    query.cast_shape(
        &shape_cast,
        &ShapeCastSettings::default(),
        &Vector::zeros(),
        &mut collector,
        &DefaultBroadPhaseLayerFilter,
        &DefaultCollisionLayerFilter,
        &DefaultBodyFilter,
        &DefaultShapeFilter,
    );

    let hit = collector.hit.expect("expected a hit");
    // Touch when the centers are 1.5 apart: 3.5 units of a 10 unit sweep.
    assert_relative_eq!(hit.fraction, 0.35, epsilon = 1.0e-3);
    assert_eq!(hit.contact.body_id2, BodyId(0));
}

#[test]
fn any_hit_ray_stops_at_the_first_body() {
    let (store, broad_phase) = test_scene();
    let query = NarrowPhaseQuery::new(&store, &broad_phase);

    let ray = RayCast::new(Point::new(-5.0, 0.0, 0.0), Vector::new(20.0, 0.0, 0.0));
    let mut collector = AnyHitCollector::new();
    query.cast_ray_with_collector(
        &ray,
        &riposte3d::collision::RayCastSettings::default(),
        &mut collector,
        &DefaultBroadPhaseLayerFilter,
        &DefaultCollisionLayerFilter,
        &DefaultBodyFilter,
        &DefaultShapeFilter,
    );

    // The collector forced an early out after the first hit; with the
    // bodies in candidate order that is body 0.
    let hit = collector.hit.expect("expected a hit");
    assert_eq!(hit.body_id, BodyId(0));
}

#[test]
fn collect_transformed_shapes_reports_compound_leaves() {
    // A compound of two spheres as a fourth body.
    let mut compound_settings = StaticCompoundShapeSettings::new();
    compound_settings.add_shape(
        Point::new(-2.0, 0.0, 0.0),
        Rotation::identity(),
        SphereShapeSettings::new(1.0).build().unwrap(),
    );
    compound_settings.add_shape(
        Point::new(2.0, 0.0, 0.0),
        Rotation::identity(),
        SphereShapeSettings::new(1.0).build().unwrap(),
    );
    let compound = compound_settings.build().unwrap();

    let (mut store, mut broad_phase) = test_scene();
    let id = BodyId(store.bodies.len() as u32);
    let body = Body::new(
        id,
        Point::new(20.0, 0.0, 0.0),
        Rotation::identity(),
        compound,
        CollisionLayer(0),
    );
    broad_phase
        .entries
        .push((id, body.transformed_shape().world_bounds()));
    store.bodies.push(RwLock::new(body));

    let query = NarrowPhaseQuery::new(&store, &broad_phase);

    // A box around the second child only (child center at x = 22).
    let bounds = Aabb::new(Point::new(21.5, -0.5, -0.5), Point::new(22.5, 0.5, 0.5));
    let mut collector = AllHitCollector::<TransformedShape>::new();
    query.collect_transformed_shapes(
        &bounds,
        &mut collector,
        &DefaultBroadPhaseLayerFilter,
        &DefaultCollisionLayerFilter,
        &DefaultBodyFilter,
        &DefaultShapeFilter,
    );

    assert_eq!(collector.hits.len(), 1);
    let leaf = &collector.hits[0];
    assert_eq!(leaf.body_id, id);
    assert_relative_eq!(leaf.position, Point::new(22.0, 0.0, 0.0));
    assert!(leaf.shape.downcast_ref::<StaticCompound>().is_none());
    assert_eq!(leaf.sub_shape_id_creator.num_bits_written(), 1);
}
