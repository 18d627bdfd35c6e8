use approx::assert_relative_eq;
use nalgebra as na;
use riposte3d::body::BodyId;
use riposte3d::collision::{
    AllHitCollector, AnyHitCollector, BackFaceMode, DefaultShapeFilter, RayCast, RayCastResult,
    RayCastSettings, TransformedShape,
};
use riposte3d::math::{Point, Rotation, Vector};
use riposte3d::shape::{BoxShapeSettings, CapsuleShapeSettings, ShapeRef, SphereShapeSettings};

#[test]
fn ray_from_above_hits_the_unit_box() {
    let cube = BoxShapeSettings::new(Vector::repeat(1.0), 0.0)
        .build()
        .unwrap();
    let ts = TransformedShape::new(Point::origin(), Rotation::identity(), cube, BodyId(0));

    let ray = RayCast::new(Point::new(0.0, 5.0, 0.0), Vector::new(0.0, -10.0, 0.0));
    let mut hit = RayCastResult::default();
    assert!(ts.cast_ray(&ray, &mut hit));
    assert_relative_eq!(hit.fraction, 0.4, epsilon = 1.0e-5);
}

#[test]
fn back_face_hits_report_the_exit_point() {
    let cube = BoxShapeSettings::new(Vector::repeat(1.0), 0.0)
        .build()
        .unwrap();
    let ts = TransformedShape::new(Point::origin(), Rotation::identity(), cube, BodyId(0));

    let ray = RayCast::new(Point::new(0.0, 5.0, 0.0), Vector::new(0.0, -10.0, 0.0));
    let settings = RayCastSettings {
        back_face_mode_convex: BackFaceMode::CollideWithBackFaces,
        ..RayCastSettings::default()
    };

    let mut collector = AllHitCollector::new();
    ts.cast_ray_with_collector(&ray, &settings, &mut collector, &DefaultShapeFilter);
    collector.sort();

    let fractions: Vec<f32> = collector.hits.iter().map(|h| h.fraction).collect();
    assert_eq!(fractions.len(), 2);
    assert_relative_eq!(fractions[0], 0.4, epsilon = 1.0e-5);
    assert_relative_eq!(fractions[1], 0.6, epsilon = 1.0e-5);
}

#[test]
fn scaled_and_rotated_box_ray_cast() {
    let cube = BoxShapeSettings::new(Vector::new(1.0, 2.0, 1.0), 0.0)
        .build()
        .unwrap();
    let mut ts = TransformedShape::new(
        Point::new(0.0, 1.0, 0.0),
        Rotation::from_axis_angle(&Vector::y_axis(), 0.7),
        cube,
        BodyId(0),
    );
    // Rotation around Y does not change the Y extent; scaling does.
    ts.scale = Vector::new(1.0, 0.5, 1.0);

    // Top face at y = 1 + 2 * 0.5 = 2.
    let ray = RayCast::new(Point::new(0.0, 7.0, 0.0), Vector::new(0.0, -10.0, 0.0));
    let mut hit = RayCastResult::default();
    assert!(ts.cast_ray(&ray, &mut hit));
    assert_relative_eq!(hit.fraction, 0.5, epsilon = 1.0e-4);
}

fn contains(ts: &TransformedShape, point: &Point) -> bool {
    let mut collector = AnyHitCollector::new();
    ts.collide_point(point, &mut collector, &DefaultShapeFilter);
    collector.had_hit()
}

/// Random rays against a rotated shape: every hit must be consistent with
/// the solid point test just before and just after the reported fraction.
fn run_random_ray_grid(name: &str, shape: ShapeRef) {
    let mut rng = oorandom::Rand32::new(42);

    for _ in 0..100 {
        let origin_dir = Vector::new(
            rng.rand_float() * 2.0 - 1.0,
            rng.rand_float() * 2.0 - 1.0,
            rng.rand_float() * 2.0 - 1.0,
        );
        let Some(origin_dir) = origin_dir.try_normalize(1.0e-3) else {
            continue;
        };
        let ray_origin = Point::from(origin_dir * 5.0);
        // Through the shape's center and well past it.
        let ray = RayCast::new(ray_origin, Point::origin() - ray_origin * 2.0);

        let rotation = na::Unit::try_new(
            na::Quaternion::new(
                rng.rand_float() * 2.0 - 1.0,
                rng.rand_float() * 2.0 - 1.0,
                rng.rand_float() * 2.0 - 1.0,
                rng.rand_float() * 2.0 - 1.0,
            ),
            1.0e-3,
        )
        .unwrap_or_else(Rotation::identity);

        let ts = TransformedShape::new(Point::origin(), rotation, shape.clone(), BodyId(0));

        let mut hit = RayCastResult::default();
        assert!(
            ts.cast_ray(&ray, &mut hit),
            "ray {ray:?} should hit {name} rotated by {rotation:?}"
        );
        assert!(hit.fraction > 0.0 && hit.fraction < 1.0);

        let nudge = 2.0e-3;
        let point_outside = ray.point_on_ray(hit.fraction - nudge);
        let point_inside = ray.point_on_ray(hit.fraction + nudge);
        assert!(
            !contains(&ts, &point_outside),
            "{name}: point just before the hit should be outside"
        );
        assert!(
            contains(&ts, &point_inside),
            "{name}: point just past the hit should be inside"
        );
    }
}

#[test]
fn random_rays_against_a_box() {
    run_random_ray_grid(
        "box",
        BoxShapeSettings::new(Vector::new(0.5, 1.0, 1.5), 0.0)
            .build()
            .unwrap(),
    );
}

#[test]
fn random_rays_against_a_sphere() {
    run_random_ray_grid("sphere", SphereShapeSettings::new(1.0).build().unwrap());
}

#[test]
fn random_rays_against_a_capsule() {
    // The capsule has no analytic ray or point test: this exercises the
    // generic GJK fallbacks.
    run_random_ray_grid(
        "capsule",
        CapsuleShapeSettings::new(0.75, 0.5).build().unwrap(),
    );
}
