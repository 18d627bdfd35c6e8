use approx::assert_relative_eq;
use riposte3d::collision::{
    dispatch, ClosestHitCollector, DefaultShapeFilter, ShapeCast, ShapeCastResult,
    ShapeCastSettings,
};
use riposte3d::math::{Isometry, Vector};
use riposte3d::shape::{BoxShapeSettings, ShapeRef, SphereShapeSettings, SubShapeIdCreator};

fn cast(
    cast_shape: ShapeRef,
    direction: Vector,
    target: ShapeRef,
    target_transform: Isometry,
    settings: &ShapeCastSettings,
) -> ClosestHitCollector<ShapeCastResult> {
    let shape_cast = ShapeCast::new(
        cast_shape,
        Vector::repeat(1.0),
        Isometry::identity(),
        direction,
    );

    let mut collector = ClosestHitCollector::new();
    dispatch().cast_shape_vs_shape_world_space(
        &shape_cast,
        settings,
        &target,
        &Vector::repeat(1.0),
        &DefaultShapeFilter,
        &target_transform,
        SubShapeIdCreator::new(),
        SubShapeIdCreator::new(),
        &mut collector,
    );
    collector
}

#[test]
fn sphere_cast_touches_at_half_the_sweep() {
    // Spheres of radius 1, target 10 away, gap of 8 out of a 16 sweep.
    let sphere = SphereShapeSettings::new(1.0).build().unwrap();
    let collector = cast(
        sphere.clone(),
        Vector::new(16.0, 0.0, 0.0),
        sphere,
        Isometry::translation(10.0, 0.0, 0.0),
        &ShapeCastSettings::default(),
    );

    let hit = collector.hit.expect("expected a hit");
    assert_relative_eq!(hit.fraction, 0.5, epsilon = 1.0e-3);
    // Touch point halfway between the surfaces at x = 9.
    assert_relative_eq!(hit.contact.contact_point_on2.x, 9.0, epsilon = 1.0e-2);
    // The contact normal points from the cast shape to the target.
    assert!(hit.contact.penetration_axis.normalize().x > 0.99);
}

#[test]
fn box_cast_stops_at_the_facing_face() {
    // Unit boxes: surfaces at x = 1 and x = 4, gap of 3 out of a 10 sweep.
    let cube = BoxShapeSettings::new(Vector::repeat(1.0), 0.0)
        .build()
        .unwrap();
    let collector = cast(
        cube.clone(),
        Vector::new(10.0, 0.0, 0.0),
        cube,
        Isometry::translation(5.0, 0.0, 0.0),
        &ShapeCastSettings::default(),
    );

    let hit = collector.hit.expect("expected a hit");
    assert_relative_eq!(hit.fraction, 0.3, epsilon = 1.0e-3);
    assert_relative_eq!(hit.contact.contact_point_on2.x, 4.0, epsilon = 1.0e-2);
}

#[test]
fn cast_past_the_target_misses() {
    let cube = BoxShapeSettings::new(Vector::repeat(1.0), 0.0)
        .build()
        .unwrap();
    // The sweep ends before reaching the target.
    let collector = cast(
        cube.clone(),
        Vector::new(2.0, 0.0, 0.0),
        cube,
        Isometry::translation(5.0, 0.0, 0.0),
        &ShapeCastSettings::default(),
    );
    assert!(!collector.had_hit());
}

#[test]
fn initially_overlapping_cast_returns_the_deepest_point() {
    let cube = BoxShapeSettings::new(Vector::repeat(1.0), 0.0)
        .build()
        .unwrap();
    let settings = ShapeCastSettings {
        return_deepest_point: true,
        ..ShapeCastSettings::default()
    };
    // Boxes overlapping by 0.2 at the start of the sweep.
    let collector = cast(
        cube.clone(),
        Vector::new(10.0, 0.0, 0.0),
        cube,
        Isometry::translation(1.8, 0.0, 0.0),
        &settings,
    );

    let hit = collector.hit.expect("expected a hit");
    assert_eq!(hit.fraction, 0.0);
    assert_relative_eq!(hit.contact.penetration_depth, 0.2, epsilon = 2.0e-2);
    assert!(hit.contact.penetration_axis.normalize().x > 0.99);
}

#[test]
fn shrunken_shape_cast_matches_the_full_shape() {
    // With use_shrunken_shape_and_convex_radius the cores are cast and the
    // convex radii added back; the fraction must match the full shapes.
    let rounded = BoxShapeSettings::new(Vector::repeat(1.0), 0.1)
        .build()
        .unwrap();
    let settings = ShapeCastSettings {
        use_shrunken_shape_and_convex_radius: true,
        ..ShapeCastSettings::default()
    };
    let collector = cast(
        rounded.clone(),
        Vector::new(10.0, 0.0, 0.0),
        rounded,
        Isometry::translation(5.0, 0.0, 0.0),
        &settings,
    );

    let hit = collector.hit.expect("expected a hit");
    assert_relative_eq!(hit.fraction, 0.3, epsilon = 1.0e-2);
}
