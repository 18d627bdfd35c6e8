use approx::assert_relative_eq;
use riposte3d::collision::{
    dispatch, AllHitCollector, CollideShapeResult, CollideShapeSettings, DefaultShapeFilter,
};
use riposte3d::math::{Isometry, Vector};
use riposte3d::shape::{BoxShapeSettings, SphereShapeSettings, SubShapeIdCreator};

fn collide(
    transform2: Isometry,
    settings: &CollideShapeSettings,
) -> AllHitCollector<CollideShapeResult> {
    let box1 = BoxShapeSettings::new(Vector::repeat(1.0), 0.0)
        .build()
        .unwrap();
    let box2 = BoxShapeSettings::new(Vector::repeat(1.0), 0.0)
        .build()
        .unwrap();

    let mut collector = AllHitCollector::new();
    dispatch().collide_shape_vs_shape(
        box1.as_ref(),
        box2.as_ref(),
        &Vector::repeat(1.0),
        &Vector::repeat(1.0),
        &Isometry::identity(),
        &transform2,
        SubShapeIdCreator::new(),
        SubShapeIdCreator::new(),
        settings,
        &mut collector,
        &DefaultShapeFilter,
    );
    collector
}

#[test]
fn separated_boxes_report_no_hits() {
    let collector = collide(
        Isometry::translation(10.0, 0.0, 0.0),
        &CollideShapeSettings::default(),
    );
    assert!(!collector.had_hit());
}

#[test]
fn boxes_overlapping_by_a_fifth() {
    // Unit boxes whose surfaces interpenetrate 0.2 along X.
    let collector = collide(
        Isometry::translation(1.8, 0.0, 0.0),
        &CollideShapeSettings::default(),
    );
    assert_eq!(collector.hits.len(), 1);

    let hit = &collector.hits[0];
    assert_relative_eq!(hit.penetration_depth, 0.2, epsilon = 2.0e-2);

    let axis = hit.penetration_axis.normalize();
    assert!(axis.x > 0.99, "expected the +X axis, got {axis:?}");

    // The contact points lie on the surfaces of their shapes.
    assert_relative_eq!(hit.contact_point_on1.x, 1.0, epsilon = 2.0e-2);
    assert_relative_eq!(hit.contact_point_on2.x, 0.8, epsilon = 2.0e-2);
    assert_relative_eq!(
        (hit.contact_point_on1 - hit.contact_point_on2).norm(),
        hit.penetration_depth,
        epsilon = 1.0e-3
    );
}

#[test]
fn touching_boxes_within_the_convex_radius() {
    // Cores are 0.1 apart; the convex radii (0.1 each) overlap.
    let box1 = BoxShapeSettings::new(Vector::repeat(1.0), 0.1)
        .build()
        .unwrap();
    let box2 = BoxShapeSettings::new(Vector::repeat(1.0), 0.1)
        .build()
        .unwrap();

    let mut collector = AllHitCollector::<CollideShapeResult>::new();
    dispatch().collide_shape_vs_shape(
        box1.as_ref(),
        box2.as_ref(),
        &Vector::repeat(1.0),
        &Vector::repeat(1.0),
        &Isometry::identity(),
        &Isometry::translation(1.9, 0.0, 0.0),
        SubShapeIdCreator::new(),
        SubShapeIdCreator::new(),
        &CollideShapeSettings::default(),
        &mut collector,
        &DefaultShapeFilter,
    );

    assert_eq!(collector.hits.len(), 1);
    assert_relative_eq!(collector.hits[0].penetration_depth, 0.1, epsilon = 1.0e-2);
}

#[test]
fn max_separation_distance_finds_near_misses() {
    // Boxes separated by 0.1: no hit normally, a negative-depth hit when
    // the query allows 0.3 of separation.
    let collector = collide(
        Isometry::translation(2.1, 0.0, 0.0),
        &CollideShapeSettings::default(),
    );
    assert!(!collector.had_hit());

    let settings = CollideShapeSettings {
        max_separation_distance: 0.3,
        ..CollideShapeSettings::default()
    };
    let collector = collide(Isometry::translation(2.1, 0.0, 0.0), &settings);
    assert_eq!(collector.hits.len(), 1);
    let hit = &collector.hits[0];
    assert!(hit.penetration_depth < 0.0);
    assert_relative_eq!(hit.penetration_depth, -0.1, epsilon = 2.0e-2);
}

#[test]
fn deep_spheres_match_the_analytic_depth() {
    // Spheres of radius 1 with centers 1 apart penetrate by 1.
    let sphere = SphereShapeSettings::new(1.0).build().unwrap();

    let mut collector = AllHitCollector::<CollideShapeResult>::new();
    dispatch().collide_shape_vs_shape(
        sphere.as_ref(),
        sphere.as_ref(),
        &Vector::repeat(1.0),
        &Vector::repeat(1.0),
        &Isometry::identity(),
        &Isometry::translation(1.0, 0.0, 0.0),
        SubShapeIdCreator::new(),
        SubShapeIdCreator::new(),
        &CollideShapeSettings::default(),
        &mut collector,
        &DefaultShapeFilter,
    );

    assert_eq!(collector.hits.len(), 1);
    let hit = &collector.hits[0];
    assert_relative_eq!(hit.penetration_depth, 1.0, epsilon = 5.0e-2);
    assert!(hit.penetration_axis.normalize().x > 0.99);
}

#[test]
fn collected_faces_are_the_contact_faces() {
    use riposte3d::collision::CollectFacesMode;

    let settings = CollideShapeSettings {
        collect_faces_mode: CollectFacesMode::CollectFaces,
        ..CollideShapeSettings::default()
    };
    let collector = collide(Isometry::translation(1.8, 0.0, 0.0), &settings);
    assert_eq!(collector.hits.len(), 1);

    let hit = &collector.hits[0];
    assert_eq!(hit.shape1_face.len(), 4);
    assert_eq!(hit.shape2_face.len(), 4);
    for vertex in &hit.shape1_face {
        assert_relative_eq!(vertex.x, 1.0, epsilon = 1.0e-3);
    }
    for vertex in &hit.shape2_face {
        assert_relative_eq!(vertex.x, 0.8, epsilon = 1.0e-3);
    }
}
