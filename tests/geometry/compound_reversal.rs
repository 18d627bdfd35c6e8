use approx::assert_relative_eq;
use riposte3d::collision::{
    dispatch, AllHitCollector, ClosestHitCollector, CollideShapeResult, CollideShapeSettings,
    DefaultShapeFilter, ShapeCast, ShapeCastResult, ShapeCastSettings,
};
use riposte3d::math::{Isometry, Point, Rotation, Vector};
use riposte3d::shape::{
    BoxShapeSettings, ShapeRef, StaticCompound, StaticCompoundShapeSettings, SubShapeIdCreator,
};

/// Two half-unit boxes at x = -2 and x = +2.
fn two_boxes() -> ShapeRef {
    let mut settings = StaticCompoundShapeSettings::new();
    settings.add_shape(
        Point::new(-2.0, 0.0, 0.0),
        Rotation::identity(),
        BoxShapeSettings::new(Vector::repeat(0.5), 0.0)
            .build()
            .unwrap(),
    );
    settings.add_shape(
        Point::new(2.0, 0.0, 0.0),
        Rotation::identity(),
        BoxShapeSettings::new(Vector::repeat(0.5), 0.0)
            .build()
            .unwrap(),
    );
    settings.build().unwrap()
}

#[test]
fn compound_vs_box_hits_the_overlapping_child() {
    let compound = two_boxes();
    // Overlaps child 1 (surface at x = 2.5) by 0.2.
    let cube = BoxShapeSettings::new(Vector::repeat(0.5), 0.0)
        .build()
        .unwrap();

    let mut collector = AllHitCollector::<CollideShapeResult>::new();
    dispatch().collide_shape_vs_shape(
        compound.as_ref(),
        cube.as_ref(),
        &Vector::repeat(1.0),
        &Vector::repeat(1.0),
        &Isometry::identity(),
        &Isometry::translation(2.8, 0.0, 0.0),
        SubShapeIdCreator::new(),
        SubShapeIdCreator::new(),
        &CollideShapeSettings::default(),
        &mut collector,
        &DefaultShapeFilter,
    );

    assert_eq!(collector.hits.len(), 1);
    let hit = &collector.hits[0];
    assert_relative_eq!(hit.penetration_depth, 0.2, epsilon = 2.0e-2);

    // The sub-shape id resolves to the child that was hit.
    let compound = compound.downcast_ref::<StaticCompound>().unwrap();
    let (child_index, remainder) = hit.sub_shape_id1.pop_id(compound.sub_shape_id_bits());
    assert_eq!(child_index, 1);
    assert!(remainder.is_empty());
}

#[test]
fn reversed_collide_matches_the_direct_result() {
    let compound = two_boxes();
    let cube = BoxShapeSettings::new(Vector::repeat(0.5), 0.0)
        .build()
        .unwrap();
    let cube_transform = Isometry::translation(2.8, 0.0, 0.0);

    // Direct order: (compound, box).
    let mut direct = AllHitCollector::<CollideShapeResult>::new();
    dispatch().collide_shape_vs_shape(
        compound.as_ref(),
        cube.as_ref(),
        &Vector::repeat(1.0),
        &Vector::repeat(1.0),
        &Isometry::identity(),
        &cube_transform,
        SubShapeIdCreator::new(),
        SubShapeIdCreator::new(),
        &CollideShapeSettings::default(),
        &mut direct,
        &DefaultShapeFilter,
    );

    // Reversed order: (box, compound) is only registered through the
    // reversal adapter.
    let mut reversed = AllHitCollector::<CollideShapeResult>::new();
    dispatch().collide_shape_vs_shape(
        cube.as_ref(),
        compound.as_ref(),
        &Vector::repeat(1.0),
        &Vector::repeat(1.0),
        &cube_transform,
        &Isometry::identity(),
        SubShapeIdCreator::new(),
        SubShapeIdCreator::new(),
        &CollideShapeSettings::default(),
        &mut reversed,
        &DefaultShapeFilter,
    );

    assert_eq!(direct.hits.len(), 1);
    assert_eq!(reversed.hits.len(), 1);
    let d = &direct.hits[0];
    let r = &reversed.hits[0];

    // Same contact, seen from the other shape: points and ids swapped,
    // axis negated.
    assert_relative_eq!(d.penetration_depth, r.penetration_depth, epsilon = 1.0e-5);
    assert_relative_eq!(d.contact_point_on1, r.contact_point_on2, epsilon = 1.0e-5);
    assert_relative_eq!(d.contact_point_on2, r.contact_point_on1, epsilon = 1.0e-5);
    assert_relative_eq!(d.penetration_axis, -r.penetration_axis, epsilon = 1.0e-5);
    assert_eq!(d.sub_shape_id1, r.sub_shape_id2);
    assert_eq!(d.sub_shape_id2, r.sub_shape_id1);
}

#[test]
fn reversed_cast_matches_the_direct_result() {
    let compound = two_boxes();
    let cube = BoxShapeSettings::new(Vector::repeat(0.5), 0.0)
        .build()
        .unwrap();

    // Direct: cast the box at the compound. Child 0 surface at x = -2.5;
    // starting at x = -6, surfaces 3 apart, sweep of 10.
    let direct_cast = ShapeCast::new(
        cube.clone(),
        Vector::repeat(1.0),
        Isometry::translation(-6.0, 0.0, 0.0),
        Vector::new(10.0, 0.0, 0.0),
    );
    let mut direct = ClosestHitCollector::<ShapeCastResult>::new();
    dispatch().cast_shape_vs_shape_world_space(
        &direct_cast,
        &ShapeCastSettings::default(),
        &compound,
        &Vector::repeat(1.0),
        &DefaultShapeFilter,
        &Isometry::identity(),
        SubShapeIdCreator::new(),
        SubShapeIdCreator::new(),
        &mut direct,
    );

    // Reversed: cast the compound at the box along the opposite sweep;
    // (compound, convex) casts go through the reversal adapter.
    let reversed_cast = ShapeCast::new(
        compound.clone(),
        Vector::repeat(1.0),
        Isometry::identity(),
        Vector::new(-10.0, 0.0, 0.0),
    );
    let mut reversed = ClosestHitCollector::<ShapeCastResult>::new();
    dispatch().cast_shape_vs_shape_world_space(
        &reversed_cast,
        &ShapeCastSettings::default(),
        &cube,
        &Vector::repeat(1.0),
        &DefaultShapeFilter,
        &Isometry::translation(-6.0, 0.0, 0.0),
        SubShapeIdCreator::new(),
        SubShapeIdCreator::new(),
        &mut reversed,
    );

    let d = direct.hit.expect("direct cast should hit");
    let r = reversed.hit.expect("reversed cast should hit");
    assert_relative_eq!(d.fraction, 0.3, epsilon = 1.0e-3);
    assert_relative_eq!(d.fraction, r.fraction, epsilon = 1.0e-3);
    assert_eq!(d.contact.sub_shape_id2, r.contact.sub_shape_id1);

    // Both report the same touch point on the compound's child 0 surface.
    assert_relative_eq!(d.contact.contact_point_on2.x, -2.5, epsilon = 1.0e-2);
}

#[test]
fn compound_ray_and_point_queries_recurse() {
    use riposte3d::body::BodyId;
    use riposte3d::collision::{AnyHitCollector, RayCast, TransformedShape};

    let compound = two_boxes();
    let ts = TransformedShape::new(
        Point::new(0.0, 10.0, 0.0),
        Rotation::identity(),
        compound,
        BodyId(7),
    );

    // Ray down onto child 1 (top face at y = 10.5).
    let ray = RayCast::new(Point::new(2.0, 15.0, 0.0), Vector::new(0.0, -10.0, 0.0));
    let mut hit = riposte3d::collision::RayCastResult::default();
    assert!(ts.cast_ray(&ray, &mut hit));
    assert_relative_eq!(hit.fraction, 0.45, epsilon = 1.0e-5);
    assert_eq!(hit.body_id, BodyId(7));

    // A point inside child 0.
    let mut collector = AnyHitCollector::new();
    ts.collide_point(
        &Point::new(-2.0, 10.2, 0.0),
        &mut collector,
        &DefaultShapeFilter,
    );
    assert!(collector.had_hit());

    // A point between the children.
    let mut collector = AnyHitCollector::new();
    ts.collide_point(&Point::new(0.0, 10.0, 0.0), &mut collector, &DefaultShapeFilter);
    assert!(!collector.had_hit());
}
