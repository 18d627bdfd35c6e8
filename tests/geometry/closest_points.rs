use approx::assert_relative_eq;
use riposte3d::gjk::{GjkClosestPoint, TransformedSupport};
use riposte3d::math::{Isometry, Point, Real, Vector};
use riposte3d::shape::{
    BoxShapeSettings, ConvexShape, Shape, SphereShapeSettings, SupportBuffer, SupportMode,
};

#[test]
fn separated_boxes_have_a_separating_axis() {
    let shape = BoxShapeSettings::new(Vector::repeat(1.0), 0.0)
        .build()
        .unwrap();
    let convex = shape.as_convex().unwrap();

    let mut buffer1 = SupportBuffer::new();
    let support1 =
        convex.support_function(SupportMode::IncludeConvexRadius, &mut buffer1, &Vector::repeat(1.0));
    let mut buffer2 = SupportBuffer::new();
    let support2 =
        convex.support_function(SupportMode::IncludeConvexRadius, &mut buffer2, &Vector::repeat(1.0));
    let transformed2 = TransformedSupport::new(Isometry::translation(4.0, 0.0, 0.0), support2);

    let mut gjk = GjkClosestPoint::new();
    let mut axis = Vector::x();
    assert!(!gjk.intersects(support1, &transformed2, 1.0e-4, &mut axis));
    // The separating axis points from A to B.
    assert!(axis.x > 0.0);
}

#[test]
fn overlapping_boxes_intersect() {
    let shape = BoxShapeSettings::new(Vector::repeat(1.0), 0.0)
        .build()
        .unwrap();
    let convex = shape.as_convex().unwrap();

    let mut buffer1 = SupportBuffer::new();
    let support1 =
        convex.support_function(SupportMode::IncludeConvexRadius, &mut buffer1, &Vector::repeat(1.0));
    let mut buffer2 = SupportBuffer::new();
    let support2 =
        convex.support_function(SupportMode::IncludeConvexRadius, &mut buffer2, &Vector::repeat(1.0));
    let transformed2 = TransformedSupport::new(Isometry::translation(1.8, 0.0, 0.0), support2);

    let mut gjk = GjkClosestPoint::new();
    let mut axis = Vector::x();
    assert!(gjk.intersects(support1, &transformed2, 1.0e-4, &mut axis));
}

#[test]
fn box_box_witness_points_lie_on_the_surfaces() {
    let shape = BoxShapeSettings::new(Vector::repeat(1.0), 0.0)
        .build()
        .unwrap();
    let convex = shape.as_convex().unwrap();

    let mut buffer1 = SupportBuffer::new();
    let support1 =
        convex.support_function(SupportMode::IncludeConvexRadius, &mut buffer1, &Vector::repeat(1.0));
    let mut buffer2 = SupportBuffer::new();
    let support2 =
        convex.support_function(SupportMode::IncludeConvexRadius, &mut buffer2, &Vector::repeat(1.0));
    let transformed2 = TransformedSupport::new(Isometry::translation(4.0, 0.0, 0.0), support2);

    let mut gjk = GjkClosestPoint::new();
    let mut axis = Vector::x();
    let mut on_a = Point::origin();
    let mut on_b = Point::origin();
    let dist_sqr = gjk.closest_points(
        support1,
        &transformed2,
        1.0e-4,
        Real::MAX,
        &mut axis,
        &mut on_a,
        &mut on_b,
    );

    // Faces at x = 1 and x = 3, separated by 2.
    assert_relative_eq!(dist_sqr, 4.0, epsilon = 1.0e-3);
    assert_relative_eq!(on_a.x, 1.0, epsilon = 1.0e-3);
    assert_relative_eq!(on_b.x, 3.0, epsilon = 1.0e-3);

    // The witness points lie on their shapes and their distance matches the
    // returned squared distance.
    assert!(on_a.y.abs() <= 1.0 + 1.0e-3 && on_a.z.abs() <= 1.0 + 1.0e-3);
    assert!(on_b.y.abs() <= 1.0 + 1.0e-3 && on_b.z.abs() <= 1.0 + 1.0e-3);
    assert_relative_eq!((on_a - on_b).norm_squared(), dist_sqr, epsilon = 1.0e-3);
}

#[test]
fn sphere_sphere_witness_points() {
    let shape1 = SphereShapeSettings::new(1.0).build().unwrap();
    let shape2 = SphereShapeSettings::new(2.0).build().unwrap();

    let mut buffer1 = SupportBuffer::new();
    let support1 = shape1.as_convex().unwrap().support_function(
        SupportMode::IncludeConvexRadius,
        &mut buffer1,
        &Vector::repeat(1.0),
    );
    let mut buffer2 = SupportBuffer::new();
    let support2 = shape2.as_convex().unwrap().support_function(
        SupportMode::IncludeConvexRadius,
        &mut buffer2,
        &Vector::repeat(1.0),
    );
    let transformed2 = TransformedSupport::new(Isometry::translation(5.0, 0.0, 0.0), support2);

    let mut gjk = GjkClosestPoint::new();
    let mut axis = Vector::x();
    let mut on_a = Point::origin();
    let mut on_b = Point::origin();
    let dist_sqr = gjk.closest_points(
        support1,
        &transformed2,
        1.0e-4,
        Real::MAX,
        &mut axis,
        &mut on_a,
        &mut on_b,
    );

    // Separation is 5 - 1 - 2 = 2.
    assert_relative_eq!(dist_sqr, 4.0, epsilon = 1.0e-3);
    assert_relative_eq!(on_a, Point::new(1.0, 0.0, 0.0), epsilon = 1.0e-2);
    assert_relative_eq!(on_b, Point::new(3.0, 0.0, 0.0), epsilon = 1.0e-2);
}

#[test]
fn closest_points_early_out_beyond_max_distance() {
    let shape = SphereShapeSettings::new(1.0).build().unwrap();

    let mut buffer1 = SupportBuffer::new();
    let support1 = shape.as_convex().unwrap().support_function(
        SupportMode::IncludeConvexRadius,
        &mut buffer1,
        &Vector::repeat(1.0),
    );
    let mut buffer2 = SupportBuffer::new();
    let support2 = shape.as_convex().unwrap().support_function(
        SupportMode::IncludeConvexRadius,
        &mut buffer2,
        &Vector::repeat(1.0),
    );
    let transformed2 = TransformedSupport::new(Isometry::translation(100.0, 0.0, 0.0), support2);

    let mut gjk = GjkClosestPoint::new();
    let mut axis = Vector::x();
    let mut on_a = Point::origin();
    let mut on_b = Point::origin();
    let dist_sqr = gjk.closest_points(
        support1,
        &transformed2,
        1.0e-4,
        4.0,
        &mut axis,
        &mut on_a,
        &mut on_b,
    );
    assert_eq!(dist_sqr, Real::MAX);
}
