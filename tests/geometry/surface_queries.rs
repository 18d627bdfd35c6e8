use approx::assert_relative_eq;
use riposte3d::body::BodyId;
use riposte3d::bounding_volume::Aabb;
use riposte3d::collision::{RayCast, RayCastResult, TransformedShape};
use riposte3d::gjk::{GjkClosestPoint, PolygonSupport, TriangleSupport};
use riposte3d::math::{Point, Rotation, Vector};
use riposte3d::shape::{
    BoxShapeSettings, ConvexShape, Shape, ShapeRef, SphereShapeSettings,
    StaticCompoundShapeSettings, SupportingFace, GET_TRIANGLES_MIN_TRIANGLES_REQUESTED,
};

fn stream_all_triangles(ts: &TransformedShape) -> Vec<Point> {
    let bounds = ts.world_bounds();
    let mut context = ts.get_triangles_start(&bounds, &Vector::zeros());

    let mut all = Vec::new();
    let mut block = Vec::new();
    loop {
        let count = ts.get_triangles_next(
            &mut context,
            GET_TRIANGLES_MIN_TRIANGLES_REQUESTED,
            &mut block,
        );
        if count == 0 {
            break;
        }
        assert_eq!(block.len(), count * 3);
        all.extend_from_slice(&block);
    }
    all
}

#[test]
fn box_triangle_stream_covers_the_box() {
    let cube = BoxShapeSettings::new(Vector::new(1.0, 2.0, 3.0), 0.0)
        .build()
        .unwrap();
    let ts = TransformedShape::new(
        Point::new(5.0, 0.0, 0.0),
        Rotation::identity(),
        cube,
        BodyId(0),
    );

    let vertices = stream_all_triangles(&ts);
    assert_eq!(vertices.len(), 12 * 3);

    // Every vertex is a corner of the world-space box.
    for vertex in &vertices {
        assert_relative_eq!((vertex.x - 5.0).abs(), 1.0, epsilon = 1.0e-5);
        assert_relative_eq!(vertex.y.abs(), 2.0, epsilon = 1.0e-5);
        assert_relative_eq!(vertex.z.abs(), 3.0, epsilon = 1.0e-5);
    }
}

#[test]
fn sphere_triangle_stream_lies_on_the_sphere() {
    let sphere = SphereShapeSettings::new(2.0).build().unwrap();
    let ts = TransformedShape::new(Point::origin(), Rotation::identity(), sphere, BodyId(0));

    let vertices = stream_all_triangles(&ts);
    assert_eq!(vertices.len(), 384);
    for vertex in &vertices {
        assert_relative_eq!(vertex.coords.norm(), 2.0, epsilon = 1.0e-4);
    }
}

#[test]
fn compound_triangle_stream_chains_its_children() {
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
    let compound = settings.build().unwrap();
    let ts = TransformedShape::new(Point::origin(), Rotation::identity(), compound, BodyId(0));

    let vertices = stream_all_triangles(&ts);
    assert_eq!(vertices.len(), 2 * 12 * 3);
}

#[test]
fn world_space_surface_normal_of_a_compound_leaf() {
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
    let compound: ShapeRef = settings.build().unwrap();
    let ts = TransformedShape::new(Point::origin(), Rotation::identity(), compound, BodyId(0));

    let ray = RayCast::new(Point::new(2.0, 5.0, 0.0), Vector::new(0.0, -10.0, 0.0));
    let mut hit = RayCastResult::default();
    assert!(ts.cast_ray(&ray, &mut hit));

    let surface_point = ray.point_on_ray(hit.fraction);
    let normal = ts.world_space_surface_normal(hit.sub_shape_id2, &surface_point);
    assert_relative_eq!(normal, Vector::y(), epsilon = 1.0e-4);
}

#[test]
fn supporting_face_of_a_transformed_box() {
    let cube = BoxShapeSettings::new(Vector::repeat(1.0), 0.0)
        .build()
        .unwrap();
    let ts = TransformedShape::new(
        Point::new(0.0, 3.0, 0.0),
        Rotation::identity(),
        cube,
        BodyId(0),
    );

    // Coming from above: the top face at y = 4.
    let mut face = SupportingFace::new();
    ts.get_supporting_face(
        riposte3d::shape::SubShapeId::empty(),
        &Vector::new(0.0, -1.0, 0.0),
        &Vector::zeros(),
        &mut face,
    );
    assert_eq!(face.len(), 4);
    for vertex in &face {
        assert_relative_eq!(vertex.y, 4.0, epsilon = 1.0e-5);
    }
}

#[test]
fn triangle_and_polygon_supports_feed_gjk() {
    // A triangle in the XZ plane below a unit sphere centered at y = 3.
    let triangle = TriangleSupport {
        vertices: [
            Point::new(-1.0, 0.0, -1.0),
            Point::new(1.0, 0.0, -1.0),
            Point::new(0.0, 0.0, 1.0),
        ],
    };
    let sphere = SphereShapeSettings::new(1.0).build().unwrap();
    let mut buffer = riposte3d::shape::SupportBuffer::new();
    let support = sphere.as_convex().unwrap().support_function(
        riposte3d::shape::SupportMode::IncludeConvexRadius,
        &mut buffer,
        &Vector::repeat(1.0),
    );
    let shifted = riposte3d::gjk::TransformedSupport::new(
        riposte3d::math::Isometry::translation(0.0, 3.0, 0.0),
        support,
    );

    let mut gjk = GjkClosestPoint::new();
    let mut axis = Vector::y();
    let mut on_a = Point::origin();
    let mut on_b = Point::origin();
    let dist_sqr = gjk.closest_points(
        &triangle,
        &shifted,
        1.0e-4,
        f32::MAX,
        &mut axis,
        &mut on_a,
        &mut on_b,
    );
    // Sphere bottom at y = 2, triangle at y = 0.
    assert_relative_eq!(dist_sqr, 4.0, epsilon = 1.0e-3);

    // The same query against the triangle as a polygon.
    let vertices = [
        Point::new(-1.0, 0.0, -1.0),
        Point::new(1.0, 0.0, -1.0),
        Point::new(0.0, 0.0, 1.0),
    ];
    let polygon = PolygonSupport {
        vertices: &vertices,
    };
    let mut gjk = GjkClosestPoint::new();
    let mut axis = Vector::y();
    let dist_sqr_poly = gjk.closest_points(
        &polygon,
        &shifted,
        1.0e-4,
        f32::MAX,
        &mut axis,
        &mut on_a,
        &mut on_b,
    );
    assert_relative_eq!(dist_sqr_poly, dist_sqr, epsilon = 1.0e-3);
}

#[test]
fn triangle_stream_respects_the_requested_block_size() {
    let sphere = SphereShapeSettings::new(1.0).build().unwrap();
    let ts = TransformedShape::new(Point::origin(), Rotation::identity(), sphere, BodyId(0));

    let bounds: Aabb = ts.world_bounds();
    let mut context = ts.get_triangles_start(&bounds, &Vector::zeros());

    let mut block = Vec::new();
    let count = ts.get_triangles_next(&mut context, 50, &mut block);
    assert_eq!(count, 50);
    let count = ts.get_triangles_next(&mut context, 128, &mut block);
    assert_eq!(count, 78);
    let count = ts.get_triangles_next(&mut context, 128, &mut block);
    assert_eq!(count, 0);
}
