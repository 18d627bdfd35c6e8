//! Shapes: the polymorphic geometry objects collision queries run against.

pub use self::box_shape::{BoxShape, BoxShapeSettings, BoxSupport};
pub use self::capsule::{Capsule, CapsuleShapeSettings, CapsuleSupport};
pub use self::compound::{CompoundChild, StaticCompound, StaticCompoundShapeSettings};
pub use self::convex_shape::{ConvexShape, Support, SupportBuffer, SupportMode};
pub use self::shape::{
    Shape, ShapeError, ShapeRef, ShapeSubType, ShapeType, SupportingFace, TrianglesContext,
    ALL_SUB_SHAPE_TYPES, COMPOUND_SUB_SHAPE_TYPES, CONVEX_SUB_SHAPE_TYPES,
    GET_TRIANGLES_MIN_TRIANGLES_REQUESTED, NUM_SUB_SHAPE_TYPES,
};
pub use self::sphere::{Sphere, SphereShapeSettings, SphereSupport};
pub use self::sub_shape_id::{SubShapeId, SubShapeIdCreator};

pub mod scale_helpers;

mod box_shape;
mod capsule;
pub(crate) mod compound;
pub(crate) mod convex_shape;
mod shape;
mod sphere;
mod sub_shape_id;
