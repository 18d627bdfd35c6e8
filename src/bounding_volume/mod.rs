//! Bounding volumes and their intersection tests.

pub use self::aabb::Aabb;

mod aabb;
