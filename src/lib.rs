/*!
riposte3d
=========

**riposte3d** is a 3-dimensional convex collision detection kernel written
with the rust programming language. It provides the narrow-phase building
blocks of a physics engine: GJK closest-point queries, EPA penetration
depth, support-mapped convex shapes, shape-pair dispatch, and scene-level
ray/point/shape queries driven by a broad-phase candidate stream.
*/

#![deny(non_camel_case_types)]
#![deny(unused_parens)]
#![deny(non_upper_case_globals)]
#![warn(missing_docs)]
#![warn(unused_imports)]
#![allow(missing_copy_implementations)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::module_inception)]

#[macro_use]
extern crate approx;
extern crate nalgebra as na;
extern crate num_traits as num;

pub mod body;
pub mod bounding_volume;
pub mod broad_phase;
pub mod collision;
pub mod epa;
pub mod gjk;
pub mod shape;

/// Aliases for the mathematical types used throughout this crate.
pub mod math {
    pub use na::{Isometry3, Point3, Translation3, UnitQuaternion, UnitVector3, Vector3};

    /// The scalar type used throughout this crate.
    pub type Real = f32;

    /// The default tolerance used for geometric operations.
    pub const DEFAULT_EPSILON: Real = Real::EPSILON;

    /// The point type.
    pub type Point = Point3<Real>;

    /// The vector type.
    pub type Vector = Vector3<Real>;

    /// The unit vector type.
    pub type UnitVector = UnitVector3<Real>;

    /// The transformation type (rotation followed by translation).
    pub type Isometry = Isometry3<Real>;

    /// The rotation type.
    pub type Rotation = UnitQuaternion<Real>;

    /// The translation type.
    pub type Translation = Translation3<Real>;
}
