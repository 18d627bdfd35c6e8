//! Predicates for classifying local-space scale vectors.
//!
//! Shapes only accept certain scales (spheres and capsules must be scaled
//! uniformly, no shape survives a zero scale); these helpers back
//! `Shape::is_valid_scale` and `Shape::make_scale_valid` so invalid scales
//! surface as caller errors instead of crashes.

use crate::math::{Real, Vector};

/// Minimum valid scale component.
pub const MIN_SCALE: Real = 1.0e-6;

/// Tolerance used when comparing scale components.
pub const SCALE_TOLERANCE: Real = 1.0e-6;

/// Tests if the scale is identity (1, 1, 1).
#[inline]
pub fn is_not_scaled(scale: &Vector) -> bool {
    (scale - Vector::repeat(1.0)).abs().max() < SCALE_TOLERANCE
}

/// Tests if the scale has the same magnitude along all axes (signs may
/// differ).
#[inline]
pub fn is_uniform_scale(scale: &Vector) -> bool {
    let abs = scale.abs();
    (abs.x - abs.y).abs() < SCALE_TOLERANCE && (abs.x - abs.z).abs() < SCALE_TOLERANCE
}

/// Tests if any component of the scale is (near) zero.
#[inline]
pub fn is_zero_scale(scale: &Vector) -> bool {
    scale.abs().min() < MIN_SCALE
}

/// Tests if the scale flips the shape inside out (odd number of negative
/// components), which inverts the winding of its faces.
#[inline]
pub fn is_inside_out(scale: &Vector) -> bool {
    let negatives =
        (scale.x < 0.0) as u32 + (scale.y < 0.0) as u32 + (scale.z < 0.0) as u32;
    negatives & 1 == 1
}

/// Clamps scale components away from zero, keeping their sign.
#[inline]
pub fn make_non_zero_scale(scale: &Vector) -> Vector {
    scale.map(|c| {
        if c.abs() < MIN_SCALE {
            MIN_SCALE.copysign(c)
        } else {
            c
        }
    })
}

/// Turns an arbitrary scale into a uniform one, keeping per-axis signs. The
/// magnitude is the component with the largest absolute value.
#[inline]
pub fn make_uniform_scale(scale: &Vector) -> Vector {
    let uniform = scale.abs().max();
    Vector::new(
        uniform.copysign(scale.x),
        uniform.copysign(scale.y),
        uniform.copysign(scale.z),
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classifies_scales() {
        assert!(is_not_scaled(&Vector::repeat(1.0)));
        assert!(!is_not_scaled(&Vector::new(1.0, 2.0, 1.0)));

        assert!(is_uniform_scale(&Vector::new(2.0, -2.0, 2.0)));
        assert!(!is_uniform_scale(&Vector::new(2.0, 1.0, 2.0)));

        assert!(is_zero_scale(&Vector::new(1.0, 0.0, 1.0)));
        assert!(!is_zero_scale(&Vector::repeat(0.5)));

        assert!(is_inside_out(&Vector::new(-1.0, 1.0, 1.0)));
        assert!(!is_inside_out(&Vector::new(-1.0, -1.0, 1.0)));
    }

    #[test]
    fn makes_scales_valid() {
        let fixed = make_non_zero_scale(&Vector::new(0.0, -0.0, 2.0));
        assert!(!is_zero_scale(&fixed));
        assert_eq!(fixed.z, 2.0);

        let uniform = make_uniform_scale(&Vector::new(1.0, -3.0, 2.0));
        assert!(is_uniform_scale(&uniform));
        assert_eq!(uniform, Vector::new(3.0, -3.0, 3.0));
    }
}
