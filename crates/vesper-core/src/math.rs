//! Math types for 2D rendering.
//!
//! Vectors come straight from [`glam`]. Affine transforms use [`Mat3x2`], a
//! row-vector view over [`glam::Affine2`]: points are transformed as `p * M`,
//! so `a * b` applies `a` first and `b` second.
//!
//! ```
//! use vesper_core::math::{Mat3x2, Vec2};
//!
//! let local = Mat3x2::scale(Vec2::splat(2.0));
//! let camera = Mat3x2::translate(Vec2::new(10.0, 0.0));
//! let composed = local * camera;
//! assert_eq!(composed.transform_point(Vec2::new(1.0, 1.0)), Vec2::new(12.0, 2.0));
//! ```

use std::ops::Mul;

use bytemuck::AnyBitPattern;
use glam::Affine2;

pub use glam::{Vec2, Vec4, vec2, vec4};

/// 3x2 affine matrix in row-vector layout.
///
/// ```text
/// | m11 m12 |
/// | m21 m22 |
/// | m31 m32 |   <- translation
/// ```
///
/// Rows one and two are the `x_axis` and `y_axis` columns of the wrapped
/// [`Affine2`], and row three is its translation.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, AnyBitPattern)]
pub struct Mat3x2(Affine2);

impl Mat3x2 {
    pub const IDENTITY: Mat3x2 = Mat3x2(Affine2::IDENTITY);

    pub fn new(m11: f32, m12: f32, m21: f32, m22: f32, m31: f32, m32: f32) -> Self {
        Self(Affine2::from_cols_array(&[m11, m12, m21, m22, m31, m32]))
    }

    pub fn translate(offset: Vec2) -> Self {
        Self(Affine2::from_translation(offset))
    }

    pub fn scale(scale: Vec2) -> Self {
        Self(Affine2::from_scale(scale))
    }

    /// Scale about `center` instead of the origin.
    pub fn scale_at(scale: Vec2, center: Vec2) -> Self {
        Self(
            Affine2::from_translation(center)
                * Affine2::from_scale(scale)
                * Affine2::from_translation(-center),
        )
    }

    /// Clockwise rotation in screen space (y pointing down).
    pub fn rotate(angle: f32) -> Self {
        Self(Affine2::from_angle(angle))
    }

    /// Pixel space to clip space for a `width` x `height` viewport:
    /// `x' = 2x / width - 1`, `y' = 1 - 2y / height`.
    pub fn screen(width: f32, height: f32) -> Self {
        Self::new(2.0 / width, 0.0, 0.0, -2.0 / height, -1.0, 1.0)
    }

    pub fn transform_point(&self, p: Vec2) -> Vec2 {
        self.0.transform_point2(p)
    }

    /// Largest uniform scale factor this matrix applies, used to pick
    /// tessellation quality for curved shapes.
    pub fn max_scaling(&self) -> f32 {
        let m = &self.0.matrix2;
        (m.x_axis + m.y_axis).length() / std::f32::consts::SQRT_2
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Elements in row order: `[m11, m12, m21, m22, m31, m32]`.
    pub fn to_array(&self) -> [f32; 6] {
        self.0.to_cols_array()
    }

    pub fn affine(&self) -> Affine2 {
        self.0
    }
}

impl Default for Mat3x2 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Mat3x2 {
    type Output = Mat3x2;

    fn mul(self, rhs: Mat3x2) -> Mat3x2 {
        Mat3x2(rhs.0 * self.0)
    }
}

impl From<Mat3x2> for Affine2 {
    fn from(m: Mat3x2) -> Self {
        m.0
    }
}

impl From<Affine2> for Mat3x2 {
    fn from(a: Affine2) -> Self {
        Self(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn test_identity_is_neutral() {
        let m = Mat3x2::translate(Vec2::new(3.0, 4.0)) * Mat3x2::scale(Vec2::splat(2.0));
        assert_eq!(m * Mat3x2::IDENTITY, m);
        assert_eq!(Mat3x2::IDENTITY * m, m);
    }

    #[test]
    fn test_composition_applies_left_first() {
        let translate = Mat3x2::translate(Vec2::new(1.0, 0.0));
        let scale = Mat3x2::scale(Vec2::splat(10.0));
        let p = Vec2::new(1.0, 1.0);
        assert!(approx((translate * scale).transform_point(p), Vec2::new(20.0, 10.0)));
        assert!(approx((scale * translate).transform_point(p), Vec2::new(11.0, 10.0)));
    }

    #[test]
    fn test_screen_matrix_corners() {
        let screen = Mat3x2::screen(800.0, 600.0);
        assert!(approx(screen.transform_point(Vec2::ZERO), Vec2::new(-1.0, 1.0)));
        assert!(approx(screen.transform_point(Vec2::new(800.0, 600.0)), Vec2::new(1.0, -1.0)));
        assert!(approx(screen.transform_point(Vec2::new(400.0, 300.0)), Vec2::ZERO));
    }

    #[test]
    fn test_max_scaling() {
        assert!((Mat3x2::IDENTITY.max_scaling() - 1.0).abs() < 1e-6);
        assert!((Mat3x2::scale(Vec2::splat(3.0)).max_scaling() - 3.0).abs() < 1e-5);
        let rotated = Mat3x2::rotate(0.7) * Mat3x2::scale(Vec2::splat(2.0));
        assert!(rotated.max_scaling() > 0.0);
    }

    #[test]
    fn test_rotate_quarter_turn_is_clockwise_on_screen() {
        let m = Mat3x2::rotate(std::f32::consts::FRAC_PI_2);
        assert!(approx(m.transform_point(Vec2::new(1.0, 0.0)), Vec2::new(0.0, 1.0)));
    }

    #[test]
    fn test_glam_round_trip() {
        let m = Mat3x2::rotate(0.3) * Mat3x2::translate(Vec2::new(5.0, -2.0));
        let affine: glam::Affine2 = m.into();
        let p = Vec2::new(2.0, 7.0);
        assert!(approx(affine.transform_point2(p), m.transform_point(p)));
        assert_eq!(Mat3x2::from(affine), m);
    }

    #[test]
    fn test_row_layout_matches_affine_columns() {
        let m = Mat3x2::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        assert_eq!(m.to_array(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let affine = m.affine();
        assert_eq!(affine.matrix2.x_axis, Vec2::new(1.0, 2.0));
        assert_eq!(affine.matrix2.y_axis, Vec2::new(3.0, 4.0));
        assert_eq!(affine.translation, Vec2::new(5.0, 6.0));
    }

    #[test]
    fn test_product_is_row_vector_order() {
        let a = Mat3x2::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        let b = Mat3x2::new(-1.0, 0.5, 2.0, 1.0, 3.0, -4.0);
        // p * (a * b) == (p * a) * b
        let p = Vec2::new(0.25, -3.0);
        assert!(approx((a * b).transform_point(p), b.transform_point(a.transform_point(p))));
        assert_eq!((a * b).to_array(), [3.0, 2.5, 5.0, 5.5, 10.0, 4.5]);
    }

    #[test]
    fn test_scale_at_keeps_center_fixed() {
        let center = Vec2::new(40.0, 30.0);
        let m = Mat3x2::scale_at(Vec2::new(2.0, 3.0), center);
        assert!(approx(m.transform_point(center), center));
        assert!(approx(m.transform_point(Vec2::new(41.0, 31.0)), Vec2::new(42.0, 33.0)));
    }
}
