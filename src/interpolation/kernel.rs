//! Radial kernel and affine basis of the spherical spline.
//!
//! The sphere is embedded in R³ and distances are chord lengths. The cubic
//! polyharmonic kernel `r³` is conditionally positive definite of order two
//! there, so it is paired with the affine space `{1, x, y, z}`.

use glam::DVec3;

/// Number of affine basis terms.
pub const AFFINE_TERMS: usize = 4;

/// Kernel value for chord distance `r`.
#[inline]
pub fn kernel(r: f64) -> f64 {
    r * r * r
}

/// Ambient gradient of `kernel(|x - center|)` with respect to `x`.
///
/// `d/dx r³ = 3 r² · (x - c) / r = 3 r (x - c)`, which is smooth at `r = 0`.
#[inline]
pub fn kernel_gradient(x: DVec3, center: DVec3) -> DVec3 {
    let d = x - center;
    3.0 * d.length() * d
}

/// Affine basis evaluated at `x`.
#[inline]
pub fn affine_basis(x: DVec3) -> [f64; AFFINE_TERMS] {
    [1.0, x.x, x.y, x.z]
}
