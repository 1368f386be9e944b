//! Spherical coordinate conventions shared by the sampler, the spline and the physics.
//!
//! Positions are `(longitude φ, colatitude θ)` in radians. Colatitude is measured
//! from the +Z pole, so the unit vector is
//! `(sin θ cos φ, sin θ sin φ, cos θ)`.

use std::f64::consts::PI;

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// A location on the sphere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpherePoint {
    /// Longitude (azimuth) in radians, nominally in `[0, 2π]`.
    pub lon: f64,
    /// Colatitude in radians, `0` at the north pole and `π` at the south pole.
    pub colat: f64,
}

impl SpherePoint {
    /// Creates a new point from longitude and colatitude.
    pub fn new(lon: f64, colat: f64) -> Self {
        Self { lon, colat }
    }

    /// Returns true if the point lies strictly between the two polar caps of
    /// angular size `cap_fraction * π`.
    pub fn outside_polar_caps(self, cap_fraction: f64) -> bool {
        cap_fraction * PI < self.colat && self.colat < (1.0 - cap_fraction) * PI
    }
}

/// Unit vector for colatitude `theta` and longitude `phi`.
#[inline]
pub fn unit_vector(theta: f64, phi: f64) -> DVec3 {
    let (st, ct) = theta.sin_cos();
    let (sp, cp) = phi.sin_cos();
    DVec3::new(st * cp, st * sp, ct)
}

/// `∂x/∂θ` of [`unit_vector`]; points south with unit length.
#[inline]
pub fn d_dtheta(theta: f64, phi: f64) -> DVec3 {
    let (st, ct) = theta.sin_cos();
    let (sp, cp) = phi.sin_cos();
    DVec3::new(ct * cp, ct * sp, -st)
}

/// `∂x/∂φ` of [`unit_vector`]; points east with length `sin θ`.
#[inline]
pub fn d_dphi(theta: f64, phi: f64) -> DVec3 {
    let (st, _) = theta.sin_cos();
    let (sp, cp) = phi.sin_cos();
    DVec3::new(-st * sp, st * cp, 0.0)
}

/// Evenly spaced samples over `[start, end]`, both ends included.
///
/// A single sample sits at `start`.
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let last = count - 1;
            let step = (end - start) / last as f64;
            (0..count)
                .map(|i| if i == last { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::TAU;

    #[test]
    fn unit_vector_has_unit_length() {
        for &(theta, phi) in &[(0.3, 0.1), (1.2, 4.0), (2.9, 6.1)] {
            assert_relative_eq!(unit_vector(theta, phi).length(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn polar_caps_exclude_points_near_either_pole() {
        assert!(SpherePoint::new(1.0, 1.5).outside_polar_caps(0.05));
        assert!(!SpherePoint::new(1.0, 0.1).outside_polar_caps(0.05));
        assert!(!SpherePoint::new(1.0, PI - 0.1).outside_polar_caps(0.05));
    }

    #[test]
    fn tangents_are_orthogonal_to_position() {
        let (theta, phi) = (0.8, 2.5);
        let x = unit_vector(theta, phi);
        assert!(x.dot(d_dtheta(theta, phi)).abs() < 1e-12);
        assert!(x.dot(d_dphi(theta, phi)).abs() < 1e-12);
        assert_relative_eq!(d_dphi(theta, phi).length(), theta.sin(), epsilon = 1e-12);
    }

    #[test]
    fn linspace_includes_both_ends() {
        let v = linspace(0.0, PI, 5);
        assert_eq!(v.len(), 5);
        assert_eq!(v[0], 0.0);
        assert_eq!(v[4], PI);
        assert_eq!(linspace(0.0, TAU, 10)[9], TAU);
        assert_eq!(linspace(1.0, 2.0, 1), vec![1.0]);
        assert!(linspace(1.0, 2.0, 0).is_empty());
    }
}
