//! Golden-angle (Fibonacci) point distribution on the sphere.

use std::f64::consts::PI;

use glam::DVec3;

use super::coords::SpherePoint;

/// Fraction of `π` excluded around each pole.
///
/// Points closer than `0.05π` to a pole are dropped so that the `1 / sin θ`
/// factor in longitudinal derivatives stays bounded.
pub const POLAR_CAP_FRACTION: f64 = 0.05;

/// Generates up to `count` quasi-uniform sample points on the sphere.
///
/// Points are laid out on a golden-angle spiral running from `y = 1` down to
/// `y = -1`, then every point inside either polar cap is discarded, so the
/// result may be shorter than `count`. The output is fully deterministic.
///
/// # Arguments
/// * `count` - Number of spiral points generated before polar exclusion
pub fn fibonacci_sphere(count: usize) -> Vec<SpherePoint> {
    spiral_vectors(count)
        .map(SpherePoint::from_spiral)
        .filter(|p| p.outside_polar_caps(POLAR_CAP_FRACTION))
        .collect()
}

/// Raw spiral positions on the unit sphere, before polar exclusion.
fn spiral_vectors(count: usize) -> impl Iterator<Item = DVec3> {
    let golden_angle = PI * (3.0 - 5.0_f64.sqrt());
    let denom = count.saturating_sub(1).max(1) as f64;

    (0..count).map(move |i| {
        // y runs from 1 to -1
        let y = 1.0 - (i as f64 / denom) * 2.0;
        let radius = (1.0 - y * y).max(0.0).sqrt();
        let golden = golden_angle * i as f64;
        DVec3::new(golden.cos() * radius, y, golden.sin() * radius)
    })
}

impl SpherePoint {
    /// Maps a spiral position to `(lon, colat)`.
    ///
    /// The spiral is built around the Y axis while colatitude is read from Z,
    /// and longitude is shifted by `π` into `[0, 2π]`.
    fn from_spiral(p: DVec3) -> Self {
        let colat = p.z.clamp(-1.0, 1.0).acos();
        let lon = p.y.atan2(p.x) + PI;
        Self { lon, colat }
    }
}
