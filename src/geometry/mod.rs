//! Sphere geometry module.
//!
//! Provides the `(longitude, colatitude)` coordinate convention and the
//! Fibonacci sampler that places the model's physics points.

mod coords;
mod fibonacci;

pub use coords::{SpherePoint, d_dphi, d_dtheta, linspace, unit_vector};
pub use fibonacci::{POLAR_CAP_FRACTION, fibonacci_sphere};
