//! Scattered-data smoothing splines on the sphere.
//!
//! A [`SplineSystem`] factorises the smoothing problem for a fixed set of
//! sample locations; [`SplineSystem::fit`] turns one set of values into a
//! [`FittedField`] that can be evaluated, together with its first angular
//! derivatives, anywhere on the sphere.

mod field;
mod kernel;
mod system;

pub use field::{EvalError, EvalMode, FittedField};
pub use system::{DEFAULT_SMOOTHING, FitError, MIN_SAMPLES, SplineSystem, fit};
