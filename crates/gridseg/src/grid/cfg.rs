//! Fixed constants for the metric discretization (internal).
//!
//! Policy
//! - Defaults are fixed constants to avoid tolerance juggling during normal
//!   development; if a caller ever needs to tune these we can surface a small
//!   config without touching call sites broadly.

/// Samples of the Fibonacci sphere lattice used to approximate the
/// hyperspherical Voronoi partition in 3D. The lattice is area-preserving,
/// so each sample stands for the same share of the sphere.
pub(crate) const SPHERE_SAMPLES: usize = 200_000;

/// Golden-angle increment of the Fibonacci lattice, in radians.
pub(crate) const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;
