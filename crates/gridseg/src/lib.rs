//! Grid-based graph-cut energy minimization for image segmentation.
//!
//! An N-D image (N in {2, 3}) and a regional/boundary energy are reduced to
//! a sequence of s-t minimum cuts on a weighted grid graph: the max-flow
//! engines exploit grid regularity instead of adjacency lists, the
//! neighbourhood/metric layer turns cuts into a Cauchy–Crofton
//! discretization of boundary length, and the segmentation drivers iterate
//! statistics estimation and min-cuts to a fixed point.

pub mod array;
pub mod error;
pub mod grid;
pub mod maxflow;
pub mod segment;
pub mod synth;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Scalar used for intensities, capacities, energies, and tolerances.
/// One scalar type flows end to end (`f32` or `f64` in practice).
pub trait Real: nalgebra::RealField + Copy {}
impl<T: nalgebra::RealField + Copy> Real for T {}

/// Lift an `f64` constant into the working scalar type.
#[inline]
pub(crate) fn real<T: Real>(x: f64) -> T {
    nalgebra::convert(x)
}

/// Lower a working scalar to `f64` (lossless for `f32`/`f64`).
#[inline]
pub(crate) fn to_f64<T: Real>(x: T) -> f64 {
    nalgebra::try_convert(x).unwrap_or(f64::NAN)
}

/// Common exports for quick imports in callers.
pub mod prelude {
    pub use crate::array::{Image, NdArray};
    pub use crate::error::SegError;
    pub use crate::grid::{crofton_weights, EdgeWeights, MetricTransform, Neighborhood};
    pub use crate::maxflow::{make_engine, MaxFlowEngine, MaxFlowSelector, Terminal};
    pub use crate::segment::{
        chan_vese, chan_vese_two_stage, mumford_shah, rousson_deriche, ChanVeseParams,
        MumfordShahParams, RoussonDericheParams, RunStatus, TwoStageParams, MASK_BACKGROUND,
        MASK_FOREGROUND, MASK_UNKNOWN,
    };
    pub use crate::Real;
}
