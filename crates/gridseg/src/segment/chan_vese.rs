//! Chan–Vese two-phase driver.
//!
//! Energy: `l1 * sum_{bg} (I - c1)^2 + l2 * sum_{fg} (I - c2)^2 +
//! mu * Perimeter`. For fixed means the pairwise term is submodular and the
//! label set binary, so the exact minimizer is one min-cut; the outer loop
//! alternates cuts with mean re-estimation until the means settle.

use super::init;
use super::{
    binary_energy, cityblock_distance_to_boundary, is_fixed, load_boundary_caps,
    load_terminal_caps, region_means, require, validate_image, validate_mask, RunStatus,
    TwoPhaseOutput, MASK_BACKGROUND, MASK_FOREGROUND, MASK_UNKNOWN,
};
use crate::array::{Image, NdArray};
use crate::error::SegError;
use crate::grid::{crofton_weights, MetricTransform, Neighborhood};
use crate::maxflow::grid_state::GridState;
use crate::maxflow::{make_engine, MaxFlowSelector, Terminal};
use crate::Real;

/// Parameters of the two-phase driver.
#[derive(Clone, Debug)]
pub struct ChanVeseParams<T> {
    /// Data weight of the background region.
    pub lambda1: T,
    /// Data weight of the foreground region.
    pub lambda2: T,
    /// Boundary (perimeter) weight.
    pub mu: T,
    /// Outer-loop threshold on `|dc1| + |dc2|`.
    pub convergence: T,
    pub max_iter: u32,
    /// Neighbourhood symbol, e.g. "N8".
    pub neighborhood: String,
    /// Optional seed for the region means; `c1 < c2` is required.
    pub init_means: Option<(T, T)>,
    pub solver: MaxFlowSelector,
    pub transform: MetricTransform<T>,
}

impl<T: Real> Default for ChanVeseParams<T> {
    fn default() -> Self {
        Self {
            lambda1: T::one(),
            lambda2: T::one(),
            mu: T::one(),
            convergence: crate::real(1e-3),
            max_iter: 100,
            neighborhood: "N8".to_string(),
            init_means: None,
            solver: MaxFlowSelector::GridKohli,
            transform: MetricTransform::Identity,
        }
    }
}

/// Two-stage variant: a full solve on a sparse neighbourhood, then a denser
/// solve restricted to a band around the stage-one boundary.
#[derive(Clone, Debug)]
pub struct TwoStageParams<T> {
    pub base: ChanVeseParams<T>,
    /// Denser neighbourhood for the band stage, e.g. "N16".
    pub band_neighborhood: String,
    /// Cityblock radius of the band around the stage-one boundary.
    pub band_radius: u32,
}

/// Run the Chan–Vese fixed-point loop.
pub fn chan_vese<T: Real>(
    image: &Image<T>,
    params: &ChanVeseParams<T>,
    mask: Option<&NdArray<u8>>,
) -> Result<TwoPhaseOutput<T>, SegError> {
    validate(image, params, mask)?;
    if let Some((a, b)) = params.init_means {
        require(a < b, "c1 must be less than c2")?;
    }
    run(image, params, mask, params.init_means)
}

/// Two-stage Chan–Vese: sparse solve, band mask, dense solve.
pub fn chan_vese_two_stage<T: Real>(
    image: &Image<T>,
    params: &TwoStageParams<T>,
    mask: Option<&NdArray<u8>>,
) -> Result<TwoPhaseOutput<T>, SegError> {
    validate(image, &params.base, mask)?;
    require(params.band_radius > 0, "band radius must be positive")?;
    // The band neighbourhood must parse and match the image rank.
    let band_nbh = Neighborhood::from_symbol(&params.band_neighborhood)?;
    require(
        band_nbh.dim() == image.ndim(),
        "band neighbourhood dimensionality does not match the image",
    )?;

    let first = run(image, &params.base, mask, params.base.init_means)?;

    // Freeze everything beyond the band; user-fixed nodes stay fixed.
    let dist = cityblock_distance_to_boundary(&first.labels);
    let mut band = NdArray::filled(image.shape(), MASK_UNKNOWN);
    for v in 0..band.len() {
        let user = mask.map(|m| m.as_slice()[v]).unwrap_or(MASK_UNKNOWN);
        band.as_mut_slice()[v] = if user != MASK_UNKNOWN {
            user
        } else if dist.as_slice()[v] <= params.band_radius {
            MASK_UNKNOWN
        } else if first.labels.as_slice()[v] != 0 {
            MASK_FOREGROUND
        } else {
            MASK_BACKGROUND
        };
    }
    let mut second_params = params.base.clone();
    second_params.neighborhood = params.band_neighborhood.clone();
    let second = run(image, &second_params, Some(&band), Some((first.c1, first.c2)))?;
    Ok(TwoPhaseOutput {
        iterations: first.iterations + second.iterations,
        ..second
    })
}

fn validate<T: Real>(
    image: &Image<T>,
    params: &ChanVeseParams<T>,
    mask: Option<&NdArray<u8>>,
) -> Result<(), SegError> {
    validate_image(image)?;
    require(params.lambda1 > T::zero(), "lambda1 must be positive")?;
    require(params.lambda2 > T::zero(), "lambda2 must be positive")?;
    require(params.mu >= T::zero(), "mu must be non-negative")?;
    require(params.max_iter > 0, "max_iter must be positive")?;
    require(
        params.convergence >= T::zero(),
        "convergence must be non-negative",
    )?;
    if let Some(m) = mask {
        validate_mask(m, image.shape())?;
    }
    Ok(())
}

/// The fixed-point loop proper; `seed` overrides the Gibou–Fedkiw estimate.
fn run<T: Real>(
    image: &Image<T>,
    params: &ChanVeseParams<T>,
    mask: Option<&NdArray<u8>>,
    seed: Option<(T, T)>,
) -> Result<TwoPhaseOutput<T>, SegError> {
    let nbh = Neighborhood::from_symbol(&params.neighborhood)?;
    require(
        nbh.dim() == image.ndim(),
        "neighbourhood dimensionality does not match the image",
    )?;
    let weights = crofton_weights(&nbh, &image.spacing, &params.transform)?;
    let mut geo = GridState::<T>::default();
    geo.init(image.shape(), &nbh)?;

    let (mut c1, mut c2) = seed.unwrap_or_else(|| {
        init::gibou_fedkiw(image, params.lambda1, params.lambda2, params.convergence, 50)
    });

    let mut engine = make_engine::<T>(params.solver);
    engine.init(image.shape(), &nbh)?;
    load_boundary_caps(engine.as_mut(), &geo, &weights, params.mu, mask);

    let mut labels = NdArray::filled(image.shape(), 0u8);
    if let Some(mk) = mask {
        for v in 0..labels.len() {
            if mk.as_slice()[v] == MASK_FOREGROUND {
                labels.as_mut_slice()[v] = 1;
            }
        }
    }

    let data = image.data.as_slice();
    let l1 = params.lambda1;
    let l2 = params.lambda2;
    let mut status = RunStatus::MaxIterReached;
    let mut iterations = 0;
    for iter in 1..=params.max_iter {
        iterations = iter;
        let (a, b) = (c1, c2);
        load_terminal_caps(
            engine.as_mut(),
            &geo,
            &weights,
            params.mu,
            mask,
            |v| {
                let d = data[v] - a;
                l1 * d * d
            },
            |v| {
                let d = data[v] - b;
                l2 * d * d
            },
        );
        engine.set_initial_labelling(labels.as_slice());
        let _flow = engine.compute();
        for v in 0..geo.n {
            labels.as_mut_slice()[v] = if is_fixed(mask, v) {
                u8::from(mask.map(|m| m.as_slice()[v]) == Some(MASK_FOREGROUND))
            } else {
                u8::from(engine.terminal_of(v) == Terminal::Source)
            };
        }
        match region_means(image, &labels) {
            (Some(m1), Some(m2)) => {
                let delta = (m1 - c1).abs() + (m2 - c2).abs();
                c1 = m1;
                c2 = m2;
                tracing::debug!(iter, delta = %delta, c1 = %c1, c2 = %c2, "chan-vese step");
                if delta <= params.convergence {
                    status = RunStatus::Converged;
                    break;
                }
            }
            _ => {
                // One region emptied out; keep the previous statistics and
                // hand the partial labelling back.
                tracing::debug!(iter, "chan-vese region emptied");
                status = RunStatus::Degenerate;
                break;
            }
        }
    }

    let energy = binary_energy(&geo, &weights, params.mu, &labels, |v, l| {
        if l == 0 {
            let d = data[v] - c1;
            l1 * d * d
        } else {
            let d = data[v] - c2;
            l2 * d * d
        }
    });
    Ok(TwoPhaseOutput {
        labels,
        energy,
        iterations,
        c1,
        c2,
        status,
    })
}
