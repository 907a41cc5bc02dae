//! Segmentation drivers: iterative fixed-point loops over grid min-cuts.
//!
//! Purpose
//! - Re-estimate region statistics, rebuild terminal capacities, and re-run
//!   max-flow until convergence (Chan–Vese, piecewise-constant Mumford–Shah
//!   via alpha-expansion, Rousson–Deriche).
//! - Shared here: mask folding, parameter validation, energy evaluation, and
//!   the cityblock distance transform the two-stage band variant needs.
//!
//! Failure semantics: validation errors return before any work; hitting
//! `max_iter` or a degenerate statistics update is reported as a status on
//! the result, with the partial labelling still returned.

mod chan_vese;
pub mod init;
mod mumford_shah;
mod rousson_deriche;

pub use chan_vese::{chan_vese, chan_vese_two_stage, ChanVeseParams, TwoStageParams};
pub use mumford_shah::{mumford_shah, MumfordShahParams};
pub use rousson_deriche::{rousson_deriche, GaussianOutput, RoussonDericheParams};

use crate::array::{Image, NdArray};
use crate::error::SegError;
use crate::grid::EdgeWeights;
use crate::maxflow::grid_state::GridState;
use crate::maxflow::MaxFlowEngine;
use crate::Real;

#[cfg(test)]
mod tests;

/// Mask value: the node is clamped to background.
pub const MASK_BACKGROUND: u8 = 1;
/// Mask value: the node is clamped to foreground.
pub const MASK_FOREGROUND: u8 = 2;
/// Mask value: the node is free and enters the graph.
pub const MASK_UNKNOWN: u8 = 3;

/// How an outer loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    /// The convergence threshold was met.
    Converged,
    /// `max_iter` elapsed first; the last labelling is returned.
    MaxIterReached,
    /// A statistics update hit an empty region (convergence error — the
    /// parameters or k may be wrong); the partial result is returned.
    Degenerate,
}

/// Result of a binary (two-phase) driver.
#[derive(Clone, Debug)]
pub struct TwoPhaseOutput<T> {
    pub labels: NdArray<u8>,
    pub energy: T,
    pub iterations: u32,
    pub c1: T,
    pub c2: T,
    pub status: RunStatus,
}

/// Result of the multi-label driver.
#[derive(Clone, Debug)]
pub struct MultiPhaseOutput<T> {
    pub labels: NdArray<u8>,
    pub energy: T,
    pub iterations: u32,
    pub means: Vec<T>,
    pub status: RunStatus,
}

pub(crate) fn require(cond: bool, msg: &str) -> Result<(), SegError> {
    if cond {
        Ok(())
    } else {
        Err(SegError::arg(msg))
    }
}

pub(crate) fn validate_image<T: Real>(image: &Image<T>) -> Result<(), SegError> {
    require(
        image.ndim() == 2 || image.ndim() == 3,
        "only 2-D and 3-D images are supported",
    )?;
    require(!image.data.is_empty(), "image has no elements")?;
    Ok(())
}

pub(crate) fn validate_mask(mask: &NdArray<u8>, shape: &[usize]) -> Result<(), SegError> {
    require(mask.shape() == shape, "mask and image shapes must match")?;
    require(
        mask.iter()
            .all(|&m| m == MASK_BACKGROUND || m == MASK_FOREGROUND || m == MASK_UNKNOWN),
        "mask values must be 1 (background), 2 (foreground), or 3 (unknown)",
    )?;
    Ok(())
}

#[inline]
pub(crate) fn is_fixed(mask: Option<&NdArray<u8>>, v: usize) -> bool {
    mask.is_some_and(|m| m.as_slice()[v] != MASK_UNKNOWN)
}

/// Load the boundary term: every edge between two UNKNOWN nodes carries
/// `scale * w_i`; edges touching a FIXED node are pruned (their influence is
/// folded into terminal capacities instead).
pub(crate) fn load_boundary_caps<T: Real>(
    engine: &mut dyn MaxFlowEngine<T>,
    geo: &GridState<T>,
    weights: &EdgeWeights<T>,
    scale: T,
    mask: Option<&NdArray<u8>>,
) {
    for v in 0..geo.n {
        let v_fixed = is_fixed(mask, v);
        for i in 0..geo.m {
            let Some(q) = geo.neighbor(v, i) else {
                continue;
            };
            let cap = if v_fixed || is_fixed(mask, q) {
                T::zero()
            } else {
                scale * weights.w[i]
            };
            engine.set_edge_cap(v, i, cap);
        }
    }
}

/// Load per-node terminal capacities for a binary subproblem.
///
/// `u0`/`u1` are the costs of labelling a node 0 (sink side) respectively 1
/// (source side); each pair is shifted so the smaller side is zero, which
/// keeps capacities non-negative even for log-likelihood unaries. FIXED
/// neighbours contribute `scale * w_i` once per direction, summed: a
/// foreground neighbour raises `c_s` (paid if the node ends background), a
/// background neighbour raises `c_t`.
pub(crate) fn load_terminal_caps<T: Real>(
    engine: &mut dyn MaxFlowEngine<T>,
    geo: &GridState<T>,
    weights: &EdgeWeights<T>,
    scale: T,
    mask: Option<&NdArray<u8>>,
    u0: impl Fn(usize) -> T,
    u1: impl Fn(usize) -> T,
) {
    let zero = T::zero();
    for v in 0..geo.n {
        if is_fixed(mask, v) {
            engine.set_terminal_caps(v, zero, zero);
            continue;
        }
        let a = u0(v);
        let b = u1(v);
        let shift = a.min(b);
        let mut cs = a - shift;
        let mut ct = b - shift;
        if let Some(mk) = mask {
            for i in 0..geo.m {
                let Some(q) = geo.neighbor(v, i) else {
                    continue;
                };
                match mk.as_slice()[q] {
                    MASK_FOREGROUND => cs += scale * weights.w[i],
                    MASK_BACKGROUND => ct += scale * weights.w[i],
                    _ => {}
                }
            }
        }
        engine.set_terminal_caps(v, cs, ct);
    }
}

/// Energy of a binary labelling: unary terms plus `scale` times the weighted
/// boundary (each undirected edge counted once via its even direction).
pub(crate) fn binary_energy<T: Real>(
    geo: &GridState<T>,
    weights: &EdgeWeights<T>,
    scale: T,
    labels: &NdArray<u8>,
    unary: impl Fn(usize, u8) -> T,
) -> T {
    let mut total = T::zero();
    let l = labels.as_slice();
    for v in 0..geo.n {
        total += unary(v, l[v]);
        for i in (0..geo.m).step_by(2) {
            if let Some(q) = geo.neighbor(v, i) {
                if l[v] != l[q] {
                    total += scale * weights.w[i];
                }
            }
        }
    }
    total
}

/// Mean intensity of each binary region; `None` for an empty region.
pub(crate) fn region_means<T: Real>(
    image: &Image<T>,
    labels: &NdArray<u8>,
) -> (Option<T>, Option<T>) {
    let mut sum = [T::zero(); 2];
    let mut count = [0usize; 2];
    let data = image.data.as_slice();
    let l = labels.as_slice();
    for v in 0..data.len() {
        let b = usize::from(l[v] != 0);
        sum[b] += data[v];
        count[b] += 1;
    }
    let mean = |b: usize| {
        (count[b] > 0).then(|| sum[b] / crate::real::<T>(count[b] as f64))
    };
    (mean(0), mean(1))
}

/// Cityblock distance to the nearest label boundary (two-pass chamfer).
/// Boundary nodes (any face neighbour with a different label) have distance
/// zero.
pub(crate) fn cityblock_distance_to_boundary(labels: &NdArray<u8>) -> NdArray<u32> {
    let shape = labels.shape().to_vec();
    let dim = shape.len();
    let strides = labels.strides().to_vec();
    let big = u32::MAX / 2;
    let mut dist = NdArray::filled(&shape, big);
    let l = labels.as_slice();
    let mut coords = vec![0usize; dim];
    // Seed: boundary nodes.
    for v in 0..labels.len() {
        labels.coords(v, &mut coords);
        let mut on_boundary = false;
        for a in 0..dim {
            if coords[a] + 1 < shape[a] && l[v] != l[v + strides[a]] {
                on_boundary = true;
            }
            if coords[a] > 0 && l[v] != l[v - strides[a]] {
                on_boundary = true;
            }
        }
        if on_boundary {
            dist.as_mut_slice()[v] = 0;
        }
    }
    // Forward pass (predecessors along each axis), then backward.
    for v in 0..labels.len() {
        labels.coords(v, &mut coords);
        for a in 0..dim {
            if coords[a] > 0 {
                let d = dist.as_slice()[v - strides[a]] + 1;
                if d < dist.as_slice()[v] {
                    dist.as_mut_slice()[v] = d;
                }
            }
        }
    }
    for v in (0..labels.len()).rev() {
        labels.coords(v, &mut coords);
        for a in 0..dim {
            if coords[a] + 1 < shape[a] {
                let d = dist.as_slice()[v + strides[a]] + 1;
                if d < dist.as_mut_slice()[v] {
                    dist.as_mut_slice()[v] = d;
                }
            }
        }
    }
    dist
}
