//! Piecewise-constant Mumford–Shah via alpha-expansion.
//!
//! Energy: `sum_v lambda[L(v)] (I(v) - c[L(v)])^2 + sum_{(u,v)} w_uv [L(u)
//! != L(v)]`. Each expansion move fixes a candidate label alpha and lets
//! every node choose between its current label and alpha; the binary
//! subproblem is submodular, so it reduces to one grid min-cut. The Potts
//! pairwise table is folded into a single directed edge capacity plus
//! terminal terms (the classic reparameterization), and nodes already
//! labelled alpha are folded into their neighbours' terminals the same way
//! mask-fixed nodes are. A move is accepted only if the recomputed total
//! energy drops; rounds repeat until a full pass changes nothing, then a
//! Lloyd step re-estimates the class means.

use super::init;
use super::{require, validate_image, MultiPhaseOutput, RunStatus};
use crate::array::{Image, NdArray};
use crate::error::SegError;
use crate::grid::{crofton_weights, EdgeWeights, MetricTransform, Neighborhood};
use crate::maxflow::grid_state::GridState;
use crate::maxflow::{make_engine, MaxFlowEngine, MaxFlowSelector, Terminal};
use crate::{real, Real};

/// Parameters of the multi-label driver.
#[derive(Clone, Debug)]
pub struct MumfordShahParams<T> {
    /// Number of labels, in (1, 255).
    pub k: usize,
    /// Data weight: one entry shared by every class, or one entry per class.
    pub lambda: Vec<T>,
    /// Outer-loop threshold on the total mean movement.
    pub convergence: T,
    pub max_iter: u32,
    pub neighborhood: String,
    pub solver: MaxFlowSelector,
    pub transform: MetricTransform<T>,
}

impl<T: Real> Default for MumfordShahParams<T> {
    fn default() -> Self {
        Self {
            k: 2,
            lambda: vec![T::one()],
            convergence: crate::real(1e-3),
            max_iter: 50,
            neighborhood: "N8".to_string(),
            solver: MaxFlowSelector::GridKohli,
            transform: MetricTransform::Identity,
        }
    }
}

/// Run the alpha-expansion fixed-point loop.
pub fn mumford_shah<T: Real>(
    image: &Image<T>,
    params: &MumfordShahParams<T>,
) -> Result<MultiPhaseOutput<T>, SegError> {
    validate_image(image)?;
    require(params.k > 1 && params.k < 255, "k must lie in (1, 255)")?;
    require(
        params.lambda.len() == 1 || params.lambda.len() == params.k,
        "lambda must be a scalar or one entry per class",
    )?;
    require(
        params.lambda.iter().all(|&l| l > T::zero()),
        "lambda must be positive",
    )?;
    require(params.max_iter > 0, "max_iter must be positive")?;
    require(
        params.convergence >= T::zero(),
        "convergence must be non-negative",
    )?;
    let nbh = Neighborhood::from_symbol(&params.neighborhood)?;
    require(
        nbh.dim() == image.ndim(),
        "neighbourhood dimensionality does not match the image",
    )?;
    let k = params.k;
    let lam: Vec<T> = if params.lambda.len() == 1 {
        vec![params.lambda[0]; k]
    } else {
        params.lambda.clone()
    };
    let weights = crofton_weights(&nbh, &image.spacing, &params.transform)?;
    let mut geo = GridState::<T>::default();
    geo.init(image.shape(), &nbh)?;

    let (mut means, mut labels, init_degenerate) = init::lloyd_kmeans(image, k, &lam, 50);
    let mut engine = make_engine::<T>(params.solver);
    let mut energy = ms_energy(image, &geo, &weights, &labels, &means, &lam);
    if init_degenerate {
        tracing::debug!("k-means initialization left an empty class");
        return Ok(MultiPhaseOutput {
            labels,
            energy,
            iterations: 0,
            means,
            status: RunStatus::Degenerate,
        });
    }

    let mut status = RunStatus::MaxIterReached;
    let mut iterations = 0;
    'outer: for iter in 1..=params.max_iter {
        iterations = iter;
        // Expansion rounds: one pass over every alpha, repeated until a full
        // round changes nothing.
        let mut rounds = 0;
        loop {
            rounds += 1;
            let mut changed = false;
            for alpha in 0..k as u8 {
                if let Some(new_energy) = try_expansion(
                    engine.as_mut(),
                    image,
                    &geo,
                    &weights,
                    &nbh,
                    &mut labels,
                    &means,
                    &lam,
                    alpha,
                    energy,
                )? {
                    debug_assert!(new_energy <= energy + real::<T>(1e-9));
                    energy = new_energy;
                    changed = true;
                }
            }
            if !changed || rounds >= params.max_iter {
                break;
            }
        }
        // Lloyd step on the class means.
        let mut sum = vec![T::zero(); k];
        let mut count = vec![0usize; k];
        for (v, &x) in image.data.as_slice().iter().enumerate() {
            let l = labels.as_slice()[v] as usize;
            sum[l] += x;
            count[l] += 1;
        }
        let mut delta = T::zero();
        for l in 0..k {
            if count[l] == 0 {
                tracing::debug!(iter, class = l, "mumford-shah class emptied");
                status = RunStatus::Degenerate;
                break 'outer;
            }
            let mean = sum[l] / real::<T>(count[l] as f64);
            delta += (mean - means[l]).abs();
            means[l] = mean;
        }
        energy = ms_energy(image, &geo, &weights, &labels, &means, &lam);
        tracing::debug!(iter, delta = %delta, energy = %energy, "mumford-shah step");
        if delta < params.convergence {
            status = RunStatus::Converged;
            break;
        }
    }

    Ok(MultiPhaseOutput {
        labels,
        energy,
        iterations,
        means,
        status,
    })
}

/// One expansion move for label `alpha`. Returns the new (lower) energy when
/// the move is accepted, `None` when it is rejected or changes nothing.
#[allow(clippy::too_many_arguments)]
fn try_expansion<T: Real>(
    engine: &mut dyn MaxFlowEngine<T>,
    image: &Image<T>,
    geo: &GridState<T>,
    weights: &EdgeWeights<T>,
    nbh: &Neighborhood,
    labels: &mut NdArray<u8>,
    means: &[T],
    lam: &[T],
    alpha: u8,
    energy: T,
) -> Result<Option<T>, SegError> {
    let zero = T::zero();
    let n = geo.n;
    let data = image.data.as_slice();
    let l = labels.as_slice();

    engine.init(image.shape(), nbh)?;
    let mut cs = vec![zero; n];
    let mut ct = vec![zero; n];
    // Unaries: keeping the current label is paid on the sink side, taking
    // alpha on the source side.
    for v in 0..n {
        if l[v] == alpha {
            continue;
        }
        let keep = l[v] as usize;
        let dk = data[v] - means[keep];
        cs[v] += lam[keep] * dk * dk;
        let da = data[v] - means[alpha as usize];
        ct[v] += lam[alpha as usize] * da * da;
    }
    // Pairwise Potts terms, one undirected edge at a time.
    for v in 0..n {
        for i in (0..geo.m).step_by(2) {
            let Some(q) = geo.neighbor(v, i) else {
                continue;
            };
            let w = weights.w[i];
            match (l[v] == alpha, l[q] == alpha) {
                (true, true) => {}
                (true, false) => cs[q] += w,
                (false, true) => cs[v] += w,
                (false, false) => {
                    // A = cost of both keeping, kappa the submodular residue.
                    let same = l[v] == l[q];
                    if same {
                        ct[v] += w;
                    }
                    cs[q] += w;
                    let kappa = if same { w + w } else { w };
                    engine.set_edge_cap(q, i ^ 1, kappa);
                }
            }
        }
    }
    for v in 0..n {
        if l[v] == alpha {
            engine.set_terminal_caps(v, zero, zero);
        } else {
            engine.set_terminal_caps(v, cs[v], ct[v]);
        }
    }
    let hint = vec![0u8; n];
    engine.set_initial_labelling(&hint);
    let _flow = engine.compute();

    let mut proposal = labels.clone();
    let mut changed = 0usize;
    for v in 0..n {
        if l[v] == alpha {
            continue;
        }
        if engine.terminal_of(v) == Terminal::Source {
            proposal.as_mut_slice()[v] = alpha;
            changed += 1;
        }
    }
    if changed == 0 {
        return Ok(None);
    }
    let new_energy = ms_energy(image, geo, weights, &proposal, means, lam);
    if new_energy < energy {
        *labels = proposal;
        Ok(Some(new_energy))
    } else {
        Ok(None)
    }
}

/// Total piecewise-constant Mumford–Shah energy of a labelling.
fn ms_energy<T: Real>(
    image: &Image<T>,
    geo: &GridState<T>,
    weights: &EdgeWeights<T>,
    labels: &NdArray<u8>,
    means: &[T],
    lam: &[T],
) -> T {
    let data = image.data.as_slice();
    let l = labels.as_slice();
    let mut total = T::zero();
    for v in 0..geo.n {
        let c = l[v] as usize;
        let d = data[v] - means[c];
        total += lam[c] * d * d;
        for i in (0..geo.m).step_by(2) {
            if let Some(q) = geo.neighbor(v, i) {
                if l[v] != l[q] {
                    total += weights.w[i];
                }
            }
        }
    }
    total
}
