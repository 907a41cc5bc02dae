//! Cauchy–Crofton edge weights via a hyperspherical Voronoi partition.
//!
//! For direction `d_i` the weight is
//!
//! ```text
//! w_i = |det A| * phi_i / (rho_i * K_N),    K_2 = 2, K_3 = pi
//! ```
//!
//! with `A` the effective linear transform (Riemannian transform times
//! diag(spacing)), `rho_i = |A d_i|`, and `phi_i` the solid-angle share of
//! the transformed unit direction in a Voronoi partition of the sphere over
//! the whole direction set. In 2D the partition is exact (angular sort); in
//! 3D it is approximated by assigning an area-preserving Fibonacci lattice
//! of sphere samples to their nearest direction, then symmetrizing so that
//! `w(d) == w(-d)` holds exactly.
//!
//! All internal arithmetic is `f64`; the finished weights are converted to
//! the caller's scalar once.

use nalgebra::{Matrix2, Matrix3, Vector2, Vector3};

use super::cfg::{GOLDEN_ANGLE, SPHERE_SAMPLES};
use super::neighborhood::Neighborhood;
use crate::error::SegError;
use crate::{real, to_f64, Real};

/// Optional Riemannian metric transform (symmetric positive definite).
#[derive(Clone, Debug)]
pub enum MetricTransform<T> {
    /// Euclidean metric (identity transform).
    Identity,
    /// 2D linear transform applied to every displacement.
    Linear2(Matrix2<T>),
    /// 3D linear transform applied to every displacement.
    Linear3(Matrix3<T>),
}

impl<T> Default for MetricTransform<T> {
    fn default() -> Self {
        MetricTransform::Identity
    }
}

/// Per-direction boundary weights; `w[i] == w[i ^ 1]`.
#[derive(Clone, Debug)]
pub struct EdgeWeights<T> {
    pub w: Vec<T>,
}

impl<T: Real> EdgeWeights<T> {
    #[inline]
    pub fn len(&self) -> usize {
        self.w.len()
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.w.is_empty()
    }
}

/// Compute Cauchy–Crofton weights for a neighbourhood under per-axis spacing
/// and an optional metric transform. Precompute once per (neighbourhood,
/// metric); the result is reused across every max-flow call.
pub fn crofton_weights<T: Real>(
    nbh: &Neighborhood,
    spacing: &[T],
    transform: &MetricTransform<T>,
) -> Result<EdgeWeights<T>, SegError> {
    if spacing.len() != nbh.dim() {
        return Err(SegError::arg(format!(
            "spacing has {} entries for a {}-D neighbourhood",
            spacing.len(),
            nbh.dim()
        )));
    }
    let sp: Vec<f64> = spacing.iter().map(|&s| to_f64(s)).collect();
    if sp.iter().any(|&s| !(s > 0.0)) {
        return Err(SegError::arg("spacing entries must be positive"));
    }
    let w64 = match (nbh.dim(), transform) {
        (2, MetricTransform::Identity) => weights_2d(nbh, &sp, &Matrix2::identity()),
        (2, MetricTransform::Linear2(m)) => weights_2d(nbh, &sp, &matrix2_f64(m)),
        (3, MetricTransform::Identity) => weights_3d(nbh, &sp, &Matrix3::identity()),
        (3, MetricTransform::Linear3(m)) => weights_3d(nbh, &sp, &matrix3_f64(m)),
        _ => {
            return Err(SegError::arg(
                "metric transform rank does not match the neighbourhood",
            ))
        }
    }?;
    Ok(EdgeWeights {
        w: w64.into_iter().map(real).collect(),
    })
}

fn matrix2_f64<T: Real>(m: &Matrix2<T>) -> Matrix2<f64> {
    Matrix2::from_fn(|r, c| to_f64(m[(r, c)]))
}

fn matrix3_f64<T: Real>(m: &Matrix3<T>) -> Matrix3<f64> {
    Matrix3::from_fn(|r, c| to_f64(m[(r, c)]))
}

/// Exact 2D partition: sort transformed directions by angle; each cell is
/// half the gap to either angular neighbour.
fn weights_2d(nbh: &Neighborhood, sp: &[f64], m: &Matrix2<f64>) -> Result<Vec<f64>, SegError> {
    let a = m * Matrix2::from_diagonal(&Vector2::new(sp[0], sp[1]));
    let det = a.determinant().abs();
    if !(det > 0.0) {
        return Err(SegError::arg("metric transform must be non-singular"));
    }
    let n = nbh.len();
    let mut rho = vec![0.0f64; n];
    let mut theta = vec![0.0f64; n];
    for i in 0..n {
        let d = nbh.offset(i);
        let v = a * Vector2::new(d[0] as f64, d[1] as f64);
        rho[i] = v.norm();
        theta[i] = v.y.atan2(v.x);
    }
    // Angular Voronoi: half gap to the previous plus half gap to the next.
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| theta[i].partial_cmp(&theta[j]).unwrap_or(std::cmp::Ordering::Equal));
    let tau = std::f64::consts::TAU;
    let mut phi = vec![0.0f64; n];
    for k in 0..n {
        let i = order[k];
        let prev = order[(k + n - 1) % n];
        let next = order[(k + 1) % n];
        let gap_prev = (theta[i] - theta[prev]).rem_euclid(tau);
        let gap_next = (theta[next] - theta[i]).rem_euclid(tau);
        phi[i] = 0.5 * (gap_prev + gap_next);
    }
    Ok((0..n).map(|i| det * phi[i] / (rho[i] * 2.0)).collect())
}

/// Approximate 3D partition: nearest-direction assignment of a Fibonacci
/// sphere lattice, symmetrized over ± pairs.
fn weights_3d(nbh: &Neighborhood, sp: &[f64], m: &Matrix3<f64>) -> Result<Vec<f64>, SegError> {
    let a = m * Matrix3::from_diagonal(&Vector3::new(sp[0], sp[1], sp[2]));
    let det = a.determinant().abs();
    if !(det > 0.0) {
        return Err(SegError::arg("metric transform must be non-singular"));
    }
    let n = nbh.len();
    let mut rho = vec![0.0f64; n];
    let mut unit = Vec::with_capacity(n);
    for i in 0..n {
        let d = nbh.offset(i);
        let v = a * Vector3::new(d[0] as f64, d[1] as f64, d[2] as f64);
        rho[i] = v.norm();
        unit.push(v / rho[i]);
    }
    let total = SPHERE_SAMPLES;
    let mut counts = vec![0u64; n];
    for s in 0..total {
        let z = 1.0 - 2.0 * (s as f64 + 0.5) / total as f64;
        let r = (1.0 - z * z).sqrt();
        let t = s as f64 * GOLDEN_ANGLE;
        let p = Vector3::new(r * t.cos(), r * t.sin(), z);
        let mut best = 0usize;
        let mut best_dot = f64::NEG_INFINITY;
        for (i, u) in unit.iter().enumerate() {
            let dot = u.dot(&p);
            if dot > best_dot {
                best_dot = dot;
                best = i;
            }
        }
        counts[best] += 1;
    }
    let sphere = 4.0 * std::f64::consts::PI;
    let raw: Vec<f64> = counts
        .iter()
        .map(|&c| sphere * c as f64 / total as f64)
        .collect();
    // Symmetrize: a direction and its opposite share the same cell area.
    let phi: Vec<f64> = (0..n).map(|i| 0.5 * (raw[i] + raw[i ^ 1])).collect();
    Ok((0..n)
        .map(|i| det * phi[i] / (rho[i] * std::f64::consts::PI))
        .collect())
}
