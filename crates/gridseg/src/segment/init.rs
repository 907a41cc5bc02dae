//! Initial statistics estimators: Gibou–Fedkiw two-mean (with a Gaussian
//! extension) and weighted Lloyd k-means on the 1-D intensity distribution.

use crate::array::{Image, NdArray};
use crate::{real, Real};

/// Floor for variance estimates; keeps the log-likelihood unaries finite on
/// (near-)constant regions.
const VAR_FLOOR: f64 = 1e-12;

/// Intensity range summary used by every initializer.
fn min_avg_max<T: Real>(image: &Image<T>) -> (T, T, T) {
    let data = image.data.as_slice();
    let mut lo = data[0];
    let mut hi = data[0];
    let mut sum = T::zero();
    for &x in data {
        lo = lo.min(x);
        hi = hi.max(x);
        sum += x;
    }
    (lo, sum / real::<T>(data.len() as f64), hi)
}

/// Gibou–Fedkiw weighted two-mean estimate.
///
/// Starts from `c1 = (min + avg) / 2`, `c2 = (avg + max) / 2` and iterates
/// the residual indicator `R = -l1 (I - c1)^2 + l2 (I - c2)^2`: nodes with
/// `R >= 0` re-estimate `c1`, the rest `c2`. An empty side keeps its
/// previous mean. Stops when `|dc1| + |dc2| < convergence` or after
/// `max_iter` sweeps.
pub fn gibou_fedkiw<T: Real>(
    image: &Image<T>,
    lambda1: T,
    lambda2: T,
    convergence: T,
    max_iter: u32,
) -> (T, T) {
    let (lo, avg, hi) = min_avg_max(image);
    let half = real::<T>(0.5);
    let mut c1 = (lo + avg) * half;
    let mut c2 = (avg + hi) * half;
    let data = image.data.as_slice();
    for _ in 0..max_iter {
        let mut sum1 = T::zero();
        let mut n1 = 0usize;
        let mut sum2 = T::zero();
        let mut n2 = 0usize;
        for &x in data {
            let r1 = x - c1;
            let r2 = x - c2;
            let r = -lambda1 * r1 * r1 + lambda2 * r2 * r2;
            if r >= T::zero() {
                sum1 += x;
                n1 += 1;
            } else {
                sum2 += x;
                n2 += 1;
            }
        }
        let new1 = if n1 > 0 { sum1 / real::<T>(n1 as f64) } else { c1 };
        let new2 = if n2 > 0 { sum2 / real::<T>(n2 as f64) } else { c2 };
        let delta = (new1 - c1).abs() + (new2 - c2).abs();
        c1 = new1;
        c2 = new2;
        if delta < convergence {
            break;
        }
    }
    (c1, c2)
}

/// Gibou–Fedkiw extended to per-region Gaussian statistics, for the
/// Rousson–Deriche driver. Returns `(c1, var1, c2, var2)`.
pub fn gibou_fedkiw_gaussian<T: Real>(image: &Image<T>, max_iter: u32) -> (T, T, T, T) {
    let (lo, avg, hi) = min_avg_max(image);
    let half = real::<T>(0.5);
    let mut c1 = (lo + avg) * half;
    let mut c2 = (avg + hi) * half;
    let data = image.data.as_slice();
    // Global variance as the starting spread of both regions.
    let mut global = T::zero();
    for &x in data {
        let d = x - avg;
        global += d * d;
    }
    global /= real::<T>(data.len() as f64);
    let floor = real::<T>(VAR_FLOOR);
    let mut v1 = global.max(floor);
    let mut v2 = v1;
    for _ in 0..max_iter {
        let mut sum = [T::zero(); 2];
        let mut sq = [T::zero(); 2];
        let mut n = [0usize; 2];
        for &x in data {
            let g1 = gaussian_cost(x, c1, v1);
            let g2 = gaussian_cost(x, c2, v2);
            let b = usize::from(g2 < g1);
            sum[b] += x;
            sq[b] += x * x;
            n[b] += 1;
        }
        let mut delta = T::zero();
        if n[0] > 0 {
            let cnt = real::<T>(n[0] as f64);
            let mean = sum[0] / cnt;
            delta += (mean - c1).abs();
            c1 = mean;
            v1 = (sq[0] / cnt - mean * mean).max(floor);
        }
        if n[1] > 0 {
            let cnt = real::<T>(n[1] as f64);
            let mean = sum[1] / cnt;
            delta += (mean - c2).abs();
            c2 = mean;
            v2 = (sq[1] / cnt - mean * mean).max(floor);
        }
        if delta == T::zero() {
            break;
        }
    }
    (c1, v1, c2, v2)
}

/// Negative Gaussian log-likelihood up to constants.
#[inline]
pub(crate) fn gaussian_cost<T: Real>(x: T, mean: T, var: T) -> T {
    let d = x - mean;
    let half = real::<T>(0.5);
    d * d / (real::<T>(2.0) * var) + half * var.ln()
}

/// Weighted Lloyd k-means on intensities. Class `l` charges
/// `lambda[l] * (I - c_l)^2`; means start spread evenly over the intensity
/// range. Returns the means, the final assignment, and whether a class went
/// empty along the way.
pub fn lloyd_kmeans<T: Real>(
    image: &Image<T>,
    k: usize,
    lambda: &[T],
    max_iter: u32,
) -> (Vec<T>, NdArray<u8>, bool) {
    debug_assert_eq!(lambda.len(), k);
    let (lo, _, hi) = min_avg_max(image);
    let span = hi - lo;
    let kf = real::<T>(k as f64);
    let mut means: Vec<T> = (0..k)
        .map(|l| lo + span * (real::<T>(l as f64) + real::<T>(0.5)) / kf)
        .collect();
    let data = image.data.as_slice();
    let mut labels = NdArray::filled(image.shape(), 0u8);
    let mut degenerate = false;
    for _ in 0..max_iter {
        let mut sum = vec![T::zero(); k];
        let mut n = vec![0usize; k];
        for (v, &x) in data.iter().enumerate() {
            let mut best = 0usize;
            let d0 = x - means[0];
            let mut best_cost = lambda[0] * d0 * d0;
            for (l, &c) in means.iter().enumerate().skip(1) {
                let d = x - c;
                let cost = lambda[l] * d * d;
                if cost < best_cost {
                    best_cost = cost;
                    best = l;
                }
            }
            labels.as_mut_slice()[v] = best as u8;
            sum[best] += x;
            n[best] += 1;
        }
        let mut delta = T::zero();
        for l in 0..k {
            if n[l] == 0 {
                degenerate = true;
                continue;
            }
            let mean = sum[l] / real::<T>(n[l] as f64);
            delta += (mean - means[l]).abs();
            means[l] = mean;
        }
        if delta == T::zero() {
            break;
        }
    }
    (means, labels, degenerate)
}
