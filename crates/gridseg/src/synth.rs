//! Deterministic synthetic images for tests, benches, and experiments.
//!
//! Every generator is seeded and reproducible; draws are plain `StdRng`
//! streams so a scenario can be replayed from its seed alone.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::array::{Image, NdArray};
use crate::{real, Real};

/// Two-intensity checkerboard (values 0 and 1).
pub fn checkerboard<T: Real>(shape: &[usize]) -> Image<T> {
    let mut data = NdArray::filled(shape, T::zero());
    let mut coords = vec![0usize; shape.len()];
    for lin in 0..data.len() {
        data.coords(lin, &mut coords);
        let parity: usize = coords.iter().sum();
        data.as_mut_slice()[lin] = if parity % 2 == 0 { T::zero() } else { T::one() };
    }
    Image::new(data)
}

/// Isotropic Gaussian blob `exp(-|x - c|^2 / (2 sigma^2))`.
pub fn gaussian_blob<T: Real>(shape: &[usize], center: &[f64], sigma: f64) -> Image<T> {
    let mut data = NdArray::filled(shape, T::zero());
    let mut coords = vec![0usize; shape.len()];
    for lin in 0..data.len() {
        data.coords(lin, &mut coords);
        let mut r2 = 0.0f64;
        for (a, &c) in coords.iter().enumerate() {
            let d = c as f64 - center[a];
            r2 += d * d;
        }
        data.as_mut_slice()[lin] = real((-r2 / (2.0 * sigma * sigma)).exp());
    }
    Image::new(data)
}

/// Piecewise-constant vertical bands of the given widths and means, with
/// additive Gaussian noise of standard deviation `noise_sd`.
pub fn banded_regions<T: Real>(
    rows: usize,
    widths: &[usize],
    means: &[f64],
    noise_sd: f64,
    seed: u64,
) -> Image<T> {
    assert_eq!(widths.len(), means.len());
    let cols: usize = widths.iter().sum();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = NdArray::filled(&[rows, cols], T::zero());
    for r in 0..rows {
        let mut c0 = 0usize;
        for (band, &w) in widths.iter().enumerate() {
            for c in c0..c0 + w {
                let noise = gaussian_sample(&mut rng) * noise_sd;
                *data.at_mut(&[r, c]) = real(means[band] + noise);
            }
            c0 += w;
        }
    }
    Image::new(data)
}

/// Uniform random intensities in [0, 1).
pub fn random_intensity<T: Real>(shape: &[usize], seed: u64) -> Image<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = NdArray::filled(shape, T::zero());
    for x in data.as_mut_slice() {
        *x = real(rng.gen::<f64>());
    }
    Image::new(data)
}

/// Box–Muller draw from N(0, 1).
fn gaussian_sample(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}
