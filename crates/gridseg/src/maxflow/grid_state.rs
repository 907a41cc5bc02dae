//! Shared grid storage for the max-flow back-ends.
//!
//! One residual table indexed `node * m + dir`; the reverse of `(v, i)` is
//! `(v + d_i, i ^ 1)`. Neighbour steps combine a precomputed linear delta
//! with a per-axis range test, so no adjacency lists are stored.

use crate::error::SegError;
use crate::grid::Neighborhood;
use crate::Real;

#[derive(Clone, Debug)]
pub(crate) struct GridState<T> {
    pub shape: Vec<usize>,
    pub strides: Vec<usize>,
    pub offsets: Vec<[i64; 3]>,
    /// Linear index delta per direction.
    pub deltas: Vec<i64>,
    /// Direction count.
    pub m: usize,
    /// Node count.
    pub n: usize,
    /// Forward residuals, `n * m` entries.
    pub rc: Vec<T>,
}

impl<T> Default for GridState<T> {
    fn default() -> Self {
        Self {
            shape: Vec::new(),
            strides: Vec::new(),
            offsets: Vec::new(),
            deltas: Vec::new(),
            m: 0,
            n: 0,
            rc: Vec::new(),
        }
    }
}

impl<T: Real> GridState<T> {
    pub(crate) fn init(&mut self, shape: &[usize], nbh: &Neighborhood) -> Result<(), SegError> {
        if shape.len() != nbh.dim() {
            return Err(SegError::arg(format!(
                "{}-D shape with a {}-D neighbourhood",
                shape.len(),
                nbh.dim()
            )));
        }
        if shape.iter().any(|&s| s == 0) {
            return Err(SegError::arg("grid shape has a zero-length axis"));
        }
        let dim = shape.len();
        let mut strides = vec![1usize; dim];
        for a in (0..dim - 1).rev() {
            strides[a] = strides[a + 1] * shape[a + 1];
        }
        let n: usize = shape.iter().product();
        let m = nbh.len();
        let deltas = nbh
            .offsets()
            .iter()
            .map(|d| {
                (0..dim)
                    .map(|a| d[a] * strides[a] as i64)
                    .sum::<i64>()
            })
            .collect();
        self.shape = shape.to_vec();
        self.strides = strides;
        self.offsets = nbh.offsets().to_vec();
        self.deltas = deltas;
        self.m = m;
        self.n = n;
        self.rc.clear();
        self.rc.resize(n * m, T::zero());
        Ok(())
    }

    /// Neighbour of `v` along direction `dir`, or `None` past the grid edge.
    #[inline]
    pub(crate) fn neighbor(&self, v: usize, dir: usize) -> Option<usize> {
        let d = self.offsets[dir];
        let mut rem = v;
        for a in 0..self.shape.len() {
            let c = (rem / self.strides[a]) as i64;
            rem %= self.strides[a];
            let nc = c + d[a];
            if nc < 0 || nc >= self.shape[a] as i64 {
                return None;
            }
        }
        Some((v as i64 + self.deltas[dir]) as usize)
    }

    #[inline]
    pub(crate) fn edge(&self, v: usize, dir: usize) -> usize {
        v * self.m + dir
    }
}
