//! Neighbourhood offset systems (N4/N8/N16/N32 in 2D, N6/N18/N26/N98 in 3D).
//!
//! Each symbol maps deterministically to an ordered table of integer
//! displacement vectors: the shortest primitive offsets, sorted by squared
//! length and then lexicographically, emitted as `d, -d` pairs so that the
//! opposite of direction `i` is `i ^ 1`. Collinear duplicates (offsets that
//! are integer multiples of a shorter one) never appear; this is what trims
//! the 5x5x5 box of N98 down to 98 directions.

use crate::error::SegError;

/// Ordered displacement table for a regular grid neighbourhood.
///
/// Invariants:
/// - `offsets.len()` is even; `offsets[i ^ 1] == -offsets[i]`.
/// - Offsets use the array axis order (axis 0 slowest); in 2D the third
///   component is zero.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Neighborhood {
    symbol: &'static str,
    dim: usize,
    offsets: Vec<[i64; 3]>,
}

impl Neighborhood {
    /// Build the offset table for a neighbourhood symbol.
    pub fn from_symbol(symbol: &str) -> Result<Self, SegError> {
        let (name, dim, max_len2) = match symbol {
            "N4" => ("N4", 2, 1),
            "N8" => ("N8", 2, 2),
            "N16" => ("N16", 2, 5),
            "N32" => ("N32", 2, 13),
            "N6" => ("N6", 3, 1),
            "N18" => ("N18", 3, 2),
            "N26" => ("N26", 3, 3),
            "N98" => ("N98", 3, 12),
            other => return Err(SegError::UnsupportedNeighbourhood(other.to_string())),
        };
        let radius = if max_len2 > 3 { if dim == 2 { 3 } else { 2 } } else { 1 };
        let reps = primitive_representatives(dim, radius, max_len2);
        let mut offsets = Vec::with_capacity(reps.len() * 2);
        for d in reps {
            offsets.push(d);
            offsets.push([-d[0], -d[1], -d[2]]);
        }
        Ok(Self {
            symbol: name,
            dim,
            offsets,
        })
    }

    #[inline]
    pub fn symbol(&self) -> &'static str {
        self.symbol
    }
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }
    /// Number of directions (twice the number of ± pairs).
    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
    #[inline]
    pub fn offsets(&self) -> &[[i64; 3]] {
        &self.offsets
    }
    #[inline]
    pub fn offset(&self, i: usize) -> [i64; 3] {
        self.offsets[i]
    }
    /// Index of the opposite direction.
    #[inline]
    pub fn opposite(i: usize) -> usize {
        i ^ 1
    }

    /// Euclidean length of direction `i` under per-axis spacing 1.
    #[inline]
    pub fn grid_len(&self, i: usize) -> f64 {
        let d = self.offsets[i];
        ((d[0] * d[0] + d[1] * d[1] + d[2] * d[2]) as f64).sqrt()
    }

    /// Table with arbitrary (still ±-paired) offsets, for exercising
    /// direction-order invariance.
    #[cfg(test)]
    pub(crate) fn from_offsets(dim: usize, offsets: Vec<[i64; 3]>) -> Self {
        assert!(offsets.len() % 2 == 0);
        for i in (0..offsets.len()).step_by(2) {
            let d = offsets[i];
            assert_eq!(offsets[i + 1], [-d[0], -d[1], -d[2]]);
        }
        Self {
            symbol: "custom",
            dim,
            offsets,
        }
    }
}

/// Representatives of all ± pairs: primitive vectors with the first nonzero
/// component positive, squared length <= `max_len2`, sorted by
/// (squared length, lexicographic order).
fn primitive_representatives(dim: usize, radius: i64, max_len2: i64) -> Vec<[i64; 3]> {
    let mut reps = Vec::new();
    let zr = if dim == 3 { radius } else { 0 };
    for dz in -zr..=zr {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let d = [dx, dy, dz];
                if d == [0, 0, 0] {
                    continue;
                }
                let len2 = d[0] * d[0] + d[1] * d[1] + d[2] * d[2];
                if len2 > max_len2 {
                    continue;
                }
                if !is_representative(&d) || !is_primitive(&d) {
                    continue;
                }
                reps.push(d);
            }
        }
    }
    reps.sort_by_key(|d| {
        let len2 = d[0] * d[0] + d[1] * d[1] + d[2] * d[2];
        (len2, d[0], d[1], d[2])
    });
    reps
}

/// First nonzero component positive (picks one of each ± pair).
fn is_representative(d: &[i64; 3]) -> bool {
    for &c in d {
        if c != 0 {
            return c > 0;
        }
    }
    false
}

/// No shorter collinear offset exists (gcd of components is 1).
fn is_primitive(d: &[i64; 3]) -> bool {
    let mut g = 0i64;
    for &c in d {
        g = gcd(g, c.abs());
    }
    g == 1
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}
