//! Grid s-t max-flow engines.
//!
//! Purpose
//! - Solve minimum cuts on regular N-D grid graphs where every voxel is a
//!   node and edges are given by a fixed neighbourhood offset table. Grid
//!   regularity replaces adjacency lists: the reverse of the residual stored
//!   at `(v, i)` lives at `(v + d_i, i ^ 1)`.
//!
//! Back-ends
//! - `GRD-KO`: Boykov–Kolmogorov augmenting paths with Kohli dynamic reuse of
//!   the search trees across terminal-capacity updates.
//! - `GRD-PRF` / `GRD-PRH`: push-relabel with a FIFO queue or highest-level
//!   buckets; these rebuild per compute.
//!
//! Drivers talk to an engine only through [`MaxFlowEngine`]; the back-end is
//! chosen by symbol at driver entry.

mod grid_bk;
pub(crate) mod grid_state;
mod push_relabel;

pub use grid_bk::GridKohli;
pub use push_relabel::GridPushRelabel;

use crate::error::SegError;
use crate::grid::Neighborhood;
use crate::Real;

#[cfg(test)]
mod tests;

/// Side of the cut a node ends on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Terminal {
    Source,
    Sink,
}

/// Capability set every grid max-flow back-end provides.
///
/// Call order: `init`, then `set_edge_cap` for every in-bounds (node,
/// direction), then `set_terminal_caps` per node, then `compute`. Engines
/// with dynamic reuse accept further `set_terminal_caps` + `compute` rounds
/// against the same edge structure; `init` always starts from scratch.
pub trait MaxFlowEngine<T: Real> {
    /// Allocate (or reset) state for a grid of the given shape and
    /// neighbourhood. All graph memory is acquired here and reused by every
    /// subsequent call.
    fn init(&mut self, shape: &[usize], nbh: &Neighborhood) -> Result<(), SegError>;

    /// Set the source and sink terminal capacities of one node. Negative
    /// capacities are programming errors.
    fn set_terminal_caps(&mut self, node: usize, source: T, sink: T);

    /// Set the capacity of the directed edge leaving `node` along direction
    /// `dir`. Out-of-bounds directions must not be set (they stay zero).
    fn set_edge_cap(&mut self, node: usize, dir: usize, cap: T);

    /// Provide a labelling hint (0 = background, nonzero = foreground). Used
    /// to decide which side nodes left FREE by the search report.
    fn set_initial_labelling(&mut self, labels: &[u8]);

    /// Run to completion and return the max-flow value.
    fn compute(&mut self) -> T;

    /// Cut readout after `compute`: the source side is every node not in the
    /// sink tree.
    fn terminal_of(&self, node: usize) -> Terminal;

    /// Residual capacity of the directed edge `(node, dir)`.
    fn residual(&self, node: usize, dir: usize) -> T;

    /// Max-flow value of the last `compute`.
    fn flow(&self) -> T;
}

/// Grid back-end selector, parsed from the wire symbols.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MaxFlowSelector {
    /// "GRD-KO": Boykov–Kolmogorov / Kohli dynamic grid flow.
    #[default]
    GridKohli,
    /// "GRD-PRF": push-relabel, FIFO active queue.
    GridPrFifo,
    /// "GRD-PRH": push-relabel, highest-level selection.
    GridPrHighest,
}

impl MaxFlowSelector {
    pub fn from_symbol(symbol: &str) -> Result<Self, SegError> {
        match symbol {
            "GRD-KO" => Ok(MaxFlowSelector::GridKohli),
            "GRD-PRF" => Ok(MaxFlowSelector::GridPrFifo),
            "GRD-PRH" => Ok(MaxFlowSelector::GridPrHighest),
            "GEN-FF" | "GEN-EK" | "GEN-DI" | "GEN-BK" | "GEN-KO" | "GEN-PRF" | "GEN-PRH" => {
                Err(SegError::UnsupportedSolver(format!(
                    "{symbol} (general-graph back-ends are not part of this crate)"
                )))
            }
            other => Err(SegError::UnsupportedSolver(other.to_string())),
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            MaxFlowSelector::GridKohli => "GRD-KO",
            MaxFlowSelector::GridPrFifo => "GRD-PRF",
            MaxFlowSelector::GridPrHighest => "GRD-PRH",
        }
    }
}

/// Construct the engine a selector names.
pub fn make_engine<T: Real>(selector: MaxFlowSelector) -> Box<dyn MaxFlowEngine<T>> {
    match selector {
        MaxFlowSelector::GridKohli => Box::new(GridKohli::default()),
        MaxFlowSelector::GridPrFifo => Box::new(GridPushRelabel::fifo()),
        MaxFlowSelector::GridPrHighest => Box::new(GridPushRelabel::highest_level()),
    }
}
