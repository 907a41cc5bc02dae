//! Caller-visible error kinds.
//!
//! Validation failures are returned before any work happens. Convergence
//! failures and numerical degeneracies are *statuses* on the result types,
//! not errors (the partial result is still returned). Internal invariant
//! violations are programming bugs and assert/panic instead.

use thiserror::Error;

/// Errors reported at the API boundary.
#[derive(Debug, Error)]
pub enum SegError {
    /// Neighbourhood symbol is not one of N4/N8/N16/N32 (2D) or
    /// N6/N18/N26/N98 (3D).
    #[error("Unsupported neighbourhood: {0}")]
    UnsupportedNeighbourhood(String),

    /// Max-flow selector symbol is unknown or not built into this crate.
    #[error("Unsupported max-flow solver: {0}")]
    UnsupportedSolver(String),

    /// A parameter failed validation (message names the parameter).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl SegError {
    pub(crate) fn arg(msg: impl Into<String>) -> Self {
        SegError::InvalidArgument(msg.into())
    }
}
