//! Error types for setup and update.
//!
//! Solving never returns an error: numerical breakdown, infeasibility and the
//! iteration cap are reported through [`SolveStatus`](crate::SolveStatus).

use thiserror::Error;

/// Errors reported by workspace setup and update.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    /// A matrix or vector does not have the shape implied by the problem.
    #[error("Dimension mismatch in {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Offending input, e.g. `"A.cols"`
        what: String,
        /// Expected size
        expected: usize,
        /// Actual size
        actual: usize,
    },

    /// Lower bound above upper bound.
    #[error("Invalid bounds at index {index}: x_lb = {lower} > x_ub = {upper}")]
    InvalidBounds {
        /// Variable index
        index: usize,
        /// Lower bound
        lower: f64,
        /// Upper bound
        upper: f64,
    },

    /// Compressed-column arrays do not describe a valid matrix.
    #[error("Malformed sparse matrix: {0}")]
    MalformedSparse(String),

    /// Update would change the sparsity pattern fixed at setup.
    #[error("Structural mismatch in {matrix}: update introduces new nonzero positions")]
    StructuralMismatch {
        /// Matrix name (`"P"`, `"A"` or `"G"`)
        matrix: &'static str,
    },

    /// Settings out of range.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// Symbolic analysis of the KKT pattern failed.
    #[error("Symbolic factorization failed: {0}")]
    SymbolicFactorization(String),

    /// Settings select a backend different from the matrix type.
    #[error("Backend mismatch: settings select {requested}, matrices are {actual}")]
    BackendMismatch {
        /// Backend named in the settings
        requested: crate::BackendKind,
        /// Backend of the matrix type
        actual: crate::BackendKind,
    },
}

/// Result type for setup and update.
pub type SolverResult<T> = Result<T, SolverError>;
