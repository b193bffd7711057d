//! Linear algebra layer.
//!
//! Matrix backends, fill-reducing orderings and the sparse LDLᵀ kernel.

pub mod dense;
pub mod ldl;
pub mod matrix;
pub mod ordering;
pub mod sparse;

pub use dense::DenseMatrix;
pub use matrix::{dot, inf_norm, QpMatrix};
pub use sparse::{SparseCsc, SparseMatrix};
