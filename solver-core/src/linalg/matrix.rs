//! Backend-agnostic matrix interface.
//!
//! The interior-point iteration only ever talks to P, A and G through this
//! trait, so it is written once for both the dense and the sparse backend.
//! Each backend also names the KKT solver that factors systems built from
//! its matrices.

use std::fmt;

use crate::error::SolverResult;
use crate::kkt::KktSolver;
use crate::settings::BackendKind;

/// Matrix operations needed by the solver.
pub trait QpMatrix: Clone + fmt::Debug + Send + Sized + 'static {
    /// KKT solver for systems assembled from this matrix type.
    type Kkt: KktSolver<Self>;

    /// Backend this matrix type belongs to.
    const BACKEND: BackendKind;

    /// Number of rows.
    fn rows(&self) -> usize;

    /// Number of columns.
    fn cols(&self) -> usize;

    /// Number of stored entries.
    fn nnz(&self) -> usize;

    /// Matrix with the given shape and no nonzeros.
    fn zeros(rows: usize, cols: usize) -> Self;

    /// y = alpha * M * x + beta * y
    fn gemv(&self, alpha: f64, x: &[f64], beta: f64, y: &mut [f64]);

    /// y = alpha * M^T * x + beta * y
    fn gemv_t(&self, alpha: f64, x: &[f64], beta: f64, y: &mut [f64]);

    /// y = alpha * S * x + beta * y, where S is the symmetric matrix whose
    /// upper triangle is stored in M. Entries below the diagonal are ignored.
    fn symv_upper(&self, alpha: f64, x: &[f64], beta: f64, y: &mut [f64]);

    /// Check that `new` can replace the values of `self` without changing
    /// the stored structure.
    fn check_update(&self, new: &Self, name: &'static str) -> SolverResult<()>;

    /// Overwrite the values of `self` with those of `new`.
    ///
    /// Positions stored in `self` but absent from `new` become zero.
    fn update_values(&mut self, new: &Self, name: &'static str) -> SolverResult<()>;

    /// True if every stored value is finite.
    fn all_finite(&self) -> bool;
}

/// y = beta * y, treating beta == 0 as an overwrite so NaNs in y do not leak.
#[inline]
pub(crate) fn scale_in_place(y: &mut [f64], beta: f64) {
    if beta == 0.0 {
        y.fill(0.0);
    } else if beta != 1.0 {
        for yi in y.iter_mut() {
            *yi *= beta;
        }
    }
}

/// Infinity norm of a slice (0 for empty slices).
#[inline]
pub fn inf_norm(v: &[f64]) -> f64 {
    v.iter().fold(0.0_f64, |acc, &x| acc.max(x.abs()))
}

/// Dot product.
#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
