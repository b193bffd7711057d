//! Sparse LDLᵀ factorization of quasi-definite matrices.
//!
//! Thin wrapper over faer's sparse Cholesky module. The caller hands over an
//! upper-triangular pattern that is already in its final (fill-reducing)
//! order, so the symbolic analysis runs with the identity ordering and the
//! numeric phase only needs a value array in the same layout.
//!
//! Pivots whose sign disagrees with the expected inertia, or whose magnitude
//! falls below `dynamic_reg_min_pivot`, are replaced during factorization.
//! The iteration refines solutions against the unperturbed system, so these
//! replacements only cost accuracy of the initial solve.

use faer::dyn_stack::{MemBuffer, MemStack, StackReq};
use faer::linalg::cholesky::ldlt::factor::{LdltParams, LdltRegularization};
use faer::sparse::linalg::cholesky::{
    factorize_symbolic_cholesky, CholeskySymbolicParams, LdltRef, SymbolicCholesky,
    SymmetricOrdering,
};
use faer::sparse::linalg::SupernodalThreshold;
use faer::sparse::{SparseColMatRef, SymbolicSparseColMatRef};
use faer::{Conj, MatMut, Par, Side, Spec};
use thiserror::Error;

/// LDLᵀ errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LdlError {
    /// Symbolic analysis rejected the pattern.
    #[error("Symbolic factorization failed: {0}")]
    Symbolic(String),

    /// Zero pivot that dynamic regularization could not repair.
    #[error("Numeric factorization failed: zero pivot at column {0}")]
    ZeroPivot(usize),

    /// Value array does not match the pattern.
    #[error("Dimension mismatch: expected {expected} values, got {actual}")]
    DimensionMismatch {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Non-finite value in the matrix.
    #[error("Matrix contains non-finite values")]
    NonFinite,
}

/// Sparse LDLᵀ solver with a fixed pattern.
pub struct LdlSolver {
    n: usize,
    col_ptr: Vec<usize>,
    row_idx: Vec<usize>,
    signs: Vec<i8>,
    symbolic: SymbolicCholesky<usize>,
    ld_vals: Vec<f64>,
    work: MemBuffer,
    par: Par,
    params: Spec<LdltParams, f64>,
    reg_epsilon: f64,
    reg_delta: f64,
    factored: bool,
}

impl LdlSolver {
    /// Symbolic factorization of an upper-triangular CSC pattern.
    ///
    /// `signs[i]` is the expected sign (+1 or -1) of pivot i.
    pub fn new(
        n: usize,
        col_ptr: Vec<usize>,
        row_idx: Vec<usize>,
        signs: Vec<i8>,
        dynamic_reg_min_pivot: f64,
    ) -> Result<Self, LdlError> {
        let symbolic = {
            let pattern = SymbolicSparseColMatRef::new_checked(n, n, &col_ptr, None, &row_idx);
            let params = CholeskySymbolicParams {
                supernodal_flop_ratio_threshold: SupernodalThreshold::AUTO,
                ..Default::default()
            };
            factorize_symbolic_cholesky(pattern, Side::Upper, SymmetricOrdering::Identity, params)
                .map_err(|e| LdlError::Symbolic(format!("{:?}", e)))?
        };

        let par = parallelism_from_env();
        let params: Spec<LdltParams, f64> = Spec::default();
        let req = StackReq::any_of(&[
            symbolic.factorize_numeric_ldlt_scratch::<f64>(par, params),
            symbolic.solve_in_place_scratch::<f64>(1, par),
        ]);

        Ok(Self {
            n,
            ld_vals: vec![0.0; symbolic.len_val()],
            col_ptr,
            row_idx,
            signs,
            symbolic,
            work: MemBuffer::new(req),
            par,
            params,
            reg_epsilon: dynamic_reg_min_pivot,
            // Same replacement ratio QDLDL-based solvers use.
            reg_delta: (dynamic_reg_min_pivot * 2e6).min(1e-6),
            factored: false,
        })
    }

    /// Dimension of the system.
    pub fn dim(&self) -> usize {
        self.n
    }

    /// Numeric factorization. `values` follows the pattern passed to `new`.
    pub fn factorize(&mut self, values: &[f64]) -> Result<(), LdlError> {
        self.factored = false;
        if values.len() != self.row_idx.len() {
            return Err(LdlError::DimensionMismatch {
                expected: self.row_idx.len(),
                actual: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(LdlError::NonFinite);
        }

        let pattern =
            SymbolicSparseColMatRef::new_checked(self.n, self.n, &self.col_ptr, None, &self.row_idx);
        let mat = SparseColMatRef::new(pattern, values);
        let regularizer = LdltRegularization {
            dynamic_regularization_signs: Some(&self.signs),
            dynamic_regularization_delta: self.reg_delta,
            dynamic_regularization_epsilon: self.reg_epsilon,
        };

        self.symbolic
            .factorize_numeric_ldlt(
                &mut self.ld_vals,
                mat,
                Side::Upper,
                regularizer,
                self.par,
                MemStack::new(&mut self.work),
                self.params,
            )
            .map_err(|e| match e {
                faer::linalg::cholesky::ldlt::factor::LdltError::ZeroPivot { index } => {
                    LdlError::ZeroPivot(index)
                }
            })?;

        if self.ld_vals.iter().any(|v| !v.is_finite()) {
            return Err(LdlError::NonFinite);
        }
        self.factored = true;
        Ok(())
    }

    /// Overwrite `x` with the solution of LDLᵀ x = x.
    ///
    /// Leaves `x` untouched if no valid factorization is available.
    pub fn solve_in_place(&mut self, x: &mut [f64]) {
        assert_eq!(x.len(), self.n);
        if !self.factored || self.n == 0 {
            return;
        }
        let ldlt = LdltRef::new(&self.symbolic, &self.ld_vals);
        let rhs = MatMut::from_column_major_slice_mut(x, self.n, 1);
        ldlt.solve_in_place_with_conj(Conj::No, rhs, self.par, MemStack::new(&mut self.work));
    }
}

/// `PROXIP_THREADS`: unset or 1 means sequential, 0 means all cores.
fn parallelism_from_env() -> Par {
    match std::env::var("PROXIP_THREADS").ok().and_then(|v| v.parse::<usize>().ok()) {
        Some(1) | None => Par::Seq,
        Some(t) => Par::rayon(t),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Upper-triangular CSC arrays from (row, col, value) with row <= col.
    fn upper_csc(n: usize, mut entries: Vec<(usize, usize, f64)>) -> (Vec<usize>, Vec<usize>, Vec<f64>) {
        entries.sort_by_key(|&(r, c, _)| (c, r));
        let mut col_ptr = vec![0; n + 1];
        for &(_, c, _) in &entries {
            col_ptr[c + 1] += 1;
        }
        for i in 0..n {
            col_ptr[i + 1] += col_ptr[i];
        }
        let rows = entries.iter().map(|e| e.0).collect();
        let vals = entries.iter().map(|e| e.2).collect();
        (col_ptr, rows, vals)
    }

    #[test]
    fn test_ldl_positive_definite() {
        // [[2, 1], [1, 2]] x = [3, 3]  =>  x = [1, 1]
        let (p, i, v) = upper_csc(2, vec![(0, 0, 2.0), (0, 1, 1.0), (1, 1, 2.0)]);
        let mut solver = LdlSolver::new(2, p, i, vec![1, 1], 1e-13).unwrap();
        solver.factorize(&v).unwrap();

        let mut x = vec![3.0, 3.0];
        solver.solve_in_place(&mut x);
        assert!((x[0] - 1.0).abs() < 1e-10, "x[0] = {}", x[0]);
        assert!((x[1] - 1.0).abs() < 1e-10, "x[1] = {}", x[1]);
    }

    #[test]
    fn test_ldl_quasi_definite() {
        // [[1, 0, 1], [0, 1, 1], [1, 1, -1]]
        let (p, i, v) = upper_csc(
            3,
            vec![(0, 0, 1.0), (1, 1, 1.0), (0, 2, 1.0), (1, 2, 1.0), (2, 2, -1.0)],
        );
        let mut solver = LdlSolver::new(3, p, i, vec![1, 1, -1], 1e-13).unwrap();
        solver.factorize(&v).unwrap();

        let rhs = [1.0, 2.0, 1.0];
        let mut x = rhs.to_vec();
        solver.solve_in_place(&mut x);

        let kx = [
            x[0] + x[2],
            x[1] + x[2],
            x[0] + x[1] - x[2],
        ];
        for k in 0..3 {
            assert!((kx[k] - rhs[k]).abs() < 1e-10, "residual at {}: {}", k, kx[k] - rhs[k]);
        }
    }

    #[test]
    fn test_ldl_refactor_with_new_values() {
        let (p, i, v) = upper_csc(2, vec![(0, 0, 4.0), (1, 1, 2.0)]);
        let mut solver = LdlSolver::new(2, p, i, vec![1, 1], 1e-13).unwrap();
        solver.factorize(&v).unwrap();
        solver.factorize(&[8.0, 1.0]).unwrap();

        let mut x = vec![8.0, 1.0];
        solver.solve_in_place(&mut x);
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ldl_rejects_nan() {
        let (p, i, _) = upper_csc(1, vec![(0, 0, 1.0)]);
        let mut solver = LdlSolver::new(1, p, i, vec![1], 1e-13).unwrap();
        assert_eq!(solver.factorize(&[f64::NAN]), Err(LdlError::NonFinite));
        assert_eq!(
            solver.factorize(&[1.0, 2.0]),
            Err(LdlError::DimensionMismatch { expected: 1, actual: 2 })
        );
    }
}
