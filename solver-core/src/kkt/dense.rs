//! Dense KKT backend.
//!
//! Eliminates the y and z blocks of K, which have constant negative
//! diagonals, and factors the reduced n × n system
//!
//! ```text
//! S = P + diag(x_reg) + (1/δ) A^T A + G^T W^{-1} G,    W = S/Z + δI
//! S dx = rhs_x + (1/δ) A^T rhs_y + G^T W^{-1} rhs_z
//! dy = (A dx - rhs_y) / δ
//! dz = W^{-1} (G dx - rhs_z)
//! ```
//!
//! S is symmetric positive definite whenever δ > 0 and x_reg > 0, so a
//! plain Cholesky factorization suffices.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};

use super::{FactorError, KktDiagonals, KktSolver, KktVector};
use crate::error::SolverResult;
use crate::linalg::{DenseMatrix, QpMatrix};
use crate::problem::ProblemData;
use crate::settings::SolverSettings;

/// Cholesky-based KKT solver for [`DenseMatrix`] problems.
pub struct DenseKkt {
    n: usize,
    m: usize,

    /// Reduced system S
    schur: DMatrix<f64>,

    /// W^{-1} G
    g_scaled: DMatrix<f64>,

    /// Reduced right-hand side, overwritten by dx
    rhs_red: DVector<f64>,

    /// W^{-1} rhs_z
    z_work: Vec<f64>,

    chol: Option<Cholesky<f64, Dyn>>,
}

impl KktSolver<DenseMatrix> for DenseKkt {
    fn symbolic(data: &ProblemData<DenseMatrix>, _settings: &SolverSettings) -> SolverResult<Self> {
        let n = data.num_vars();
        let m = data.num_ineq();
        Ok(Self {
            n,
            m,
            schur: DMatrix::zeros(n, n),
            g_scaled: DMatrix::zeros(m, n),
            rhs_red: DVector::zeros(n),
            z_work: vec![0.0; m],
            chol: None,
        })
    }

    fn factorize(&mut self, data: &ProblemData<DenseMatrix>, diag: &KktDiagonals) -> Result<(), FactorError> {
        self.chol = None;
        let p_mat = data.P.as_matrix();
        let n = self.n;

        // Symmetric P from its upper triangle, plus the x diagonal.
        for j in 0..n {
            for i in 0..j {
                let v = p_mat[(i, j)];
                self.schur[(i, j)] = v;
                self.schur[(j, i)] = v;
            }
            self.schur[(j, j)] = p_mat[(j, j)] + diag.x_reg[j];
        }

        if data.num_eq() > 0 {
            let a = data.A.as_matrix();
            self.schur.gemm_tr(1.0 / diag.delta, a, a, 1.0);
        }

        if self.m > 0 {
            let g = data.G.as_matrix();
            for i in 0..self.m {
                let scale = 1.0 / diag.w[i];
                for j in 0..n {
                    self.g_scaled[(i, j)] = g[(i, j)] * scale;
                }
            }
            self.schur.gemm_tr(1.0, &self.g_scaled, g, 1.0);
        }

        if self.schur.iter().any(|v| !v.is_finite()) {
            return Err(FactorError::NonFinite);
        }

        self.chol = Cholesky::new(self.schur.clone());
        if self.chol.is_none() {
            return Err(FactorError::NotPositiveDefinite);
        }
        Ok(())
    }

    fn solve(&mut self, data: &ProblemData<DenseMatrix>, diag: &KktDiagonals, rhs: &KktVector, sol: &mut KktVector) {
        let chol = match &self.chol {
            Some(chol) => chol,
            None => {
                sol.fill(0.0);
                return;
            }
        };

        // rhs_red = rhs_x + A^T rhs_y / δ + G^T W^{-1} rhs_z
        let rhs_red = self.rhs_red.as_mut_slice();
        rhs_red.copy_from_slice(&rhs.x);
        if !rhs.y.is_empty() {
            data.A.gemv_t(1.0 / diag.delta, &rhs.y, 1.0, rhs_red);
        }
        for ((zw, &r), &w) in self.z_work.iter_mut().zip(&rhs.z).zip(&diag.w) {
            *zw = r / w;
        }
        data.G.gemv_t(1.0, &self.z_work, 1.0, rhs_red);

        chol.solve_mut(&mut self.rhs_red);
        sol.x.copy_from_slice(self.rhs_red.as_slice());

        // dy = (A dx - rhs_y) / δ
        sol.y.copy_from_slice(&rhs.y);
        data.A.gemv(1.0 / diag.delta, &sol.x, -1.0 / diag.delta, &mut sol.y);

        // dz = (G dx - rhs_z) / w
        sol.z.copy_from_slice(&rhs.z);
        data.G.gemv(1.0, &sol.x, -1.0, &mut sol.z);
        for (dz, &w) in sol.z.iter_mut().zip(&diag.w) {
            *dz /= w;
        }
    }
}
