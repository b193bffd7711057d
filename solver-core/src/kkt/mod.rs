//! KKT system assembly and solution.
//!
//! Every Newton step of the iteration solves the quasi-definite system
//!
//! ```text
//! K = [ P + ρI + D_box    A^T        G^T        ]
//!     [ A                -δI         0          ]
//!     [ G                 0        -(S/Z + δI)  ]
//! ```
//!
//! where `D_box` collects the eliminated box constraints. The backends only
//! see the diagonals in [`KktDiagonals`]; the box pairs never appear as rows
//! of K.

pub mod dense;
pub mod sparse;

use thiserror::Error;

use crate::error::SolverResult;
use crate::linalg::ldl::LdlError;
use crate::linalg::{inf_norm, QpMatrix};
use crate::problem::ProblemData;
use crate::settings::SolverSettings;

/// Numeric factorization failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FactorError {
    /// Sparse LDLᵀ failed.
    #[error("LDL factorization failed: {0}")]
    Ldl(#[from] LdlError),

    /// Reduced dense system is not numerically positive definite.
    #[error("Cholesky factorization failed: reduced system not positive definite")]
    NotPositiveDefinite,

    /// Non-finite entry in the assembled system.
    #[error("KKT system contains non-finite values")]
    NonFinite,
}

/// Vector split into the three KKT blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct KktVector {
    /// Primal block (n)
    pub x: Vec<f64>,
    /// Equality block (p)
    pub y: Vec<f64>,
    /// Inequality block (m)
    pub z: Vec<f64>,
}

impl KktVector {
    /// Zero vector with the given block sizes.
    pub fn new(n: usize, p: usize, m: usize) -> Self {
        Self { x: vec![0.0; n], y: vec![0.0; p], z: vec![0.0; m] }
    }

    /// Set every entry to `value`.
    pub fn fill(&mut self, value: f64) {
        self.x.fill(value);
        self.y.fill(value);
        self.z.fill(value);
    }

    /// Infinity norm over all blocks.
    pub fn inf_norm(&self) -> f64 {
        inf_norm(&self.x).max(inf_norm(&self.y)).max(inf_norm(&self.z))
    }

    /// self += alpha * other
    pub fn axpy(&mut self, alpha: f64, other: &KktVector) {
        for (a, b) in [
            (&mut self.x, &other.x),
            (&mut self.y, &other.y),
            (&mut self.z, &other.z),
        ] {
            for (ai, bi) in a.iter_mut().zip(b.iter()) {
                *ai += alpha * bi;
            }
        }
    }

    /// Copy all blocks from `other`.
    pub fn copy_from(&mut self, other: &KktVector) {
        self.x.copy_from_slice(&other.x);
        self.y.copy_from_slice(&other.y);
        self.z.copy_from_slice(&other.z);
    }

    fn all_finite(&self) -> bool {
        self.x.iter().chain(&self.y).chain(&self.z).all(|v| v.is_finite())
    }
}

/// Diagonal terms of K for the current iterate.
#[derive(Debug, Clone)]
pub struct KktDiagonals {
    /// Primal proximal weight ρ
    pub rho: f64,
    /// Dual proximal weight δ
    pub delta: f64,
    /// ρ + D_box, per variable (n)
    pub x_reg: Vec<f64>,
    /// s/z + δ, per inequality (m)
    pub w: Vec<f64>,
}

impl KktDiagonals {
    /// Diagonals with ρ = δ = 0 and unit W.
    pub fn new(n: usize, m: usize) -> Self {
        Self { rho: 0.0, delta: 0.0, x_reg: vec![0.0; n], w: vec![1.0; m] }
    }

    fn all_finite(&self) -> bool {
        self.rho.is_finite()
            && self.delta.is_finite()
            && self.x_reg.iter().chain(&self.w).all(|v| v.is_finite())
    }
}

/// Factor-and-solve interface implemented by each backend.
pub trait KktSolver<M: QpMatrix>: Sized + Send {
    /// One-time analysis for the problem's fixed structure.
    fn symbolic(data: &ProblemData<M>, settings: &SolverSettings) -> SolverResult<Self>;

    /// Factor K for the current data and diagonals.
    fn factorize(&mut self, data: &ProblemData<M>, diag: &KktDiagonals) -> Result<(), FactorError>;

    /// Solve K sol = rhs with the latest factorization.
    fn solve(&mut self, data: &ProblemData<M>, diag: &KktDiagonals, rhs: &KktVector, sol: &mut KktVector);
}

/// res = rhs - K sol
pub fn kkt_residual<M: QpMatrix>(
    data: &ProblemData<M>,
    diag: &KktDiagonals,
    sol: &KktVector,
    rhs: &KktVector,
    res: &mut KktVector,
) {
    // x block: rhs_x - (P + diag(x_reg)) x - A^T y - G^T z
    res.x.copy_from_slice(&rhs.x);
    data.P.symv_upper(-1.0, &sol.x, 1.0, &mut res.x);
    data.A.gemv_t(-1.0, &sol.y, 1.0, &mut res.x);
    data.G.gemv_t(-1.0, &sol.z, 1.0, &mut res.x);
    for ((r, &d), &x) in res.x.iter_mut().zip(&diag.x_reg).zip(&sol.x) {
        *r -= d * x;
    }

    // y block: rhs_y - A x + δ y
    res.y.copy_from_slice(&rhs.y);
    data.A.gemv(-1.0, &sol.x, 1.0, &mut res.y);
    for (r, &y) in res.y.iter_mut().zip(&sol.y) {
        *r += diag.delta * y;
    }

    // z block: rhs_z - G x + w z
    res.z.copy_from_slice(&rhs.z);
    data.G.gemv(-1.0, &sol.x, 1.0, &mut res.z);
    for ((r, &w), &z) in res.z.iter_mut().zip(&diag.w).zip(&sol.z) {
        *r += w * z;
    }
}

/// Solve with iterative refinement against the full regularized operator.
///
/// Corrects the perturbation introduced by dynamic pivot regularization and
/// the roundoff of the reduced dense system. Returns the final residual
/// infinity norm.
pub fn solve_refined<M: QpMatrix>(
    kkt: &mut M::Kkt,
    data: &ProblemData<M>,
    diag: &KktDiagonals,
    rhs: &KktVector,
    sol: &mut KktVector,
    refine_iters: usize,
    scratch: &mut RefineScratch,
) -> f64 {
    debug_assert!(diag.all_finite());
    kkt.solve(data, diag, rhs, sol);

    let rhs_norm = rhs.inf_norm();
    let tol = 1e-14 * (1.0 + rhs_norm);
    kkt_residual(data, diag, sol, rhs, &mut scratch.res);
    let mut res_norm = scratch.res.inf_norm();

    for _ in 0..refine_iters {
        if !res_norm.is_finite() || res_norm <= tol {
            break;
        }
        kkt.solve(data, diag, &scratch.res, &mut scratch.delta);
        if !scratch.delta.all_finite() {
            break;
        }

        scratch.trial.copy_from(sol);
        scratch.trial.axpy(1.0, &scratch.delta);
        kkt_residual(data, diag, &scratch.trial, rhs, &mut scratch.res);
        let new_norm = scratch.res.inf_norm();
        if !(new_norm < res_norm) {
            // Stalled: keep the current solution.
            break;
        }
        sol.copy_from(&scratch.trial);
        res_norm = new_norm;
    }
    res_norm
}

/// Buffers reused by [`solve_refined`].
#[derive(Debug, Clone)]
pub struct RefineScratch {
    res: KktVector,
    delta: KktVector,
    trial: KktVector,
}

impl RefineScratch {
    /// Allocate for block sizes (n, p, m).
    pub fn new(n: usize, p: usize, m: usize) -> Self {
        Self {
            res: KktVector::new(n, p, m),
            delta: KktVector::new(n, p, m),
            trial: KktVector::new(n, p, m),
        }
    }
}
