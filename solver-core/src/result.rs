//! Solve status, solver state and the reported solution.

use std::fmt;
use std::time::Duration;

/// Outcome of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolveStatus {
    /// Residuals and duality gap within tolerance
    Solved,

    /// Iteration cap reached; the last iterate is reported
    MaxIterReached,

    /// Primal infeasibility certificate found
    PrimalInfeasible,

    /// Dual infeasibility certificate found
    DualInfeasible,

    /// Factorization kept failing or the iterate became non-finite
    NumericalError,

    /// No solve has completed yet
    #[default]
    Unsolved,
}

impl SolveStatus {
    /// Integer code used by the C interface.
    pub fn code(self) -> i32 {
        match self {
            SolveStatus::Solved => 1,
            SolveStatus::MaxIterReached => -1,
            SolveStatus::PrimalInfeasible => -2,
            SolveStatus::DualInfeasible => -3,
            SolveStatus::NumericalError => -8,
            SolveStatus::Unsolved => -9,
        }
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Solved => write!(f, "Solved"),
            SolveStatus::MaxIterReached => write!(f, "Max Iterations Reached"),
            SolveStatus::PrimalInfeasible => write!(f, "Primal Infeasible"),
            SolveStatus::DualInfeasible => write!(f, "Dual Infeasible"),
            SolveStatus::NumericalError => write!(f, "Numerical Error"),
            SolveStatus::Unsolved => write!(f, "Unsolved"),
        }
    }
}

/// Lifecycle state of a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    /// Set up or updated, ready to solve
    Initialized,
    /// Inside the iteration
    Iterating,
    Solved,
    PrimalInfeasible,
    DualInfeasible,
    MaxIterReached,
    NumericalError,
}

impl SolverState {
    /// True for states that end a solve.
    pub fn is_terminal(self) -> bool {
        self.status().is_some()
    }

    /// Status corresponding to a terminal state.
    pub fn status(self) -> Option<SolveStatus> {
        match self {
            SolverState::Initialized | SolverState::Iterating => None,
            SolverState::Solved => Some(SolveStatus::Solved),
            SolverState::PrimalInfeasible => Some(SolveStatus::PrimalInfeasible),
            SolverState::DualInfeasible => Some(SolveStatus::DualInfeasible),
            SolverState::MaxIterReached => Some(SolveStatus::MaxIterReached),
            SolverState::NumericalError => Some(SolveStatus::NumericalError),
        }
    }
}

/// Which problem an infeasibility certificate refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateKind {
    /// Farkas ray in the duals
    PrimalInfeasible,
    /// Improving ray in x
    DualInfeasible,
}

/// Normalized infeasibility certificate.
///
/// `residual` is the violation of the ray conditions and `objective` the
/// objective of the ray, both divided by the ray's infinity norm. A valid
/// certificate has a small residual and a negative objective.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Certificate {
    pub kind: CertificateKind,
    pub residual: f64,
    pub objective: f64,
}

/// Solution of the last completed solve.
///
/// Box vectors always have length n. A side without a finite bound reports
/// dual 0 and slack [`INF`](crate::INF).
#[derive(Debug, Clone, Default)]
pub struct SolveResult {
    /// Solution status
    pub status: SolveStatus,

    /// Primal solution (n)
    pub x: Vec<f64>,

    /// Equality duals (p)
    pub y: Vec<f64>,

    /// Inequality duals (m)
    pub z: Vec<f64>,

    /// Lower bound duals (n)
    pub z_lb: Vec<f64>,

    /// Upper bound duals (n)
    pub z_ub: Vec<f64>,

    /// Inequality slacks (m)
    pub s: Vec<f64>,

    /// Lower bound slacks (n)
    pub s_lb: Vec<f64>,

    /// Upper bound slacks (n)
    pub s_ub: Vec<f64>,

    /// Infeasibility certificate, if one was found
    pub certificate: Option<Certificate>,

    /// Diagnostics
    pub info: SolveInfo,
}

/// Detailed solve information.
#[derive(Debug, Clone, Default)]
pub struct SolveInfo {
    /// Iterations of the last solve
    pub iterations: usize,

    /// The last solve started from the previous iterate
    pub warm_start: bool,

    /// Primal residual (infinity norm)
    pub primal_res: f64,

    /// Dual residual (infinity norm)
    pub dual_res: f64,

    /// Primal residual divided by its scale
    pub primal_res_rel: f64,

    /// Dual residual divided by its scale
    pub dual_res_rel: f64,

    /// Absolute duality gap
    pub duality_gap: f64,

    /// Duality gap divided by its scale
    pub duality_gap_rel: f64,

    /// 1/2 x'Px + c'x
    pub primal_obj: f64,

    /// Dual objective
    pub dual_obj: f64,

    /// Final primal proximal weight
    pub rho: f64,

    /// Final dual proximal weight
    pub delta: f64,

    /// Final complementarity measure
    pub mu: f64,

    /// Last centering parameter
    pub sigma: f64,

    /// Last step length
    pub step_length: f64,

    /// Regularization bumps after failed factorizations
    pub factor_retries: usize,

    /// Time spent in setup
    pub setup_time: Duration,

    /// Time spent in the last update
    pub update_time: Duration,

    /// Time spent in the last solve
    pub solve_time: Duration,

    /// setup + update + solve
    pub run_time: Duration,

    /// Time spent in numeric factorizations during the last solve
    pub kkt_factor_time: Duration,

    /// Time spent in KKT solves during the last solve
    pub kkt_solve_time: Duration,
}
