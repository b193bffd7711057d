//! proxip: a proximal interior-point solver for convex quadratic programs
//!
//! Solves
//!
//! ```text
//! minimize    1/2 x'Px + c'x
//! subject to  A x = b
//!             G x <= h
//!             x_lb <= x <= x_ub
//! ```
//!
//! with P symmetric positive semidefinite (only its upper triangle is read).
//! Bounds at or beyond [`INF`] in magnitude are treated as absent.
//!
//! # Algorithm
//!
//! A primal-dual interior-point method with Mehrotra predictor-corrector
//! steps, stabilized by a proximal method of multipliers:
//!
//! - **Quasi-definite KKT systems** regularized by ρ (primal) and δ (dual),
//!   which decay with the step length
//! - **Two backends**: dense matrices with a reduced Cholesky solve, and
//!   compressed-column matrices with a sparse LDLᵀ under a fill-reducing
//!   ordering
//! - **Infeasibility certificates** for primal and dual infeasible problems
//! - **Update-and-resolve** with warm starts and reuse of the symbolic
//!   factorization
//!
//! # Example
//!
//! ```ignore
//! use proxip_core::{ProblemData, SolverSettings, SparseMatrix, SparseWorkspace, SolveStatus};
//!
//! // min x0^2 + x1^2 s.t. x0 + x1 = 1
//! let problem = ProblemData::new(
//!     SparseMatrix::from_triplets(2, 2, vec![(0, 0, 2.0), (1, 1, 2.0)]),
//!     vec![0.0, 0.0],
//! )
//! .with_equalities(SparseMatrix::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]), vec![1.0]);
//!
//! let mut ws = SparseWorkspace::setup(problem, SolverSettings::default_sparse())?;
//! assert_eq!(ws.solve(), SolveStatus::Solved);
//! println!("x = {:?}", ws.result().x);
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod ipm;
pub mod kkt;
pub mod linalg;
pub mod problem;
pub mod result;
pub mod settings;
pub mod workspace;

// Re-export main types
pub use error::{SolverError, SolverResult};
pub use linalg::{DenseMatrix, QpMatrix, SparseCsc, SparseMatrix};
pub use problem::{ProblemData, QpUpdate, INF};
pub use result::{Certificate, CertificateKind, SolveInfo, SolveResult, SolveStatus, SolverState};
pub use settings::{BackendKind, KktOrdering, SolverSettings};
pub use workspace::{DenseWorkspace, SparseWorkspace, Workspace};

/// Set up a workspace, solve once and return the result.
///
/// # Example
///
/// ```ignore
/// use proxip_core::{solve, DenseMatrix, ProblemData, SolverSettings};
///
/// // min 1/2 x^2 - x
/// let problem = ProblemData::new(DenseMatrix::from_row_slice(1, 1, &[1.0])?, vec![-1.0]);
/// let result = solve(problem, SolverSettings::default_dense())?;
/// ```
pub fn solve<M: QpMatrix>(problem: ProblemData<M>, settings: SolverSettings) -> SolverResult<SolveResult> {
    let mut ws = Workspace::setup(problem, settings)?;
    ws.solve();
    Ok(ws.into_result())
}
