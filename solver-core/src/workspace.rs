//! Solver workspace: setup, solve, update and teardown.
//!
//! A workspace owns the problem data, the KKT factorization, the iterate and
//! the result of the last completed solve. All storage is sized at setup; an
//! update only rewrites values, so repeated update/solve cycles reuse the
//! symbolic analysis and every buffer.

use std::time::{Duration, Instant};

use crate::error::{SolverError, SolverResult};
use crate::ipm::{self, BoxIndex, Iterate, StepWorkspace};
use crate::kkt::KktSolver;
use crate::linalg::{DenseMatrix, QpMatrix, SparseMatrix};
use crate::problem::{ProblemData, QpUpdate};
use crate::result::{SolveResult, SolveStatus, SolverState};
use crate::settings::SolverSettings;

/// Workspace for one QP, generic over the matrix backend.
pub struct Workspace<M: QpMatrix> {
    problem: ProblemData<M>,
    settings: SolverSettings,
    boxes: BoxIndex,
    iterate: Iterate,
    step: StepWorkspace,
    kkt: M::Kkt,
    state: SolverState,
    result: SolveResult,
    /// Stored iterate is a usable starting point for the next solve.
    warm: bool,
    setup_time: Duration,
    update_time: Duration,
}

/// Workspace over dense matrices.
pub type DenseWorkspace = Workspace<DenseMatrix>;

/// Workspace over compressed-column matrices.
pub type SparseWorkspace = Workspace<SparseMatrix>;

impl<M: QpMatrix> Workspace<M> {
    /// Validate `problem` and `settings`, allocate all storage and run the
    /// symbolic KKT analysis.
    pub fn setup(problem: ProblemData<M>, settings: SolverSettings) -> SolverResult<Self> {
        let start = Instant::now();
        settings.validate()?;
        check_backend::<M>(&settings)?;
        problem.validate()?;

        let (n, p, m) = (problem.num_vars(), problem.num_eq(), problem.num_ineq());
        let boxes = BoxIndex::from_bounds(&problem.x_lb, &problem.x_ub);
        let kkt = M::Kkt::symbolic(&problem, &settings)?;

        log::debug!(
            "setup: {} backend, n={} p={} m={} nnz(P,A,G)=({}, {}, {}) boxes=({}, {})",
            M::BACKEND,
            n,
            p,
            m,
            problem.P.nnz(),
            problem.A.nnz(),
            problem.G.nnz(),
            boxes.n_lb(),
            boxes.n_ub()
        );

        let mut result = SolveResult::default();
        Iterate::zeros(n, p, m, &boxes).export(&boxes, &mut result);

        Ok(Self {
            iterate: Iterate::zeros(n, p, m, &boxes),
            step: StepWorkspace::new(n, p, m, &boxes),
            problem,
            settings,
            boxes,
            kkt,
            state: SolverState::Initialized,
            result,
            warm: false,
            setup_time: start.elapsed(),
            update_time: Duration::ZERO,
        })
    }

    /// Run the interior-point iteration and publish the result.
    ///
    /// Warm starts from the previous iterate when the last solve ended
    /// `Solved` or `MaxIterReached`; otherwise starts cold.
    pub fn solve(&mut self) -> SolveStatus {
        let start = Instant::now();
        let warm = self.warm;
        self.state = SolverState::Iterating;

        let out = ipm::solve::<M>(
            &self.problem,
            &self.boxes,
            &mut self.kkt,
            &mut self.iterate,
            &mut self.step,
            &self.settings,
            warm,
        );
        let solve_time = start.elapsed();

        let status = out.state.status().unwrap_or(SolveStatus::NumericalError);
        self.state = out.state;
        self.warm = matches!(status, SolveStatus::Solved | SolveStatus::MaxIterReached)
            && self.iterate.all_finite();

        let result = &mut self.result;
        result.status = status;
        self.iterate.export(&self.boxes, result);
        result.certificate = out.certificate;

        let info = &mut result.info;
        info.iterations = out.iterations;
        info.warm_start = warm;
        info.primal_res = out.metrics.primal_res;
        info.dual_res = out.metrics.dual_res;
        info.primal_res_rel = out.metrics.primal_rel;
        info.dual_res_rel = out.metrics.dual_rel;
        info.duality_gap = out.metrics.gap;
        info.duality_gap_rel = out.metrics.gap_rel;
        info.primal_obj = out.metrics.primal_obj;
        info.dual_obj = out.metrics.dual_obj;
        info.mu = out.metrics.mu;
        info.rho = out.reg.rho;
        info.delta = out.reg.delta;
        info.sigma = out.sigma;
        info.step_length = out.step_length;
        info.factor_retries = out.reg.retries;

        if self.settings.compute_timings {
            info.setup_time = self.setup_time;
            info.update_time = self.update_time;
            info.solve_time = solve_time;
            info.run_time = self.setup_time + self.update_time + solve_time;
            info.kkt_factor_time = out.timers.factorization;
            info.kkt_solve_time = out.timers.solve;
        } else {
            info.setup_time = Duration::ZERO;
            info.update_time = Duration::ZERO;
            info.solve_time = Duration::ZERO;
            info.run_time = Duration::ZERO;
            info.kkt_factor_time = Duration::ZERO;
            info.kkt_solve_time = Duration::ZERO;
        }

        status
    }

    /// Replace parts of the problem data.
    ///
    /// The whole update is validated before anything is written, so an
    /// error leaves the workspace exactly as it was. The result of the last
    /// solve is kept; the iterate is kept as a warm start.
    pub fn update(&mut self, update: QpUpdate<'_, M>) -> SolverResult<()> {
        let start = Instant::now();
        self.problem.apply_update(&update)?;

        if update.touches_bounds() {
            let boxes = BoxIndex::from_bounds(&self.problem.x_lb, &self.problem.x_ub);
            if boxes != self.boxes {
                log::debug!(
                    "update: box pairs ({}, {}) -> ({}, {})",
                    self.boxes.n_lb(),
                    self.boxes.n_ub(),
                    boxes.n_lb(),
                    boxes.n_ub()
                );
                let (n, p, m) = (self.problem.num_vars(), self.problem.num_eq(), self.problem.num_ineq());
                self.iterate.remap_boxes(&self.boxes, &boxes);
                self.step = StepWorkspace::new(n, p, m, &boxes);
                self.boxes = boxes;
            }
        }

        self.state = SolverState::Initialized;
        self.update_time = start.elapsed();
        Ok(())
    }

    /// Replace the settings between solves.
    ///
    /// The backend must stay the same. A new ordering or pivot threshold
    /// reruns the symbolic analysis.
    pub fn update_settings(&mut self, settings: SolverSettings) -> SolverResult<()> {
        settings.validate()?;
        check_backend::<M>(&settings)?;

        if settings.ordering != self.settings.ordering
            || settings.dynamic_reg_min_pivot != self.settings.dynamic_reg_min_pivot
        {
            self.kkt = M::Kkt::symbolic(&self.problem, &settings)?;
        }
        self.settings = settings;
        self.state = SolverState::Initialized;
        Ok(())
    }

    /// Release the workspace.
    pub fn cleanup(self) {}

    /// Consume the workspace, keeping only the last result.
    pub fn into_result(self) -> SolveResult {
        self.result
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    /// Result of the last completed solve.
    pub fn result(&self) -> &SolveResult {
        &self.result
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    pub fn problem(&self) -> &ProblemData<M> {
        &self.problem
    }
}

fn check_backend<M: QpMatrix>(settings: &SolverSettings) -> SolverResult<()> {
    if settings.backend != M::BACKEND {
        return Err(SolverError::BackendMismatch { requested: settings.backend, actual: M::BACKEND });
    }
    Ok(())
}
