//! Per-iteration scratch space and the Newton direction.
//!
//! All buffers are sized once from the problem dimensions and the box index,
//! so an iteration performs no allocation.

use super::iterate::{BestIterate, BoxIndex, Direction, Iterate};
use super::perf::{PerfSection, PerfTimers};
use super::residuals::Residuals;
use super::termination::InfeasibilityDetector;
use crate::kkt::{solve_refined, KktDiagonals, KktVector, RefineScratch};
use crate::linalg::QpMatrix;
use crate::problem::ProblemData;

pub struct StepWorkspace {
    pub diag: KktDiagonals,
    pub residuals: Residuals,
    pub detector: InfeasibilityDetector,
    pub best: BestIterate,

    /// Affine (predictor) direction
    pub dir_aff: Direction,
    /// Combined direction
    pub dir: Direction,

    /// Complementarity right-hand sides
    pub rc: Vec<f64>,
    pub rc_lb: Vec<f64>,
    pub rc_ub: Vec<f64>,

    /// s/z + δ for the box pairs
    w_lb: Vec<f64>,
    w_ub: Vec<f64>,
    t_lb: Vec<f64>,
    t_ub: Vec<f64>,

    rhs: KktVector,
    sol: KktVector,
    refine: RefineScratch,

    /// Residual norm of the last KKT solve
    pub last_kkt_residual: f64,
}

impl StepWorkspace {
    pub fn new(n: usize, p: usize, m: usize, boxes: &BoxIndex) -> Self {
        let (n_lb, n_ub) = (boxes.n_lb(), boxes.n_ub());
        Self {
            diag: KktDiagonals::new(n, m),
            residuals: Residuals::new(n, p, m, boxes),
            detector: InfeasibilityDetector::new(n, p, m, boxes),
            best: BestIterate::new(n, p, m, boxes),
            dir_aff: Iterate::zeros(n, p, m, boxes),
            dir: Iterate::zeros(n, p, m, boxes),
            rc: vec![0.0; m],
            rc_lb: vec![0.0; n_lb],
            rc_ub: vec![0.0; n_ub],
            w_lb: vec![0.0; n_lb],
            w_ub: vec![0.0; n_ub],
            t_lb: vec![0.0; n_lb],
            t_ub: vec![0.0; n_ub],
            rhs: KktVector::new(n, p, m),
            sol: KktVector::new(n, p, m),
            refine: RefineScratch::new(n, p, m),
            last_kkt_residual: 0.0,
        }
    }

    /// Fill the KKT diagonals for iterate `it` and weights (ρ, δ).
    ///
    /// Box pairs are folded into the x diagonal as 1 / (s/z + δ).
    pub fn set_diagonals(&mut self, it: &Iterate, boxes: &BoxIndex, rho: f64, delta: f64) {
        self.diag.rho = rho;
        self.diag.delta = delta;
        self.diag.x_reg.fill(rho);
        for (w, (&s, &z)) in self.diag.w.iter_mut().zip(it.s.iter().zip(&it.z)) {
            *w = s / z + delta;
        }
        for (k, &i) in boxes.lb.iter().enumerate() {
            self.w_lb[k] = it.s_lb[k] / it.z_lb[k] + delta;
            self.diag.x_reg[i] += 1.0 / self.w_lb[k];
        }
        for (k, &i) in boxes.ub.iter().enumerate() {
            self.w_ub[k] = it.s_ub[k] / it.z_ub[k] + delta;
            self.diag.x_reg[i] += 1.0 / self.w_ub[k];
        }
    }

    /// Diagonals of the cold-start system, where every s/z is taken as 1.
    pub fn set_unit_diagonals(&mut self, boxes: &BoxIndex, rho: f64, delta: f64) {
        let w = 1.0 + delta;
        self.diag.rho = rho;
        self.diag.delta = delta;
        self.diag.x_reg.fill(rho);
        self.diag.w.fill(w);
        self.w_lb.fill(w);
        self.w_ub.fill(w);
        for &i in boxes.lb.iter().chain(&boxes.ub) {
            self.diag.x_reg[i] += 1.0 / w;
        }
    }

    /// Complementarity targets s∘z (affine step).
    pub fn set_affine_targets(&mut self, it: &Iterate) {
        for (rc, (&s, &z)) in self.rc.iter_mut().zip(it.s.iter().zip(&it.z)) {
            *rc = s * z;
        }
        for (rc, (&s, &z)) in self.rc_lb.iter_mut().zip(it.s_lb.iter().zip(&it.z_lb)) {
            *rc = s * z;
        }
        for (rc, (&s, &z)) in self.rc_ub.iter_mut().zip(it.s_ub.iter().zip(&it.z_ub)) {
            *rc = s * z;
        }
    }

    /// Complementarity targets s∘z + ds_aff∘dz_aff - σμ (corrector step).
    pub fn set_corrector_targets(&mut self, it: &Iterate, sigma_mu: f64) {
        let d = &self.dir_aff;
        for i in 0..self.rc.len() {
            self.rc[i] = it.s[i] * it.z[i] + d.s[i] * d.z[i] - sigma_mu;
        }
        for k in 0..self.rc_lb.len() {
            self.rc_lb[k] = it.s_lb[k] * it.z_lb[k] + d.s_lb[k] * d.z_lb[k] - sigma_mu;
        }
        for k in 0..self.rc_ub.len() {
            self.rc_ub[k] = it.s_ub[k] * it.z_ub[k] + d.s_ub[k] * d.z_ub[k] - sigma_mu;
        }
    }

    /// Newton direction for the current residuals and complementarity
    /// targets, written to `self.dir`.
    ///
    /// Eliminates the slacks and box duals:
    ///
    /// ```text
    /// t_lb  = -r_lb + rc_lb / z_lb          t_ub = -r_ub + rc_ub / z_ub
    /// rhs_x = -r_dual - E_lb^T (t_lb / w_lb) + E_ub^T (t_ub / w_ub)
    /// rhs_y = -r_eq
    /// rhs_z = -r_ineq + rc / z
    /// ```
    ///
    /// and recovers them from (dx, dy, dz) afterwards.
    pub fn newton_direction<M: QpMatrix>(
        &mut self,
        kkt: &mut M::Kkt,
        data: &ProblemData<M>,
        boxes: &BoxIndex,
        it: &Iterate,
        refine_iters: usize,
        timers: &mut PerfTimers,
    ) {
        let r = &self.residuals;

        for k in 0..self.t_lb.len() {
            self.t_lb[k] = -r.r_lb[k] + self.rc_lb[k] / it.z_lb[k];
        }
        for k in 0..self.t_ub.len() {
            self.t_ub[k] = -r.r_ub[k] + self.rc_ub[k] / it.z_ub[k];
        }

        for (rhs, &rd) in self.rhs.x.iter_mut().zip(&r.r_dual) {
            *rhs = -rd;
        }
        for (k, &i) in boxes.lb.iter().enumerate() {
            self.rhs.x[i] -= self.t_lb[k] / self.w_lb[k];
        }
        for (k, &i) in boxes.ub.iter().enumerate() {
            self.rhs.x[i] += self.t_ub[k] / self.w_ub[k];
        }
        for (rhs, &re) in self.rhs.y.iter_mut().zip(&r.r_eq) {
            *rhs = -re;
        }
        for i in 0..self.rhs.z.len() {
            self.rhs.z[i] = -r.r_ineq[i] + self.rc[i] / it.z[i];
        }

        self.last_kkt_residual = timers.time(PerfSection::Solve, || {
            solve_refined::<M>(kkt, data, &self.diag, &self.rhs, &mut self.sol, refine_iters, &mut self.refine)
        });

        let dir = &mut self.dir;
        dir.x.copy_from_slice(&self.sol.x);
        dir.y.copy_from_slice(&self.sol.y);
        dir.z.copy_from_slice(&self.sol.z);

        for i in 0..dir.s.len() {
            dir.s[i] = (-self.rc[i] - it.s[i] * dir.z[i]) / it.z[i];
        }
        for (k, &i) in boxes.lb.iter().enumerate() {
            dir.z_lb[k] = (-dir.x[i] - self.t_lb[k]) / self.w_lb[k];
            dir.s_lb[k] = (-self.rc_lb[k] - it.s_lb[k] * dir.z_lb[k]) / it.z_lb[k];
        }
        for (k, &i) in boxes.ub.iter().enumerate() {
            dir.z_ub[k] = (dir.x[i] - self.t_ub[k]) / self.w_ub[k];
            dir.s_ub[k] = (-self.rc_ub[k] - it.s_ub[k] * dir.z_ub[k]) / it.z_ub[k];
        }
    }

    /// Solve K [x; y; z] = rhs with the current diagonals, used by the cold
    /// start. The solution is read back through [`Self::solution`].
    pub fn solve_plain<M: QpMatrix>(
        &mut self,
        kkt: &mut M::Kkt,
        data: &ProblemData<M>,
        boxes: &BoxIndex,
        refine_iters: usize,
    ) {
        // [-c + E_lb^T x_lb / w + E_ub^T x_ub / w; b; h]
        for (rhs, &c) in self.rhs.x.iter_mut().zip(&data.c) {
            *rhs = -c;
        }
        for (k, &i) in boxes.lb.iter().enumerate() {
            self.rhs.x[i] += data.x_lb[i] / self.w_lb[k];
        }
        for (k, &i) in boxes.ub.iter().enumerate() {
            self.rhs.x[i] += data.x_ub[i] / self.w_ub[k];
        }
        self.rhs.y.copy_from_slice(&data.b);
        self.rhs.z.copy_from_slice(&data.h);

        self.last_kkt_residual =
            solve_refined::<M>(kkt, data, &self.diag, &self.rhs, &mut self.sol, refine_iters, &mut self.refine);
    }

    /// Solution of the last [`Self::solve_plain`].
    pub fn solution(&self) -> &KktVector {
        &self.sol
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kkt::sparse::SparseKkt;
    use crate::kkt::KktSolver;
    use crate::linalg::SparseMatrix;
    use crate::problem::INF;
    use crate::settings::SolverSettings;

    /// The direction must satisfy every linearized equation, not just the
    /// reduced system.
    #[test]
    fn test_direction_satisfies_linearized_system() {
        let data = ProblemData::new(
            SparseMatrix::from_triplets(2, 2, vec![(0, 0, 2.0), (0, 1, 0.5), (1, 1, 1.0)]),
            vec![1.0, -1.0],
        )
        .with_equalities(SparseMatrix::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]), vec![1.0])
        .with_inequalities(SparseMatrix::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, -1.0)]), vec![0.5])
        .with_bounds(vec![0.0, -INF], vec![INF, 3.0]);
        let boxes = BoxIndex::from_bounds(&data.x_lb, &data.x_ub);

        let mut it = Iterate::zeros(2, 1, 1, &boxes);
        it.x = vec![0.3, 0.4];
        it.y = vec![0.1];
        it.z = vec![0.7];
        it.s = vec![1.2];
        it.z_lb = vec![0.9];
        it.s_lb = vec![0.5];
        it.z_ub = vec![1.1];
        it.s_ub = vec![2.0];

        let (rho, delta) = (1e-6, 1e-4);
        let mut ws = StepWorkspace::new(2, 1, 1, &boxes);
        ws.residuals.compute(&data, &boxes, &it);
        ws.set_diagonals(&it, &boxes, rho, delta);
        ws.set_affine_targets(&it);

        let settings = SolverSettings::default_sparse();
        let mut kkt = SparseKkt::symbolic(&data, &settings).unwrap();
        kkt.factorize(&data, &ws.diag).unwrap();
        let mut timers = PerfTimers::default();
        ws.newton_direction::<SparseMatrix>(&mut kkt, &data, &boxes, &it, 3, &mut timers);

        let d = &ws.dir;
        let r = &ws.residuals;

        // (P + ρI) dx + A^T dy + G^T dz - dz_lb e0 + dz_ub e1 = -r_dual
        let mut lhs = vec![0.0; 2];
        data.P.symv_upper(1.0, &d.x, 0.0, &mut lhs);
        data.A.gemv_t(1.0, &d.y, 1.0, &mut lhs);
        data.G.gemv_t(1.0, &d.z, 1.0, &mut lhs);
        lhs[0] += rho * d.x[0] - d.z_lb[0];
        lhs[1] += rho * d.x[1] + d.z_ub[0];
        for i in 0..2 {
            assert!((lhs[i] + r.r_dual[i]).abs() < 1e-9, "dual row {}", i);
        }

        // A dx - δ dy = -r_eq
        let a_dx = d.x[0] + d.x[1];
        assert!((a_dx - delta * d.y[0] + r.r_eq[0]).abs() < 1e-9);

        // G dx + ds - δ dz = -r_ineq
        let g_dx = d.x[0] - d.x[1];
        assert!((g_dx + d.s[0] - delta * d.z[0] + r.r_ineq[0]).abs() < 1e-9);

        // -dx0 + ds_lb - δ dz_lb = -r_lb,  dx1 + ds_ub - δ dz_ub = -r_ub
        assert!((-d.x[0] + d.s_lb[0] - delta * d.z_lb[0] + r.r_lb[0]).abs() < 1e-9);
        assert!((d.x[1] + d.s_ub[0] - delta * d.z_ub[0] + r.r_ub[0]).abs() < 1e-9);

        // z ds + s dz = -s z
        assert!((it.z[0] * d.s[0] + it.s[0] * d.z[0] + it.s[0] * it.z[0]).abs() < 1e-12);
        assert!((it.z_lb[0] * d.s_lb[0] + it.s_lb[0] * d.z_lb[0] + it.s_lb[0] * it.z_lb[0]).abs() < 1e-12);
    }
}
