//! Proximal interior-point iteration.
//!
//! Mehrotra predictor-corrector on the regularized KKT system. The proximal
//! centers are the current iterate, so ρ and δ only enter the matrix; they
//! decay with the step length and vanish from the fixed point.
//!
//! The iteration is written once against [`QpMatrix`] and its
//! [`KktSolver`](crate::kkt::KktSolver), so the dense and the sparse backend
//! share every line below.

pub mod diagnostics;
pub mod iterate;
pub mod perf;
pub mod regularization;
pub mod residuals;
pub mod termination;
pub mod workspace;

pub use diagnostics::DiagnosticsConfig;
pub use iterate::{BoxIndex, Direction, Iterate};
pub use perf::{PerfSection, PerfTimers};
pub use regularization::{RegularizationPolicy, RegularizationState};
pub use residuals::{Metrics, Residuals};
pub use termination::{is_solved, InfeasibilityDetector};
pub use workspace::StepWorkspace;

use crate::kkt::KktSolver;
use crate::linalg::QpMatrix;
use crate::problem::ProblemData;
use crate::result::{Certificate, CertificateKind, SolverState};
use crate::settings::SolverSettings;

/// End state of one run of the iteration.
#[derive(Debug, Clone)]
pub struct IpmOutcome {
    pub state: SolverState,
    pub iterations: usize,
    pub metrics: Metrics,
    pub reg: RegularizationState,
    pub sigma: f64,
    pub step_length: f64,
    pub certificate: Option<Certificate>,
    pub timers: PerfTimers,
}

/// Run the iteration from the stored iterate (`warm`) or from a cold start.
///
/// `it` holds the final iterate on return. On `MaxIterReached` that is the
/// iterate with the lowest combined relative residual and gap.
pub fn solve<M: QpMatrix>(
    data: &ProblemData<M>,
    boxes: &BoxIndex,
    kkt: &mut M::Kkt,
    it: &mut Iterate,
    ws: &mut StepWorkspace,
    settings: &SolverSettings,
    warm: bool,
) -> IpmOutcome {
    let policy = RegularizationPolicy::from_settings(settings);
    let diag_cfg = DiagnosticsConfig::from_env();
    let mut reg = policy.init_state();
    let mut timers = PerfTimers::default();
    let mut certificate = None;
    let mut metrics = Metrics::default();
    let mut sigma = 0.0;
    let mut step_length = 0.0;
    let mut iter = 0;

    if settings.verbose {
        log::info!(
            "proxip {} backend: n={} p={} m={} lb={} ub={} ({} start)",
            M::BACKEND,
            data.num_vars(),
            data.num_eq(),
            data.num_ineq(),
            boxes.n_lb(),
            boxes.n_ub(),
            if warm { "warm" } else { "cold" }
        );
        log::info!(
            "{:>4} {:>12} {:>12} {:>10} {:>10} {:>10} {:>9} {:>9} {:>6}",
            "iter", "primal obj", "dual obj", "primal res", "dual res", "gap", "rho", "delta", "step"
        );
    }

    let started = if warm {
        metrics = ws.residuals.compute(data, boxes, it);
        if it.all_finite() && metrics.all_finite() && is_solved(&metrics, settings) {
            Some(SolverState::Solved)
        } else {
            warm_start(data, boxes, it, settings.warm_start_floor);
            None
        }
    } else if cold_start(data, boxes, kkt, it, ws, settings, &policy, &mut reg, &mut timers) {
        None
    } else {
        Some(SolverState::NumericalError)
    };

    let state = match started {
        Some(state) => state,
        None => {
            ws.detector.snapshot(it);
            ws.best.reset();
            loop {
                metrics = ws.residuals.compute(data, boxes, it);
                if !it.all_finite() || !metrics.all_finite() {
                    log::warn!("non-finite iterate at iteration {}", iter);
                    break SolverState::NumericalError;
                }
                ws.best.consider(it, &metrics);

                if settings.verbose {
                    log::info!(
                        "{:4} {:12.5e} {:12.5e} {:10.3e} {:10.3e} {:10.3e} {:9.2e} {:9.2e} {:6.4}",
                        iter,
                        metrics.primal_obj,
                        metrics.dual_obj,
                        metrics.primal_res,
                        metrics.dual_res,
                        metrics.gap,
                        reg.rho,
                        reg.delta,
                        step_length
                    );
                }
                if diag_cfg.should_log(iter) {
                    log::debug!(
                        "iter {:4} mu={:.3e} sigma={:.3e} alpha={:.3e} rel_p={:.3e} rel_d={:.3e} gap_rel={:.3e} kkt_res={:.3e} retries={}",
                        iter,
                        metrics.mu,
                        sigma,
                        step_length,
                        metrics.primal_rel,
                        metrics.dual_rel,
                        metrics.gap_rel,
                        ws.last_kkt_residual,
                        reg.retries
                    );
                }

                if is_solved(&metrics, settings) {
                    break SolverState::Solved;
                }
                if iter > 0 && iter % settings.infeasibility_check_interval == 0 {
                    if let Some(cert) = ws.detector.check(data, boxes, it, settings.eps_infeasibility) {
                        certificate = Some(cert);
                        break match cert.kind {
                            CertificateKind::PrimalInfeasible => SolverState::PrimalInfeasible,
                            CertificateKind::DualInfeasible => SolverState::DualInfeasible,
                        };
                    }
                    ws.detector.snapshot(it);
                }
                if iter >= settings.max_iter {
                    // Report the best iterate seen, not the last one.
                    if let Some(best) = ws.best.restore(it) {
                        metrics = best;
                    }
                    break SolverState::MaxIterReached;
                }

                if !factorize(data, boxes, kkt, it, ws, &policy, &mut reg, &mut timers, false) {
                    break SolverState::NumericalError;
                }

                // Predictor
                let mu = metrics.mu;
                ws.set_affine_targets(it);
                ws.newton_direction::<M>(kkt, data, boxes, it, settings.kkt_refine_iters, &mut timers);

                let alpha = if it.pair_count() == 0 {
                    // Without complementarity pairs the affine step is the Newton step.
                    sigma = 0.0;
                    1.0
                } else {
                    ws.dir_aff.copy_from(&ws.dir);
                    let alpha_aff = it.max_step(&ws.dir_aff);
                    let mu_aff = it.mu_after_step(&ws.dir_aff, alpha_aff);
                    sigma = if mu > 0.0 { (mu_aff / mu).powi(3).clamp(0.0, 1.0) } else { 0.0 };

                    // Corrector
                    ws.set_corrector_targets(it, sigma * mu);
                    ws.newton_direction::<M>(kkt, data, boxes, it, settings.kkt_refine_iters, &mut timers);
                    (settings.tau * it.max_step(&ws.dir)).min(1.0)
                };

                it.axpy(alpha, &ws.dir);
                policy.advance(&mut reg, alpha);
                step_length = alpha;
                iter += 1;
            }
        }
    };

    if settings.verbose {
        log::info!(
            "status: {:?} after {} iterations (primal res {:.3e}, dual res {:.3e}, gap {:.3e})",
            state,
            iter,
            metrics.primal_res,
            metrics.dual_res,
            metrics.gap
        );
    }
    if diag_cfg.enabled {
        log::debug!(
            "timers: factorization={:?} kkt solve={:?}",
            timers.factorization,
            timers.solve
        );
    }

    IpmOutcome {
        state,
        iterations: iter,
        metrics,
        reg,
        sigma,
        step_length,
        certificate,
        timers,
    }
}

/// Numeric factorization with regularization bumps on failure.
///
/// `unit_slacks` selects the cold-start diagonals (every s/z taken as 1).
#[allow(clippy::too_many_arguments)]
fn factorize<M: QpMatrix>(
    data: &ProblemData<M>,
    boxes: &BoxIndex,
    kkt: &mut M::Kkt,
    it: &Iterate,
    ws: &mut StepWorkspace,
    policy: &RegularizationPolicy,
    reg: &mut RegularizationState,
    timers: &mut PerfTimers,
    unit_slacks: bool,
) -> bool {
    let mut attempts = 0;
    loop {
        if unit_slacks {
            ws.set_unit_diagonals(boxes, reg.rho, reg.delta);
        } else {
            ws.set_diagonals(it, boxes, reg.rho, reg.delta);
        }
        let result = timers.time(PerfSection::Factorization, || kkt.factorize(data, &ws.diag));
        match result {
            Ok(()) => return true,
            Err(e) if attempts < policy.max_retries => {
                attempts += 1;
                policy.bump(reg);
                log::warn!(
                    "KKT factorization failed ({}); retry {} with rho={:.2e} delta={:.2e}",
                    e,
                    attempts,
                    reg.rho,
                    reg.delta
                );
            }
            Err(e) => {
                log::warn!("KKT factorization failed ({}); giving up after {} retries", e, attempts);
                return false;
            }
        }
    }
}

/// Starting point from one regularized solve with S Z^{-1} = I.
#[allow(clippy::too_many_arguments)]
fn cold_start<M: QpMatrix>(
    data: &ProblemData<M>,
    boxes: &BoxIndex,
    kkt: &mut M::Kkt,
    it: &mut Iterate,
    ws: &mut StepWorkspace,
    settings: &SolverSettings,
    policy: &RegularizationPolicy,
    reg: &mut RegularizationState,
    timers: &mut PerfTimers,
) -> bool {
    if !factorize(data, boxes, kkt, it, ws, policy, reg, timers, true) {
        return false;
    }
    let w = 1.0 + reg.delta;
    timers.time(PerfSection::Solve, || ws.solve_plain::<M>(kkt, data, boxes, settings.kkt_refine_iters));
    let sol = ws.solution();
    it.x.copy_from_slice(&sol.x);
    it.y.copy_from_slice(&sol.y);
    // z = (G x - h) / w from the solve
    it.z.copy_from_slice(&sol.z);

    // s = h - G x
    it.s.copy_from_slice(&data.h);
    data.G.gemv(-1.0, &it.x, 1.0, &mut it.s);
    for (k, &i) in boxes.lb.iter().enumerate() {
        it.s_lb[k] = it.x[i] - data.x_lb[i];
        it.z_lb[k] = -it.s_lb[k] / w;
    }
    for (k, &i) in boxes.ub.iter().enumerate() {
        it.s_ub[k] = data.x_ub[i] - it.x[i];
        it.z_ub[k] = -it.s_ub[k] / w;
    }

    shift_into_interior([&mut it.s, &mut it.s_lb, &mut it.s_ub]);
    shift_into_interior([&mut it.z, &mut it.z_lb, &mut it.z_ub]);
    true
}

/// Shift a family of vectors by `max(0, 1 - min)` so every entry is >= 1.
fn shift_into_interior(family: [&mut Vec<f64>; 3]) {
    let min = family
        .iter()
        .flat_map(|v| v.iter())
        .fold(f64::INFINITY, |a, &b| a.min(b));
    if !min.is_finite() {
        return;
    }
    let shift = (1.0 - min).max(0.0);
    for v in family {
        for vi in v.iter_mut() {
            *vi += shift;
        }
    }
}

/// Recompute slacks from the current data and move the stored iterate
/// strictly inside the cone.
fn warm_start<M: QpMatrix>(data: &ProblemData<M>, boxes: &BoxIndex, it: &mut Iterate, floor: f64) {
    it.s.copy_from_slice(&data.h);
    data.G.gemv(-1.0, &it.x, 1.0, &mut it.s);
    for (k, &i) in boxes.lb.iter().enumerate() {
        it.s_lb[k] = it.x[i] - data.x_lb[i];
    }
    for (k, &i) in boxes.ub.iter().enumerate() {
        it.s_ub[k] = data.x_ub[i] - it.x[i];
    }
    for v in [&mut it.s, &mut it.s_lb, &mut it.s_ub, &mut it.z, &mut it.z_lb, &mut it.z_ub] {
        for vi in v.iter_mut() {
            *vi = vi.max(floor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::{DenseMatrix, SparseMatrix};
    use crate::problem::INF;

    fn run<M: QpMatrix>(data: &ProblemData<M>, settings: &SolverSettings) -> (IpmOutcome, Iterate) {
        let boxes = BoxIndex::from_bounds(&data.x_lb, &data.x_ub);
        let (n, p, m) = (data.num_vars(), data.num_eq(), data.num_ineq());
        let mut kkt = M::Kkt::symbolic(data, settings).unwrap();
        let mut it = Iterate::zeros(n, p, m, &boxes);
        let mut ws = StepWorkspace::new(n, p, m, &boxes);
        let out = solve(data, &boxes, &mut kkt, &mut it, &mut ws, settings, false);
        (out, it)
    }

    #[test]
    fn test_shift_into_interior() {
        let mut a = vec![-2.0, 0.5];
        let mut b = vec![3.0];
        let mut c = vec![];
        shift_into_interior([&mut a, &mut b, &mut c]);
        assert_eq!(a, vec![1.0, 3.5]);
        assert_eq!(b, vec![6.0]);

        // Already interior: unchanged.
        let mut d = vec![2.0];
        shift_into_interior([&mut d, &mut vec![], &mut vec![]]);
        assert_eq!(d, vec![2.0]);
    }

    #[test]
    fn test_box_only_qp() {
        // min (x0 - 2)^2 + (x1 + 3)^2 with 0 <= x <= 1: x = (1, 0)
        let data = ProblemData::new(
            SparseMatrix::from_triplets(2, 2, vec![(0, 0, 2.0), (1, 1, 2.0)]),
            vec![-4.0, 6.0],
        )
        .with_bounds(vec![0.0, 0.0], vec![1.0, 1.0]);
        let (out, it) = run(&data, &SolverSettings::default_sparse());
        assert_eq!(out.state, SolverState::Solved);
        assert!((it.x[0] - 1.0).abs() < 1e-6);
        assert!(it.x[1].abs() < 1e-6);
        // Active upper bound of x0 carries dual 2, active lower bound of x1 carries 6.
        assert!((it.z_ub[0] - 2.0).abs() < 1e-5);
        assert!((it.z_lb[1] - 6.0).abs() < 1e-5);
    }

    #[test]
    fn test_unconstrained_dense() {
        // min x0^2 + x0 x1 + x1^2 - x0: x = (2/3, -1/3)
        let data = ProblemData::new(
            DenseMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 2.0]).unwrap(),
            vec![-1.0, 0.0],
        );
        let (out, it) = run(&data, &SolverSettings::default_dense());
        assert_eq!(out.state, SolverState::Solved);
        assert!((it.x[0] - 2.0 / 3.0).abs() < 1e-7);
        assert!((it.x[1] + 1.0 / 3.0).abs() < 1e-7);
    }

    #[test]
    fn test_iteration_cap_reports_best_iterate() {
        // min 3x0^2 + 2x1^2 - x0 - 4x1, x0 = 2x1, x0 <= 1, -x0 <= 1, -1 <= x1 <= 1
        let data = ProblemData::new(
            SparseMatrix::from_triplets(2, 2, vec![(0, 0, 6.0), (1, 1, 4.0)]),
            vec![-1.0, -4.0],
        )
        .with_equalities(SparseMatrix::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, -2.0)]), vec![0.0])
        .with_inequalities(
            SparseMatrix::from_triplets(2, 2, vec![(0, 0, 1.0), (1, 0, -1.0)]),
            vec![1.0, 1.0],
        )
        .with_bounds(vec![-INF, -1.0], vec![INF, 1.0]);
        let boxes = BoxIndex::from_bounds(&data.x_lb, &data.x_ub);

        let mut previous = f64::INFINITY;
        for max_iter in 1..=6 {
            let settings = SolverSettings { max_iter, ..SolverSettings::default_sparse() };
            let (out, it) = run(&data, &settings);
            if out.state == SolverState::Solved {
                break;
            }
            assert_eq!(out.state, SolverState::MaxIterReached);
            assert_eq!(out.iterations, max_iter);

            // The reported metrics describe the returned iterate.
            let merit = Residuals::new(2, 1, 2, &boxes).compute(&data, &boxes, &it).merit();
            assert!((merit - out.metrics.merit()).abs() <= 1e-12 * (1.0 + merit));

            // A longer run has seen every iterate of a shorter one.
            assert!(merit <= previous, "cap {}: merit {} after {}", max_iter, merit, previous);
            previous = merit;
        }
    }

    #[test]
    fn test_free_variable_with_infinite_bounds() {
        let data = ProblemData::new(SparseMatrix::from_triplets(1, 1, vec![(0, 0, 1.0)]), vec![-3.0])
            .with_bounds(vec![-INF], vec![f64::INFINITY]);
        let (out, it) = run(&data, &SolverSettings::default_sparse());
        assert_eq!(out.state, SolverState::Solved);
        assert!((it.x[0] - 3.0).abs() < 1e-7);
        assert!(it.s_lb.is_empty() && it.s_ub.is_empty());
    }
}
