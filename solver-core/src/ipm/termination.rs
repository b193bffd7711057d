//! Termination criteria.
//!
//! Checks for:
//! - Optimality: primal/dual residuals and duality gap within tolerance
//! - Primal infeasibility: Farkas ray in the change of (y, z, z_lb, z_ub)
//! - Dual infeasibility: improving ray in the change of x
//!
//! Both certificates are tested on the difference between the current
//! iterate and a snapshot taken at the previous check. On an infeasible
//! problem the diverging part of the iterate dominates that difference, so
//! it approaches the certificate ray.

use super::iterate::{BoxIndex, Iterate};
use super::residuals::Metrics;
use crate::linalg::{dot, inf_norm, QpMatrix};
use crate::problem::ProblemData;
use crate::result::{Certificate, CertificateKind};
use crate::settings::SolverSettings;

/// True if the residuals and the gap satisfy the tolerances.
pub fn is_solved(metrics: &Metrics, settings: &SolverSettings) -> bool {
    let primal_ok = metrics.primal_res <= settings.eps_abs + settings.eps_rel * metrics.primal_scale;
    let dual_ok = metrics.dual_res <= settings.eps_abs + settings.eps_rel * metrics.dual_scale;
    let gap_ok =
        metrics.gap <= settings.eps_duality_gap_abs + settings.eps_duality_gap_rel * metrics.gap_scale;
    primal_ok && dual_ok && gap_ok
}

/// Snapshot-based infeasibility detection.
#[derive(Debug, Clone)]
pub struct InfeasibilityDetector {
    snapshot: Iterate,
    delta: Iterate,
    work_n: Vec<f64>,
    work_p: Vec<f64>,
    work_m: Vec<f64>,
}

impl InfeasibilityDetector {
    pub fn new(n: usize, p: usize, m: usize, boxes: &BoxIndex) -> Self {
        Self {
            snapshot: Iterate::zeros(n, p, m, boxes),
            delta: Iterate::zeros(n, p, m, boxes),
            work_n: vec![0.0; n],
            work_p: vec![0.0; p],
            work_m: vec![0.0; m],
        }
    }

    /// Remember `it` as the reference for the next check.
    pub fn snapshot(&mut self, it: &Iterate) {
        self.snapshot.copy_from(it);
    }

    /// Test both certificates on `it - snapshot`.
    pub fn check<M: QpMatrix>(
        &mut self,
        data: &ProblemData<M>,
        boxes: &BoxIndex,
        it: &Iterate,
        eps: f64,
    ) -> Option<Certificate> {
        self.delta.copy_from(it);
        self.delta.axpy(-1.0, &self.snapshot);

        self.primal_certificate(data, boxes, eps)
            .or_else(|| self.dual_certificate(data, boxes, eps))
    }

    /// y, z, z_lb, z_ub ray with
    ///
    /// ```text
    /// Δz, Δz_lb, Δz_ub >= 0
    /// A^T Δy + G^T Δz - E_lb^T Δz_lb + E_ub^T Δz_ub = 0
    /// b^T Δy + h^T Δz - x_lb^T Δz_lb + x_ub^T Δz_ub < 0
    /// ```
    fn primal_certificate<M: QpMatrix>(
        &mut self,
        data: &ProblemData<M>,
        boxes: &BoxIndex,
        eps: f64,
    ) -> Option<Certificate> {
        let d = &self.delta;
        let norm = inf_norm(&d.y)
            .max(inf_norm(&d.z))
            .max(inf_norm(&d.z_lb))
            .max(inf_norm(&d.z_ub));
        if !(norm > 0.0 && norm.is_finite()) {
            return None;
        }
        let tol = eps * norm;

        let min_dual = d
            .z
            .iter()
            .chain(&d.z_lb)
            .chain(&d.z_ub)
            .fold(f64::INFINITY, |a, &b| a.min(b));
        if min_dual < -tol {
            return None;
        }

        let r = &mut self.work_n;
        data.A.gemv_t(1.0, &d.y, 0.0, r);
        data.G.gemv_t(1.0, &d.z, 1.0, r);
        let mut objective = dot(&data.b, &d.y) + dot(&data.h, &d.z);
        for (k, &i) in boxes.lb.iter().enumerate() {
            r[i] -= d.z_lb[k];
            objective -= data.x_lb[i] * d.z_lb[k];
        }
        for (k, &i) in boxes.ub.iter().enumerate() {
            r[i] += d.z_ub[k];
            objective += data.x_ub[i] * d.z_ub[k];
        }
        let residual = inf_norm(r);

        if residual <= tol && objective < -tol {
            Some(Certificate {
                kind: CertificateKind::PrimalInfeasible,
                residual: residual / norm,
                objective: objective / norm,
            })
        } else {
            None
        }
    }

    /// x ray with
    ///
    /// ```text
    /// P Δx = 0,  A Δx = 0,  G Δx <= 0
    /// Δx[lb] >= 0,  Δx[ub] <= 0,  c^T Δx < 0
    /// ```
    fn dual_certificate<M: QpMatrix>(
        &mut self,
        data: &ProblemData<M>,
        boxes: &BoxIndex,
        eps: f64,
    ) -> Option<Certificate> {
        let dx = &self.delta.x;
        let norm = inf_norm(dx);
        if !(norm > 0.0 && norm.is_finite()) {
            return None;
        }
        let tol = eps * norm;

        let objective = dot(&data.c, dx);
        if objective >= -tol {
            return None;
        }

        data.P.symv_upper(1.0, dx, 0.0, &mut self.work_n);
        data.A.gemv(1.0, dx, 0.0, &mut self.work_p);
        data.G.gemv(1.0, dx, 0.0, &mut self.work_m);

        let mut residual = inf_norm(&self.work_n).max(inf_norm(&self.work_p));
        residual = self.work_m.iter().fold(residual, |a, &g| a.max(g));
        residual = boxes.lb.iter().fold(residual, |a, &i| a.max(-dx[i]));
        residual = boxes.ub.iter().fold(residual, |a, &i| a.max(dx[i]));

        if residual <= tol {
            Some(Certificate {
                kind: CertificateKind::DualInfeasible,
                residual: residual / norm,
                objective: objective / norm,
            })
        } else {
            None
        }
    }
}
