//! Optimality residuals and the metrics derived from them.

use super::iterate::{BoxIndex, Iterate};
use crate::linalg::{dot, inf_norm, QpMatrix};
use crate::problem::ProblemData;

/// Residual norms, scales and objectives of one iterate.
#[derive(Debug, Copy, Clone, Default)]
pub struct Metrics {
    pub primal_res: f64,
    pub dual_res: f64,
    pub primal_scale: f64,
    pub dual_scale: f64,

    pub primal_rel: f64,
    pub dual_rel: f64,

    pub primal_obj: f64,
    pub dual_obj: f64,
    pub gap: f64,
    pub gap_scale: f64,
    pub gap_rel: f64,

    pub mu: f64,
}

impl Metrics {
    /// Combined relative primal residual, dual residual and gap, used to
    /// rank iterates of an unfinished solve.
    pub fn merit(&self) -> f64 {
        self.primal_rel + self.dual_rel + self.gap_rel
    }

    pub fn all_finite(&self) -> bool {
        [self.primal_res, self.dual_res, self.gap, self.primal_obj, self.dual_obj, self.mu]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Residual vectors of the optimality conditions, kept for the Newton
/// right-hand sides.
///
/// ```text
/// r_dual = P x + c + A^T y + G^T z - E_lb^T z_lb + E_ub^T z_ub
/// r_eq   = A x - b
/// r_ineq = G x + s - h
/// r_lb   = s_lb - x[lb] + x_lb[lb]
/// r_ub   = s_ub + x[ub] - x_ub[ub]
/// ```
#[derive(Debug, Clone)]
pub struct Residuals {
    pub r_dual: Vec<f64>,
    pub r_eq: Vec<f64>,
    pub r_ineq: Vec<f64>,
    pub r_lb: Vec<f64>,
    pub r_ub: Vec<f64>,

    px: Vec<f64>,
    aty: Vec<f64>,
    gtz: Vec<f64>,
    ax: Vec<f64>,
    gx: Vec<f64>,
}

impl Residuals {
    pub fn new(n: usize, p: usize, m: usize, boxes: &BoxIndex) -> Self {
        Self {
            r_dual: vec![0.0; n],
            r_eq: vec![0.0; p],
            r_ineq: vec![0.0; m],
            r_lb: vec![0.0; boxes.n_lb()],
            r_ub: vec![0.0; boxes.n_ub()],
            px: vec![0.0; n],
            aty: vec![0.0; n],
            gtz: vec![0.0; n],
            ax: vec![0.0; p],
            gx: vec![0.0; m],
        }
    }

    /// Evaluate residuals and metrics at `it`.
    pub fn compute<M: QpMatrix>(&mut self, data: &ProblemData<M>, boxes: &BoxIndex, it: &Iterate) -> Metrics {
        let x = &it.x;

        data.P.symv_upper(1.0, x, 0.0, &mut self.px);
        data.A.gemv(1.0, x, 0.0, &mut self.ax);
        data.G.gemv(1.0, x, 0.0, &mut self.gx);
        data.A.gemv_t(1.0, &it.y, 0.0, &mut self.aty);
        data.G.gemv_t(1.0, &it.z, 0.0, &mut self.gtz);

        // r_dual
        for i in 0..x.len() {
            self.r_dual[i] = self.px[i] + data.c[i] + self.aty[i] + self.gtz[i];
        }
        for (k, &i) in boxes.lb.iter().enumerate() {
            self.r_dual[i] -= it.z_lb[k];
        }
        for (k, &i) in boxes.ub.iter().enumerate() {
            self.r_dual[i] += it.z_ub[k];
        }

        // r_eq, r_ineq
        for i in 0..self.r_eq.len() {
            self.r_eq[i] = self.ax[i] - data.b[i];
        }
        for i in 0..self.r_ineq.len() {
            self.r_ineq[i] = self.gx[i] + it.s[i] - data.h[i];
        }

        // Box residuals and the bound terms of the objectives.
        let mut lb_inf = 0.0_f64;
        let mut lb_z = 0.0;
        for (k, &i) in boxes.lb.iter().enumerate() {
            let lb = data.x_lb[i];
            self.r_lb[k] = it.s_lb[k] - x[i] + lb;
            lb_inf = lb_inf.max(lb.abs());
            lb_z += lb * it.z_lb[k];
        }
        let mut ub_inf = 0.0_f64;
        let mut ub_z = 0.0;
        for (k, &i) in boxes.ub.iter().enumerate() {
            let ub = data.x_ub[i];
            self.r_ub[k] = it.s_ub[k] + x[i] - ub;
            ub_inf = ub_inf.max(ub.abs());
            ub_z += ub * it.z_ub[k];
        }

        let primal_res = inf_norm(&self.r_eq)
            .max(inf_norm(&self.r_ineq))
            .max(inf_norm(&self.r_lb))
            .max(inf_norm(&self.r_ub));
        let dual_res = inf_norm(&self.r_dual);

        let primal_scale = [
            inf_norm(&self.ax),
            inf_norm(&data.b),
            inf_norm(&self.gx),
            inf_norm(&data.h),
            inf_norm(&it.s),
            inf_norm(x),
            lb_inf,
            ub_inf,
            inf_norm(&it.s_lb),
            inf_norm(&it.s_ub),
        ]
        .iter()
        .fold(0.0_f64, |a, &b| a.max(b));
        let dual_scale = [
            inf_norm(&self.px),
            inf_norm(&data.c),
            inf_norm(&self.aty),
            inf_norm(&self.gtz),
            inf_norm(&it.z_lb),
            inf_norm(&it.z_ub),
        ]
        .iter()
        .fold(0.0_f64, |a, &b| a.max(b));

        let xpx = dot(x, &self.px);
        let ctx = dot(&data.c, x);
        let bty = dot(&data.b, &it.y);
        let htz = dot(&data.h, &it.z);

        let primal_obj = 0.5 * xpx + ctx;
        let dual_obj = -0.5 * xpx - bty - htz + lb_z - ub_z;

        let gap = (xpx + ctx + bty + htz - lb_z + ub_z).abs();
        let gap_scale = [xpx, ctx, bty, htz, lb_z, ub_z]
            .iter()
            .fold(0.0_f64, |a, &b| a.max(b.abs()));

        Metrics {
            primal_res,
            dual_res,
            primal_scale,
            dual_scale,
            primal_rel: primal_res / primal_scale.max(1.0),
            dual_rel: dual_res / dual_scale.max(1.0),
            primal_obj,
            dual_obj,
            gap,
            gap_scale,
            gap_rel: gap / gap_scale.max(1.0),
            mu: it.mu(),
        }
    }
}
