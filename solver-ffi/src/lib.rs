//! C ABI for the proxip QP solver.
//!
//! All functions are `#[no_mangle] extern "C"`.
//!
//! Memory convention:
//!   - Problem data is passed as flat arrays owned by the caller and copied
//!     during setup and update.
//!   - The workspace is created by `proxip_setup_*` and released by
//!     `proxip_cleanup`. Its `result` arrays are owned by the workspace and
//!     refreshed after every solve.
//!   - Setup and update return [`PROXIP_OK`] or a negative error code; the
//!     error itself is logged through the `log` facade.

#![allow(non_snake_case)]

mod convert;
pub mod types;

use std::os::raw::c_int;
use std::ptr;

use proxip_core::{
    DenseMatrix, DenseWorkspace, ProblemData, QpMatrix, QpUpdate, SolveResult, SolveStatus, SolverSettings,
    SparseMatrix, SparseWorkspace, INF,
};

use convert::{csc_matrix, dense_matrix, dims, fail, opt_slice, or_zeros, settings_or, settings_to_c, vec_or};
pub use types::*;

enum Solver {
    Dense(DenseWorkspace),
    Sparse(SparseWorkspace),
}

/// Result arrays with a fixed length for the lifetime of the workspace, so
/// the pointers handed to C never move.
struct ResultBuffers {
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
    z_lb: Vec<f64>,
    z_ub: Vec<f64>,
    s: Vec<f64>,
    s_lb: Vec<f64>,
    s_ub: Vec<f64>,
}

struct Inner {
    solver: Solver,
    buffers: ResultBuffers,
    result: Box<ProxipResult>,
}

/// Solver workspace. Only `result` is meant to be read from C.
#[repr(C)]
pub struct ProxipWorkspace {
    pub result: *mut ProxipResult,
    inner: Box<Inner>,
}

impl ProxipWorkspace {
    fn new_raw(solver: Solver) -> *mut ProxipWorkspace {
        let (n, p, m) = match &solver {
            Solver::Dense(ws) => problem_dims(ws.problem()),
            Solver::Sparse(ws) => problem_dims(ws.problem()),
        };
        let mut buffers = ResultBuffers {
            x: vec![0.0; n],
            y: vec![0.0; p],
            z: vec![0.0; m],
            z_lb: vec![0.0; n],
            z_ub: vec![0.0; n],
            s: vec![0.0; m],
            s_lb: vec![INF; n],
            s_ub: vec![INF; n],
        };
        let result = Box::new(ProxipResult {
            x: buffers.x.as_mut_ptr(),
            y: buffers.y.as_mut_ptr(),
            z: buffers.z.as_mut_ptr(),
            z_lb: buffers.z_lb.as_mut_ptr(),
            z_ub: buffers.z_ub.as_mut_ptr(),
            s: buffers.s.as_mut_ptr(),
            s_lb: buffers.s_lb.as_mut_ptr(),
            s_ub: buffers.s_ub.as_mut_ptr(),
            info: empty_info(),
        });
        let mut inner = Box::new(Inner { solver, buffers, result });
        let result_ptr: *mut ProxipResult = &mut *inner.result;
        inner.publish();
        Box::into_raw(Box::new(ProxipWorkspace { result: result_ptr, inner }))
    }
}

impl Inner {
    /// Copy the core result into the C-visible buffers.
    fn publish(&mut self) {
        let r: &SolveResult = match &self.solver {
            Solver::Dense(ws) => ws.result(),
            Solver::Sparse(ws) => ws.result(),
        };
        let b = &mut self.buffers;
        for (dst, src) in [
            (&mut b.x, &r.x),
            (&mut b.y, &r.y),
            (&mut b.z, &r.z),
            (&mut b.z_lb, &r.z_lb),
            (&mut b.z_ub, &r.z_ub),
            (&mut b.s, &r.s),
            (&mut b.s_lb, &r.s_lb),
            (&mut b.s_ub, &r.s_ub),
        ] {
            if dst.len() == src.len() {
                dst.copy_from_slice(src);
            }
        }

        let info = &r.info;
        self.result.info = ProxipInfo {
            status: r.status.code(),
            iter: info.iterations as ProxipInt,
            rho: info.rho,
            delta: info.delta,
            mu: info.mu,
            sigma: info.sigma,
            step_length: info.step_length,
            primal_obj: info.primal_obj,
            dual_obj: info.dual_obj,
            primal_res: info.primal_res,
            dual_res: info.dual_res,
            duality_gap: info.duality_gap,
            factor_retries: info.factor_retries as ProxipInt,
            setup_time: info.setup_time.as_secs_f64(),
            update_time: info.update_time.as_secs_f64(),
            solve_time: info.solve_time.as_secs_f64(),
            run_time: info.run_time.as_secs_f64(),
        };
    }
}

fn problem_dims<M: QpMatrix>(problem: &ProblemData<M>) -> (usize, usize, usize) {
    (problem.num_vars(), problem.num_eq(), problem.num_ineq())
}

fn empty_info() -> ProxipInfo {
    ProxipInfo {
        status: SolveStatus::Unsolved.code(),
        iter: 0,
        rho: 0.0,
        delta: 0.0,
        mu: 0.0,
        sigma: 0.0,
        step_length: 0.0,
        primal_obj: 0.0,
        dual_obj: 0.0,
        primal_res: 0.0,
        dual_res: 0.0,
        duality_gap: 0.0,
        factor_retries: 0,
        setup_time: 0.0,
        update_time: 0.0,
        solve_time: 0.0,
        run_time: 0.0,
    }
}

// ─────────────────────────────────────────────────────────────
//  Settings
// ─────────────────────────────────────────────────────────────

/// Fill `settings` with the dense-backend defaults.
///
/// # Safety
/// `settings` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn proxip_set_default_settings_dense(settings: *mut ProxipSettings) {
    if let Some(s) = settings.as_mut() {
        *s = settings_to_c(&SolverSettings::default_dense());
    }
}

/// Fill `settings` with the sparse-backend defaults.
///
/// # Safety
/// `settings` must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn proxip_set_default_settings_sparse(settings: *mut ProxipSettings) {
    if let Some(s) = settings.as_mut() {
        *s = settings_to_c(&SolverSettings::default_sparse());
    }
}

// ─────────────────────────────────────────────────────────────
//  Sparse matrix helpers
// ─────────────────────────────────────────────────────────────

/// Allocate a compressed-column view over caller-owned arrays. Release it
/// with [`proxip_csc_free`].
#[no_mangle]
pub extern "C" fn proxip_csc_matrix(
    m: ProxipInt,
    n: ProxipInt,
    nnz: ProxipInt,
    p: *const ProxipInt,
    i: *const ProxipInt,
    x: *const ProxipFloat,
) -> *mut ProxipCsc {
    Box::into_raw(Box::new(ProxipCsc { m, n, nnz, p, i, x }))
}

/// Release a view created by [`proxip_csc_matrix`].
///
/// # Safety
/// `csc` must be null or a pointer returned by `proxip_csc_matrix`.
#[no_mangle]
pub unsafe extern "C" fn proxip_csc_free(csc: *mut ProxipCsc) {
    if !csc.is_null() {
        drop(Box::from_raw(csc));
    }
}

// ─────────────────────────────────────────────────────────────
//  Setup
// ─────────────────────────────────────────────────────────────

/// Set up a dense workspace. On success `*workspace` points to the new
/// workspace; on failure it is null.
///
/// A null `settings` selects the dense defaults.
///
/// # Safety
/// `workspace` must be valid for writes, `data` must point to a valid record
/// whose arrays have the sizes implied by n, p and m.
#[no_mangle]
pub unsafe extern "C" fn proxip_setup_dense(
    workspace: *mut *mut ProxipWorkspace,
    data: *const ProxipDataDense,
    settings: *const ProxipSettings,
) -> c_int {
    if workspace.is_null() {
        return PROXIP_ERR_NULL_POINTER;
    }
    *workspace = ptr::null_mut();
    let Some(data) = data.as_ref() else {
        return PROXIP_ERR_NULL_POINTER;
    };
    match setup_dense(data, settings) {
        Ok(ws) => {
            *workspace = ProxipWorkspace::new_raw(Solver::Dense(ws));
            PROXIP_OK
        }
        Err(code) => code,
    }
}

unsafe fn setup_dense(d: &ProxipDataDense, settings: *const ProxipSettings) -> Result<DenseWorkspace, c_int> {
    let settings = settings_or(settings, SolverSettings::default_dense())?;
    let (n, p, m) = dims(d.n, d.p, d.m)?;
    let P = or_zeros(dense_matrix(d.P, n, n)?, n, n);
    let A = or_zeros(dense_matrix(d.A, p, n)?, p, n);
    let G = or_zeros(dense_matrix(d.G, m, n)?, m, n);
    let problem = ProblemData::new(P, vec_or(d.c, n, 0.0))
        .with_equalities(A, vec_or(d.b, p, 0.0))
        .with_inequalities(G, vec_or(d.h, m, 0.0))
        .with_bounds(vec_or(d.x_lb, n, -INF), vec_or(d.x_ub, n, INF));
    DenseWorkspace::setup(problem, settings).map_err(fail)
}

/// Set up a sparse workspace. Null handling as for [`proxip_setup_dense`].
///
/// # Safety
/// `workspace` must be valid for writes, `data` must point to a valid record
/// whose matrices and vectors have the sizes implied by n, p and m.
#[no_mangle]
pub unsafe extern "C" fn proxip_setup_sparse(
    workspace: *mut *mut ProxipWorkspace,
    data: *const ProxipDataSparse,
    settings: *const ProxipSettings,
) -> c_int {
    if workspace.is_null() {
        return PROXIP_ERR_NULL_POINTER;
    }
    *workspace = ptr::null_mut();
    let Some(data) = data.as_ref() else {
        return PROXIP_ERR_NULL_POINTER;
    };
    match setup_sparse(data, settings) {
        Ok(ws) => {
            *workspace = ProxipWorkspace::new_raw(Solver::Sparse(ws));
            PROXIP_OK
        }
        Err(code) => code,
    }
}

unsafe fn setup_sparse(d: &ProxipDataSparse, settings: *const ProxipSettings) -> Result<SparseWorkspace, c_int> {
    let settings = settings_or(settings, SolverSettings::default_sparse())?;
    let (n, p, m) = dims(d.n, d.p, d.m)?;
    let P = or_zeros(csc_matrix(d.P, n, n, "P")?, n, n);
    let A = or_zeros(csc_matrix(d.A, p, n, "A")?, p, n);
    let G = or_zeros(csc_matrix(d.G, m, n, "G")?, m, n);
    let problem = ProblemData::new(P, vec_or(d.c, n, 0.0))
        .with_equalities(A, vec_or(d.b, p, 0.0))
        .with_inequalities(G, vec_or(d.h, m, 0.0))
        .with_bounds(vec_or(d.x_lb, n, -INF), vec_or(d.x_ub, n, INF));
    SparseWorkspace::setup(problem, settings).map_err(fail)
}

// ─────────────────────────────────────────────────────────────
//  Update
// ─────────────────────────────────────────────────────────────

/// Vector part of an update; null pointers leave fields unchanged.
struct VectorUpdate<'a> {
    c: Option<&'a [f64]>,
    b: Option<&'a [f64]>,
    h: Option<&'a [f64]>,
    x_lb: Option<&'a [f64]>,
    x_ub: Option<&'a [f64]>,
}

impl<'a> VectorUpdate<'a> {
    unsafe fn read(
        (n, p, m): (usize, usize, usize),
        c: *const ProxipFloat,
        b: *const ProxipFloat,
        h: *const ProxipFloat,
        x_lb: *const ProxipFloat,
        x_ub: *const ProxipFloat,
    ) -> Self {
        Self {
            c: opt_slice(c, n),
            b: opt_slice(b, p),
            h: opt_slice(h, m),
            x_lb: opt_slice(x_lb, n),
            x_ub: opt_slice(x_ub, n),
        }
    }

    fn apply<M>(&self, mut update: QpUpdate<'a, M>) -> QpUpdate<'a, M> {
        if let Some(c) = self.c {
            update = update.with_c(c);
        }
        if let Some(b) = self.b {
            update = update.with_b(b);
        }
        if let Some(h) = self.h {
            update = update.with_h(h);
        }
        if let Some(x_lb) = self.x_lb {
            update = update.with_x_lb(x_lb);
        }
        if let Some(x_ub) = self.x_ub {
            update = update.with_x_ub(x_ub);
        }
        update
    }
}

type UpdateMatrices<M> = (Option<M>, Option<M>, Option<M>);

unsafe fn dense_update_matrices(
    P: *const ProxipFloat,
    A: *const ProxipFloat,
    G: *const ProxipFloat,
    (n, p, m): (usize, usize, usize),
) -> Result<UpdateMatrices<DenseMatrix>, c_int> {
    Ok((dense_matrix(P, n, n)?, dense_matrix(A, p, n)?, dense_matrix(G, m, n)?))
}

unsafe fn sparse_update_matrices(
    P: *const ProxipCsc,
    A: *const ProxipCsc,
    G: *const ProxipCsc,
    (n, p, m): (usize, usize, usize),
) -> Result<UpdateMatrices<SparseMatrix>, c_int> {
    Ok((csc_matrix(P, n, n, "P")?, csc_matrix(A, p, n, "A")?, csc_matrix(G, m, n, "G")?))
}

/// Update a dense workspace. Null arguments leave the corresponding data
/// unchanged; matrices are row-major. Nothing is changed on error.
///
/// # Safety
/// `workspace` must come from `proxip_setup_dense`; non-null arrays must have
/// the sizes of the data they replace.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn proxip_update_dense(
    workspace: *mut ProxipWorkspace,
    P: *const ProxipFloat,
    c: *const ProxipFloat,
    A: *const ProxipFloat,
    b: *const ProxipFloat,
    G: *const ProxipFloat,
    h: *const ProxipFloat,
    x_lb: *const ProxipFloat,
    x_ub: *const ProxipFloat,
) -> c_int {
    let Some(work) = workspace.as_mut() else {
        return PROXIP_ERR_NULL_POINTER;
    };
    let Solver::Dense(ws) = &mut work.inner.solver else {
        log::warn!("proxip: dense update on a sparse workspace");
        return PROXIP_ERR_BACKEND;
    };
    let (n, p, m) = problem_dims(ws.problem());

    let (P, A, G) = match dense_update_matrices(P, A, G, (n, p, m)) {
        Ok(mats) => mats,
        Err(code) => return code,
    };
    let vectors = VectorUpdate::read((n, p, m), c, b, h, x_lb, x_ub);

    let mut update = vectors.apply(QpUpdate::<DenseMatrix>::new());
    if let Some(P) = &P {
        update = update.with_p(P);
    }
    if let Some(A) = &A {
        update = update.with_a(A);
    }
    if let Some(G) = &G {
        update = update.with_g(G);
    }
    match ws.update(update) {
        Ok(()) => PROXIP_OK,
        Err(err) => fail(err),
    }
}

/// Update a sparse workspace. Matrices must keep (a subset of) the sparsity
/// pattern given at setup.
///
/// # Safety
/// `workspace` must come from `proxip_setup_sparse`; non-null arguments must
/// have the sizes of the data they replace.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn proxip_update_sparse(
    workspace: *mut ProxipWorkspace,
    P: *const ProxipCsc,
    c: *const ProxipFloat,
    A: *const ProxipCsc,
    b: *const ProxipFloat,
    G: *const ProxipCsc,
    h: *const ProxipFloat,
    x_lb: *const ProxipFloat,
    x_ub: *const ProxipFloat,
) -> c_int {
    let Some(work) = workspace.as_mut() else {
        return PROXIP_ERR_NULL_POINTER;
    };
    let Solver::Sparse(ws) = &mut work.inner.solver else {
        log::warn!("proxip: sparse update on a dense workspace");
        return PROXIP_ERR_BACKEND;
    };
    let (n, p, m) = problem_dims(ws.problem());

    let (P, A, G) = match sparse_update_matrices(P, A, G, (n, p, m)) {
        Ok(mats) => mats,
        Err(code) => return code,
    };
    let vectors = VectorUpdate::read((n, p, m), c, b, h, x_lb, x_ub);

    let mut update = vectors.apply(QpUpdate::<SparseMatrix>::new());
    if let Some(P) = &P {
        update = update.with_p(P);
    }
    if let Some(A) = &A {
        update = update.with_a(A);
    }
    if let Some(G) = &G {
        update = update.with_g(G);
    }
    match ws.update(update) {
        Ok(()) => PROXIP_OK,
        Err(err) => fail(err),
    }
}

/// Replace the settings between solves. The backend must not change.
///
/// # Safety
/// `workspace` must come from a setup function, `settings` must point to a
/// valid record.
#[no_mangle]
pub unsafe extern "C" fn proxip_update_settings(
    workspace: *mut ProxipWorkspace,
    settings: *const ProxipSettings,
) -> c_int {
    let (Some(work), Some(_)) = (workspace.as_mut(), settings.as_ref()) else {
        return PROXIP_ERR_NULL_POINTER;
    };
    let current = match &work.inner.solver {
        Solver::Dense(ws) => ws.settings().clone(),
        Solver::Sparse(ws) => ws.settings().clone(),
    };
    let settings = match settings_or(settings, current) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let res = match &mut work.inner.solver {
        Solver::Dense(ws) => ws.update_settings(settings),
        Solver::Sparse(ws) => ws.update_settings(settings),
    };
    match res {
        Ok(()) => PROXIP_OK,
        Err(err) => fail(err),
    }
}

// ─────────────────────────────────────────────────────────────
//  Solve and cleanup
// ─────────────────────────────────────────────────────────────

/// Solve and refresh `workspace->result`. Returns the status code.
///
/// # Safety
/// `workspace` must be null or come from a setup function.
#[no_mangle]
pub unsafe extern "C" fn proxip_solve(workspace: *mut ProxipWorkspace) -> c_int {
    let Some(work) = workspace.as_mut() else {
        return PROXIP_UNSOLVED;
    };
    let status = match &mut work.inner.solver {
        Solver::Dense(ws) => ws.solve(),
        Solver::Sparse(ws) => ws.solve(),
    };
    work.inner.publish();
    status.code()
}

/// Release a workspace and its result arrays.
///
/// # Safety
/// `workspace` must be null or come from a setup function, and must not be
/// used afterwards.
#[no_mangle]
pub unsafe extern "C" fn proxip_cleanup(workspace: *mut ProxipWorkspace) {
    if workspace.is_null() {
        return;
    }
    let work = Box::from_raw(workspace);
    match work.inner.solver {
        Solver::Dense(ws) => ws.cleanup(),
        Solver::Sparse(ws) => ws.cleanup(),
    }
}
