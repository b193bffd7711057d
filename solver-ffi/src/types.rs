//! `#[repr(C)]` records shared with C callers.

use std::os::raw::c_int;

/// Integer type for sizes and compressed-column indices.
pub type ProxipInt = i64;

/// Floating point type of all problem data.
pub type ProxipFloat = f64;

/// Bound magnitude treated as infinite.
pub const PROXIP_INF: ProxipFloat = proxip_core::INF;

// Solve status codes
pub const PROXIP_SOLVED: c_int = 1;
pub const PROXIP_MAX_ITER_REACHED: c_int = -1;
pub const PROXIP_PRIMAL_INFEASIBLE: c_int = -2;
pub const PROXIP_DUAL_INFEASIBLE: c_int = -3;
pub const PROXIP_NUMERICS: c_int = -8;
pub const PROXIP_UNSOLVED: c_int = -9;
pub const PROXIP_INVALID_SETTINGS: c_int = -10;

// Setup/update return codes
pub const PROXIP_OK: c_int = 0;
pub const PROXIP_ERR_DIMENSION: c_int = -11;
pub const PROXIP_ERR_BOUNDS: c_int = -12;
pub const PROXIP_ERR_MALFORMED_SPARSE: c_int = -13;
pub const PROXIP_ERR_STRUCTURE: c_int = -14;
pub const PROXIP_ERR_SYMBOLIC: c_int = -15;
pub const PROXIP_ERR_BACKEND: c_int = -16;
pub const PROXIP_ERR_NULL_POINTER: c_int = -17;

// Orderings
pub const PROXIP_ORDERING_NATURAL: c_int = 0;
pub const PROXIP_ORDERING_AMD: c_int = 1;
pub const PROXIP_ORDERING_RCM: c_int = 2;

// Backends
pub const PROXIP_BACKEND_DENSE: c_int = 0;
pub const PROXIP_BACKEND_SPARSE: c_int = 1;

/// Flat settings record. Booleans are 0/1.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ProxipSettings {
    pub rho_init: ProxipFloat,
    pub delta_init: ProxipFloat,
    pub reg_lower_limit: ProxipFloat,
    pub reg_bump_factor: ProxipFloat,
    pub max_factor_retries: ProxipInt,
    pub eps_abs: ProxipFloat,
    pub eps_rel: ProxipFloat,
    pub eps_duality_gap_abs: ProxipFloat,
    pub eps_duality_gap_rel: ProxipFloat,
    pub eps_infeasibility: ProxipFloat,
    pub infeasibility_check_interval: ProxipInt,
    pub max_iter: ProxipInt,
    pub tau: ProxipFloat,
    pub kkt_refine_iters: ProxipInt,
    pub warm_start_floor: ProxipFloat,
    pub dynamic_reg_min_pivot: ProxipFloat,
    pub ordering: c_int,
    pub backend: c_int,
    pub verbose: c_int,
    pub compute_timings: c_int,
}

/// Dense problem data. Matrices are row-major; P is n x n, A is p x n and
/// G is m x n.
///
/// At setup a null `c`, `b` or `h` means zeros, a null `x_lb`/`x_ub` means
/// unbounded and a null matrix means all zeros.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[allow(non_snake_case)]
pub struct ProxipDataDense {
    pub n: ProxipInt,
    pub p: ProxipInt,
    pub m: ProxipInt,
    pub P: *const ProxipFloat,
    pub c: *const ProxipFloat,
    pub A: *const ProxipFloat,
    pub b: *const ProxipFloat,
    pub G: *const ProxipFloat,
    pub h: *const ProxipFloat,
    pub x_lb: *const ProxipFloat,
    pub x_ub: *const ProxipFloat,
}

/// Compressed-column matrix view: `p` has n + 1 column pointers, `i` and
/// `x` hold `nnz` row indices and values.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ProxipCsc {
    pub m: ProxipInt,
    pub n: ProxipInt,
    pub nnz: ProxipInt,
    pub p: *const ProxipInt,
    pub i: *const ProxipInt,
    pub x: *const ProxipFloat,
}

/// Sparse problem data; null handling as for [`ProxipDataDense`].
#[repr(C)]
#[derive(Debug, Clone, Copy)]
#[allow(non_snake_case)]
pub struct ProxipDataSparse {
    pub n: ProxipInt,
    pub p: ProxipInt,
    pub m: ProxipInt,
    pub P: *const ProxipCsc,
    pub c: *const ProxipFloat,
    pub A: *const ProxipCsc,
    pub b: *const ProxipFloat,
    pub G: *const ProxipCsc,
    pub h: *const ProxipFloat,
    pub x_lb: *const ProxipFloat,
    pub x_ub: *const ProxipFloat,
}

/// Solve information. Times are in seconds.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ProxipInfo {
    pub status: c_int,
    pub iter: ProxipInt,
    pub rho: ProxipFloat,
    pub delta: ProxipFloat,
    pub mu: ProxipFloat,
    pub sigma: ProxipFloat,
    pub step_length: ProxipFloat,
    pub primal_obj: ProxipFloat,
    pub dual_obj: ProxipFloat,
    pub primal_res: ProxipFloat,
    pub dual_res: ProxipFloat,
    pub duality_gap: ProxipFloat,
    pub factor_retries: ProxipInt,
    pub setup_time: ProxipFloat,
    pub update_time: ProxipFloat,
    pub solve_time: ProxipFloat,
    pub run_time: ProxipFloat,
}

/// Solution of the last completed solve. The arrays are owned by the
/// workspace and stay valid until `proxip_cleanup`; box arrays have length n.
#[repr(C)]
#[derive(Debug)]
pub struct ProxipResult {
    pub x: *mut ProxipFloat,
    pub y: *mut ProxipFloat,
    pub z: *mut ProxipFloat,
    pub z_lb: *mut ProxipFloat,
    pub z_ub: *mut ProxipFloat,
    pub s: *mut ProxipFloat,
    pub s_lb: *mut ProxipFloat,
    pub s_ub: *mut ProxipFloat,
    pub info: ProxipInfo,
}
