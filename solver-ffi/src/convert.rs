//! Conversions between the C records and the core types.
//!
//! Every conversion validates sizes before building a slice from a raw
//! pointer. Failures are logged and reported as a C return code.

use std::os::raw::c_int;
use std::slice;

use proxip_core::{
    BackendKind, DenseMatrix, KktOrdering, QpMatrix, SolverError, SolverSettings, SparseMatrix,
};

use crate::types::*;

/// Log `err` and map it to its return code.
pub(crate) fn fail(err: SolverError) -> c_int {
    log::warn!("proxip: {}", err);
    error_code(&err)
}

pub(crate) fn error_code(err: &SolverError) -> c_int {
    match err {
        SolverError::DimensionMismatch { .. } => PROXIP_ERR_DIMENSION,
        SolverError::InvalidBounds { .. } => PROXIP_ERR_BOUNDS,
        SolverError::MalformedSparse(_) => PROXIP_ERR_MALFORMED_SPARSE,
        SolverError::StructuralMismatch { .. } => PROXIP_ERR_STRUCTURE,
        SolverError::InvalidSettings(_) => PROXIP_INVALID_SETTINGS,
        SolverError::SymbolicFactorization(_) => PROXIP_ERR_SYMBOLIC,
        SolverError::BackendMismatch { .. } => PROXIP_ERR_BACKEND,
    }
}

fn count(value: ProxipInt, name: &str) -> Result<usize, c_int> {
    usize::try_from(value).map_err(|_| {
        log::warn!("proxip: {} must be non-negative, got {}", name, value);
        PROXIP_ERR_DIMENSION
    })
}

pub(crate) fn dims(n: ProxipInt, p: ProxipInt, m: ProxipInt) -> Result<(usize, usize, usize), c_int> {
    Ok((count(n, "n")?, count(p, "p")?, count(m, "m")?))
}

fn settings_count(value: ProxipInt, name: &str) -> Result<usize, SolverError> {
    usize::try_from(value)
        .map_err(|_| SolverError::InvalidSettings(format!("{} must be non-negative, got {}", name, value)))
}

pub(crate) fn settings_from_c(c: &ProxipSettings) -> Result<SolverSettings, SolverError> {
    let ordering = match c.ordering {
        PROXIP_ORDERING_NATURAL => KktOrdering::Natural,
        PROXIP_ORDERING_AMD => KktOrdering::Amd,
        PROXIP_ORDERING_RCM => KktOrdering::ReverseCuthillMckee,
        other => return Err(SolverError::InvalidSettings(format!("unknown ordering {}", other))),
    };
    let backend = match c.backend {
        PROXIP_BACKEND_DENSE => BackendKind::Dense,
        PROXIP_BACKEND_SPARSE => BackendKind::Sparse,
        other => return Err(SolverError::InvalidSettings(format!("unknown backend {}", other))),
    };
    Ok(SolverSettings {
        rho_init: c.rho_init,
        delta_init: c.delta_init,
        reg_lower_limit: c.reg_lower_limit,
        reg_bump_factor: c.reg_bump_factor,
        max_factor_retries: settings_count(c.max_factor_retries, "max_factor_retries")?,
        eps_abs: c.eps_abs,
        eps_rel: c.eps_rel,
        eps_duality_gap_abs: c.eps_duality_gap_abs,
        eps_duality_gap_rel: c.eps_duality_gap_rel,
        eps_infeasibility: c.eps_infeasibility,
        infeasibility_check_interval: settings_count(c.infeasibility_check_interval, "infeasibility_check_interval")?,
        max_iter: settings_count(c.max_iter, "max_iter")?,
        tau: c.tau,
        kkt_refine_iters: settings_count(c.kkt_refine_iters, "kkt_refine_iters")?,
        warm_start_floor: c.warm_start_floor,
        dynamic_reg_min_pivot: c.dynamic_reg_min_pivot,
        ordering,
        backend,
        verbose: c.verbose != 0,
        compute_timings: c.compute_timings != 0,
    })
}

pub(crate) fn settings_to_c(s: &SolverSettings) -> ProxipSettings {
    ProxipSettings {
        rho_init: s.rho_init,
        delta_init: s.delta_init,
        reg_lower_limit: s.reg_lower_limit,
        reg_bump_factor: s.reg_bump_factor,
        max_factor_retries: s.max_factor_retries as ProxipInt,
        eps_abs: s.eps_abs,
        eps_rel: s.eps_rel,
        eps_duality_gap_abs: s.eps_duality_gap_abs,
        eps_duality_gap_rel: s.eps_duality_gap_rel,
        eps_infeasibility: s.eps_infeasibility,
        infeasibility_check_interval: s.infeasibility_check_interval as ProxipInt,
        max_iter: s.max_iter as ProxipInt,
        tau: s.tau,
        kkt_refine_iters: s.kkt_refine_iters as ProxipInt,
        warm_start_floor: s.warm_start_floor,
        dynamic_reg_min_pivot: s.dynamic_reg_min_pivot,
        ordering: match s.ordering {
            KktOrdering::Natural => PROXIP_ORDERING_NATURAL,
            KktOrdering::Amd => PROXIP_ORDERING_AMD,
            KktOrdering::ReverseCuthillMckee => PROXIP_ORDERING_RCM,
        },
        backend: match s.backend {
            BackendKind::Dense => PROXIP_BACKEND_DENSE,
            BackendKind::Sparse => PROXIP_BACKEND_SPARSE,
        },
        verbose: s.verbose as c_int,
        compute_timings: s.compute_timings as c_int,
    }
}

/// Settings from a possibly null pointer; null selects `default`.
///
/// # Safety
/// A non-null `settings` must point to a valid record.
pub(crate) unsafe fn settings_or(
    settings: *const ProxipSettings,
    default: SolverSettings,
) -> Result<SolverSettings, c_int> {
    match settings.as_ref() {
        Some(c) => settings_from_c(c).map_err(fail),
        None => Ok(default),
    }
}

/// # Safety
/// A non-null `ptr` must be valid for `len` reads.
pub(crate) unsafe fn opt_slice<'a>(ptr: *const ProxipFloat, len: usize) -> Option<&'a [ProxipFloat]> {
    if ptr.is_null() {
        None
    } else {
        Some(slice::from_raw_parts(ptr, len))
    }
}

/// Vector of length `len` from `ptr`, or filled with `fill` when null.
///
/// # Safety
/// As for [`opt_slice`].
pub(crate) unsafe fn vec_or(ptr: *const ProxipFloat, len: usize, fill: f64) -> Vec<f64> {
    opt_slice(ptr, len).map_or_else(|| vec![fill; len], <[f64]>::to_vec)
}

/// Row-major `rows x cols` matrix, `None` when `ptr` is null.
///
/// # Safety
/// A non-null `ptr` must be valid for `rows * cols` reads.
pub(crate) unsafe fn dense_matrix(
    ptr: *const ProxipFloat,
    rows: usize,
    cols: usize,
) -> Result<Option<DenseMatrix>, c_int> {
    match opt_slice(ptr, rows * cols) {
        Some(data) => DenseMatrix::from_row_slice(rows, cols, data).map(Some).map_err(fail),
        None => Ok(None),
    }
}

fn index_vec(raw: &[ProxipInt], what: &str) -> Result<Vec<usize>, c_int> {
    raw.iter()
        .map(|&v| {
            usize::try_from(v).map_err(|_| fail(SolverError::MalformedSparse(format!("negative {} entry {}", what, v))))
        })
        .collect()
}

/// Compressed-column matrix with the expected shape, `None` when `csc` is
/// null.
///
/// # Safety
/// A non-null `csc` must point to a record whose arrays are valid for the
/// lengths it declares.
pub(crate) unsafe fn csc_matrix(
    csc: *const ProxipCsc,
    rows: usize,
    cols: usize,
    name: &str,
) -> Result<Option<SparseMatrix>, c_int> {
    let Some(csc) = csc.as_ref() else {
        return Ok(None);
    };
    let (m, n) = (count(csc.m, name)?, count(csc.n, name)?);
    if m != rows {
        return Err(fail(SolverError::DimensionMismatch { what: format!("{}.rows", name), expected: rows, actual: m }));
    }
    if n != cols {
        return Err(fail(SolverError::DimensionMismatch { what: format!("{}.cols", name), expected: cols, actual: n }));
    }
    let nnz = count(csc.nnz, name)?;
    if csc.p.is_null() || (nnz > 0 && (csc.i.is_null() || csc.x.is_null())) {
        log::warn!("proxip: {} has null compressed-column arrays", name);
        return Err(PROXIP_ERR_NULL_POINTER);
    }

    let indptr = index_vec(slice::from_raw_parts(csc.p, n + 1), "column pointer")?;
    let (indices, data) = if nnz == 0 {
        (Vec::new(), Vec::new())
    } else {
        (
            index_vec(slice::from_raw_parts(csc.i, nnz), "row index")?,
            slice::from_raw_parts(csc.x, nnz).to_vec(),
        )
    };
    SparseMatrix::from_csc_parts(m, n, indptr, indices, data).map(Some).map_err(fail)
}

/// `matrix` or an empty matrix of the given shape.
pub(crate) fn or_zeros<M: QpMatrix>(matrix: Option<M>, rows: usize, cols: usize) -> M {
    matrix.unwrap_or_else(|| M::zeros(rows, cols))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_round_trip_keeps_defaults() {
        let defaults = SolverSettings::default_dense();
        let back = settings_from_c(&settings_to_c(&defaults)).unwrap();
        assert_eq!(back.backend, BackendKind::Dense);
        assert_eq!(back.ordering, defaults.ordering);
        assert_eq!(back.max_iter, defaults.max_iter);
        assert_eq!(back.eps_abs, defaults.eps_abs);
        assert_eq!(back.verbose, defaults.verbose);
    }

    #[test]
    fn test_negative_counts_are_rejected() {
        let mut c = settings_to_c(&SolverSettings::default());
        c.max_iter = -1;
        assert!(matches!(settings_from_c(&c), Err(SolverError::InvalidSettings(_))));

        let mut c = settings_to_c(&SolverSettings::default());
        c.ordering = 7;
        assert!(settings_from_c(&c).is_err());

        assert_eq!(dims(2, -1, 0), Err(PROXIP_ERR_DIMENSION));
    }

    #[test]
    fn test_csc_shape_is_checked() {
        let p = [0i64, 1, 1];
        let i = [0i64];
        let x = [2.0];
        let csc = ProxipCsc { m: 2, n: 2, nnz: 1, p: p.as_ptr(), i: i.as_ptr(), x: x.as_ptr() };
        let ok = unsafe { csc_matrix(&csc, 2, 2, "P") }.unwrap().unwrap();
        assert_eq!(ok.nnz(), 1);
        assert_eq!(unsafe { csc_matrix(&csc, 3, 2, "P") }.err(), Some(PROXIP_ERR_DIMENSION));
        assert!(unsafe { csc_matrix(std::ptr::null(), 2, 2, "P") }.unwrap().is_none());

        let bad_i = [-1i64];
        let bad = ProxipCsc { i: bad_i.as_ptr(), ..csc };
        assert_eq!(unsafe { csc_matrix(&bad, 2, 2, "P") }.err(), Some(PROXIP_ERR_MALFORMED_SPARSE));
    }
}
