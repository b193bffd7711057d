//! Solver configuration.

use std::fmt;

use crate::error::{SolverError, SolverResult};

/// Linear-algebra backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Dense storage, reduced system factored by Cholesky.
    Dense,
    /// Compressed-column storage, quasi-definite LDLᵀ.
    #[default]
    Sparse,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Dense => write!(f, "dense"),
            BackendKind::Sparse => write!(f, "sparse"),
        }
    }
}

/// Fill-reducing ordering for the sparse KKT factorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KktOrdering {
    /// Keep the natural variable order.
    Natural,
    /// Approximate minimum degree.
    #[default]
    Amd,
    /// Reverse Cuthill-McKee on the symmetric KKT pattern.
    ReverseCuthillMckee,
}

/// Solver settings.
#[derive(Debug, Clone)]
pub struct SolverSettings {
    /// Initial primal proximal weight ρ
    pub rho_init: f64,

    /// Initial dual proximal weight δ
    pub delta_init: f64,

    /// Lower limit for ρ and δ
    pub reg_lower_limit: f64,

    /// Factor applied to ρ and δ after a failed factorization
    pub reg_bump_factor: f64,

    /// Failed factorizations tolerated per iteration
    pub max_factor_retries: usize,

    /// Absolute residual tolerance
    pub eps_abs: f64,

    /// Relative residual tolerance
    pub eps_rel: f64,

    /// Absolute duality gap tolerance
    pub eps_duality_gap_abs: f64,

    /// Relative duality gap tolerance
    pub eps_duality_gap_rel: f64,

    /// Relative tolerance for infeasibility certificates
    pub eps_infeasibility: f64,

    /// Iterations between infeasibility checks
    pub infeasibility_check_interval: usize,

    /// Maximum iterations
    pub max_iter: usize,

    /// Fraction-to-boundary safety factor
    pub tau: f64,

    /// Iterative refinement steps per KKT solve
    pub kkt_refine_iters: usize,

    /// Floor for slacks and duals when warm starting
    pub warm_start_floor: f64,

    /// Pivot magnitude below which the LDLᵀ diagonal is replaced
    pub dynamic_reg_min_pivot: f64,

    /// Ordering used by the sparse backend
    pub ordering: KktOrdering,

    /// Backend the workspace is built for
    pub backend: BackendKind,

    /// Verbosity
    pub verbose: bool,

    /// Record setup/update/solve timings
    pub compute_timings: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            rho_init: 1e-6,
            delta_init: 1e-4,
            reg_lower_limit: 1e-10,
            reg_bump_factor: 100.0,
            max_factor_retries: 10,
            eps_abs: 1e-8,
            eps_rel: 1e-9,
            eps_duality_gap_abs: 1e-8,
            eps_duality_gap_rel: 1e-9,
            eps_infeasibility: 1e-8,
            infeasibility_check_interval: 5,
            max_iter: 250,
            tau: 0.99,
            kkt_refine_iters: 3,
            warm_start_floor: 1e-3,
            dynamic_reg_min_pivot: 1e-13,
            ordering: KktOrdering::default(),
            backend: BackendKind::Sparse,
            verbose: false,
            compute_timings: true,
        }
    }
}

impl SolverSettings {
    /// Defaults for the dense backend.
    pub fn default_dense() -> Self {
        Self { backend: BackendKind::Dense, ..Self::default() }
    }

    /// Defaults for the sparse backend.
    pub fn default_sparse() -> Self {
        Self { backend: BackendKind::Sparse, ..Self::default() }
    }

    /// Set both residual tolerances.
    pub fn with_tolerances(mut self, eps_abs: f64, eps_rel: f64) -> Self {
        self.eps_abs = eps_abs;
        self.eps_rel = eps_rel;
        self
    }

    /// Set the iteration cap.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Enable or disable per-iteration logging.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Check ranges of all numeric fields.
    pub fn validate(&self) -> SolverResult<()> {
        let positive = [
            ("rho_init", self.rho_init),
            ("delta_init", self.delta_init),
            ("reg_lower_limit", self.reg_lower_limit),
            ("eps_abs", self.eps_abs),
            ("eps_duality_gap_abs", self.eps_duality_gap_abs),
            ("eps_infeasibility", self.eps_infeasibility),
            ("warm_start_floor", self.warm_start_floor),
            ("dynamic_reg_min_pivot", self.dynamic_reg_min_pivot),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SolverError::InvalidSettings(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )));
            }
        }

        for (name, value) in [("eps_rel", self.eps_rel), ("eps_duality_gap_rel", self.eps_duality_gap_rel)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SolverError::InvalidSettings(format!(
                    "{} must be non-negative and finite, got {}",
                    name, value
                )));
            }
        }

        if self.reg_lower_limit > self.rho_init || self.reg_lower_limit > self.delta_init {
            return Err(SolverError::InvalidSettings(format!(
                "reg_lower_limit ({}) exceeds rho_init ({}) or delta_init ({})",
                self.reg_lower_limit, self.rho_init, self.delta_init
            )));
        }
        if !(self.reg_bump_factor.is_finite() && self.reg_bump_factor > 1.0) {
            return Err(SolverError::InvalidSettings(format!(
                "reg_bump_factor must be greater than 1, got {}",
                self.reg_bump_factor
            )));
        }
        if !(self.tau > 0.0 && self.tau < 1.0) {
            return Err(SolverError::InvalidSettings(format!(
                "tau must lie in (0, 1), got {}",
                self.tau
            )));
        }
        if self.max_iter == 0 {
            return Err(SolverError::InvalidSettings("max_iter must be at least 1".into()));
        }
        if self.infeasibility_check_interval == 0 {
            return Err(SolverError::InvalidSettings(
                "infeasibility_check_interval must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
