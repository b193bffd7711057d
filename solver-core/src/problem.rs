//! Problem data structures and validation.
//!
//! The solver works with the formulation
//!
//! ```text
//! minimize    (1/2) x^T P x + c^T x
//! subject to  A x  = b
//!             G x <= h
//!             x_lb <= x <= x_ub
//! ```
//!
//! # Dimensions
//!
//! - `n`: number of primal variables (length of c and x)
//! - `p`: number of equality constraints (rows of A)
//! - `m`: number of inequality constraints (rows of G)
//! - P: n × n, only the upper triangle is read
//! - x_lb, x_ub: n, with ±[`INF`] marking an unbounded side

use crate::error::{SolverError, SolverResult};
use crate::linalg::QpMatrix;

/// Bound magnitude treated as infinite.
///
/// Any bound with `|value| >= INF`, including IEEE infinity, is unbounded
/// on that side and gets no slack/dual pair.
pub const INF: f64 = 1e30;

/// True if a lower bound is finite.
#[inline]
pub fn has_lower(x_lb: f64) -> bool {
    x_lb > -INF
}

/// True if an upper bound is finite.
#[inline]
pub fn has_upper(x_ub: f64) -> bool {
    x_ub < INF
}

/// Quadratic program data.
#[derive(Debug, Clone)]
#[allow(non_snake_case)] // P, A and G are standard mathematical notation
pub struct ProblemData<M> {
    /// Quadratic cost matrix P (n × n, PSD, upper triangle used)
    pub P: M,

    /// Linear cost vector c (length n)
    pub c: Vec<f64>,

    /// Equality constraint matrix A (p × n)
    pub A: M,

    /// Equality right-hand side b (length p)
    pub b: Vec<f64>,

    /// Inequality constraint matrix G (m × n)
    pub G: M,

    /// Inequality right-hand side h (length m)
    pub h: Vec<f64>,

    /// Lower variable bounds (length n)
    pub x_lb: Vec<f64>,

    /// Upper variable bounds (length n)
    pub x_ub: Vec<f64>,
}

#[allow(non_snake_case)]
impl<M: QpMatrix> ProblemData<M> {
    /// Unconstrained problem `min 1/2 x'Px + c'x`.
    pub fn new(P: M, c: Vec<f64>) -> Self {
        let n = c.len();
        Self {
            P,
            A: M::zeros(0, n),
            b: Vec::new(),
            G: M::zeros(0, n),
            h: Vec::new(),
            x_lb: vec![-INF; n],
            x_ub: vec![INF; n],
            c,
        }
    }

    /// Set the equality constraints `A x = b`.
    pub fn with_equalities(mut self, A: M, b: Vec<f64>) -> Self {
        self.A = A;
        self.b = b;
        self
    }

    /// Set the inequality constraints `G x <= h`.
    pub fn with_inequalities(mut self, G: M, h: Vec<f64>) -> Self {
        self.G = G;
        self.h = h;
        self
    }

    /// Set the box constraints `x_lb <= x <= x_ub`.
    pub fn with_bounds(mut self, x_lb: Vec<f64>, x_ub: Vec<f64>) -> Self {
        self.x_lb = x_lb;
        self.x_ub = x_ub;
        self
    }

    /// Number of variables, the column count of P.
    pub fn num_vars(&self) -> usize {
        self.P.cols()
    }

    /// Number of equality constraints, the row count of A.
    pub fn num_eq(&self) -> usize {
        self.A.rows()
    }

    /// Number of inequality constraints, the row count of G.
    pub fn num_ineq(&self) -> usize {
        self.G.rows()
    }

    /// Objective value 1/2 x'Px + c'x.
    pub fn objective(&self, x: &[f64]) -> f64 {
        let mut px = vec![0.0; self.num_vars()];
        self.P.symv_upper(1.0, x, 0.0, &mut px);
        0.5 * crate::linalg::dot(x, &px) + crate::linalg::dot(&self.c, x)
    }

    /// Validate dimensions and bound ordering.
    pub fn validate(&self) -> SolverResult<()> {
        let n = self.num_vars();
        let p = self.num_eq();
        let m = self.num_ineq();

        check_dim("P.rows", n, self.P.rows())?;
        check_dim("c", n, self.c.len())?;
        check_dim("A.cols", n, self.A.cols())?;
        check_dim("b", p, self.b.len())?;
        check_dim("G.cols", n, self.G.cols())?;
        check_dim("h", m, self.h.len())?;
        check_dim("x_lb", n, self.x_lb.len())?;
        check_dim("x_ub", n, self.x_ub.len())?;

        check_bounds(&self.x_lb, &self.x_ub)
    }

    /// Validate an update against this problem without applying it.
    pub fn check_update(&self, update: &QpUpdate<'_, M>) -> SolverResult<()> {
        let n = self.num_vars();

        if let Some(P) = update.P {
            self.P.check_update(P, "P")?;
        }
        if let Some(A) = update.A {
            self.A.check_update(A, "A")?;
        }
        if let Some(G) = update.G {
            self.G.check_update(G, "G")?;
        }
        if let Some(c) = update.c {
            check_dim("c", n, c.len())?;
        }
        if let Some(b) = update.b {
            check_dim("b", self.num_eq(), b.len())?;
        }
        if let Some(h) = update.h {
            check_dim("h", self.num_ineq(), h.len())?;
        }
        if let Some(x_lb) = update.x_lb {
            check_dim("x_lb", n, x_lb.len())?;
        }
        if let Some(x_ub) = update.x_ub {
            check_dim("x_ub", n, x_ub.len())?;
        }
        if update.x_lb.is_some() || update.x_ub.is_some() {
            let x_lb = update.x_lb.unwrap_or(&self.x_lb);
            let x_ub = update.x_ub.unwrap_or(&self.x_ub);
            check_bounds(x_lb, x_ub)?;
        }
        Ok(())
    }

    /// Apply an update. Nothing is written unless the whole update is valid.
    pub fn apply_update(&mut self, update: &QpUpdate<'_, M>) -> SolverResult<()> {
        self.check_update(update)?;

        if let Some(P) = update.P {
            self.P.update_values(P, "P")?;
        }
        if let Some(A) = update.A {
            self.A.update_values(A, "A")?;
        }
        if let Some(G) = update.G {
            self.G.update_values(G, "G")?;
        }
        if let Some(c) = update.c {
            self.c.copy_from_slice(c);
        }
        if let Some(b) = update.b {
            self.b.copy_from_slice(b);
        }
        if let Some(h) = update.h {
            self.h.copy_from_slice(h);
        }
        if let Some(x_lb) = update.x_lb {
            self.x_lb.copy_from_slice(x_lb);
        }
        if let Some(x_ub) = update.x_ub {
            self.x_ub.copy_from_slice(x_ub);
        }
        Ok(())
    }
}

fn check_dim(what: &str, expected: usize, actual: usize) -> SolverResult<()> {
    if expected != actual {
        return Err(SolverError::DimensionMismatch { what: what.to_string(), expected, actual });
    }
    Ok(())
}

fn check_bounds(x_lb: &[f64], x_ub: &[f64]) -> SolverResult<()> {
    for (index, (&lower, &upper)) in x_lb.iter().zip(x_ub.iter()).enumerate() {
        // NaN bounds fail the ordering test as well. A lower bound at +INF
        // or an upper bound at -INF leaves no feasible value for x[index].
        if !(lower <= upper) || lower >= INF || upper <= -INF {
            return Err(SolverError::InvalidBounds { index, lower, upper });
        }
    }
    Ok(())
}

/// New values for a subset of the problem data.
///
/// `None` leaves the corresponding field unchanged.
#[derive(Debug)]
#[allow(non_snake_case)]
pub struct QpUpdate<'a, M> {
    /// New P values
    pub P: Option<&'a M>,
    /// New c
    pub c: Option<&'a [f64]>,
    /// New A values
    pub A: Option<&'a M>,
    /// New b
    pub b: Option<&'a [f64]>,
    /// New G values
    pub G: Option<&'a M>,
    /// New h
    pub h: Option<&'a [f64]>,
    /// New lower bounds
    pub x_lb: Option<&'a [f64]>,
    /// New upper bounds
    pub x_ub: Option<&'a [f64]>,
}

impl<M> Default for QpUpdate<'_, M> {
    fn default() -> Self {
        Self { P: None, c: None, A: None, b: None, G: None, h: None, x_lb: None, x_ub: None }
    }
}

impl<M> Clone for QpUpdate<'_, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for QpUpdate<'_, M> {}

#[allow(non_snake_case)]
impl<'a, M> QpUpdate<'a, M> {
    /// Empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace P values.
    pub fn with_p(mut self, P: &'a M) -> Self {
        self.P = Some(P);
        self
    }

    /// Replace c.
    pub fn with_c(mut self, c: &'a [f64]) -> Self {
        self.c = Some(c);
        self
    }

    /// Replace A values.
    pub fn with_a(mut self, A: &'a M) -> Self {
        self.A = Some(A);
        self
    }

    /// Replace b.
    pub fn with_b(mut self, b: &'a [f64]) -> Self {
        self.b = Some(b);
        self
    }

    /// Replace G values.
    pub fn with_g(mut self, G: &'a M) -> Self {
        self.G = Some(G);
        self
    }

    /// Replace h.
    pub fn with_h(mut self, h: &'a [f64]) -> Self {
        self.h = Some(h);
        self
    }

    /// Replace the lower bounds.
    pub fn with_x_lb(mut self, x_lb: &'a [f64]) -> Self {
        self.x_lb = Some(x_lb);
        self
    }

    /// Replace the upper bounds.
    pub fn with_x_ub(mut self, x_ub: &'a [f64]) -> Self {
        self.x_ub = Some(x_ub);
        self
    }

    /// True if any matrix is replaced.
    pub fn touches_matrices(&self) -> bool {
        self.P.is_some() || self.A.is_some() || self.G.is_some()
    }

    /// True if any bound vector is replaced.
    pub fn touches_bounds(&self) -> bool {
        self.x_lb.is_some() || self.x_ub.is_some()
    }
}
