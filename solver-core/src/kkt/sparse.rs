//! Sparse KKT backend.
//!
//! The upper triangle of K is assembled once, in fill-reducing order, into a
//! CSC matrix whose pattern never changes. Every nonzero of P, A and G and
//! every diagonal entry of K owns a fixed slot in the value array (the data
//! maps), so a numeric refactorization is a scatter followed by LDLᵀ.

use sprs::CsMat;

use super::{FactorError, KktDiagonals, KktSolver, KktVector};
use crate::error::{SolverError, SolverResult};
use crate::linalg::ldl::LdlSolver;
use crate::linalg::ordering::{compute_ordering, Permutation};
use crate::linalg::{QpMatrix, SparseMatrix};
use crate::problem::ProblemData;
use crate::settings::SolverSettings;

/// LDLᵀ-based KKT solver for [`SparseMatrix`] problems.
pub struct SparseKkt {
    n: usize,
    p: usize,
    m: usize,

    /// Symmetric permutation applied to K
    perm: Permutation,

    /// Permuted upper triangle of K
    kkt: CsMat<f64>,

    /// Slot of each stored P entry; `None` for entries below the diagonal
    p_map: Vec<Option<usize>>,

    /// Slot of each stored A entry
    a_map: Vec<usize>,

    /// Slot of each stored G entry
    g_map: Vec<usize>,

    /// Slot of each diagonal entry of K, in unpermuted order
    diag_map: Vec<usize>,

    ldl: LdlSolver,

    /// Permuted right-hand side / solution
    work: Vec<f64>,
}

impl SparseKkt {
    /// Dimension of K.
    pub fn dim(&self) -> usize {
        self.n + self.p + self.m
    }

    /// Stored entries of the upper triangle of K.
    pub fn nnz(&self) -> usize {
        self.kkt.nnz()
    }

    /// Permutation in use.
    pub fn permutation(&self) -> &Permutation {
        &self.perm
    }

    fn offsets(&self) -> (usize, usize) {
        (self.n, self.n + self.p)
    }
}

/// Slot of permuted entry (row, col) in the pattern.
fn slot(col_ptr: &[usize], row_idx: &[usize], row: usize, col: usize) -> SolverResult<usize> {
    let rows = &row_idx[col_ptr[col]..col_ptr[col + 1]];
    rows.binary_search(&row).map(|k| col_ptr[col] + k).map_err(|_| {
        SolverError::SymbolicFactorization(format!("KKT pattern has no slot for ({}, {})", row, col))
    })
}

impl KktSolver<SparseMatrix> for SparseKkt {
    fn symbolic(data: &ProblemData<SparseMatrix>, settings: &SolverSettings) -> SolverResult<Self> {
        let n = data.num_vars();
        let p = data.num_eq();
        let m = data.num_ineq();
        let dim = n + p + m;
        let (y_off, z_off) = (n, n + p);

        // Upper-triangular coordinates of K in natural order.
        let mut entries: Vec<(usize, usize)> = Vec::with_capacity(dim + data.P.nnz() + data.A.nnz() + data.G.nnz());
        entries.extend((0..dim).map(|i| (i, i)));
        data.P.with_raw(|pp, pi, _| {
            for col in 0..n {
                for &row in &pi[pp[col]..pp[col + 1]] {
                    if row <= col {
                        entries.push((row, col));
                    }
                }
            }
        });
        data.A.with_raw(|ap, ai, _| {
            for col in 0..n {
                for &row in &ai[ap[col]..ap[col + 1]] {
                    entries.push((col, y_off + row));
                }
            }
        });
        data.G.with_raw(|gp, gi, _| {
            for col in 0..n {
                for &row in &gi[gp[col]..gp[col + 1]] {
                    entries.push((col, z_off + row));
                }
            }
        });

        let perm = compute_ordering(dim, &entries, settings.ordering);
        let pinv = &perm.perm_inv;
        let place = |r: usize, c: usize| {
            let (a, b) = (pinv[r], pinv[c]);
            (a.min(b), a.max(b))
        };

        let mut columns: Vec<Vec<usize>> = vec![Vec::new(); dim];
        for &(r, c) in &entries {
            let (pr, pc) = place(r, c);
            columns[pc].push(pr);
        }
        let mut col_ptr = Vec::with_capacity(dim + 1);
        let mut row_idx = Vec::new();
        col_ptr.push(0);
        for rows in &mut columns {
            rows.sort_unstable();
            rows.dedup();
            row_idx.extend_from_slice(rows);
            col_ptr.push(row_idx.len());
        }
        drop(columns);

        let find = |r: usize, c: usize| {
            let (pr, pc) = place(r, c);
            slot(&col_ptr, &row_idx, pr, pc)
        };

        let diag_map = (0..dim).map(|i| find(i, i)).collect::<SolverResult<Vec<_>>>()?;
        let p_map = data.P.with_raw(|pp, pi, _| {
            let mut map = vec![None; pi.len()];
            for col in 0..n {
                for k in pp[col]..pp[col + 1] {
                    if pi[k] <= col {
                        map[k] = Some(find(pi[k], col)?);
                    }
                }
            }
            Ok::<_, SolverError>(map)
        })?;
        let a_map = data.A.with_raw(|ap, ai, _| {
            let mut map = vec![0; ai.len()];
            for col in 0..n {
                for k in ap[col]..ap[col + 1] {
                    map[k] = find(col, y_off + ai[k])?;
                }
            }
            Ok::<_, SolverError>(map)
        })?;
        let g_map = data.G.with_raw(|gp, gi, _| {
            let mut map = vec![0; gi.len()];
            for col in 0..n {
                for k in gp[col]..gp[col + 1] {
                    map[k] = find(col, z_off + gi[k])?;
                }
            }
            Ok::<_, SolverError>(map)
        })?;

        // Expected pivot signs: + for the primal block, - for the dual blocks.
        let mut signs = vec![-1i8; dim];
        for i in 0..n {
            signs[pinv[i]] = 1;
        }

        let nnz = row_idx.len();
        let ldl = LdlSolver::new(dim, col_ptr.clone(), row_idx.clone(), signs, settings.dynamic_reg_min_pivot)
            .map_err(|e| SolverError::SymbolicFactorization(e.to_string()))?;
        let kkt = CsMat::new_csc((dim, dim), col_ptr, row_idx, vec![0.0; nnz]);

        log::debug!(
            "sparse KKT: dim={} nnz={} ordering={:?}",
            dim,
            nnz,
            settings.ordering
        );

        Ok(Self {
            n,
            p,
            m,
            perm,
            kkt,
            p_map,
            a_map,
            g_map,
            diag_map,
            ldl,
            work: vec![0.0; dim],
        })
    }

    fn factorize(&mut self, data: &ProblemData<SparseMatrix>, diag: &KktDiagonals) -> Result<(), FactorError> {
        let (y_off, z_off) = self.offsets();
        let vals = self.kkt.data_mut();
        vals.fill(0.0);

        data.P.with_raw(|_, _, px| {
            for (k, &v) in px.iter().enumerate() {
                if let Some(pos) = self.p_map[k] {
                    vals[pos] += v;
                }
            }
        });
        data.A.with_raw(|_, _, ax| {
            for (&pos, &v) in self.a_map.iter().zip(ax) {
                vals[pos] += v;
            }
        });
        data.G.with_raw(|_, _, gx| {
            for (&pos, &v) in self.g_map.iter().zip(gx) {
                vals[pos] += v;
            }
        });

        for (i, &d) in diag.x_reg.iter().enumerate() {
            vals[self.diag_map[i]] += d;
        }
        for i in 0..self.p {
            vals[self.diag_map[y_off + i]] -= diag.delta;
        }
        for (i, &w) in diag.w.iter().enumerate() {
            vals[self.diag_map[z_off + i]] -= w;
        }

        if vals.iter().any(|v| !v.is_finite()) {
            return Err(FactorError::NonFinite);
        }
        self.ldl.factorize(self.kkt.data())?;
        Ok(())
    }

    fn solve(
        &mut self,
        _data: &ProblemData<SparseMatrix>,
        _diag: &KktDiagonals,
        rhs: &KktVector,
        sol: &mut KktVector,
    ) {
        let pinv = &self.perm.perm_inv;
        let (y_off, z_off) = (self.n, self.n + self.p);

        for (i, &v) in rhs.x.iter().enumerate() {
            self.work[pinv[i]] = v;
        }
        for (i, &v) in rhs.y.iter().enumerate() {
            self.work[pinv[y_off + i]] = v;
        }
        for (i, &v) in rhs.z.iter().enumerate() {
            self.work[pinv[z_off + i]] = v;
        }

        self.ldl.solve_in_place(&mut self.work);

        for (i, v) in sol.x.iter_mut().enumerate() {
            *v = self.work[pinv[i]];
        }
        for (i, v) in sol.y.iter_mut().enumerate() {
            *v = self.work[pinv[y_off + i]];
        }
        for (i, v) in sol.z.iter_mut().enumerate() {
            *v = self.work[pinv[z_off + i]];
        }
        debug_assert_eq!(sol.z.len(), self.m);
    }
}
