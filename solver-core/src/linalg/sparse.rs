//! Sparse matrices in CSC format.
//!
//! [`SparseMatrix`] wraps a `sprs` compressed-column matrix whose structure
//! is frozen once a workspace has been set up. Updates may change values and
//! drop entries to zero, but never add positions.

use sprs::{CsMat, TriMat};

use super::matrix::{scale_in_place, QpMatrix};
use crate::error::{SolverError, SolverResult};
use crate::kkt::sparse::SparseKkt;
use crate::settings::BackendKind;

/// Sparse matrix in CSC format (general, not necessarily symmetric).
pub type SparseCsc = CsMat<f64>;

/// Build a sparse CSC matrix from triplets (row, col, value).
///
/// Duplicate entries are summed.
pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> SparseCsc
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut tri = TriMat::new((nrows, ncols));
    for (i, j, v) in triplets {
        tri.add_triplet(i, j, v);
    }
    tri.to_csc()
}

/// Check raw compressed-column arrays.
///
/// Requires `indptr.len() == ncols + 1`, `indptr[0] == 0`, non-decreasing
/// pointers, `indices.len() == data.len() == indptr[ncols]`, row indices in
/// range and strictly increasing within each column.
pub fn validate_csc(
    nrows: usize,
    ncols: usize,
    indptr: &[usize],
    indices: &[usize],
    data: &[f64],
) -> SolverResult<()> {
    if indptr.len() != ncols + 1 {
        return Err(SolverError::MalformedSparse(format!(
            "column pointer array has length {}, expected {}",
            indptr.len(),
            ncols + 1
        )));
    }
    if indptr[0] != 0 {
        return Err(SolverError::MalformedSparse(format!(
            "first column pointer is {}, expected 0",
            indptr[0]
        )));
    }
    let nnz = indptr[ncols];
    if indices.len() != nnz || data.len() != nnz {
        return Err(SolverError::MalformedSparse(format!(
            "nnz is {} but {} row indices and {} values were given",
            nnz,
            indices.len(),
            data.len()
        )));
    }
    for col in 0..ncols {
        let (start, end) = (indptr[col], indptr[col + 1]);
        if end < start || end > nnz {
            return Err(SolverError::MalformedSparse(format!(
                "column pointers are not monotone at column {}",
                col
            )));
        }
        let rows = &indices[start..end];
        for (k, &row) in rows.iter().enumerate() {
            if row >= nrows {
                return Err(SolverError::MalformedSparse(format!(
                    "row index {} out of range in column {} ({} rows)",
                    row, col, nrows
                )));
            }
            if k > 0 && rows[k - 1] >= row {
                return Err(SolverError::MalformedSparse(format!(
                    "row indices of column {} are not strictly increasing",
                    col
                )));
            }
        }
    }
    Ok(())
}

/// Sparse backend matrix.
#[derive(Debug, Clone)]
pub struct SparseMatrix {
    mat: SparseCsc,
}

impl SparseMatrix {
    /// Wrap a `sprs` matrix, converting CSR input to CSC.
    pub fn new(mat: SparseCsc) -> Self {
        let mat = if mat.is_csc() { mat } else { mat.to_csc() };
        Self { mat }
    }

    /// Build from (row, col, value) triplets.
    pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        Self { mat: from_triplets(nrows, ncols, triplets) }
    }

    /// Build from raw CSC arrays after validating them.
    pub fn from_csc_parts(
        nrows: usize,
        ncols: usize,
        indptr: Vec<usize>,
        indices: Vec<usize>,
        data: Vec<f64>,
    ) -> SolverResult<Self> {
        validate_csc(nrows, ncols, &indptr, &indices, &data)?;
        Ok(Self { mat: CsMat::new_csc((nrows, ncols), indptr, indices, data) })
    }

    /// Underlying CSC matrix.
    pub fn as_csc(&self) -> &SparseCsc {
        &self.mat
    }

    /// Run `f` on the column pointers, row indices and values.
    pub(crate) fn with_raw<R>(&self, f: impl FnOnce(&[usize], &[usize], &[f64]) -> R) -> R {
        // Keep indptr alive
        let indptr = self.mat.indptr();
        f(indptr.raw_storage(), self.mat.indices(), self.mat.data())
    }
}

impl From<SparseCsc> for SparseMatrix {
    fn from(mat: SparseCsc) -> Self {
        Self::new(mat)
    }
}

impl QpMatrix for SparseMatrix {
    type Kkt = SparseKkt;
    const BACKEND: BackendKind = BackendKind::Sparse;

    fn rows(&self) -> usize {
        self.mat.rows()
    }

    fn cols(&self) -> usize {
        self.mat.cols()
    }

    fn nnz(&self) -> usize {
        self.mat.nnz()
    }

    fn zeros(rows: usize, cols: usize) -> Self {
        Self { mat: CsMat::new_csc((rows, cols), vec![0; cols + 1], Vec::new(), Vec::new()) }
    }

    fn gemv(&self, alpha: f64, x: &[f64], beta: f64, y: &mut [f64]) {
        assert_eq!(self.cols(), x.len());
        assert_eq!(self.rows(), y.len());
        scale_in_place(y, beta);
        if alpha == 0.0 {
            return;
        }
        self.with_raw(|a_p, a_i, a_x| {
            for col in 0..x.len() {
                let xj = alpha * x[col];
                for k in a_p[col]..a_p[col + 1] {
                    y[a_i[k]] += a_x[k] * xj;
                }
            }
        });
    }

    fn gemv_t(&self, alpha: f64, x: &[f64], beta: f64, y: &mut [f64]) {
        assert_eq!(self.rows(), x.len());
        assert_eq!(self.cols(), y.len());
        scale_in_place(y, beta);
        if alpha == 0.0 {
            return;
        }
        self.with_raw(|a_p, a_i, a_x| {
            for (col, yc) in y.iter_mut().enumerate() {
                let mut acc = 0.0;
                for k in a_p[col]..a_p[col + 1] {
                    acc += a_x[k] * x[a_i[k]];
                }
                *yc += alpha * acc;
            }
        });
    }

    fn symv_upper(&self, alpha: f64, x: &[f64], beta: f64, y: &mut [f64]) {
        assert_eq!(self.rows(), self.cols());
        assert_eq!(self.cols(), x.len());
        assert_eq!(self.rows(), y.len());
        scale_in_place(y, beta);
        if alpha == 0.0 {
            return;
        }
        self.with_raw(|a_p, a_i, a_x| {
            for col in 0..x.len() {
                for k in a_p[col]..a_p[col + 1] {
                    let row = a_i[k];
                    if row > col {
                        continue;
                    }
                    y[row] += alpha * a_x[k] * x[col];
                    if row != col {
                        y[col] += alpha * a_x[k] * x[row];
                    }
                }
            }
        });
    }

    fn check_update(&self, new: &Self, name: &'static str) -> SolverResult<()> {
        check_shape(name, self.rows(), self.cols(), new.rows(), new.cols())?;
        let ncols = self.cols();
        let fits = self.with_raw(|old_p, old_i, _| {
            new.with_raw(|new_p, new_i, _| {
                (0..ncols).all(|col| {
                    is_sorted_subset(
                        &new_i[new_p[col]..new_p[col + 1]],
                        &old_i[old_p[col]..old_p[col + 1]],
                    )
                })
            })
        });
        if !fits {
            return Err(SolverError::StructuralMismatch { matrix: name });
        }
        Ok(())
    }

    fn update_values(&mut self, new: &Self, name: &'static str) -> SolverResult<()> {
        self.check_update(new, name)?;
        let ncols = self.cols();
        let mut values = vec![0.0; self.nnz()];
        self.with_raw(|old_p, old_i, _| {
            new.with_raw(|new_p, new_i, new_x| {
                for col in 0..ncols {
                    let mut j = new_p[col];
                    for k in old_p[col]..old_p[col + 1] {
                        if j < new_p[col + 1] && new_i[j] == old_i[k] {
                            values[k] = new_x[j];
                            j += 1;
                        }
                    }
                }
            })
        });
        self.mat.data_mut().copy_from_slice(&values);
        Ok(())
    }

    fn all_finite(&self) -> bool {
        self.mat.data().iter().all(|v| v.is_finite())
    }
}

pub(crate) fn check_shape(
    name: &'static str,
    rows: usize,
    cols: usize,
    new_rows: usize,
    new_cols: usize,
) -> SolverResult<()> {
    if rows != new_rows {
        return Err(SolverError::DimensionMismatch {
            what: format!("{}.rows", name),
            expected: rows,
            actual: new_rows,
        });
    }
    if cols != new_cols {
        return Err(SolverError::DimensionMismatch {
            what: format!("{}.cols", name),
            expected: cols,
            actual: new_cols,
        });
    }
    Ok(())
}

/// Both slices sorted ascending; true if every element of `sub` is in `sup`.
fn is_sorted_subset(sub: &[usize], sup: &[usize]) -> bool {
    let mut j = 0;
    for &v in sub {
        while j < sup.len() && sup[j] < v {
            j += 1;
        }
        if j == sup.len() || sup[j] != v {
            return false;
        }
        j += 1;
    }
    true
}
