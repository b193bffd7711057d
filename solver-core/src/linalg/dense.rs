//! Dense matrices backed by nalgebra.

use nalgebra::DMatrix;

use super::matrix::{scale_in_place, QpMatrix};
use super::sparse::check_shape;
use crate::error::{SolverError, SolverResult};
use crate::kkt::dense::DenseKkt;
use crate::settings::BackendKind;

/// Dense backend matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    mat: DMatrix<f64>,
}

impl DenseMatrix {
    /// Build from a row-major array of length `rows * cols`.
    pub fn from_row_slice(rows: usize, cols: usize, data: &[f64]) -> SolverResult<Self> {
        if data.len() != rows * cols {
            return Err(SolverError::DimensionMismatch {
                what: "dense matrix data".to_string(),
                expected: rows * cols,
                actual: data.len(),
            });
        }
        Ok(Self { mat: DMatrix::from_row_slice(rows, cols, data) })
    }

    /// Build from a column-major array of length `rows * cols`.
    pub fn from_column_slice(rows: usize, cols: usize, data: &[f64]) -> SolverResult<Self> {
        if data.len() != rows * cols {
            return Err(SolverError::DimensionMismatch {
                what: "dense matrix data".to_string(),
                expected: rows * cols,
                actual: data.len(),
            });
        }
        Ok(Self { mat: DMatrix::from_column_slice(rows, cols, data) })
    }

    /// Underlying nalgebra matrix.
    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.mat
    }

    /// Entry (i, j).
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.mat[(i, j)]
    }
}

impl From<DMatrix<f64>> for DenseMatrix {
    fn from(mat: DMatrix<f64>) -> Self {
        Self { mat }
    }
}

impl QpMatrix for DenseMatrix {
    type Kkt = DenseKkt;
    const BACKEND: BackendKind = BackendKind::Dense;

    fn rows(&self) -> usize {
        self.mat.nrows()
    }

    fn cols(&self) -> usize {
        self.mat.ncols()
    }

    fn nnz(&self) -> usize {
        self.mat.len()
    }

    fn zeros(rows: usize, cols: usize) -> Self {
        Self { mat: DMatrix::zeros(rows, cols) }
    }

    fn gemv(&self, alpha: f64, x: &[f64], beta: f64, y: &mut [f64]) {
        assert_eq!(self.cols(), x.len());
        assert_eq!(self.rows(), y.len());
        scale_in_place(y, beta);
        if alpha == 0.0 {
            return;
        }
        for (j, col) in self.mat.column_iter().enumerate() {
            let xj = alpha * x[j];
            for (yi, &v) in y.iter_mut().zip(col.iter()) {
                *yi += v * xj;
            }
        }
    }

    fn gemv_t(&self, alpha: f64, x: &[f64], beta: f64, y: &mut [f64]) {
        assert_eq!(self.rows(), x.len());
        assert_eq!(self.cols(), y.len());
        scale_in_place(y, beta);
        if alpha == 0.0 {
            return;
        }
        for (yj, col) in y.iter_mut().zip(self.mat.column_iter()) {
            let acc: f64 = col.iter().zip(x.iter()).map(|(v, xi)| v * xi).sum();
            *yj += alpha * acc;
        }
    }

    fn symv_upper(&self, alpha: f64, x: &[f64], beta: f64, y: &mut [f64]) {
        assert_eq!(self.rows(), self.cols());
        assert_eq!(self.cols(), x.len());
        assert_eq!(self.rows(), y.len());
        scale_in_place(y, beta);
        if alpha == 0.0 {
            return;
        }
        let n = self.cols();
        for j in 0..n {
            for i in 0..j {
                let v = alpha * self.mat[(i, j)];
                y[i] += v * x[j];
                y[j] += v * x[i];
            }
            y[j] += alpha * self.mat[(j, j)] * x[j];
        }
    }

    fn check_update(&self, new: &Self, name: &'static str) -> SolverResult<()> {
        check_shape(name, self.rows(), self.cols(), new.rows(), new.cols())
    }

    fn update_values(&mut self, new: &Self, name: &'static str) -> SolverResult<()> {
        self.check_update(new, name)?;
        self.mat.copy_from(&new.mat);
        Ok(())
    }

    fn all_finite(&self) -> bool {
        self.mat.iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_ingest() {
        // [[1, 0], [-1, 0]]
        let g = DenseMatrix::from_row_slice(2, 2, &[1.0, 0.0, -1.0, 0.0]).unwrap();
        assert_eq!(g.get(0, 0), 1.0);
        assert_eq!(g.get(1, 0), -1.0);
        assert_eq!(g.get(0, 1), 0.0);

        let mut y = vec![0.0; 2];
        g.gemv(1.0, &[2.0, 5.0], 0.0, &mut y);
        assert_eq!(y, vec![2.0, -2.0]);

        let mut z = vec![1.0; 2];
        g.gemv_t(1.0, &[1.0, 3.0], 1.0, &mut z);
        assert_eq!(z, vec![-1.0, 1.0]);
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(matches!(
            DenseMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0]),
            Err(SolverError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_symv_upper_ignores_lower() {
        let p = DenseMatrix::from_row_slice(2, 2, &[6.0, 1.0, 50.0, 4.0]).unwrap();
        let mut y = vec![0.0; 2];
        p.symv_upper(1.0, &[1.0, 2.0], 0.0, &mut y);
        assert_eq!(y, vec![8.0, 9.0]);
    }

    #[test]
    fn test_update_values_checks_shape() {
        let mut a = DenseMatrix::from_row_slice(1, 2, &[1.0, -2.0]).unwrap();
        let b = DenseMatrix::from_row_slice(1, 2, &[1.0, -3.0]).unwrap();
        a.update_values(&b, "A").unwrap();
        assert_eq!(a, b);
        assert!(a.update_values(&DenseMatrix::zeros(2, 2), "A").is_err());
    }
}
