//! Sparse matrix storage and a conjugate gradient solver.
//!
//! The cotangent Laplacian and the augmented constraint system are assembled
//! from `(row, col, value)` triplets into compressed sparse row storage.

use nalgebra::{DMatrix, DVector};

use crate::error::{MeshError, Result};

/// Compressed Sparse Row (CSR) matrix.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    /// `row_ptr[i]..row_ptr[i + 1]` is the slice of `col_idx`/`values` for row i.
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Create a CSR matrix from triplets (row, col, value).
    ///
    /// Duplicate entries at the same (row, col) are summed. Column indices
    /// within each row end up sorted ascending.
    pub fn from_triplets(rows: usize, cols: usize, mut triplets: Vec<(usize, usize, f64)>) -> Self {
        triplets.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut row_ptr = vec![0usize; rows + 1];
        let mut col_idx: Vec<usize> = Vec::with_capacity(triplets.len());
        let mut values: Vec<f64> = Vec::with_capacity(triplets.len());
        let mut last: Option<(usize, usize)> = None;

        for (row, col, val) in triplets {
            debug_assert!(row < rows && col < cols, "triplet ({}, {}) out of bounds", row, col);
            if last == Some((row, col)) {
                if let Some(v) = values.last_mut() {
                    *v += val;
                }
                continue;
            }
            col_idx.push(col);
            values.push(val);
            row_ptr[row + 1] += 1;
            last = Some((row, col));
        }

        // Prefix sum turns per-row counts into offsets.
        for r in 0..rows {
            row_ptr[r + 1] += row_ptr[r];
        }

        Self {
            rows,
            cols,
            row_ptr,
            col_idx,
            values,
        }
    }

    /// Get the number of rows.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.rows
    }

    /// Get the number of columns.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.cols
    }

    /// Get the number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Iterate the stored `(col, value)` entries of one row.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        self.col_idx[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// Entry at `(i, j)`, zero when not stored.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        match self.col_idx[range.clone()].binary_search(&j) {
            Ok(k) => self.values[range.start + k],
            Err(_) => 0.0,
        }
    }

    /// Sum of each row.
    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.rows).map(|i| self.row(i).map(|(_, v)| v).sum()).collect()
    }

    /// Whether `A(i, j) == A(j, i)` for every stored entry (exact comparison).
    pub fn is_symmetric(&self) -> bool {
        self.rows == self.cols
            && (0..self.rows).all(|i| self.row(i).all(|(j, v)| self.get(j, i) == v))
    }

    /// Expand into a dense matrix.
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.rows, self.cols);
        for i in 0..self.rows {
            for (j, v) in self.row(i) {
                dense[(i, j)] = v;
            }
        }
        dense
    }

    /// Multiply matrix by vector: y = A * x.
    pub fn mul_vec(&self, x: &DVector<f64>) -> DVector<f64> {
        assert_eq!(x.len(), self.cols, "Vector dimension mismatch");

        let mut y = DVector::zeros(self.rows);
        for i in 0..self.rows {
            y[i] = self.row(i).map(|(j, v)| v * x[j]).sum();
        }
        y
    }
}

/// Solve A*x = b using the Conjugate Gradient method.
///
/// Requires A to be symmetric positive definite.
///
/// # Arguments
///
/// * `a` - The system matrix (must be symmetric positive definite)
/// * `b` - The right-hand side vector
/// * `x0` - Optional initial guess (zeros if None)
/// * `max_iter` - Maximum number of iterations
/// * `tolerance` - Convergence tolerance (relative residual norm)
///
/// # Returns
///
/// The solution vector x. Fails with `ConvergenceFailed` when the budget
/// runs out and with `SingularSystem` when a search direction has zero
/// curvature.
pub fn conjugate_gradient(
    a: &CsrMatrix,
    b: &DVector<f64>,
    x0: Option<&DVector<f64>>,
    max_iter: usize,
    tolerance: f64,
) -> Result<DVector<f64>> {
    let n = b.len();
    assert_eq!(a.nrows(), n, "Matrix-vector dimension mismatch");
    assert_eq!(a.ncols(), n, "Matrix must be square");

    let mut x = match x0 {
        Some(x0) => x0.clone(),
        None => DVector::zeros(n),
    };

    let b_norm = b.norm();
    if b_norm < 1e-15 {
        return Ok(DVector::zeros(n));
    }

    let mut r = b - a.mul_vec(&x);
    let mut r_norm_sq = r.dot(&r);
    if r_norm_sq.sqrt() / b_norm < tolerance {
        return Ok(x);
    }

    let mut p = r.clone();

    for _iter in 0..max_iter {
        let ap = a.mul_vec(&p);

        let p_ap = p.dot(&ap);
        if p_ap.abs() < 1e-300 {
            // Zero curvature along a non-zero search direction.
            return Err(MeshError::singular("conjugate gradient broke down on a singular matrix"));
        }
        let alpha = r_norm_sq / p_ap;

        x += alpha * &p;
        r -= alpha * &ap;

        let new_r_norm_sq = r.dot(&r);
        if new_r_norm_sq.sqrt() / b_norm < tolerance {
            return Ok(x);
        }

        let beta = new_r_norm_sq / r_norm_sq;
        p = &r + beta * &p;
        r_norm_sq = new_r_norm_sq;
    }

    Err(MeshError::ConvergenceFailed {
        iterations: max_iter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spd_2x2() -> CsrMatrix {
        // [ 4  1 ]
        // [ 1  3 ]
        CsrMatrix::from_triplets(2, 2, vec![(0, 0, 4.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)])
    }

    #[test]
    fn test_csr_from_triplets_with_duplicates() {
        let triplets = vec![
            (1, 1, 3.0),
            (0, 0, 2.0),
            (0, 1, 1.0),
            (0, 0, 2.0),
            (1, 0, 1.0),
        ];
        let a = CsrMatrix::from_triplets(2, 2, triplets);

        assert_eq!(a.nnz(), 4);
        assert_eq!(a.get(0, 0), 4.0);
        assert_eq!(a.get(1, 1), 3.0);
        assert!(a.is_symmetric());
    }

    #[test]
    fn test_csr_empty_rows() {
        let a = CsrMatrix::from_triplets(4, 4, vec![(2, 3, 5.0), (0, 0, 1.0)]);
        assert_eq!(a.row(1).count(), 0);
        assert_eq!(a.row(3).count(), 0);
        assert_eq!(a.get(2, 3), 5.0);
        assert_eq!(a.get(3, 2), 0.0);
        assert_eq!(a.row_sums(), vec![1.0, 0.0, 5.0, 0.0]);
        assert!(!a.is_symmetric());

        let empty = CsrMatrix::from_triplets(3, 3, Vec::new());
        assert_eq!(empty.nnz(), 0);
        assert_eq!(empty.row_sums(), vec![0.0; 3]);
    }

    #[test]
    fn test_csr_mul_vec_and_dense() {
        // [ 4  1 ]   [ 1 ]   [ 5 ]
        // [ 1  3 ] * [ 1 ] = [ 4 ]
        let a = spd_2x2();
        let y = a.mul_vec(&DVector::from_vec(vec![1.0, 1.0]));
        assert!((y[0] - 5.0).abs() < 1e-10);
        assert!((y[1] - 4.0).abs() < 1e-10);

        let dense = a.to_dense();
        assert_eq!(dense, DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]));
    }

    #[test]
    fn test_cg_simple() {
        // Solution: x = 1/11, y = 7/11
        let a = spd_2x2();
        let b = DVector::from_vec(vec![1.0, 2.0]);

        let x = conjugate_gradient(&a, &b, None, 100, 1e-10).unwrap();

        assert!((a.mul_vec(&x) - b).norm() < 1e-8);
        assert!((x[0] - 1.0 / 11.0).abs() < 1e-8);
        assert!((x[1] - 7.0 / 11.0).abs() < 1e-8);
    }

    #[test]
    fn test_cg_with_initial_guess() {
        let a = spd_2x2();
        let b = DVector::from_vec(vec![1.0, 2.0]);

        let x0 = DVector::from_vec(vec![0.1, 0.6]);
        let x = conjugate_gradient(&a, &b, Some(&x0), 100, 1e-10).unwrap();

        assert!((a.mul_vec(&x) - b).norm() < 1e-8);
    }

    #[test]
    fn test_cg_reports_non_convergence() {
        // Indefinite matrix with a budget too small to finish.
        let a = CsrMatrix::from_triplets(
            3,
            3,
            vec![(0, 0, 1.0), (1, 1, -2.0), (2, 2, 3.0), (0, 2, 1.0), (2, 0, 1.0)],
        );
        let b = DVector::from_vec(vec![1.0, 1.0, 1.0]);
        assert!(matches!(
            conjugate_gradient(&a, &b, None, 1, 1e-12),
            Err(MeshError::ConvergenceFailed { iterations: 1 })
        ));
    }

    #[test]
    fn test_cg_singular_matrix() {
        let zero = CsrMatrix::from_triplets(2, 2, vec![(0, 0, 0.0), (1, 1, 0.0)]);
        let b = DVector::from_vec(vec![1.0, 0.0]);
        assert!(matches!(
            conjugate_gradient(&zero, &b, None, 10, 1e-10),
            Err(MeshError::SingularSystem { .. })
        ));
    }
}
