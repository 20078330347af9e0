//! Sparse matrix and conjugate gradient solver for the Poisson systems.
//!
//! The systems assembled by reconstruction are symmetric positive definite
//! (a 7-point Laplacian with Dirichlet data folded into the right-hand side),
//! which is exactly what conjugate gradient needs.

use nalgebra::DVector;
use rayon::prelude::*;

/// Compressed Sparse Row (CSR) matrix.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    /// `row_ptr[i]..row_ptr[i + 1]` indexes the entries of row `i`.
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Create a CSR matrix from triplets (row, col, value).
    ///
    /// Duplicate entries at the same (row, col) are summed.
    pub fn from_triplets(rows: usize, cols: usize, mut triplets: Vec<(usize, usize, f64)>) -> Self {
        triplets.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut row_ptr = vec![0usize; rows + 1];
        let mut col_idx: Vec<usize> = Vec::with_capacity(triplets.len());
        let mut values: Vec<f64> = Vec::with_capacity(triplets.len());
        let mut last: Option<(usize, usize)> = None;

        for (row, col, val) in triplets {
            if last == Some((row, col)) {
                if let Some(acc) = values.last_mut() {
                    *acc += val;
                }
            } else {
                col_idx.push(col);
                values.push(val);
                row_ptr[row + 1] += 1;
                last = Some((row, col));
            }
        }

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

    /// Number of rows.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.cols
    }

    /// Number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Multiply matrix by vector: y = A * x.
    pub fn mul_vec(&self, x: &DVector<f64>) -> DVector<f64> {
        debug_assert_eq!(x.len(), self.cols);
        let y: Vec<f64> = (0..self.rows)
            .into_par_iter()
            .map(|i| {
                (self.row_ptr[i]..self.row_ptr[i + 1])
                    .map(|k| self.values[k] * x[self.col_idx[k]])
                    .sum()
            })
            .collect();
        DVector::from_vec(y)
    }
}

/// Outcome of a conjugate gradient solve.
#[derive(Debug, Clone)]
pub struct CgSolution {
    /// Best iterate found.
    pub x: DVector<f64>,
    /// Iterations performed.
    pub iterations: usize,
    /// Whether the relative residual dropped below the tolerance.
    pub converged: bool,
    /// Final `|b - Ax| / |b|`.
    pub relative_residual: f64,
}

/// Solve A*x = b using the Conjugate Gradient method.
///
/// Requires A to be symmetric positive definite. Stops after `max_iter`
/// iterations or once the relative residual is below `tolerance`; a solve
/// that runs out of iterations still returns its last iterate, flagged as
/// not converged.
pub fn conjugate_gradient(
    a: &CsrMatrix,
    b: &DVector<f64>,
    x0: Option<&DVector<f64>>,
    max_iter: usize,
    tolerance: f64,
) -> CgSolution {
    let n = b.len();
    debug_assert_eq!(a.nrows(), n);
    debug_assert_eq!(a.ncols(), n);

    let mut x = match x0 {
        Some(x0) => x0.clone(),
        None => DVector::zeros(n),
    };

    let b_norm = b.norm();
    if b_norm < 1e-300 {
        return CgSolution {
            x: DVector::zeros(n),
            iterations: 0,
            converged: true,
            relative_residual: 0.0,
        };
    }

    // r = b - A*x
    let mut r = b - a.mul_vec(&x);
    let mut r_norm_sq = r.dot(&r);
    let mut iterations = 0;

    if r_norm_sq.sqrt() / b_norm >= tolerance {
        let mut p = r.clone();

        while iterations < max_iter {
            iterations += 1;
            let ap = a.mul_vec(&p);

            let p_ap = p.dot(&ap);
            if p_ap.abs() < 1e-300 {
                break;
            }
            let alpha = r_norm_sq / p_ap;

            x.axpy(alpha, &p, 1.0);
            r.axpy(-alpha, &ap, 1.0);

            let new_r_norm_sq = r.dot(&r);
            if new_r_norm_sq.sqrt() / b_norm < tolerance {
                r_norm_sq = new_r_norm_sq;
                break;
            }

            let beta = new_r_norm_sq / r_norm_sq;
            // p = r + beta * p
            p.axpy(1.0, &r, beta);
            r_norm_sq = new_r_norm_sq;
        }
    }

    let relative_residual = r_norm_sq.sqrt() / b_norm;
    CgSolution {
        x,
        iterations,
        converged: relative_residual < tolerance,
        relative_residual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csr_from_triplets_with_duplicates() {
        let triplets = vec![
            (0, 0, 2.0),
            (0, 0, 2.0),
            (0, 1, 1.0),
            (1, 0, 1.0),
            (1, 1, 3.0),
        ];
        let a = CsrMatrix::from_triplets(2, 2, triplets);
        assert_eq!(a.nnz(), 4);

        let y = a.mul_vec(&DVector::from_vec(vec![1.0, 0.0]));
        assert!((y[0] - 4.0).abs() < 1e-12);
        assert!((y[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_csr_empty_rows() {
        let a = CsrMatrix::from_triplets(3, 3, vec![(2, 2, 5.0), (0, 0, 1.0)]);
        let y = a.mul_vec(&DVector::from_vec(vec![1.0, 1.0, 1.0]));
        assert_eq!(y.as_slice(), &[1.0, 0.0, 5.0]);
    }

    #[test]
    fn test_cg_simple() {
        // [ 4  1 ] x = [ 1 ]  ->  x = (1/11, 7/11)
        // [ 1  3 ]     [ 2 ]
        let triplets = vec![(0, 0, 4.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)];
        let a = CsrMatrix::from_triplets(2, 2, triplets);
        let b = DVector::from_vec(vec![1.0, 2.0]);

        let solution = conjugate_gradient(&a, &b, None, 100, 1e-10);
        assert!(solution.converged);
        assert!((solution.x[0] - 1.0 / 11.0).abs() < 1e-8);
        assert!((solution.x[1] - 7.0 / 11.0).abs() < 1e-8);
    }

    #[test]
    fn test_cg_1d_laplacian() {
        let n = 50;
        let mut triplets = Vec::new();
        for i in 0..n {
            triplets.push((i, i, 2.0));
            if i > 0 {
                triplets.push((i, i - 1, -1.0));
            }
            if i + 1 < n {
                triplets.push((i, i + 1, -1.0));
            }
        }
        let a = CsrMatrix::from_triplets(n, n, triplets);
        let b = DVector::from_element(n, 1.0);

        let solution = conjugate_gradient(&a, &b, None, 200, 1e-10);
        assert!(solution.converged);
        assert!((a.mul_vec(&solution.x) - &b).norm() < 1e-7);
    }

    #[test]
    fn test_cg_reports_non_convergence() {
        let n = 50;
        let mut triplets = Vec::new();
        for i in 0..n {
            triplets.push((i, i, 2.0));
            if i > 0 {
                triplets.push((i, i - 1, -1.0));
                triplets.push((i - 1, i, -1.0));
            }
        }
        let a = CsrMatrix::from_triplets(n, n, triplets);
        let b = DVector::from_element(n, 1.0);

        let solution = conjugate_gradient(&a, &b, None, 2, 1e-12);
        assert!(!solution.converged);
        assert_eq!(solution.iterations, 2);
        assert!(solution.relative_residual > 1e-12);
    }

    #[test]
    fn test_cg_exact_initial_guess() {
        let a = CsrMatrix::from_triplets(2, 2, vec![(0, 0, 4.0), (1, 1, 2.0)]);
        let b = DVector::from_vec(vec![4.0, 2.0]);
        let x0 = DVector::from_vec(vec![1.0, 1.0]);
        let solution = conjugate_gradient(&a, &b, Some(&x0), 100, 1e-10);
        assert_eq!(solution.iterations, 0);
        assert!(solution.converged);
    }
}
