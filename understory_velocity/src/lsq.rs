// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Weighted polynomial least-squares fitting.
//!
//! ## Overview
//!
//! [`LeastSquaresSolver`] fits a polynomial of a requested degree to weighted `(x, y)`
//! samples. It expands the samples into a weighted Vandermonde matrix, runs a Gram–Schmidt
//! QR decomposition on it, and back-substitutes the upper-triangular system.
//!
//! The result carries the coefficient of determination as its
//! [`confidence`](PolynomialFit::confidence).
//!
//! ## Degenerate input
//!
//! When a basis vector collapses (norm below `1e-6`) the samples are linearly dependent
//! for the requested degree and [`LeastSquaresSolver::solve`] returns `None`.
//! Callers treat that as "cannot fit", not as an error.
//!
//! ```
//! use understory_velocity::lsq::LeastSquaresSolver;
//!
//! let x = [0.0, 1.0, 2.0, 3.0];
//! let y = [1.0, 3.0, 5.0, 7.0];
//! let w = [1.0; 4];
//! let fit = LeastSquaresSolver::new(&x, &y, &w).solve(1).unwrap();
//! assert!((fit.coefficients[0] - 1.0).abs() < 1e-9);
//! assert!((fit.coefficients[1] - 2.0).abs() < 1e-9);
//! ```

/// Norm below which a Gram–Schmidt basis vector is considered degenerate.
const DEGENERATE_NORM: f64 = 0.000_001;

/// Row-major dense matrix used by the solver.
#[derive(Clone, Debug)]
struct Matrix {
    columns: usize,
    elements: Vec<f64>,
}

impl Matrix {
    fn new(rows: usize, columns: usize) -> Self {
        Self {
            columns,
            elements: vec![0.0; rows * columns],
        }
    }

    #[inline]
    fn get(&self, row: usize, col: usize) -> f64 {
        self.elements[row * self.columns + col]
    }

    #[inline]
    fn set(&mut self, row: usize, col: usize, value: f64) {
        self.elements[row * self.columns + col] = value;
    }

    fn row(&self, row: usize) -> &[f64] {
        let start = row * self.columns;
        &self.elements[start..start + self.columns]
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(a, b)| a * b).sum()
}

/// A polynomial fitted by [`LeastSquaresSolver::solve`].
#[derive(Clone, Debug, PartialEq)]
pub struct PolynomialFit {
    /// Coefficients, lowest order first: `y ≈ c[0] + c[1]·x + c[2]·x² + …`.
    pub coefficients: Vec<f64>,
    /// Weighted coefficient of determination, `1 - SSE / SST`.
    ///
    /// `1.0` when the data has no variance.
    pub confidence: f64,
}

impl PolynomialFit {
    fn new(degree: usize) -> Self {
        Self {
            coefficients: vec![0.0; degree + 1],
            confidence: 0.0,
        }
    }
}

/// Fits polynomials to weighted samples.
///
/// The three slices are parallel: `x[i]`, `y[i]`, and weight `w[i]` describe one sample.
#[derive(Clone, Copy, Debug)]
pub struct LeastSquaresSolver<'a> {
    x: &'a [f64],
    y: &'a [f64],
    w: &'a [f64],
}

impl<'a> LeastSquaresSolver<'a> {
    /// Create a solver over parallel sample slices.
    pub fn new(x: &'a [f64], y: &'a [f64], w: &'a [f64]) -> Self {
        debug_assert!(x.len() == y.len(), "x and y must have the same length");
        debug_assert!(y.len() == w.len(), "y and w must have the same length");
        Self { x, y, w }
    }

    /// Fit a polynomial of the given degree.
    ///
    /// Returns `None` when there are fewer samples than the degree or when the weighted
    /// Vandermonde matrix is rank deficient.
    pub fn solve(&self, degree: usize) -> Option<PolynomialFit> {
        if degree > self.x.len() {
            return None;
        }

        let mut result = PolynomialFit::new(degree);

        let m = self.x.len();
        let n = degree + 1;

        // Expand x into the weighted Vandermonde matrix A (n × m).
        let mut a = Matrix::new(n, m);
        for h in 0..m {
            a.set(0, h, self.w[h]);
            for i in 1..n {
                a.set(i, h, a.get(i - 1, h) * self.x[h]);
            }
        }

        // Gram–Schmidt: q holds the orthonormal basis (one vector per row),
        // r is upper triangular.
        let mut q = Matrix::new(n, m);
        let mut r = Matrix::new(n, n);
        for j in 0..n {
            for h in 0..m {
                q.set(j, h, a.get(j, h));
            }
            for i in 0..j {
                let d = dot(q.row(j), q.row(i));
                for h in 0..m {
                    q.set(j, h, q.get(j, h) - d * q.get(i, h));
                }
            }

            let norm = dot(q.row(j), q.row(j)).sqrt();
            if norm < DEGENERATE_NORM {
                return None;
            }

            let inverse_norm = 1.0 / norm;
            for h in 0..m {
                q.set(j, h, q.get(j, h) * inverse_norm);
            }
            for i in 0..n {
                let value = if i < j { 0.0 } else { dot(q.row(j), a.row(i)) };
                r.set(j, i, value);
            }
        }

        // Solve R·B = Qᵀ·W·Y from the bottom row up.
        let wy: Vec<f64> = self.y.iter().zip(self.w).map(|(y, w)| y * w).collect();
        for i in (0..n).rev() {
            let mut c = dot(q.row(i), &wy);
            for j in (i + 1..n).rev() {
                c -= r.get(i, j) * result.coefficients[j];
            }
            result.coefficients[i] = c / r.get(i, i);
        }

        #[allow(
            clippy::cast_precision_loss,
            reason = "Sample counts are bounded by the tracker history."
        )]
        let y_mean = self.y.iter().sum::<f64>() / m as f64;

        let mut sum_squared_error = 0.0;
        let mut sum_squared_total = 0.0;
        for h in 0..m {
            let mut term = 1.0;
            let mut err = self.y[h] - result.coefficients[0];
            for i in 1..n {
                term *= self.x[h];
                err -= term * result.coefficients[i];
            }
            let w2 = self.w[h] * self.w[h];
            sum_squared_error += w2 * err * err;
            let v = self.y[h] - y_mean;
            sum_squared_total += w2 * v * v;
        }

        result.confidence = if sum_squared_total <= DEGENERATE_NORM {
            1.0
        } else {
            1.0 - (sum_squared_error / sum_squared_total)
        };
        Some(result)
    }
}
