//! Cleartext numerical fitting
//!
//! Default implementation of the external fitting collaborator: linear
//! regression through ridge-stabilized normal equations, logistic/softmax
//! regression through deterministic full-batch gradient descent. Everything
//! here runs in ordinary floating point before quantization.
//!
//! Convergence misses are non-fatal: they are reported in the returned
//! `FitReport` and never turned into errors, so callers can decide whether a
//! partially converged model is acceptable.

use crate::{Error, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Ridge term keeping the normal equations well conditioned
const RIDGE: f64 = 1e-9;

/// Outcome of a fitting run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    /// Whether the optimizer reached its tolerance before the iteration cap
    pub converged: bool,
    /// Iterations actually performed
    pub iterations: usize,
}

impl FitReport {
    fn direct() -> Self {
        Self {
            converged: true,
            iterations: 1,
        }
    }
}

/// Fit a linear regression by solving the normal equations
///
/// Returns `(weights, bias)` with `weights` shaped `(n_outputs, n_features)`.
/// The bias is zero when `fit_intercept` is false.
pub fn fit_linear_regression(
    x: &Array2<f64>,
    y: &Array2<f64>,
    fit_intercept: bool,
) -> Result<(Array2<f64>, Array1<f64>, FitReport)> {
    let (n, f) = (x.nrows(), x.ncols());
    if y.nrows() != n {
        return Err(Error::ShapeMismatch {
            expected: vec![n],
            got: vec![y.nrows()],
        });
    }
    let n_out = y.ncols();
    let m = if fit_intercept { f + 1 } else { f };

    // Augmented design with a trailing ones column for the intercept
    let mut xa = Array2::<f64>::ones((n, m));
    xa.slice_mut(ndarray::s![.., ..f]).assign(x);

    let mut a = xa.t().dot(&xa);
    for i in 0..m {
        a[[i, i]] += RIDGE;
    }
    let b = xa.t().dot(y);

    let solution = gauss_jordan(a, b)?;

    let mut weights = Array2::<f64>::zeros((n_out, f));
    for o in 0..n_out {
        for j in 0..f {
            weights[[o, j]] = solution[[j, o]];
        }
    }
    let bias = if fit_intercept {
        solution.row(f).to_owned()
    } else {
        Array1::zeros(n_out)
    };

    Ok((weights, bias, FitReport::direct()))
}

/// Fit a logistic (binary) or softmax (multiclass) classifier
///
/// Binary problems produce a single weight row scored through a sigmoid;
/// multiclass problems produce one row per class scored through a softmax.
/// Full-batch gradient descent from a zero initialization, so identical data
/// always yields identical parameters.
pub fn fit_logistic(
    x: &Array2<f64>,
    labels: &[usize],
    n_classes: usize,
    max_iter: usize,
    learning_rate: f64,
    tolerance: f64,
) -> Result<(Array2<f64>, Array1<f64>, FitReport)> {
    let (n, f) = (x.nrows(), x.ncols());
    if labels.len() != n {
        return Err(Error::ShapeMismatch {
            expected: vec![n],
            got: vec![labels.len()],
        });
    }
    if n_classes < 2 {
        return Err(Error::InvalidParameter(format!(
            "classification needs at least 2 classes, got {n_classes}"
        )));
    }
    if let Some(&bad) = labels.iter().find(|&&l| l >= n_classes) {
        return Err(Error::InvalidParameter(format!(
            "label {bad} out of range for {n_classes} classes"
        )));
    }

    // Binary uses one score row; multiclass one row per class
    let rows = if n_classes == 2 { 1 } else { n_classes };
    let mut w = Array2::<f64>::zeros((rows, f));
    let mut b = Array1::<f64>::zeros(rows);

    let mut converged = false;
    let mut iterations = 0;

    for _ in 0..max_iter {
        iterations += 1;

        // Residuals P - Y, shaped (n, rows)
        let z = x.dot(&w.t()) + &b;
        let mut g = Array2::<f64>::zeros((n, rows));
        if rows == 1 {
            for i in 0..n {
                let p = sigmoid(z[[i, 0]]);
                g[[i, 0]] = p - labels[i] as f64;
            }
        } else {
            for i in 0..n {
                let row = z.row(i);
                let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let exps: Vec<f64> = row.iter().map(|&v| (v - max).exp()).collect();
                let sum: f64 = exps.iter().sum();
                for c in 0..rows {
                    let p = exps[c] / sum;
                    g[[i, c]] = p - if labels[i] == c { 1.0 } else { 0.0 };
                }
            }
        }

        let grad_w = g.t().dot(x) / n as f64;
        let grad_b = g.sum_axis(Axis(0)) / n as f64;

        let max_grad = grad_w
            .iter()
            .chain(grad_b.iter())
            .fold(0.0f64, |m, &v| m.max(v.abs()));

        w = w - learning_rate * &grad_w;
        b = b - learning_rate * &grad_b;

        if max_grad < tolerance {
            converged = true;
            break;
        }
    }

    Ok((w, b, FitReport {
        converged,
        iterations,
    }))
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Solve `A X = B` for square `A` by Gauss-Jordan elimination with partial
/// pivoting; `B` may hold multiple right-hand sides as columns.
fn gauss_jordan(mut a: Array2<f64>, mut b: Array2<f64>) -> Result<Array2<f64>> {
    let m = a.nrows();
    debug_assert_eq!(a.ncols(), m);
    debug_assert_eq!(b.nrows(), m);

    for col in 0..m {
        let pivot = (col..m)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        if a[[pivot, col]].abs() < 1e-12 {
            return Err(Error::InvalidParameter(
                "normal equations are singular; the design matrix may be degenerate".to_string(),
            ));
        }
        if pivot != col {
            for j in 0..m {
                a.swap([pivot, j], [col, j]);
            }
            for j in 0..b.ncols() {
                b.swap([pivot, j], [col, j]);
            }
        }

        let diag = a[[col, col]];
        for j in 0..m {
            a[[col, j]] /= diag;
        }
        for j in 0..b.ncols() {
            b[[col, j]] /= diag;
        }

        for row in 0..m {
            if row == col {
                continue;
            }
            let factor = a[[row, col]];
            if factor == 0.0 {
                continue;
            }
            for j in 0..m {
                a[[row, j]] -= factor * a[[col, j]];
            }
            for j in 0..b.ncols() {
                b[[row, j]] -= factor * b[[col, j]];
            }
        }
    }

    Ok(b)
}
