//! Least-squares helpers shared by the fractal and fluctuation estimators.

use std::time::{Duration, Instant};

use crate::error::{FeatureError, Result};

/// Tukey bisquare tuning constant (95% efficiency under Gaussian noise).
const BISQUARE_C: f64 = 4.685;
/// Scales a median absolute deviation to a Gaussian standard deviation.
const MAD_TO_SIGMA: f64 = 1.4826;
const MAX_ROBUST_ITERATIONS: usize = 50;
const SLOPE_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LineFit {
    pub fn eval(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Ordinary least-squares line through `(xs, ys)`.
pub fn least_squares_line(xs: &[f64], ys: &[f64]) -> Result<LineFit> {
    let weights = vec![1.0; xs.len()];
    weighted_line(xs, ys, &weights)
}

/// Outlier-resistant line: iteratively reweighted least squares with
/// bisquare weights, seeded by the ordinary fit.
///
/// The optional `deadline` bounds the iteration; running past it is a
/// `ComputationError`, never a silently truncated fit.
pub fn robust_line(xs: &[f64], ys: &[f64], deadline: Option<Duration>) -> Result<LineFit> {
    let started = Instant::now();
    let mut fit = least_squares_line(xs, ys)?;
    if xs.len() < 3 {
        return Ok(fit);
    }
    let y_extent = ys.iter().fold(0.0_f64, |acc, y| acc.max(y.abs()));

    for _ in 0..MAX_ROBUST_ITERATIONS {
        if let Some(limit) = deadline {
            if started.elapsed() > limit {
                return Err(FeatureError::ComputationError(format!(
                    "robust fit exceeded its {:?} deadline",
                    limit
                )));
            }
        }

        let residuals: Vec<f64> = xs
            .iter()
            .zip(ys)
            .map(|(&x, &y)| y - fit.eval(x))
            .collect();
        let scale = MAD_TO_SIGMA * median_absolute(&residuals);
        if scale <= f64::EPSILON * (1.0 + y_extent) {
            break;
        }

        let cutoff = BISQUARE_C * scale;
        let weights: Vec<f64> = residuals
            .iter()
            .map(|r| {
                let u = r / cutoff;
                if u.abs() < 1.0 {
                    (1.0 - u * u).powi(2)
                } else {
                    0.0
                }
            })
            .collect();
        if weights.iter().filter(|&&w| w > 0.0).count() < 2 {
            break;
        }

        let next = match weighted_line(xs, ys, &weights) {
            Ok(next) => next,
            // the surviving points collapsed onto one abscissa
            Err(FeatureError::NumericalError(_)) => break,
            Err(err) => return Err(err),
        };
        let converged =
            (next.slope - fit.slope).abs() <= SLOPE_TOLERANCE * (1.0 + fit.slope.abs());
        fit = next;
        if converged {
            break;
        }
    }
    Ok(fit)
}

fn weighted_line(xs: &[f64], ys: &[f64], weights: &[f64]) -> Result<LineFit> {
    if xs.len() != ys.len() || xs.len() != weights.len() {
        return Err(FeatureError::invalid("mismatched fit inputs"));
    }
    if xs.len() < 2 {
        return Err(FeatureError::insufficient(format!(
            "need at least 2 points for a line fit, got {}",
            xs.len()
        )));
    }
    if xs.iter().chain(ys).any(|v| !v.is_finite()) {
        return Err(FeatureError::NumericalError(
            "non-finite value in fit input".to_string(),
        ));
    }

    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(FeatureError::NumericalError("all fit weights are zero".into()));
    }
    let x_mean = weights.iter().zip(xs).map(|(w, x)| w * x).sum::<f64>() / total;
    let y_mean = weights.iter().zip(ys).map(|(w, y)| w * y).sum::<f64>() / total;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for ((&w, &x), &y) in weights.iter().zip(xs).zip(ys) {
        let dx = x - x_mean;
        sxx += w * dx * dx;
        sxy += w * dx * (y - y_mean);
    }
    let x_extent = xs.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()));
    if sxx <= f64::EPSILON * total * (1.0 + x_extent * x_extent) {
        return Err(FeatureError::NumericalError(
            "singular design matrix: abscissae do not vary".to_string(),
        ));
    }

    let slope = sxy / sxx;
    Ok(LineFit {
        slope,
        intercept: y_mean - slope * x_mean,
    })
}

fn median_absolute(values: &[f64]) -> f64 {
    let mut magnitudes: Vec<f64> = values.iter().map(|v| v.abs()).collect();
    magnitudes.sort_by(|a, b| a.total_cmp(b));
    let mid = magnitudes.len() / 2;
    if magnitudes.is_empty() {
        0.0
    } else if magnitudes.len() % 2 == 0 {
        (magnitudes[mid - 1] + magnitudes[mid]) / 2.0
    } else {
        magnitudes[mid]
    }
}

/// Polynomial fitted on an abscissa rescaled to `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct Polynomial {
    coefficients: Vec<f64>,
    center: f64,
    half_range: f64,
}

impl Polynomial {
    pub fn eval(&self, x: f64) -> f64 {
        let u = (x - self.center) / self.half_range;
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * u + c)
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }
}

/// Least-squares polynomial of `degree` through `(xs, ys)`.
pub fn fit_polynomial(xs: &[f64], ys: &[f64], degree: usize) -> Result<Polynomial> {
    let terms = degree + 1;
    if xs.len() != ys.len() {
        return Err(FeatureError::invalid("mismatched fit inputs"));
    }
    if xs.len() < terms {
        return Err(FeatureError::insufficient(format!(
            "degree {} fit needs {} points, got {}",
            degree,
            terms,
            xs.len()
        )));
    }

    let (min, max) = xs
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
            (lo.min(x), hi.max(x))
        });
    let center = (min + max) / 2.0;
    let half_range = if max > min { (max - min) / 2.0 } else { 1.0 };

    // normal equations in the rescaled basis: gram[i][j] = sum u^(i+j)
    let mut gram = vec![vec![0.0; terms]; terms];
    let mut rhs = vec![0.0; terms];
    let mut powers = vec![0.0; 2 * terms - 1];
    for (&x, &y) in xs.iter().zip(ys) {
        let u = (x - center) / half_range;
        let mut p = 1.0;
        for power in powers.iter_mut() {
            *power = p;
            p *= u;
        }
        for i in 0..terms {
            rhs[i] += powers[i] * y;
            for j in 0..terms {
                gram[i][j] += powers[i + j];
            }
        }
    }

    let coefficients = solve_linear(gram, rhs)?;
    Ok(Polynomial {
        coefficients,
        center,
        half_range,
    })
}

/// Gaussian elimination with partial pivoting.
fn solve_linear(mut matrix: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Result<Vec<f64>> {
    let n = rhs.len();
    let scale = matrix
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let tolerance = scale * 1e-12;

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&a, &b| matrix[a][col].abs().total_cmp(&matrix[b][col].abs()))
            .unwrap_or(col);
        if matrix[pivot_row][col].abs() <= tolerance {
            return Err(FeatureError::NumericalError(
                "singular normal equations in polynomial fit".to_string(),
            ));
        }
        matrix.swap(col, pivot_row);
        rhs.swap(col, pivot_row);

        for row in col + 1..n {
            let factor = matrix[row][col] / matrix[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                matrix[row][k] -= factor * matrix[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| matrix[row][k] * solution[k]).sum();
        solution[row] = (rhs[row] - tail) / matrix[row][row];
    }
    Ok(solution)
}
