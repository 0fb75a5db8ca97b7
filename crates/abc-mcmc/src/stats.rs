use abc_core::{AbcError, ErrorInfo};
use nalgebra::{DMatrix, DVector};

/// One step of the recursive (Welford-style) mean and covariance update.
///
/// `count` is the number of samples already folded into `mean_prev` and
/// `cov_prev`. The covariance is the unbiased (`n - 1`) estimator:
/// `cov' = ((i - 1) / i) cov + d d^T / (i + 1)` with `d = x - mean_prev`.
pub fn covariance_recursive(
    x: &DVector<f64>,
    count: usize,
    cov_prev: &DMatrix<f64>,
    mean_prev: &DVector<f64>,
) -> (DMatrix<f64>, DVector<f64>) {
    let i = count as f64;
    let delta = x - mean_prev;
    let mean = mean_prev + &delta / (i + 1.0);
    let cov = if count == 0 {
        DMatrix::zeros(x.len(), x.len())
    } else {
        cov_prev * ((i - 1.0) / i) + (&delta * delta.transpose()) / (i + 1.0)
    };
    (cov, mean)
}

/// Running mean and unbiased covariance of a stream of vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct RunningMoments {
    mean: DVector<f64>,
    covariance: DMatrix<f64>,
    count: usize,
}

impl RunningMoments {
    /// Batch estimate over `rows`; at least two rows are required.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, AbcError> {
        if rows.len() < 2 {
            return Err(AbcError::Numeric(
                ErrorInfo::new("moments-rows", "covariance needs at least two samples")
                    .with_context("rows", rows.len().to_string()),
            ));
        }
        Ok(Self {
            mean: batch_mean(rows),
            covariance: batch_covariance(rows),
            count: rows.len(),
        })
    }

    /// Folds one more sample into the estimate.
    pub fn update(&mut self, x: &[f64]) {
        let x = DVector::from_column_slice(x);
        let (covariance, mean) =
            covariance_recursive(&x, self.count, &self.covariance, &self.mean);
        self.covariance = covariance;
        self.mean = mean;
        self.count += 1;
    }

    /// Current mean.
    pub fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// Current unbiased covariance.
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    /// Number of samples folded in.
    pub fn count(&self) -> usize {
        self.count
    }
}

/// Column means of `rows`.
pub fn batch_mean(rows: &[Vec<f64>]) -> DVector<f64> {
    let dim = rows.first().map_or(0, Vec::len);
    let mut mean = DVector::zeros(dim);
    for row in rows {
        mean += DVector::from_column_slice(row);
    }
    if !rows.is_empty() {
        mean /= rows.len() as f64;
    }
    mean
}

/// Unbiased sample covariance of `rows`; zero when fewer than two rows.
pub fn batch_covariance(rows: &[Vec<f64>]) -> DMatrix<f64> {
    let dim = rows.first().map_or(0, Vec::len);
    let mut cov = DMatrix::zeros(dim, dim);
    if rows.len() < 2 {
        return cov;
    }
    let mean = batch_mean(rows);
    for row in rows {
        let d = DVector::from_column_slice(row) - &mean;
        cov += &d * d.transpose();
    }
    cov / (rows.len() - 1) as f64
}

/// Linear-interpolation percentile of an ascending slice at level `q in [0, 1]`.
///
/// The position is `q * (n - 1)`; the result is NaN for an empty slice.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let weight = position - lower as f64;
        sorted[lower] * (1.0 - weight) + sorted[upper] * weight
    }
}

/// Per-column population standard deviation (`n` denominator).
pub fn population_std(rows: &[Vec<f64>]) -> Vec<f64> {
    let mean = batch_mean(rows);
    let n = rows.len() as f64;
    (0..mean.len())
        .map(|k| {
            let ss: f64 = rows.iter().map(|row| (row[k] - mean[k]).powi(2)).sum();
            (ss / n).sqrt()
        })
        .collect()
}
