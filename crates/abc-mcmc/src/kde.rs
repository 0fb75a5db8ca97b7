//! Gaussian kernel density estimate evaluated on a regular grid.

use abc_core::{AbcError, ErrorInfo, ParamBox};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::prior::DensityGrid;
use crate::stats::batch_covariance;

/// Relative width used as the per-axis bandwidth floor when the sample
/// covariance is singular.
const DEGENERATE_BANDWIDTH: f64 = 1e-3;

/// Gridded density plus its argmax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KdeEstimate {
    /// Density at every node of the `(bins + 1)^d` grid spanning the box.
    pub grid: DensityGrid,
    /// Grid node of maximal density (smoothed point estimate).
    pub point_estimate: Vec<f64>,
}

/// Evaluates a Gaussian KDE of `data` on `bins + 1` evenly spaced nodes per
/// axis of `limits`, edges included.
///
/// The kernel covariance is the sample covariance scaled by Scott's factor
/// `n^(-1 / (d + 4))` squared. A singular covariance falls back to a diagonal
/// kernel.
pub fn estimate(data: &[Vec<f64>], limits: &ParamBox, bins: usize) -> Result<KdeEstimate, AbcError> {
    let dim = limits.dim();
    if data.len() < 2 {
        return Err(AbcError::Numeric(
            ErrorInfo::new("kde-samples", "density estimation needs at least two samples")
                .with_context("samples", data.len().to_string()),
        ));
    }
    if bins == 0 {
        return Err(AbcError::Config(ErrorInfo::new("kde-bins", "at least one bin is required")));
    }
    if let Some(row) = data.iter().find(|row| row.len() != dim) {
        return Err(AbcError::Numeric(
            ErrorInfo::new("kde-dimension", "sample dimension differs from the box")
                .with_context("expected", dim.to_string())
                .with_context("actual", row.len().to_string()),
        ));
    }

    let axes: Vec<Vec<f64>> = limits
        .bounds()
        .iter()
        .map(|b| {
            (0..=bins)
                .map(|k| b.lower + b.width() * k as f64 / bins as f64)
                .collect()
        })
        .collect();
    let nodes = DensityGrid::node_count(&axes).ok_or_else(|| {
        AbcError::Config(
            ErrorInfo::new("kde-grid-size", "density grid is too large")
                .with_context("bins", bins.to_string())
                .with_context("dim", dim.to_string()),
        )
    })?;

    let kernel = Kernel::fit(data, limits)?;
    let mut grid = DensityGrid {
        axes,
        values: Vec::new(),
    };
    let values: Vec<f64> = (0..nodes)
        .into_par_iter()
        .map(|flat| kernel.density(&grid.node(flat)))
        .collect();
    grid.values = values;

    let best = grid
        .values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (index, &value)| {
            if value > best.1 {
                (index, value)
            } else {
                best
            }
        })
        .0;
    let point_estimate = grid.node(best);
    Ok(KdeEstimate {
        grid,
        point_estimate,
    })
}

struct Kernel {
    points: Vec<DVector<f64>>,
    factor: DMatrix<f64>,
    norm: f64,
}

impl Kernel {
    fn fit(data: &[Vec<f64>], limits: &ParamBox) -> Result<Self, AbcError> {
        let n = data.len() as f64;
        let dim = limits.dim();
        let scott = n.powf(-1.0 / (dim as f64 + 4.0));
        let covariance = batch_covariance(data) * (scott * scott);

        let factor = match covariance.clone().cholesky() {
            Some(chol) => chol.l(),
            None => {
                let diagonal = DVector::from_iterator(
                    dim,
                    limits.widths().iter().enumerate().map(|(k, width)| {
                        let floor = (DEGENERATE_BANDWIDTH * width * scott).powi(2);
                        covariance[(k, k)].max(floor).sqrt()
                    }),
                );
                DMatrix::from_diagonal(&diagonal)
            }
        };
        let log_det: f64 = factor.diagonal().iter().map(|v| v.ln()).sum::<f64>() * 2.0;
        if !log_det.is_finite() {
            return Err(AbcError::Numeric(ErrorInfo::new(
                "kde-bandwidth",
                "kernel covariance is not positive definite",
            )));
        }
        let norm = (-(0.5 * dim as f64 * (2.0 * std::f64::consts::PI).ln()) - 0.5 * log_det).exp() / n;
        Ok(Self {
            points: data.iter().map(|row| DVector::from_column_slice(row)).collect(),
            factor,
            norm,
        })
    }

    fn density(&self, x: &[f64]) -> f64 {
        let x = DVector::from_column_slice(x);
        self.points
            .iter()
            .map(|point| {
                let diff = &x - point;
                let z = self
                    .factor
                    .solve_lower_triangular(&diff)
                    .unwrap_or_else(|| DVector::from_element(diff.len(), f64::INFINITY));
                (-0.5 * z.norm_squared()).exp()
            })
            .sum::<f64>()
            * self.norm
    }
}
