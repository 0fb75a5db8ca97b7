use abc_core::{AbcError, ErrorInfo};
use serde::{Deserialize, Serialize};

fn grid_error(code: &str, message: impl Into<String>) -> AbcError {
    AbcError::Config(ErrorInfo::new(code, message.into()))
}

/// Density values on a regular grid.
///
/// `values` is row-major over `axes`: the last axis varies fastest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityGrid {
    /// Ascending grid coordinates per parameter.
    pub axes: Vec<Vec<f64>>,
    /// Density at every grid node.
    pub values: Vec<f64>,
}

impl DensityGrid {
    /// Number of grid nodes implied by the axes, `None` on overflow.
    pub fn node_count(axes: &[Vec<f64>]) -> Option<usize> {
        axes.iter()
            .try_fold(1usize, |total, axis| total.checked_mul(axis.len()))
    }

    /// Flat index of the node with per-axis indices `index`.
    pub fn flat_index(&self, index: &[usize]) -> usize {
        index
            .iter()
            .zip(&self.axes)
            .fold(0, |flat, (&i, axis)| flat * axis.len() + i)
    }

    /// Coordinates of the node at flat position `flat`.
    pub fn node(&self, mut flat: usize) -> Vec<f64> {
        let mut point = vec![0.0; self.axes.len()];
        for (slot, axis) in point.iter_mut().zip(&self.axes).rev() {
            *slot = axis[flat % axis.len()];
            flat /= axis.len();
        }
        point
    }
}

/// Prior density over the parameter box, interpolated multilinearly between
/// the nodes of a [`DensityGrid`].
///
/// Read-only once built and shared by every chain of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DensityGrid", into = "DensityGrid")]
pub struct PriorSurface {
    grid: DensityGrid,
}

impl PriorSurface {
    /// Wraps a grid after checking its shape.
    pub fn new(grid: DensityGrid) -> Result<Self, AbcError> {
        if grid.axes.is_empty() {
            return Err(grid_error("prior-axes", "density grid needs at least one axis"));
        }
        for (index, axis) in grid.axes.iter().enumerate() {
            if axis.len() < 2 || axis.windows(2).any(|w| !(w[0] < w[1])) {
                return Err(AbcError::Config(
                    ErrorInfo::new("prior-axis", "grid axes need two or more ascending nodes")
                        .with_context("axis", index.to_string()),
                ));
            }
        }
        if DensityGrid::node_count(&grid.axes) != Some(grid.values.len()) {
            return Err(AbcError::Config(
                ErrorInfo::new("prior-values", "density value count does not match the grid")
                    .with_context("values", grid.values.len().to_string()),
            ));
        }
        Ok(Self { grid })
    }

    /// Underlying grid.
    pub fn grid(&self) -> &DensityGrid {
        &self.grid
    }

    /// Number of parameters covered.
    pub fn dim(&self) -> usize {
        self.grid.axes.len()
    }

    /// Interpolated density at `point`; `None` outside the grid.
    pub fn density(&self, point: &[f64]) -> Option<f64> {
        if point.len() != self.dim() {
            return None;
        }
        let mut cells = Vec::with_capacity(point.len());
        for (&value, axis) in point.iter().zip(&self.grid.axes) {
            let first = axis[0];
            let last = axis[axis.len() - 1];
            if !(first..=last).contains(&value) {
                return None;
            }
            let upper = axis.partition_point(|&node| node <= value).min(axis.len() - 1);
            let lower = upper - 1;
            let weight = (value - axis[lower]) / (axis[upper] - axis[lower]);
            cells.push((lower, weight));
        }

        let dim = cells.len();
        let mut total = 0.0;
        let mut index = vec![0; dim];
        for corner in 0..(1usize << dim) {
            let mut weight = 1.0;
            for (axis, &(lower, t)) in cells.iter().enumerate() {
                if (corner >> (dim - 1 - axis)) & 1 == 1 {
                    index[axis] = lower + 1;
                    weight *= t;
                } else {
                    index[axis] = lower;
                    weight *= 1.0 - t;
                }
            }
            if weight != 0.0 {
                total += weight * self.grid.values[self.grid.flat_index(&index)];
            }
        }
        Some(total)
    }
}

impl TryFrom<DensityGrid> for PriorSurface {
    type Error = AbcError;

    fn try_from(grid: DensityGrid) -> Result<Self, Self::Error> {
        PriorSurface::new(grid)
    }
}

impl From<PriorSurface> for DensityGrid {
    fn from(value: PriorSurface) -> Self {
        value.grid
    }
}

/// Metropolis-Hastings prior-ratio test.
///
/// Accepts with probability `min(1, candidate / current)` given a uniform
/// `draw in [0, 1)`. Missing or non-finite densities count as zero; a zero
/// candidate is rejected, a zero current with a positive candidate is
/// accepted.
pub fn prior_ratio_accepts(current: Option<f64>, candidate: Option<f64>, draw: f64) -> bool {
    let clean = |density: Option<f64>| match density {
        Some(value) if value.is_finite() && value > 0.0 => value,
        _ => 0.0,
    };
    let current = clean(current);
    let candidate = clean(candidate);
    if candidate == 0.0 {
        return false;
    }
    if current == 0.0 {
        return true;
    }
    draw < (candidate / current).min(1.0)
}
