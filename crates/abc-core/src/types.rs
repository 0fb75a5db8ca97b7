use serde::{Deserialize, Serialize};

use crate::errors::{AbcError, ErrorInfo};

fn box_error(code: &str, message: impl Into<String>) -> AbcError {
    AbcError::Config(ErrorInfo::new(code, message.into()))
}

/// Admissible open interval `(lower, upper)` of a single parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Lower edge of the interval.
    pub lower: f64,
    /// Upper edge of the interval.
    pub upper: f64,
}

impl Bounds {
    /// Creates a validated interval; both edges must be finite and `lower < upper`.
    pub fn new(lower: f64, upper: f64) -> Result<Self, AbcError> {
        if !lower.is_finite() || !upper.is_finite() {
            return Err(box_error("bounds-non-finite", "interval edges must be finite")
                .with_bounds(lower, upper));
        }
        if lower >= upper {
            return Err(box_error("bounds-empty", "interval requires lower < upper")
                .with_bounds(lower, upper));
        }
        Ok(Self { lower, upper })
    }

    /// Width `upper - lower` of the interval.
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Strict membership test, edges excluded.
    pub fn contains(&self, value: f64) -> bool {
        self.lower < value && value < self.upper
    }
}

trait WithBounds {
    fn with_bounds(self, lower: f64, upper: f64) -> Self;
}

impl WithBounds for AbcError {
    fn with_bounds(self, lower: f64, upper: f64) -> Self {
        match self {
            AbcError::Config(info) => AbcError::Config(
                info.with_context("lower", lower.to_string())
                    .with_context("upper", upper.to_string()),
            ),
            other => other,
        }
    }
}

/// Ordered list of per-parameter intervals defining the sampling support.
///
/// Index `i` of the box describes parameter `i` of every parameter vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Bounds>", into = "Vec<Bounds>")]
pub struct ParamBox {
    bounds: Vec<Bounds>,
}

impl ParamBox {
    /// Creates a box from already validated intervals.
    pub fn new(bounds: Vec<Bounds>) -> Result<Self, AbcError> {
        if bounds.is_empty() {
            return Err(box_error("box-empty", "parameter box needs at least one interval"));
        }
        for (index, b) in bounds.iter().enumerate() {
            Bounds::new(b.lower, b.upper).map_err(|err| match err {
                AbcError::Config(info) => {
                    AbcError::Config(info.with_context("parameter", index.to_string()))
                }
                other => other,
            })?;
        }
        Ok(Self { bounds })
    }

    /// Creates a box from `[lower, upper]` pairs as written in configuration files.
    pub fn from_pairs(pairs: &[[f64; 2]]) -> Result<Self, AbcError> {
        Self::new(
            pairs
                .iter()
                .map(|pair| Bounds {
                    lower: pair[0],
                    upper: pair[1],
                })
                .collect(),
        )
    }

    /// Number of parameters described by the box.
    pub fn dim(&self) -> usize {
        self.bounds.len()
    }

    /// Intervals in parameter order.
    pub fn bounds(&self) -> &[Bounds] {
        &self.bounds
    }

    /// Per-parameter widths.
    pub fn widths(&self) -> Vec<f64> {
        self.bounds.iter().map(Bounds::width).collect()
    }

    /// Strict membership test for a full parameter vector.
    pub fn contains(&self, params: &[f64]) -> bool {
        params.len() == self.bounds.len()
            && self
                .bounds
                .iter()
                .zip(params)
                .all(|(bounds, &value)| bounds.contains(value))
    }

    /// Box as `[lower, upper]` pairs.
    pub fn to_pairs(&self) -> Vec<[f64; 2]> {
        self.bounds.iter().map(|b| [b.lower, b.upper]).collect()
    }
}

impl TryFrom<Vec<Bounds>> for ParamBox {
    type Error = AbcError;

    fn try_from(bounds: Vec<Bounds>) -> Result<Self, Self::Error> {
        ParamBox::new(bounds)
    }
}

impl From<ParamBox> for Vec<Bounds> {
    fn from(value: ParamBox) -> Self {
        value.bounds
    }
}

/// Output of a work function: the input parameters, optional auxiliary
/// scalars, and the distance as the trailing element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationResult {
    values: Vec<f64>,
}

impl EvaluationResult {
    /// Builds a result from its parts: `params ++ extras ++ [distance]`.
    pub fn from_parts(params: &[f64], extras: &[f64], distance: f64) -> Self {
        let mut values = Vec::with_capacity(params.len() + extras.len() + 1);
        values.extend_from_slice(params);
        values.extend_from_slice(extras);
        values.push(distance);
        Self { values }
    }

    /// Wraps a raw output vector, checking it describes `n_params` parameters
    /// followed by at least one trailing scalar and a non-NaN distance.
    pub fn from_values(values: Vec<f64>, n_params: usize) -> Result<Self, AbcError> {
        if values.len() <= n_params {
            return Err(AbcError::Evaluation(
                ErrorInfo::new(
                    "malformed-output",
                    "work function output lacks a trailing distance",
                )
                .with_context("len", values.len().to_string())
                .with_context("n_params", n_params.to_string()),
            ));
        }
        let result = Self { values };
        if result.distance().is_nan() {
            return Err(AbcError::Evaluation(ErrorInfo::new(
                "nan-distance",
                "work function returned a NaN distance",
            )));
        }
        Ok(result)
    }

    /// Distance between simulated and observed behaviour.
    pub fn distance(&self) -> f64 {
        self.values.last().copied().unwrap_or(f64::NAN)
    }

    /// Leading `n_params` entries, i.e. the evaluated parameter vector.
    pub fn params(&self, n_params: usize) -> &[f64] {
        &self.values[..n_params.min(self.values.len())]
    }

    /// Full output vector.
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}
