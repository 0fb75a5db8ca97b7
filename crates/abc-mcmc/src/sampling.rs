use std::fmt;
use std::str::FromStr;

use abc_core::{AbcError, ErrorInfo, ParamBox, RngHandle};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Strategy used to draw candidate parameter vectors from a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SamplingStrategy {
    /// Independent uniform draws.
    Random,
    /// Deterministic regular grid of cell centres.
    Uniform,
}

impl SamplingStrategy {
    /// Canonical configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SamplingStrategy::Random => "random",
            SamplingStrategy::Uniform => "uniform",
        }
    }
}

impl fmt::Display for SamplingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SamplingStrategy {
    type Err = AbcError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "random" => Ok(SamplingStrategy::Random),
            "uniform" => Ok(SamplingStrategy::Uniform),
            other => Err(AbcError::Config(
                ErrorInfo::new("unknown-sampling", format!("unknown sampling strategy `{other}`"))
                    .with_hint("expected `random` or `uniform`"),
            )),
        }
    }
}

/// Draws exactly `n` parameter vectors from `limits`.
pub fn sample(
    strategy: SamplingStrategy,
    limits: &ParamBox,
    n: usize,
    rng: &mut RngHandle,
) -> Vec<Vec<f64>> {
    match strategy {
        SamplingStrategy::Random => sample_random(limits, n, rng),
        SamplingStrategy::Uniform => sample_uniform_grid(limits, n),
    }
}

fn sample_random(limits: &ParamBox, n: usize, rng: &mut RngHandle) -> Vec<Vec<f64>> {
    (0..n)
        .map(|_| {
            limits
                .bounds()
                .iter()
                .map(|b| rng.gen_range(b.lower..b.upper))
                .collect()
        })
        .collect()
}

/// Smallest `k` with `k^dim >= n`.
fn points_per_axis(n: usize, dim: usize) -> u128 {
    let mut k = (n as f64).powf(1.0 / dim as f64).ceil().max(1.0) as u128;
    while k > 1 && (k - 1).checked_pow(dim as u32).map_or(false, |total| total >= n as u128) {
        k -= 1;
    }
    while k.checked_pow(dim as u32).map_or(false, |total| total < n as u128) {
        k += 1;
    }
    k
}

/// Regular grid with `k` cell centres per axis, thinned evenly to `n` points.
fn sample_uniform_grid(limits: &ParamBox, n: usize) -> Vec<Vec<f64>> {
    if n == 0 {
        return Vec::new();
    }
    let dim = limits.dim();
    let k = points_per_axis(n, dim);
    let total = k.saturating_pow(dim as u32);
    (0..n as u128)
        .map(|j| {
            let mut flat = j * total / n as u128;
            let mut point = vec![0.0; dim];
            for axis in (0..dim).rev() {
                let cell = (flat % k) as f64;
                flat /= k;
                let bounds = limits.bounds()[axis];
                point[axis] = bounds.lower + (cell + 0.5) * bounds.width() / k as f64;
            }
            point
        })
        .collect()
}
