use std::fmt;
use std::str::FromStr;

use abc_core::{AbcError, ErrorInfo, EvaluationResult, RngHandle, WorkFunction};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::config::WorkConfig;

fn work_error(code: &str, message: impl Into<String>) -> AbcError {
    AbcError::Config(ErrorInfo::new(code, message.into()))
}

/// Closed set of simulator cases known to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkCase {
    /// The parameters are the simulation output; distance is the Euclidean
    /// distance to the reference vector.
    Identity,
    /// Exponential decay `a * exp(-b t)` sampled on `t in [0, 5]`.
    Decay,
    /// Oscillation `a * sin(w t)` sampled on `t in [0, 2 pi]`.
    Periodic,
    /// Sample means of Gaussian draws centred on the parameters.
    NoisyMean,
}

impl WorkCase {
    /// Canonical configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkCase::Identity => "identity",
            WorkCase::Decay => "decay",
            WorkCase::Periodic => "periodic",
            WorkCase::NoisyMean => "noisy-mean",
        }
    }

    /// Fixed parameter count of the case, `None` when any dimension works.
    pub fn fixed_dim(&self) -> Option<usize> {
        match self {
            WorkCase::Identity | WorkCase::NoisyMean => None,
            WorkCase::Decay | WorkCase::Periodic => Some(2),
        }
    }
}

impl fmt::Display for WorkCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkCase {
    type Err = AbcError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "identity" => Ok(WorkCase::Identity),
            "decay" => Ok(WorkCase::Decay),
            "periodic" => Ok(WorkCase::Periodic),
            "noisy-mean" => Ok(WorkCase::NoisyMean),
            other => Err(AbcError::Config(
                ErrorInfo::new("unknown-case", format!("unknown work function case `{other}`"))
                    .with_hint("expected one of identity, decay, periodic, noisy-mean"),
            )),
        }
    }
}

/// Work function built from a resolved [`WorkCase`] and its observations.
#[derive(Debug, Clone)]
pub struct CaseFunction {
    case: WorkCase,
    reference: Vec<f64>,
    times: Vec<f64>,
    observed: Vec<f64>,
    draws: usize,
    noise: f64,
}

impl CaseFunction {
    /// Resolved case.
    pub fn case(&self) -> WorkCase {
        self.case
    }

    /// Observed data the simulations are compared against.
    pub fn observed(&self) -> &[f64] {
        &self.observed
    }

    fn curve(&self, params: &[f64]) -> Vec<f64> {
        match self.case {
            WorkCase::Decay => self
                .times
                .iter()
                .map(|t| params[0] * (-params[1] * t).exp())
                .collect(),
            WorkCase::Periodic => self
                .times
                .iter()
                .map(|t| params[0] * (params[1] * t).sin())
                .collect(),
            WorkCase::Identity | WorkCase::NoisyMean => params.to_vec(),
        }
    }
}

/// Resolves the configured case into a work function for `n_params` parameters.
///
/// Fails before any evaluation when the case is unknown or the reference
/// vector does not match the parameter count.
pub fn build_work_function(config: &WorkConfig, n_params: usize) -> Result<CaseFunction, AbcError> {
    let case: WorkCase = config.case.parse()?;
    if let Some(dim) = case.fixed_dim() {
        if dim != n_params {
            return Err(AbcError::Config(
                ErrorInfo::new("case-dimension", "parameter box does not match the case")
                    .with_context("case", case.as_str())
                    .with_context("expected", dim.to_string())
                    .with_context("actual", n_params.to_string()),
            ));
        }
    }
    if config.reference.len() != n_params {
        return Err(AbcError::Config(
            ErrorInfo::new("reference-length", "reference vector length differs from the box")
                .with_context("reference", config.reference.len().to_string())
                .with_context("n_params", n_params.to_string()),
        ));
    }
    if config.reference.iter().any(|value| !value.is_finite()) {
        return Err(work_error("reference-non-finite", "reference values must be finite"));
    }
    if config.observations < 2 {
        return Err(work_error("observations", "at least two observations are required"));
    }
    if !(config.noise.is_finite() && config.noise >= 0.0) {
        return Err(work_error("noise", "noise must be a non-negative finite number"));
    }

    let span = match case {
        WorkCase::Decay => 5.0,
        WorkCase::Periodic => 2.0 * std::f64::consts::PI,
        WorkCase::Identity | WorkCase::NoisyMean => 0.0,
    };
    let times = match case {
        WorkCase::Decay | WorkCase::Periodic => (0..config.observations)
            .map(|k| span * k as f64 / (config.observations - 1) as f64)
            .collect(),
        WorkCase::Identity | WorkCase::NoisyMean => Vec::new(),
    };
    let mut function = CaseFunction {
        case,
        reference: config.reference.clone(),
        times,
        observed: Vec::new(),
        draws: config.observations,
        noise: config.noise,
    };
    function.observed = function.curve(&function.reference);
    Ok(function)
}

impl WorkFunction for CaseFunction {
    fn n_params(&self) -> usize {
        self.reference.len()
    }

    fn evaluate(&self, params: &[f64], rng: &mut RngHandle) -> Result<EvaluationResult, AbcError> {
        let distance = match self.case {
            WorkCase::Identity => euclidean(params, &self.reference),
            WorkCase::Decay | WorkCase::Periodic => rms(&self.curve(params), &self.observed),
            WorkCase::NoisyMean => {
                let means: Vec<f64> = params
                    .iter()
                    .map(|&mu| {
                        let total: f64 = (0..self.draws)
                            .map(|_| mu + self.noise * rng.sample::<f64, _>(StandardNormal))
                            .sum();
                        total / self.draws as f64
                    })
                    .collect();
                euclidean(&means, &self.observed)
            }
        };
        Ok(EvaluationResult::from_parts(params, &[], distance))
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

fn rms(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    (a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>() / a.len() as f64).sqrt()
}

/// Evaluates `params` and checks the output shape.
///
/// The parameter count must match the work function and the output must carry
/// the parameters plus a non-NaN trailing distance; anything else is an
/// [`AbcError::Evaluation`].
pub fn evaluate<W: WorkFunction + ?Sized>(
    work: &W,
    params: &[f64],
    rng: &mut RngHandle,
) -> Result<EvaluationResult, AbcError> {
    let n_params = work.n_params();
    if params.len() != n_params {
        return Err(AbcError::Evaluation(
            ErrorInfo::new("param-length", "parameter vector length mismatch")
                .with_context("expected", n_params.to_string())
                .with_context("actual", params.len().to_string()),
        ));
    }
    let result = work.evaluate(params, rng)?;
    EvaluationResult::from_values(result.values().to_vec(), n_params)
}
