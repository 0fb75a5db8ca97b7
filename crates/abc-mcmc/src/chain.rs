use abc_core::{AbcError, ErrorInfo, EvaluationResult, RngHandle, WorkFunction};
use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::calibration::RunContext;
use crate::config::ChainConfig;
use crate::prior::{prior_ratio_accepts, PriorSurface};
use crate::stats::RunningMoments;
use crate::work::evaluate;

/// Cholesky retries with growing diagonal jitter before giving up.
const JITTER_ATTEMPTS: usize = 10;

/// Threshold axis of the chain variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum ThresholdMode {
    /// Constant threshold `eps` from calibration.
    Fixed,
    /// Per-chain threshold `delta` driven towards a target acceptance rate.
    Adaptive {
        /// Long-run fraction of evaluated proposals passing the distance test.
        target_acceptance: f64,
    },
}

/// Per-chain settings shared by all chains of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainSettings {
    /// Entries per chain, starting point included.
    pub length: usize,
    /// First iteration using the adapted covariance.
    pub t0: usize,
    /// Threshold axis.
    pub threshold: ThresholdMode,
    /// Cap on box redraws and on evaluations per iteration.
    pub max_attempts: Option<u64>,
}

impl From<&ChainConfig> for ChainSettings {
    fn from(config: &ChainConfig) -> Self {
        let threshold = if config.adaptive {
            ThresholdMode::Adaptive {
                target_acceptance: config.target_acceptance,
            }
        } else {
            ThresholdMode::Fixed
        };
        Self {
            length: config.length,
            t0: config.t0,
            threshold,
            max_attempts: config.max_attempts,
        }
    }
}

/// Phase of the chain state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainPhase {
    /// Isotropic proposals with the calibrated step sizes.
    BurnIn,
    /// Proposals from the scaled running covariance.
    Adaptive,
}

/// Scaling `s_d` applied to the running covariance in the adaptive phase.
pub fn scaling_constant(mode: ThresholdMode, dim: usize) -> f64 {
    let base: f64 = match mode {
        ThresholdMode::Fixed => 2.4,
        ThresholdMode::Adaptive { .. } => 2.38,
    };
    base * base / dim as f64
}

/// Stochastic-approximation update of the adaptive threshold.
///
/// `delta * exp((iteration + 1)^(-2/3) * (target - accepted))`.
pub fn adapt_threshold(delta: f64, iteration: usize, target: f64, accepted: bool) -> f64 {
    let indicator = if accepted { 1.0 } else { 0.0 };
    let gain = ((iteration + 1) as f64).powf(-2.0 / 3.0);
    delta * (gain * (target - indicator)).exp()
}

/// Variant selected once per chain.
#[derive(Debug, Clone, Copy)]
pub struct ChainVariant<'a> {
    /// Threshold axis.
    pub threshold: ThresholdMode,
    /// Prior axis; `Some` selects prior-weighted acceptance.
    pub prior: Option<&'a PriorSurface>,
}

impl ChainVariant<'_> {
    /// Stable variant name used in logs and manifests.
    pub fn name(&self) -> &'static str {
        match (self.threshold, self.prior.is_some()) {
            (ThresholdMode::Fixed, false) => "fixed",
            (ThresholdMode::Fixed, true) => "fixed-prior",
            (ThresholdMode::Adaptive { .. }, false) => "adaptive",
            (ThresholdMode::Adaptive { .. }, true) => "adaptive-prior",
        }
    }
}

/// Result of a single chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutcome {
    /// Accepted evaluations; entry 0 evaluates the starting point.
    pub trajectory: Vec<EvaluationResult>,
    /// Threshold each entry was accepted under.
    pub thresholds: Vec<f64>,
    /// Proposal draws, box rejections included.
    pub samples_drawn: u64,
    /// WorkFunction evaluations, starting point included.
    pub evaluations: u64,
    /// Threshold in force when the chain stopped.
    pub final_delta: f64,
}

struct ChainState {
    position: Vec<f64>,
    moments: Option<RunningMoments>,
    delta: f64,
    samples_drawn: u64,
    evaluations: u64,
}

/// Rejection-based ABC-MCMC sampler for one chain.
pub struct ChainEngine<'a, W: WorkFunction + ?Sized> {
    work: &'a W,
    context: &'a RunContext,
    settings: ChainSettings,
    variant: ChainVariant<'a>,
    scaling: f64,
}

impl<'a, W: WorkFunction + ?Sized> ChainEngine<'a, W> {
    /// Builds an engine; the prior axis follows the presence of a prior in `context`.
    pub fn new(work: &'a W, context: &'a RunContext, settings: ChainSettings) -> Self {
        let variant = ChainVariant {
            threshold: settings.threshold,
            prior: context.prior.as_ref(),
        };
        Self {
            work,
            context,
            settings,
            variant,
            scaling: scaling_constant(settings.threshold, context.limits.dim()),
        }
    }

    /// Name of the selected variant.
    pub fn variant_name(&self) -> &'static str {
        self.variant.name()
    }

    /// Runs the chain from `start` to `settings.length` accepted entries.
    pub fn run(&self, start: &[f64], rng: &mut RngHandle) -> Result<ChainOutcome, AbcError> {
        let n = self.settings.length;
        let dim = self.context.limits.dim();
        self.context.validate()?;
        if start.len() != dim {
            return Err(AbcError::Config(
                ErrorInfo::new("start-dimension", "starting point length differs from the box")
                    .with_context("len", start.len().to_string())
                    .with_context("dim", dim.to_string()),
            ));
        }
        let first = evaluate(self.work, start, rng)?;
        let delta = match self.settings.threshold {
            ThresholdMode::Fixed => self.context.eps,
            ThresholdMode::Adaptive { .. } => initial_delta(first.distance(), self.context.eps),
        };
        let mut state = ChainState {
            position: first.params(dim).to_vec(),
            moments: None,
            delta,
            samples_drawn: 0,
            evaluations: 1,
        };
        let mut trajectory = Vec::with_capacity(n);
        let mut thresholds = Vec::with_capacity(n);
        trajectory.push(first);
        thresholds.push(delta);

        let progress_every = (n / 100).max(1);
        let burn_in_end = self.settings.t0.min(n);
        for i in 1..n {
            if i == burn_in_end {
                let positions: Vec<Vec<f64>> = trajectory
                    .iter()
                    .map(|entry| entry.params(dim).to_vec())
                    .collect();
                let moments = RunningMoments::from_rows(&positions)?;
                debug!(
                    mean = ?moments.mean().as_slice(),
                    trace = moments.covariance().trace(),
                    "burn-in finished"
                );
                state.moments = Some(moments);
            }
            let phase = if state.moments.is_some() {
                ChainPhase::Adaptive
            } else {
                ChainPhase::BurnIn
            };
            let (result, threshold) = self.step(&mut state, phase, i, rng)?;
            state.position = result.params(dim).to_vec();
            if let Some(moments) = state.moments.as_mut() {
                moments.update(&state.position);
            }
            trajectory.push(result);
            thresholds.push(threshold);
            if i % progress_every == 0 {
                info!(
                    accepted = i,
                    length = n,
                    evaluations = state.evaluations,
                    variant = self.variant.name(),
                    "chain progress"
                );
            }
        }

        info!(
            evaluations = state.evaluations,
            samples_drawn = state.samples_drawn,
            accepted = n,
            "chain finished"
        );
        Ok(ChainOutcome {
            trajectory,
            thresholds,
            samples_drawn: state.samples_drawn,
            evaluations: state.evaluations,
            final_delta: state.delta,
        })
    }

    fn step(
        &self,
        state: &mut ChainState,
        phase: ChainPhase,
        iteration: usize,
        rng: &mut RngHandle,
    ) -> Result<(EvaluationResult, f64), AbcError> {
        let factor = match (&state.moments, phase) {
            (Some(moments), ChainPhase::Adaptive) => {
                Some(proposal_factor(moments.covariance(), self.scaling)?)
            }
            _ => None,
        };
        let mut attempts = 0u64;
        loop {
            attempts += 1;
            self.check_attempts(attempts, "evaluation", iteration)?;
            let candidate = self.propose(state, factor.as_ref(), iteration, rng)?;
            let result = evaluate(self.work, &candidate, rng)?;
            state.evaluations += 1;

            let threshold = state.delta;
            let within = result.distance() <= threshold;
            if let ThresholdMode::Adaptive { target_acceptance } = self.settings.threshold {
                state.delta = adapt_threshold(state.delta, iteration, target_acceptance, within);
            }
            if !within {
                continue;
            }
            if let Some(prior) = self.variant.prior {
                let draw: f64 = rng.gen();
                if !prior_ratio_accepts(prior.density(&state.position), prior.density(&candidate), draw) {
                    continue;
                }
            }
            return Ok((result, threshold));
        }
    }

    fn propose(
        &self,
        state: &mut ChainState,
        factor: Option<&DMatrix<f64>>,
        iteration: usize,
        rng: &mut RngHandle,
    ) -> Result<Vec<f64>, AbcError> {
        let dim = state.position.len();
        let mut attempts = 0u64;
        loop {
            attempts += 1;
            self.check_attempts(attempts, "box", iteration)?;
            state.samples_drawn += 1;
            let z = DVector::from_fn(dim, |_, _| rng.sample::<f64, _>(StandardNormal));
            let candidate: Vec<f64> = match factor {
                Some(l) => {
                    let step = l * z;
                    state.position.iter().zip(step.iter()).map(|(x, s)| x + s).collect()
                }
                None => state
                    .position
                    .iter()
                    .zip(&self.context.std)
                    .zip(z.iter())
                    .map(|((x, std), z)| x + std * z)
                    .collect(),
            };
            if self.context.limits.contains(&candidate) {
                return Ok(candidate);
            }
        }
    }

    fn check_attempts(&self, attempts: u64, loop_name: &str, iteration: usize) -> Result<(), AbcError> {
        match self.settings.max_attempts {
            Some(cap) if attempts > cap => Err(AbcError::Exhaustion(
                ErrorInfo::new("max-attempts", "rejection loop exceeded its attempt cap")
                    .with_context("loop", loop_name)
                    .with_context("iteration", iteration.to_string())
                    .with_context("cap", cap.to_string())
                    .with_hint("raise chain.max_attempts or revisit the calibration threshold"),
            )),
            _ => Ok(()),
        }
    }
}

/// Starting value of the adaptive threshold: the first distance when it is
/// positive and finite, otherwise the calibrated `eps`.
fn initial_delta(first_distance: f64, eps: f64) -> f64 {
    if first_distance.is_finite() && first_distance > 0.0 {
        first_distance
    } else if eps.is_finite() && eps > 0.0 {
        eps
    } else {
        f64::MIN_POSITIVE
    }
}

/// Lower Cholesky factor of `scaling * covariance`, retrying with growing
/// diagonal jitter when the matrix is not positive definite.
pub fn proposal_factor(covariance: &DMatrix<f64>, scaling: f64) -> Result<DMatrix<f64>, AbcError> {
    let scaled = covariance * scaling;
    if let Some(chol) = scaled.clone().cholesky() {
        return Ok(chol.l());
    }
    let dim = scaled.nrows();
    let mean_diag = if dim == 0 {
        0.0
    } else {
        scaled.diagonal().iter().map(|v| v.abs()).sum::<f64>() / dim as f64
    };
    let mut jitter = (mean_diag * 1e-10).max(1e-12);
    for _ in 0..JITTER_ATTEMPTS {
        let mut attempt = scaled.clone();
        for k in 0..dim {
            attempt[(k, k)] += jitter;
        }
        if let Some(chol) = attempt.cholesky() {
            debug!(jitter, "proposal covariance regularised");
            return Ok(chol.l());
        }
        jitter *= 10.0;
    }
    Err(AbcError::Numeric(
        ErrorInfo::new("covariance-factor", "proposal covariance is not positive definite")
            .with_context("dim", dim.to_string())
            .with_context("jitter", jitter.to_string()),
    ))
}
