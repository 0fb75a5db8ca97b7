use std::path::{Path, PathBuf};
use std::time::Instant;

use abc_core::{AbcError, Bounds, ErrorInfo, EvaluationResult, ParamBox, RngHandle, WorkFunction};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::artefacts::{ArtefactStore, SamplePayload, ScalarPayload};
use crate::config::RunConfig;
use crate::determinism::{calibration_task_seed, sampler_seed, start_point_seed};
use crate::executor::ParallelExecutor;
use crate::kde;
use crate::prior::PriorSurface;
use crate::sampling::{sample, SamplingStrategy};
use crate::stats::{percentile, population_std};
use crate::work::evaluate;

/// Observed ranges narrower than this are widened by the previous step size.
pub const DEGENERATE_RANGE: f64 = 1e-5;
/// Step sizes below this trigger the additive floor.
pub const STEP_SIZE_MINIMUM: f64 = 1e-8;
/// Amount added to every step size when the floor triggers.
pub const STEP_SIZE_CORRECTION: f64 = 1e-5;
/// Fraction of the initial width used as the step size of a fresh run.
pub const INITIAL_STEP_FRACTION: f64 = 0.1;

/// Resolved inputs of the two-round calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationPlan {
    /// Candidate generator.
    pub strategy: SamplingStrategy,
    /// Sizes of round one and round two.
    pub samples: [usize; 2],
    /// Percentile levels of round one and round two.
    pub x: [f64; 2],
    /// Widening factor for the box and the step sizes.
    pub phi: f64,
    /// Bins per axis of the KDE prior, disabled when absent.
    pub prior_bins: Option<usize>,
    /// Number of chain starting points to draw.
    pub workers: usize,
    /// Master seed of the run.
    pub master_seed: u64,
    /// Directory, relative to the artefact store, receiving the snapshots.
    pub artefact_dir: PathBuf,
}

impl CalibrationPlan {
    /// Builds the plan from a validated configuration.
    pub fn from_config(config: &RunConfig) -> Result<Self, AbcError> {
        Ok(Self {
            strategy: config.sampling_strategy()?,
            samples: config.calibration.samples,
            x: config.calibration.x,
            phi: config.calibration.phi,
            prior_bins: config.calibration.prior_update,
            workers: config.workers,
            master_seed: config.seed_policy.master_seed,
            artefact_dir: config.output.calibration_dir.clone(),
        })
    }
}

/// Numeric degeneracy recovered during calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CalibrationWarning {
    /// Observed range of a parameter was below [`DEGENERATE_RANGE`] and got
    /// widened by the previous step size.
    DegenerateRange {
        /// Parameter index.
        parameter: usize,
        /// Observed `max - min`.
        observed_width: f64,
    },
    /// A step size fell below [`STEP_SIZE_MINIMUM`]; every component was
    /// raised by [`STEP_SIZE_CORRECTION`].
    StepSizeFloored {
        /// Smallest step size before the correction.
        minimum: f64,
    },
}

/// Sorted evaluations of one calibration round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSnapshot {
    /// Round number, 1 or 2.
    pub round: usize,
    /// Percentile threshold of the round.
    pub eps: f64,
    /// Evaluated parameter vectors, ascending by distance.
    pub params: Vec<Vec<f64>>,
    /// Distances aligned with `params`.
    pub distances: Vec<f64>,
}

impl RoundSnapshot {
    /// Sorts `results` by distance and computes the `x`-percentile threshold.
    pub fn from_results(round: usize, mut results: Vec<EvaluationResult>, n_params: usize, x: f64) -> Self {
        results.sort_by(|a, b| a.distance().total_cmp(&b.distance()));
        let distances: Vec<f64> = results.iter().map(EvaluationResult::distance).collect();
        let params = results
            .iter()
            .map(|result| result.params(n_params).to_vec())
            .collect();
        Self {
            round,
            eps: percentile(&distances, x),
            params,
            distances,
        }
    }

    /// Parameter vectors with `distance <= eps`.
    pub fn accepted(&self) -> Vec<Vec<f64>> {
        self.params
            .iter()
            .zip(&self.distances)
            .filter(|(_, &distance)| distance <= self.eps)
            .map(|(params, _)| params.clone())
            .collect()
    }

    /// Number of infinite distances in the round.
    pub fn non_finite(&self) -> usize {
        self.distances.iter().filter(|d| !d.is_finite()).count()
    }

    fn payload(&self) -> SamplePayload {
        SamplePayload {
            params: self.params.clone(),
            distances: self.distances.clone(),
        }
    }
}

/// Immutable state handed from calibration to every chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    /// Working threshold (eps2).
    pub eps: f64,
    /// Narrowed box; proposals outside it are redrawn.
    pub limits: ParamBox,
    /// Burn-in step size per parameter.
    pub std: Vec<f64>,
    /// Optional prior density; its presence selects prior-weighted chains.
    #[serde(default)]
    pub prior: Option<PriorSurface>,
    /// One starting point per chain.
    pub start_points: Vec<Vec<f64>>,
}

fn context_error(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message).with_hint("recalibrate or repair calibration/context.json")
}

impl RunContext {
    /// Checks that step sizes, starting points and prior agree with the box.
    pub fn validate(&self) -> Result<(), AbcError> {
        let dim = self.limits.dim();
        if !self.eps.is_finite() || self.eps < 0.0 {
            return Err(AbcError::Config(
                context_error("context-eps", "threshold must be finite and non-negative")
                    .with_context("eps", self.eps.to_string()),
            ));
        }
        if self.std.len() != dim {
            return Err(AbcError::Config(
                context_error("context-std", "one step size per parameter is required")
                    .with_context("std", self.std.len().to_string())
                    .with_context("dim", dim.to_string()),
            ));
        }
        if let Some(index) = self.std.iter().position(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(AbcError::Config(
                context_error("context-std", "step sizes must be finite and positive")
                    .with_context("parameter", index.to_string())
                    .with_context("value", self.std[index].to_string()),
            ));
        }
        if self.start_points.is_empty() {
            return Err(AbcError::Config(context_error(
                "context-start-points",
                "context has no chain starting points",
            )));
        }
        if let Some(index) = self.start_points.iter().position(|point| point.len() != dim) {
            return Err(AbcError::Config(
                context_error("context-start-points", "starting point length differs from the box")
                    .with_context("chain", index.to_string())
                    .with_context("len", self.start_points[index].len().to_string())
                    .with_context("dim", dim.to_string()),
            ));
        }
        if let Some(prior) = &self.prior {
            if prior.dim() != dim {
                return Err(AbcError::Config(
                    context_error("context-prior", "prior grid dimension differs from the box")
                        .with_context("prior", prior.dim().to_string())
                        .with_context("dim", dim.to_string()),
                ));
            }
        }
        Ok(())
    }
}

/// Summary of a calibration for logs, manifests and the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Round-one threshold.
    pub eps1: f64,
    /// Working threshold.
    pub eps2: f64,
    /// Size of the round-two accepted set.
    pub accepted: usize,
    /// Infinite distances observed in round one.
    pub non_finite: usize,
    /// KDE argmax when the prior was estimated.
    pub point_estimate: Option<Vec<f64>>,
    /// Recovered numeric degeneracies.
    pub warnings: Vec<CalibrationWarning>,
}

/// Everything produced by [`calibrate`].
#[derive(Debug, Clone)]
pub struct CalibrationOutcome {
    /// Context for the chain stage.
    pub context: RunContext,
    /// Summary of the calibration.
    pub report: CalibrationReport,
    /// Sorted round-one evaluations.
    pub round1: RoundSnapshot,
    /// Sorted round-two evaluations.
    pub round2: RoundSnapshot,
    /// Artefacts written, relative to the store root.
    pub artefacts: Vec<PathBuf>,
}

/// Evaluates `candidates` in parallel; task `k` gets its own RNG substream.
pub fn evaluate_round<W: WorkFunction + ?Sized>(
    work: &W,
    executor: &ParallelExecutor,
    candidates: &[Vec<f64>],
    master_seed: u64,
    round: usize,
) -> Result<Vec<EvaluationResult>, AbcError> {
    executor.run(candidates, |task, params| {
        let mut rng = RngHandle::from_seed(calibration_task_seed(master_seed, round, task));
        evaluate(work, params, &mut rng)
    })
}

/// Narrows the box around the observed range of every parameter.
///
/// Each interval becomes `mid +- phi * (max - min) / 2` over all sampled
/// values. Ranges below [`DEGENERATE_RANGE`] are first widened by `prev_std`.
pub fn narrow_limits(
    params: &[Vec<f64>],
    prev_std: &[f64],
    phi: f64,
) -> Result<(ParamBox, Vec<CalibrationWarning>), AbcError> {
    let mut warnings = Vec::new();
    let mut bounds = Vec::with_capacity(prev_std.len());
    for (index, &std) in prev_std.iter().enumerate() {
        let (mut min, mut max) = params
            .iter()
            .map(|row| row[index])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if max - min < DEGENERATE_RANGE {
            warnings.push(CalibrationWarning::DegenerateRange {
                parameter: index,
                observed_width: max - min,
            });
            min -= std;
            max += std;
        }
        let half = phi * (max - min) / 2.0;
        let mid = (max + min) / 2.0;
        let interval = Bounds::new(mid - half, mid + half).map_err(|err| {
            AbcError::Numeric(
                ErrorInfo::new("narrowed-box", err.info().message.clone())
                    .with_context("parameter", index.to_string())
                    .with_hint("increase the round-one sample count or phi"),
            )
        })?;
        bounds.push(interval);
    }
    Ok((ParamBox::new(bounds)?, warnings))
}

/// `phi * population_std(accepted)` with the additive floor applied once.
pub fn step_sizes(
    accepted: &[Vec<f64>],
    phi: f64,
) -> Result<(Vec<f64>, Option<CalibrationWarning>), AbcError> {
    if accepted.is_empty() {
        return Err(AbcError::Numeric(ErrorInfo::new(
            "step-size-empty",
            "no accepted samples to estimate step sizes from",
        )));
    }
    let mut std: Vec<f64> = population_std(accepted).into_iter().map(|s| phi * s).collect();
    let minimum = std.iter().copied().fold(f64::INFINITY, f64::min);
    if minimum < STEP_SIZE_MINIMUM {
        for value in &mut std {
            *value += STEP_SIZE_CORRECTION;
        }
        return Ok((std, Some(CalibrationWarning::StepSizeFloored { minimum })));
    }
    Ok((std, None))
}

/// Picks `workers` distinct accepted vectors as chain starting points.
pub fn choose_start_points(
    accepted: &[Vec<f64>],
    workers: usize,
    rng: &mut RngHandle,
) -> Result<Vec<Vec<f64>>, AbcError> {
    if accepted.len() < workers {
        return Err(AbcError::Config(
            ErrorInfo::new("start-points", "fewer accepted samples than chains")
                .with_context("accepted", accepted.len().to_string())
                .with_context("workers", workers.to_string())
                .with_hint("raise calibration.x[1] or calibration.samples[1]"),
        ));
    }
    Ok(rand::seq::index::sample(rng, accepted.len(), workers)
        .into_iter()
        .map(|index| accepted[index].clone())
        .collect())
}

fn run_round<W: WorkFunction + ?Sized>(
    work: &W,
    executor: &ParallelExecutor,
    plan: &CalibrationPlan,
    limits: &ParamBox,
    round: usize,
) -> Result<RoundSnapshot, AbcError> {
    let mut rng = RngHandle::from_seed(sampler_seed(plan.master_seed, round));
    let candidates = sample(plan.strategy, limits, plan.samples[round - 1], &mut rng);
    info!(round, samples = candidates.len(), sampling = %plan.strategy, "calibration round");

    let started = Instant::now();
    let results = evaluate_round(work, executor, &candidates, plan.master_seed, round)?;
    let snapshot = RoundSnapshot::from_results(round, results, limits.dim(), plan.x[round - 1]);
    info!(
        round,
        eps = snapshot.eps,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "calibration round finished"
    );
    Ok(snapshot)
}

struct Snapshots<'a> {
    store: Option<&'a ArtefactStore>,
    dir: &'a Path,
    written: Vec<PathBuf>,
}

impl Snapshots<'_> {
    fn write<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> Result<(), AbcError> {
        if let Some(store) = self.store {
            self.written.push(store.write_json(self.dir.join(name), value)?);
        }
        Ok(())
    }
}

/// Runs both calibration rounds and builds the [`RunContext`].
///
/// Snapshots of every intermediate quantity are written to `store` when one
/// is given.
pub fn calibrate<W: WorkFunction + ?Sized>(
    work: &W,
    executor: &ParallelExecutor,
    initial: &ParamBox,
    plan: &CalibrationPlan,
    store: Option<&ArtefactStore>,
) -> Result<CalibrationOutcome, AbcError> {
    let mut snapshots = Snapshots {
        store,
        dir: &plan.artefact_dir,
        written: Vec::new(),
    };

    let round1 = run_round(work, executor, plan, initial, 1)?;
    let non_finite = round1.non_finite();
    if non_finite > 0 {
        warn!(non_finite, "round one produced infinite distances");
    }
    snapshots.write("eps1.json", &ScalarPayload { value: round1.eps })?;
    snapshots.write("calibration1.json", &round1.payload())?;

    let prev_std: Vec<f64> = initial
        .widths()
        .iter()
        .map(|width| INITIAL_STEP_FRACTION * width)
        .collect();
    let (limits, mut warnings) = narrow_limits(&round1.params, &prev_std, plan.phi)?;
    for warning in &warnings {
        warn!(?warning, "degenerate observed range widened");
    }
    info!(limits = ?limits.to_pairs(), "narrowed parameter box");
    snapshots.write("limits.json", &limits)?;

    let round2 = run_round(work, executor, plan, &limits, 2)?;
    snapshots.write("eps2.json", &ScalarPayload { value: round2.eps })?;
    snapshots.write("calibration2.json", &round2.payload())?;

    let accepted = round2.accepted();
    let (std, floored) = step_sizes(&accepted, plan.phi)?;
    if let Some(warning) = floored {
        warn!(?warning, std = ?std, "step sizes floored, consider more calibration samples");
        warnings.push(warning);
    }
    debug!(std = ?std, accepted = accepted.len(), "step sizes");
    snapshots.write("std.json", &std)?;

    let mut prior = None;
    let mut point_estimate = None;
    if let Some(bins) = plan.prior_bins {
        let started = Instant::now();
        let estimate = kde::estimate(&accepted, &limits, bins)?;
        info!(
            point_estimate = ?estimate.point_estimate,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "prior density estimated"
        );
        let surface = PriorSurface::new(estimate.grid)?;
        snapshots.write("prior.json", &surface)?;
        snapshots.write("point_estimate.json", &estimate.point_estimate)?;
        prior = Some(surface);
        point_estimate = Some(estimate.point_estimate);
    }

    let mut rng = RngHandle::from_seed(start_point_seed(plan.master_seed));
    let start_points = choose_start_points(&accepted, plan.workers, &mut rng)?;
    debug!(start_points = ?start_points, "chain starting points");

    let context = RunContext {
        eps: round2.eps,
        limits,
        std,
        prior,
        start_points,
    };
    snapshots.write("context.json", &context)?;

    let report = CalibrationReport {
        eps1: round1.eps,
        eps2: round2.eps,
        accepted: accepted.len(),
        non_finite,
        point_estimate,
        warnings,
    };
    Ok(CalibrationOutcome {
        context,
        report,
        round1,
        round2,
        artefacts: snapshots.written,
    })
}
