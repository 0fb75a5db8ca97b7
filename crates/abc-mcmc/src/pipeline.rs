use std::path::{Path, PathBuf};
use std::time::Instant;

use abc_core::{AbcError, ErrorInfo, RngHandle, WorkFunction};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::{aggregate, ChainSummary};
use crate::artefacts::{read_json_file, ArtefactStore, SamplePayload};
use crate::calibration::{calibrate, CalibrationOutcome, CalibrationPlan, CalibrationReport, RunContext};
use crate::chain::{ChainEngine, ChainOutcome, ChainSettings};
use crate::classic::{run_classic, ClassicOutcome};
use crate::config::RunConfig;
use crate::determinism::{chain_seed, classic_seed};
use crate::executor::ParallelExecutor;
use crate::manifest::RunManifest;
use crate::sampling::sample;
use crate::work::{build_work_function, CaseFunction};

/// Summary returned by [`run`] and [`resume`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Calibration summary; absent for resumed runs.
    pub calibration: Option<CalibrationReport>,
    /// Context the chains ran with.
    pub context: RunContext,
    /// Chain variant name.
    pub variant: String,
    /// Per-chain counters in chain order.
    pub chains: Vec<ChainSummary>,
    /// Aggregated chain samples.
    pub samples: SamplePayload,
    /// Aggregated samples file, if emitted.
    pub accepted_path: Option<PathBuf>,
    /// Manifest path, if emitted.
    pub manifest_path: Option<PathBuf>,
}

fn open_store(config: &RunConfig) -> Result<Option<ArtefactStore>, AbcError> {
    config
        .output
        .run_directory
        .as_ref()
        .map(ArtefactStore::new)
        .transpose()
}

fn check_dimension<W: WorkFunction + ?Sized>(work: &W, dim: usize) -> Result<(), AbcError> {
    if work.n_params() != dim {
        return Err(AbcError::Config(
            ErrorInfo::new("work-dimension", "work function and parameter box disagree")
                .with_context("work", work.n_params().to_string())
                .with_context("box", dim.to_string()),
        ));
    }
    Ok(())
}

fn resolve_work(config: &RunConfig, n_params: usize) -> Result<CaseFunction, AbcError> {
    let work = build_work_function(&config.work, n_params)?;
    debug!(case = %work.case(), observations = work.observed().len(), "work function resolved");
    Ok(work)
}

/// Calibrates and samples with the work function named in `config.work`.
pub fn run(config: &RunConfig) -> Result<RunSummary, AbcError> {
    config.validate()?;
    let work = resolve_work(config, config.limits.len())?;
    run_with(config, &work)
}

/// Calibrates and samples with a caller-supplied work function.
pub fn run_with<W: WorkFunction + ?Sized>(config: &RunConfig, work: &W) -> Result<RunSummary, AbcError> {
    config.validate()?;
    let executor = ParallelExecutor::new(config.workers)?;
    let store = open_store(config)?;
    let outcome = calibrate_on(config, work, &executor, store.as_ref())?;
    let mut summary = sample_on(
        config,
        work,
        &executor,
        outcome.context,
        store.as_ref(),
        Some(outcome.report.eps1),
        outcome.artefacts,
    )?;
    summary.calibration = Some(outcome.report);
    Ok(summary)
}

/// Runs only the calibration stage.
pub fn calibrate_with<W: WorkFunction + ?Sized>(
    config: &RunConfig,
    work: &W,
) -> Result<CalibrationOutcome, AbcError> {
    config.validate()?;
    let executor = ParallelExecutor::new(config.workers)?;
    let store = open_store(config)?;
    calibrate_on(config, work, &executor, store.as_ref())
}

fn calibrate_on<W: WorkFunction + ?Sized>(
    config: &RunConfig,
    work: &W,
    executor: &ParallelExecutor,
    store: Option<&ArtefactStore>,
) -> Result<CalibrationOutcome, AbcError> {
    let initial = config.param_box()?;
    check_dimension(work, initial.dim())?;
    let plan = CalibrationPlan::from_config(config)?;
    let started = Instant::now();
    let outcome = calibrate(work, executor, &initial, &plan, store)?;
    info!(
        eps1 = outcome.report.eps1,
        eps2 = outcome.report.eps2,
        accepted = outcome.report.accepted,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "calibration finished"
    );
    Ok(outcome)
}

/// Runs the chain stage from a context stored at `context_path`.
pub fn resume(config: &RunConfig, context_path: &Path) -> Result<RunSummary, AbcError> {
    config.validate()?;
    let context: RunContext = read_json_file(context_path)?;
    let work = resolve_work(config, context.limits.dim())?;
    resume_with(config, &work, context)
}

/// Runs the chain stage from an existing context with a caller-supplied work function.
pub fn resume_with<W: WorkFunction + ?Sized>(
    config: &RunConfig,
    work: &W,
    context: RunContext,
) -> Result<RunSummary, AbcError> {
    config.validate()?;
    context.validate()?;
    let executor = ParallelExecutor::new(config.workers)?;
    let store = open_store(config)?;
    sample_on(config, work, &executor, context, store.as_ref(), None, Vec::new())
}

/// Runs one chain per starting point of `context` on the executor.
pub fn run_chains<W: WorkFunction + ?Sized>(
    work: &W,
    executor: &ParallelExecutor,
    context: &RunContext,
    settings: ChainSettings,
    master_seed: u64,
) -> Result<Vec<ChainOutcome>, AbcError> {
    context.validate()?;
    check_dimension(work, context.limits.dim())?;
    let engine = ChainEngine::new(work, context, settings);
    executor.run(&context.start_points, |index, start| {
        let mut rng = RngHandle::from_seed(chain_seed(master_seed, index));
        engine.run(start, &mut rng)
    })
}

fn sample_on<W: WorkFunction + ?Sized>(
    config: &RunConfig,
    work: &W,
    executor: &ParallelExecutor,
    context: RunContext,
    store: Option<&ArtefactStore>,
    eps1: Option<f64>,
    mut artefacts: Vec<PathBuf>,
) -> Result<RunSummary, AbcError> {
    let settings = ChainSettings::from(&config.chain);
    let variant = ChainEngine::new(work, &context, settings).variant_name();
    let master_seed = config.seed_policy.master_seed;
    info!(
        chains = context.start_points.len(),
        workers = executor.workers(),
        variant,
        eps = context.eps,
        "starting chains"
    );

    let started = Instant::now();
    let outcomes = run_chains(work, executor, &context, settings, master_seed)?;
    let chains: Vec<ChainSummary> = outcomes
        .iter()
        .enumerate()
        .map(|(index, outcome)| ChainSummary::from_outcome(index, variant, outcome))
        .collect();
    let samples = aggregate(&outcomes, context.limits.dim());
    info!(
        samples = samples.len(),
        evaluations = chains.iter().map(|c| c.evaluations).sum::<u64>(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "chains finished"
    );

    let mut accepted_path = None;
    let mut manifest_path = None;
    if let Some(store) = store {
        let relative = store.write_json(&config.output.accepted_file, &samples)?;
        accepted_path = Some(store.path(&relative));
        artefacts.push(relative);

        let mut manifest = RunManifest::new(config, eps1, context.eps, variant)?;
        manifest.accepted_samples = samples.len();
        manifest.artefacts = artefacts;
        manifest_path = Some(manifest.write(store, &config.output.manifest_file)?);
    }

    Ok(RunSummary {
        calibration: None,
        context,
        variant: variant.to_string(),
        chains,
        samples,
        accepted_path,
        manifest_path,
    })
}

/// Classic rejection ABC over `config.classic.samples` draws from the initial box.
pub fn classic(config: &RunConfig) -> Result<ClassicOutcome, AbcError> {
    config.validate()?;
    let work = resolve_work(config, config.limits.len())?;
    classic_with(config, &work)
}

/// Classic rejection ABC with a caller-supplied work function.
pub fn classic_with<W: WorkFunction + ?Sized>(
    config: &RunConfig,
    work: &W,
) -> Result<ClassicOutcome, AbcError> {
    config.validate()?;
    let limits = config.param_box()?;
    check_dimension(work, limits.dim())?;
    let executor = ParallelExecutor::new(config.workers)?;
    let store = open_store(config)?;
    let master_seed = config.seed_policy.master_seed;
    let mut rng = RngHandle::from_seed(classic_seed(master_seed, None));
    let candidates = sample(config.sampling_strategy()?, &limits, config.classic.samples, &mut rng);
    run_classic(
        work,
        &executor,
        &candidates,
        master_seed,
        store.as_ref(),
        config.classic.chunk_size,
    )
}
