#![deny(missing_docs)]
#![doc = "Two-round ABC calibration followed by parallel ABC-MCMC chains with fixed or adaptive thresholds and optional KDE priors."]

/// Aggregation of chain trajectories and per-chain summaries.
pub mod aggregate;
/// JSON artefact store used for calibration snapshots and results.
pub mod artefacts;
/// Epsilon estimation, box narrowing, step sizes and starting points.
pub mod calibration;
/// The ABC-MCMC chain engine.
pub mod chain;
/// Classic rejection ABC.
pub mod classic;
/// Run configuration structures.
pub mod config;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Ordered parallel task execution.
pub mod executor;
/// Gridded Gaussian kernel density estimation.
pub mod kde;
/// Manifest emission utilities.
pub mod manifest;
/// High-level run, resume and classic entry points.
pub mod pipeline;
/// Gridded prior density and the prior-ratio test.
pub mod prior;
/// Candidate sampling strategies.
pub mod sampling;
/// Percentiles and batch/recursive moment estimates.
pub mod stats;
/// Built-in work function cases.
pub mod work;

pub use aggregate::{aggregate, ChainSummary};
pub use artefacts::{ArtefactStore, SamplePayload, ScalarPayload};
pub use calibration::{
    calibrate, CalibrationOutcome, CalibrationPlan, CalibrationReport, CalibrationWarning,
    RunContext,
};
pub use chain::{ChainEngine, ChainOutcome, ChainSettings, ThresholdMode};
pub use classic::{run_classic, ClassicOutcome};
pub use config::{
    CalibrationConfig, ChainConfig, ClassicConfig, OutputConfig, RunConfig, SeedPolicy, WorkConfig,
};
pub use executor::ParallelExecutor;
pub use manifest::RunManifest;
pub use pipeline::{calibrate_with, classic, classic_with, resume, resume_with, run, run_chains, run_with, RunSummary};
pub use prior::{DensityGrid, PriorSurface};
pub use sampling::SamplingStrategy;
pub use work::{build_work_function, CaseFunction, WorkCase};
