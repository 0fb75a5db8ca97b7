use std::path::PathBuf;

use abc_core::{AbcError, ErrorInfo, ParamBox};
use serde::{Deserialize, Serialize};

use crate::sampling::SamplingStrategy;

fn config_error(code: &str, message: impl Into<String>) -> AbcError {
    AbcError::Config(ErrorInfo::new(code, message.into()))
}

fn round_error(code: &str, message: impl Into<String>, round: usize) -> AbcError {
    AbcError::Config(ErrorInfo::new(code, message.into()).with_context("round", round.to_string()))
}

/// YAML-configurable parameters governing a calibration + sampling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Simulator case and observation settings.
    pub work: WorkConfig,
    /// Initial parameter box as `[lower, upper]` pairs.
    pub limits: Vec<[f64; 2]>,
    /// Name of the sampling strategy used by the calibration rounds.
    #[serde(default = "default_sampling")]
    pub sampling: String,
    /// Two-round calibration settings.
    #[serde(default)]
    pub calibration: CalibrationConfig,
    /// Markov chain settings.
    #[serde(default)]
    pub chain: ChainConfig,
    /// Classic rejection ABC settings.
    #[serde(default)]
    pub classic: ClassicConfig,
    /// Number of parallel workers, which is also the number of chains.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Output directory configuration.
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_sampling() -> String {
    "random".to_string()
}

fn default_workers() -> usize {
    4
}

impl RunConfig {
    /// Builds a configuration with default sections for the given case and box.
    pub fn new(work: WorkConfig, limits: Vec<[f64; 2]>) -> Self {
        Self {
            work,
            limits,
            sampling: default_sampling(),
            calibration: CalibrationConfig::default(),
            chain: ChainConfig::default(),
            classic: ClassicConfig::default(),
            workers: default_workers(),
            seed_policy: SeedPolicy::default(),
            output: OutputConfig::default(),
        }
    }

    /// Parses a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self, AbcError> {
        serde_yaml::from_str(text).map_err(|err| {
            AbcError::Serde(ErrorInfo::new("config-parse", err.to_string()))
        })
    }

    /// Initial parameter box.
    pub fn param_box(&self) -> Result<ParamBox, AbcError> {
        ParamBox::from_pairs(&self.limits)
    }

    /// Resolves the configured sampling strategy by name.
    pub fn sampling_strategy(&self) -> Result<SamplingStrategy, AbcError> {
        self.sampling.parse()
    }

    /// Checks every numeric setting before any evaluation is attempted.
    pub fn validate(&self) -> Result<(), AbcError> {
        self.param_box()?;
        self.sampling_strategy()?;
        if self.workers == 0 {
            return Err(config_error("workers-zero", "at least one worker is required"));
        }
        self.calibration.validate()?;
        self.chain.validate()?;
        if self.classic.chunk_size == 0 {
            return Err(config_error("chunk-size-zero", "classic.chunk_size must be positive"));
        }
        Ok(())
    }
}

/// Simulator selection and observation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkConfig {
    /// Case name resolved once into a known work function.
    pub case: String,
    /// Parameters that generate the observed data (or the target vector).
    #[serde(default)]
    pub reference: Vec<f64>,
    /// Number of observation points or simulated draws.
    #[serde(default = "default_observations")]
    pub observations: usize,
    /// Standard deviation of simulator noise for stochastic cases.
    #[serde(default = "default_noise")]
    pub noise: f64,
}

fn default_observations() -> usize {
    32
}

fn default_noise() -> f64 {
    1.0
}

impl WorkConfig {
    /// Creates a work configuration for `case` with the given reference parameters.
    pub fn new(case: impl Into<String>, reference: Vec<f64>) -> Self {
        Self {
            case: case.into(),
            reference,
            observations: default_observations(),
            noise: default_noise(),
        }
    }
}

/// Settings of the two calibration rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Number of samples drawn in round one and round two.
    #[serde(default = "default_calibration_samples")]
    pub samples: [usize; 2],
    /// Percentile levels in `[0, 1]` defining eps1 and eps2.
    #[serde(default = "default_percentiles")]
    pub x: [f64; 2],
    /// Range widening factor, also used to scale the step sizes.
    #[serde(default = "default_phi")]
    pub phi: f64,
    /// Number of bins per dimension for the KDE prior (disabled when absent).
    #[serde(default)]
    pub prior_update: Option<usize>,
}

fn default_calibration_samples() -> [usize; 2] {
    [1000, 1000]
}

fn default_percentiles() -> [f64; 2] {
    [0.1, 0.1]
}

fn default_phi() -> f64 {
    1.0
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            samples: default_calibration_samples(),
            x: default_percentiles(),
            phi: default_phi(),
            prior_update: None,
        }
    }
}

impl CalibrationConfig {
    fn validate(&self) -> Result<(), AbcError> {
        for (round, &count) in self.samples.iter().enumerate() {
            if count == 0 {
                return Err(round_error(
                    "calibration-samples",
                    "calibration rounds need samples",
                    round + 1,
                ));
            }
        }
        for (round, &level) in self.x.iter().enumerate() {
            if !(0.0..=1.0).contains(&level) {
                return Err(round_error(
                    "calibration-percentile",
                    format!("percentile level {level} outside [0, 1]"),
                    round + 1,
                ));
            }
        }
        if !(self.phi.is_finite() && self.phi > 0.0) {
            return Err(config_error("calibration-phi", "phi must be a positive finite number"));
        }
        if self.prior_update == Some(0) {
            return Err(config_error("prior-bins", "prior_update needs at least one bin"));
        }
        Ok(())
    }
}

/// Markov chain settings shared by every chain of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Number of accepted entries per chain, including the starting point.
    #[serde(default = "default_length")]
    pub length: usize,
    /// First iteration of the adaptive phase; earlier iterations are burn-in.
    #[serde(default = "default_t0")]
    pub t0: usize,
    /// Enables the self-adapting threshold.
    #[serde(default)]
    pub adaptive: bool,
    /// Long-run acceptance rate targeted by the adaptive threshold.
    #[serde(default = "default_target_acceptance")]
    pub target_acceptance: f64,
    /// Optional cap on attempts per rejection loop (unbounded when absent).
    #[serde(default)]
    pub max_attempts: Option<u64>,
}

fn default_length() -> usize {
    1000
}

fn default_t0() -> usize {
    100
}

fn default_target_acceptance() -> f64 {
    0.1
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            length: default_length(),
            t0: default_t0(),
            adaptive: false,
            target_acceptance: default_target_acceptance(),
            max_attempts: None,
        }
    }
}

impl ChainConfig {
    fn validate(&self) -> Result<(), AbcError> {
        if self.length == 0 {
            return Err(config_error("chain-length", "chains need at least one entry"));
        }
        if self.t0 < 2 {
            return Err(AbcError::Config(
                ErrorInfo::new(
                    "chain-t0",
                    "t0 must be at least 2 so the burn-in covariance is defined",
                )
                .with_context("t0", self.t0.to_string())
                .with_hint("burn-in covers iterations 1..t0-1"),
            ));
        }
        if !(self.target_acceptance > 0.0 && self.target_acceptance < 1.0) {
            return Err(config_error(
                "target-acceptance",
                "target_acceptance must lie strictly between 0 and 1",
            ));
        }
        if self.max_attempts == Some(0) {
            return Err(config_error("max-attempts", "max_attempts must be positive when set"));
        }
        Ok(())
    }
}

/// Classic rejection ABC settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassicConfig {
    /// Number of parameter vectors drawn from the initial box.
    #[serde(default = "default_classic_samples")]
    pub samples: usize,
    /// Maximum number of samples written per chunk file.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_classic_samples() -> usize {
    10_000
}

fn default_chunk_size() -> usize {
    50_000_000
}

impl Default for ClassicConfig {
    fn default() -> Self {
        Self {
            samples: default_classic_samples(),
            chunk_size: default_chunk_size(),
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label recorded in manifests.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x0ABC_5EED_0ABC_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// Output directory layout configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for run artefacts. Nothing is written when absent.
    #[serde(default)]
    pub run_directory: Option<PathBuf>,
    /// Calibration snapshot directory relative to `run_directory`.
    #[serde(default = "default_calibration_dir")]
    pub calibration_dir: PathBuf,
    /// Aggregated chain samples relative to `run_directory`.
    #[serde(default = "default_accepted_filename")]
    pub accepted_file: PathBuf,
    /// Manifest filename relative to `run_directory`.
    #[serde(default = "default_manifest_filename")]
    pub manifest_file: PathBuf,
}

fn default_calibration_dir() -> PathBuf {
    PathBuf::from("calibration")
}

fn default_accepted_filename() -> PathBuf {
    PathBuf::from("accepted.json")
}

fn default_manifest_filename() -> PathBuf {
    PathBuf::from("manifest.json")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            run_directory: None,
            calibration_dir: default_calibration_dir(),
            accepted_file: default_accepted_filename(),
            manifest_file: default_manifest_filename(),
        }
    }
}
