use std::path::{Path, PathBuf};

use abc_core::{AbcError, ErrorInfo};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::artefacts::{read_json_file, ArtefactStore};
use crate::config::RunConfig;

/// Structured manifest describing a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Configuration used for the run.
    pub config: RunConfig,
    /// Master seed used to derive every substream.
    pub master_seed: u64,
    /// Optional seed label captured from the configuration.
    pub seed_label: Option<String>,
    /// SHA-256 of the canonical JSON form of `config`.
    pub config_hash: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// Round-one threshold, absent when the run resumed from a stored context.
    pub eps1: Option<f64>,
    /// Threshold handed to the chains.
    pub eps2: f64,
    /// Chain variant name.
    pub variant: String,
    /// Number of aggregated chain samples.
    pub accepted_samples: usize,
    /// Artefacts produced during the run (relative to the run directory).
    pub artefacts: Vec<PathBuf>,
}

impl RunManifest {
    /// Creates a manifest stamped with the current time and the config hash.
    pub fn new(config: &RunConfig, eps1: Option<f64>, eps2: f64, variant: &str) -> Result<Self, AbcError> {
        Ok(Self {
            config: config.clone(),
            master_seed: config.seed_policy.master_seed,
            seed_label: config.seed_policy.label.clone(),
            config_hash: config_hash(config)?,
            created_at: chrono::Utc::now().to_rfc3339(),
            eps1,
            eps2,
            variant: variant.to_string(),
            accepted_samples: 0,
            artefacts: Vec::new(),
        })
    }

    /// Writes the manifest into `store` and returns its absolute path.
    pub fn write(&self, store: &ArtefactStore, relative: impl AsRef<Path>) -> Result<PathBuf, AbcError> {
        let relative = store.write_json(relative, self)?;
        Ok(store.path(relative))
    }

    /// Loads a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, AbcError> {
        read_json_file(path)
    }
}

/// Hex SHA-256 of the compact JSON serialisation of `config`.
pub fn config_hash(config: &RunConfig) -> Result<String, AbcError> {
    let bytes = serde_json::to_vec(config)
        .map_err(|err| AbcError::Serde(ErrorInfo::new("config-hash", err.to_string())))?;
    let digest = Sha256::digest(&bytes);
    Ok(digest.iter().map(|byte| format!("{byte:02x}")).collect())
}
