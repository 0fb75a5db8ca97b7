use std::path::PathBuf;
use std::time::Instant;

use abc_core::{AbcError, ErrorInfo, RngHandle, WorkFunction};
use tracing::info;

use crate::artefacts::{ArtefactStore, SamplePayload};
use crate::determinism::classic_seed;
use crate::executor::ParallelExecutor;
use crate::work::evaluate;

/// File holding every classic ABC sample.
pub const ALL_SAMPLES_FILE: &str = "all_abc.json";

/// Result of a classic rejection ABC run.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassicOutcome {
    /// Every evaluated parameter vector with its distance, in input order.
    pub samples: SamplePayload,
    /// Files written, relative to the store root.
    pub artefacts: Vec<PathBuf>,
}

/// Name of chunk `index` of a classic run.
pub fn chunk_file(index: usize) -> String {
    format!("classic_abc{index}.json")
}

/// Evaluates every candidate once and keeps all results.
///
/// When a store is given the full set goes to [`ALL_SAMPLES_FILE`]; runs with
/// more than `chunk_size` samples are also split into consecutive
/// [`chunk_file`] files of at most `chunk_size` rows.
pub fn run_classic<W: WorkFunction + ?Sized>(
    work: &W,
    executor: &ParallelExecutor,
    candidates: &[Vec<f64>],
    master_seed: u64,
    store: Option<&ArtefactStore>,
    chunk_size: usize,
) -> Result<ClassicOutcome, AbcError> {
    if chunk_size == 0 {
        return Err(AbcError::Config(ErrorInfo::new(
            "chunk-size-zero",
            "classic chunk size must be positive",
        )));
    }
    let n_params = work.n_params();
    let started = Instant::now();
    let results = executor.run(candidates, |task, params| {
        let mut rng = RngHandle::from_seed(classic_seed(master_seed, Some(task)));
        evaluate(work, params, &mut rng)
    })?;
    info!(
        samples = results.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "classic abc finished"
    );

    let samples = SamplePayload {
        params: results.iter().map(|r| r.params(n_params).to_vec()).collect(),
        distances: results.iter().map(|r| r.distance()).collect(),
    };
    let mut artefacts = Vec::new();
    if let Some(store) = store {
        if samples.len() > chunk_size {
            for (index, (params, distances)) in samples
                .params
                .chunks(chunk_size)
                .zip(samples.distances.chunks(chunk_size))
                .enumerate()
            {
                let chunk = SamplePayload {
                    params: params.to_vec(),
                    distances: distances.to_vec(),
                };
                artefacts.push(store.write_json(chunk_file(index), &chunk)?);
            }
        }
        artefacts.push(store.write_json(ALL_SAMPLES_FILE, &samples)?);
    }
    Ok(ClassicOutcome { samples, artefacts })
}
