use abc_core::ParamBox;
use tempfile::tempdir;

use abc_mcmc::artefacts::{ArtefactStore, SamplePayload};
use abc_mcmc::classic::{chunk_file, ALL_SAMPLES_FILE};
use abc_mcmc::manifest::config_hash;
use abc_mcmc::prior::{DensityGrid, PriorSurface};
use abc_mcmc::{
    build_work_function, classic, run_classic, ParallelExecutor, RunConfig, RunContext,
    RunManifest, WorkConfig,
};

fn config() -> RunConfig {
    RunConfig::new(WorkConfig::new("identity", vec![0.5]), vec![[0.0, 1.0]])
}

#[test]
fn sample_payload_round_trips() {
    let dir = tempdir().unwrap();
    let store = ArtefactStore::new(dir.path().join("out")).unwrap();
    let payload = SamplePayload {
        params: vec![vec![0.25, 1.5], vec![0.75, -2.0]],
        distances: vec![0.1, 0.2],
    };
    let relative = store.write_json("nested/samples.json", &payload).unwrap();
    assert_eq!(relative, std::path::Path::new("nested/samples.json"));
    let restored: SamplePayload = store.read_json(&relative).unwrap();
    assert_eq!(restored, payload);
}

#[test]
fn run_context_round_trips_with_prior() {
    let dir = tempdir().unwrap();
    let store = ArtefactStore::new(dir.path()).unwrap();
    let context = RunContext {
        eps: 0.125,
        limits: ParamBox::from_pairs(&[[-0.5, 1.5]]).unwrap(),
        std: vec![0.0625],
        prior: Some(
            PriorSurface::new(DensityGrid {
                axes: vec![vec![-0.5, 0.5, 1.5]],
                values: vec![0.25, 1.0, 0.25],
            })
            .unwrap(),
        ),
        start_points: vec![vec![0.5], vec![0.25]],
    };
    store.write_json("context.json", &context).unwrap();
    let restored: RunContext = store.read_json("context.json").unwrap();
    assert_eq!(restored, context);
}

#[test]
fn missing_artefact_is_a_serde_error() {
    let dir = tempdir().unwrap();
    let store = ArtefactStore::new(dir.path()).unwrap();
    let err = store.read_json::<SamplePayload>("absent.json").unwrap_err();
    assert_eq!(err.info().code, "artefact-read");
}

#[test]
fn manifest_round_trips_and_hash_is_stable() {
    let dir = tempdir().unwrap();
    let store = ArtefactStore::new(dir.path()).unwrap();
    let config = config();
    let mut manifest = RunManifest::new(&config, Some(0.1), 0.05, "adaptive").unwrap();
    manifest.accepted_samples = 12;
    let path = manifest.write(&store, "meta/manifest.json").unwrap();
    assert_eq!(path, dir.path().join("meta/manifest.json"));
    let loaded = RunManifest::load(&path).unwrap();
    assert_eq!(loaded.config, config);
    assert_eq!(loaded.config_hash, config_hash(&config).unwrap());
    assert_eq!(loaded.config_hash.len(), 64);
    assert_eq!(loaded.variant, "adaptive");

    let mut other = config.clone();
    other.chain.length += 1;
    assert_ne!(config_hash(&other).unwrap(), loaded.config_hash);
}

#[test]
fn classic_abc_splits_large_runs_into_chunks() {
    let dir = tempdir().unwrap();
    let store = ArtefactStore::new(dir.path()).unwrap();
    let work = build_work_function(&WorkConfig::new("identity", vec![0.5]), 1).unwrap();
    let executor = ParallelExecutor::new(2).unwrap();
    let candidates: Vec<Vec<f64>> = (0..10).map(|k| vec![k as f64 / 10.0]).collect();

    let outcome = run_classic(&work, &executor, &candidates, 1, Some(&store), 4).unwrap();
    assert_eq!(outcome.samples.len(), 10);
    assert_eq!(outcome.samples.params, candidates);
    assert!((outcome.samples.distances[0] - 0.5).abs() < 1e-12);
    assert_eq!(outcome.artefacts.len(), 4);

    let chunks: Vec<SamplePayload> = (0..3)
        .map(|index| store.read_json(chunk_file(index)).unwrap())
        .collect();
    assert_eq!(
        chunks.iter().map(SamplePayload::len).collect::<Vec<_>>(),
        vec![4, 4, 2]
    );
    let all: SamplePayload = store.read_json(ALL_SAMPLES_FILE).unwrap();
    assert_eq!(all, outcome.samples);
}

#[test]
fn classic_abc_from_config_writes_single_file() {
    let dir = tempdir().unwrap();
    let mut config = config();
    config.classic.samples = 50;
    config.workers = 2;
    config.output.run_directory = Some(dir.path().to_path_buf());
    let outcome = classic(&config).unwrap();
    assert_eq!(outcome.samples.len(), 50);
    assert_eq!(outcome.artefacts, vec![std::path::PathBuf::from(ALL_SAMPLES_FILE)]);
    assert!(!dir.path().join(chunk_file(0)).exists());
}
