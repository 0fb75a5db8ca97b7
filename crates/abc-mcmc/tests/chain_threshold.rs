use abc_core::{AbcError, ParamBox, RngHandle};
use abc_mcmc::chain::{ChainEngine, ChainSettings, ThresholdMode};
use abc_mcmc::prior::{DensityGrid, PriorSurface};
use abc_mcmc::{
    build_work_function, resume_with, run_chains, CaseFunction, ParallelExecutor, RunConfig,
    RunContext, WorkConfig,
};

fn identity() -> CaseFunction {
    build_work_function(&WorkConfig::new("identity", vec![0.5]), 1).unwrap()
}

fn context(eps: f64) -> RunContext {
    RunContext {
        eps,
        limits: ParamBox::from_pairs(&[[0.0, 1.0]]).unwrap(),
        std: vec![0.05],
        prior: None,
        start_points: vec![vec![0.5]],
    }
}

fn settings(threshold: ThresholdMode) -> ChainSettings {
    ChainSettings {
        length: 200,
        t0: 50,
        threshold,
        max_attempts: None,
    }
}

#[test]
fn fixed_chain_returns_exactly_n_entries_within_eps() {
    let work = identity();
    let context = context(0.1);
    let engine = ChainEngine::new(&work, &context, settings(ThresholdMode::Fixed));
    assert_eq!(engine.variant_name(), "fixed");

    let mut rng = RngHandle::from_seed(11);
    let outcome = engine.run(&[0.5], &mut rng).unwrap();
    assert_eq!(outcome.trajectory.len(), 200);
    assert_eq!(outcome.thresholds.len(), 200);
    assert_eq!(outcome.trajectory[0].params(1), &[0.5]);
    for entry in &outcome.trajectory {
        assert!(entry.distance() <= 0.1);
        assert!(context.limits.contains(entry.params(1)));
    }
    assert!(outcome.thresholds.iter().all(|&t| t == 0.1));
    assert!(outcome.evaluations >= 200);
    assert!(outcome.samples_drawn >= outcome.evaluations - 1);
    assert_eq!(outcome.final_delta, 0.1);
}

#[test]
fn chains_are_reproducible_for_a_seed() {
    let work = identity();
    let context = context(0.1);
    let engine = ChainEngine::new(&work, &context, settings(ThresholdMode::Fixed));
    let first = engine.run(&[0.5], &mut RngHandle::from_seed(3)).unwrap();
    let second = engine.run(&[0.5], &mut RngHandle::from_seed(3)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn prior_weighted_variant_keeps_threshold() {
    let work = identity();
    let mut context = context(0.1);
    context.prior = Some(
        PriorSurface::new(DensityGrid {
            axes: vec![vec![0.0, 0.5, 1.0]],
            values: vec![1.0, 2.0, 1.0],
        })
        .unwrap(),
    );
    let engine = ChainEngine::new(&work, &context, settings(ThresholdMode::Fixed));
    assert_eq!(engine.variant_name(), "fixed-prior");

    let outcome = engine.run(&[0.5], &mut RngHandle::from_seed(5)).unwrap();
    assert_eq!(outcome.trajectory.len(), 200);
    assert!(outcome.trajectory.iter().all(|entry| entry.distance() <= 0.1));
}

fn peaked_prior() -> PriorSurface {
    PriorSurface::new(DensityGrid {
        axes: vec![vec![0.0, 0.5, 1.0]],
        values: vec![1.0, 2.0, 1.0],
    })
    .unwrap()
}

#[test]
fn adaptive_prior_variant_tracks_its_own_threshold() {
    let work = identity();
    let mut context = context(0.1);
    context.prior = Some(peaked_prior());
    let engine = ChainEngine::new(
        &work,
        &context,
        settings(ThresholdMode::Adaptive {
            target_acceptance: 0.3,
        }),
    );
    assert_eq!(engine.variant_name(), "adaptive-prior");

    let outcome = engine.run(&[0.5], &mut RngHandle::from_seed(21)).unwrap();
    assert_eq!(outcome.trajectory.len(), 200);
    assert_eq!(outcome.thresholds.len(), 200);
    assert_eq!(outcome.thresholds[0], 0.1);
    assert!(outcome.final_delta > 0.0);
    assert!(outcome.evaluations >= 200);
    for (entry, &threshold) in outcome.trajectory.iter().zip(&outcome.thresholds) {
        assert!(threshold > 0.0);
        assert!(entry.distance() <= threshold);
        assert!(context.limits.contains(entry.params(1)));
    }
    // Thresholds move between entries, so delta adapted during the run.
    assert!(outcome.thresholds.windows(2).any(|pair| pair[0] != pair[1]));
}

#[test]
fn adaptive_chain_keeps_delta_positive() {
    let work = identity();
    let context = context(0.1);
    let engine = ChainEngine::new(
        &work,
        &context,
        settings(ThresholdMode::Adaptive {
            target_acceptance: 0.2,
        }),
    );
    assert_eq!(engine.variant_name(), "adaptive");

    let outcome = engine.run(&[0.5], &mut RngHandle::from_seed(9)).unwrap();
    assert_eq!(outcome.trajectory.len(), 200);
    // The start point sits on the reference, so delta starts from eps.
    assert_eq!(outcome.thresholds[0], 0.1);
    assert!(outcome.final_delta > 0.0);
    for (entry, &threshold) in outcome.trajectory.iter().zip(&outcome.thresholds) {
        assert!(threshold > 0.0);
        assert!(entry.distance() <= threshold);
    }
}

#[test]
fn attempt_cap_raises_exhaustion() {
    let work = identity();
    let context = context(1e-12);
    let mut settings = settings(ThresholdMode::Fixed);
    settings.length = 5;
    settings.max_attempts = Some(50);
    let engine = ChainEngine::new(&work, &context, settings);
    let err = engine.run(&[0.5], &mut RngHandle::from_seed(1)).unwrap_err();
    assert!(matches!(err, AbcError::Exhaustion(_)));
    assert_eq!(err.info().code, "max-attempts");
}

#[test]
fn chain_shorter_than_burn_in_skips_adaptation() {
    let work = identity();
    let context = context(0.1);
    let mut settings = settings(ThresholdMode::Fixed);
    settings.length = 10;
    settings.t0 = 50;
    let engine = ChainEngine::new(&work, &context, settings);
    let outcome = engine.run(&[0.5], &mut RngHandle::from_seed(2)).unwrap();
    assert_eq!(outcome.trajectory.len(), 10);
}

fn planar_context() -> RunContext {
    RunContext {
        eps: 0.1,
        limits: ParamBox::from_pairs(&[[0.0, 1.0], [0.0, 1.0]]).unwrap(),
        std: vec![0.05, 0.05],
        prior: None,
        start_points: vec![vec![0.5, 0.5]],
    }
}

#[test]
fn short_step_sizes_are_rejected_before_sampling() {
    let work = build_work_function(&WorkConfig::new("identity", vec![0.5, 0.5]), 2).unwrap();
    let mut context = planar_context();
    context.std = vec![0.1];
    let mut settings = settings(ThresholdMode::Fixed);
    settings.max_attempts = Some(100_000);

    let err = context.validate().unwrap_err();
    assert!(err.is_config());
    assert_eq!(err.info().code, "context-std");

    let executor = ParallelExecutor::new(1).unwrap();
    let err = run_chains(&work, &executor, &context, settings, 7).unwrap_err();
    assert!(err.is_config());
    assert_eq!(err.info().code, "context-std");

    let engine = ChainEngine::new(&work, &context, settings);
    let err = engine.run(&[0.5, 0.5], &mut RngHandle::from_seed(7)).unwrap_err();
    assert!(matches!(err, AbcError::Config(_)));
}

#[test]
fn stored_context_must_agree_with_its_box() {
    let work = build_work_function(&WorkConfig::new("identity", vec![0.5, 0.5]), 2).unwrap();
    let config = RunConfig::new(
        WorkConfig::new("identity", vec![0.5, 0.5]),
        vec![[0.0, 1.0], [0.0, 1.0]],
    );

    let mut prior_mismatch = planar_context();
    prior_mismatch.prior = Some(peaked_prior());
    let err = resume_with(&config, &work, prior_mismatch).unwrap_err();
    assert_eq!(err.info().code, "context-prior");

    let mut zero_step = planar_context();
    zero_step.std = vec![0.05, 0.0];
    assert_eq!(zero_step.validate().unwrap_err().info().code, "context-std");

    let mut short_start = planar_context();
    short_start.start_points = vec![vec![0.5]];
    let err = resume_with(&config, &work, short_start).unwrap_err();
    assert!(err.is_config());
    assert_eq!(err.info().code, "context-start-points");

    let mut no_start = planar_context();
    no_start.start_points.clear();
    assert_eq!(no_start.validate().unwrap_err().info().code, "context-start-points");

    assert!(planar_context().validate().is_ok());
}

#[test]
fn start_point_must_match_the_box() {
    let work = identity();
    let context = context(0.1);
    let engine = ChainEngine::new(&work, &context, settings(ThresholdMode::Fixed));
    let err = engine.run(&[0.5, 0.5], &mut RngHandle::from_seed(4)).unwrap_err();
    assert_eq!(err.info().code, "start-dimension");
}
