use abc_core::{AbcError, EvaluationResult, RngHandle};
use abc_mcmc::calibration::{
    choose_start_points, narrow_limits, step_sizes, CalibrationWarning, RoundSnapshot,
    STEP_SIZE_CORRECTION,
};
use abc_mcmc::stats::percentile;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-12
}

#[test]
fn percentile_interpolates_linearly() {
    let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
    assert_eq!(percentile(&sorted, 0.5), 3.0);
    assert_eq!(percentile(&sorted, 0.0), 1.0);
    assert_eq!(percentile(&sorted, 1.0), 5.0);
    assert!(close(percentile(&sorted, 0.1), 1.4));
    assert!(close(percentile(&[0.0, 10.0], 0.3), 3.0));
    assert!(percentile(&[], 0.5).is_nan());
}

#[test]
fn odd_length_median_is_exact() {
    let sorted: Vec<f64> = (0..11).map(|k| k as f64 * 0.25).collect();
    assert_eq!(percentile(&sorted, 0.5), sorted[5]);
}

#[test]
fn round_snapshot_sorts_by_distance() {
    let results = vec![
        EvaluationResult::from_parts(&[0.9], &[], 0.4),
        EvaluationResult::from_parts(&[0.6], &[], 0.1),
        EvaluationResult::from_parts(&[0.7], &[], 0.2),
        EvaluationResult::from_parts(&[0.8], &[], 0.3),
        EvaluationResult::from_parts(&[0.0], &[], f64::INFINITY),
    ];
    let snapshot = RoundSnapshot::from_results(1, results, 1, 0.5);
    assert_eq!(snapshot.distances, vec![0.1, 0.2, 0.3, 0.4, f64::INFINITY]);
    assert_eq!(snapshot.params[0], vec![0.6]);
    assert_eq!(snapshot.eps, 0.3);
    assert_eq!(snapshot.accepted(), vec![vec![0.6], vec![0.7], vec![0.8]]);
    assert_eq!(snapshot.non_finite(), 1);
}

#[test]
fn narrowed_box_spans_observed_range_times_phi() {
    let params = vec![vec![0.2, 5.0], vec![0.8, 7.0], vec![0.5, 6.0]];
    let (limits, warnings) = narrow_limits(&params, &[0.1, 0.1], 2.0).unwrap();
    assert!(warnings.is_empty());
    let pairs = limits.to_pairs();
    assert!(close(pairs[0][0], -0.1) && close(pairs[0][1], 1.1));
    assert!(close(pairs[1][0], 4.0) && close(pairs[1][1], 8.0));
}

#[test]
fn degenerate_range_is_widened_by_previous_step() {
    let params = vec![vec![0.5]; 4];
    let (limits, warnings) = narrow_limits(&params, &[0.1], 1.0).unwrap();
    let bounds = limits.bounds()[0];
    assert!(bounds.lower < bounds.upper);
    assert!((bounds.lower - 0.4).abs() < 1e-12);
    assert!((bounds.upper - 0.6).abs() < 1e-12);
    assert!(matches!(
        warnings.as_slice(),
        [CalibrationWarning::DegenerateRange { parameter: 0, .. }]
    ));
}

#[test]
fn zero_previous_step_cannot_rescue_degenerate_range() {
    let params = vec![vec![0.5]; 3];
    let err = narrow_limits(&params, &[0.0], 1.0).unwrap_err();
    assert!(matches!(err, AbcError::Numeric(_)));
}

#[test]
fn step_sizes_scale_population_std() {
    let accepted = vec![vec![1.0, 10.0], vec![3.0, 14.0]];
    let (std, warning) = step_sizes(&accepted, 0.5).unwrap();
    assert!(warning.is_none());
    assert!(close(std[0], 0.5));
    assert!(close(std[1], 1.0));
}

#[test]
fn step_size_floor_adds_correction_to_every_component() {
    let accepted = vec![vec![1.0, 2.0], vec![3.0, 2.0]];
    let (std, warning) = step_sizes(&accepted, 1.0).unwrap();
    assert!(close(std[0], 1.0 + STEP_SIZE_CORRECTION));
    assert!(close(std[1], STEP_SIZE_CORRECTION));
    assert!(matches!(
        warning,
        Some(CalibrationWarning::StepSizeFloored { minimum }) if minimum == 0.0
    ));
}

#[test]
fn start_points_are_distinct_and_deterministic() {
    let accepted: Vec<Vec<f64>> = (0..10).map(|k| vec![k as f64]).collect();
    let mut rng = RngHandle::from_seed(7);
    let first = choose_start_points(&accepted, 4, &mut rng).unwrap();
    let mut rng = RngHandle::from_seed(7);
    let second = choose_start_points(&accepted, 4, &mut rng).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 4);
    let mut values: Vec<f64> = first.iter().map(|p| p[0]).collect();
    values.sort_by(f64::total_cmp);
    values.dedup();
    assert_eq!(values.len(), 4);
}

#[test]
fn too_few_accepted_samples_is_a_config_error() {
    let accepted = vec![vec![0.1], vec![0.2]];
    let mut rng = RngHandle::from_seed(1);
    let err = choose_start_points(&accepted, 3, &mut rng).unwrap_err();
    assert!(err.is_config());
    assert_eq!(err.info().code, "start-points");
}
