use abc_mcmc::chain::{adapt_threshold, proposal_factor, scaling_constant, ThresholdMode};
use nalgebra::DMatrix;

#[test]
fn delta_stays_strictly_positive() {
    let mut delta = 0.5;
    for i in 1..5_000 {
        delta = adapt_threshold(delta, i, 0.1, i % 3 != 0);
        assert!(delta > 0.0 && delta.is_finite());
    }
}

#[test]
fn expected_log_drift_vanishes_at_target_rate() {
    let target = 0.3;
    for i in [1usize, 10, 100, 10_000] {
        let up = adapt_threshold(1.0, i, target, false).ln();
        let down = adapt_threshold(1.0, i, target, true).ln();
        let drift = target * down + (1.0 - target) * up;
        assert!(drift.abs() < 1e-12, "drift {drift} at iteration {i}");
        assert!(up > 0.0 && down < 0.0);
    }
}

#[test]
fn step_gain_decays_with_iteration() {
    let early = adapt_threshold(1.0, 1, 0.1, false).ln();
    let late = adapt_threshold(1.0, 1_000, 0.1, false).ln();
    assert!(late < early);
    assert!((early - 0.1 * 2f64.powf(-2.0 / 3.0)).abs() < 1e-12);
}

#[test]
fn scaling_depends_on_variant_and_dimension() {
    assert!((scaling_constant(ThresholdMode::Fixed, 2) - 2.88).abs() < 1e-12);
    let adaptive = ThresholdMode::Adaptive {
        target_acceptance: 0.1,
    };
    assert!((scaling_constant(adaptive, 1) - 2.38 * 2.38).abs() < 1e-12);
}

#[test]
fn singular_covariance_is_regularised() {
    let singular = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
    let factor = proposal_factor(&singular, 1.0).unwrap();
    let rebuilt = &factor * factor.transpose();
    assert!((rebuilt - singular).amax() < 1e-6);
}

#[test]
fn indefinite_covariance_is_a_numeric_error() {
    let indefinite = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, -1.0]);
    let err = proposal_factor(&indefinite, 1.0).unwrap_err();
    assert_eq!(err.info().code, "covariance-factor");
}
