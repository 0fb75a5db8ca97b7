use abc_core::ParamBox;
use abc_mcmc::kde;
use abc_mcmc::prior::{prior_ratio_accepts, DensityGrid, PriorSurface};

fn surface(axes: Vec<Vec<f64>>, values: Vec<f64>) -> PriorSurface {
    PriorSurface::new(DensityGrid { axes, values }).unwrap()
}

#[test]
fn one_dimensional_interpolation_is_linear() {
    let prior = surface(vec![vec![0.0, 1.0, 2.0]], vec![0.0, 2.0, 4.0]);
    assert!((prior.density(&[0.5]).unwrap() - 1.0).abs() < 1e-12);
    assert!((prior.density(&[1.5]).unwrap() - 3.0).abs() < 1e-12);
    assert_eq!(prior.density(&[2.0]), Some(4.0));
    assert_eq!(prior.density(&[0.0]), Some(0.0));
    assert_eq!(prior.density(&[2.5]), None);
    assert_eq!(prior.density(&[-0.1]), None);
}

#[test]
fn bilinear_interpolation_uses_row_major_values() {
    let prior = surface(vec![vec![0.0, 1.0], vec![0.0, 1.0]], vec![0.0, 1.0, 2.0, 3.0]);
    assert_eq!(prior.density(&[1.0, 0.0]), Some(2.0));
    assert_eq!(prior.density(&[0.0, 1.0]), Some(1.0));
    assert!((prior.density(&[0.5, 0.5]).unwrap() - 1.5).abs() < 1e-12);
    assert_eq!(prior.density(&[0.5]), None);
}

#[test]
fn malformed_grids_are_rejected() {
    let short = PriorSurface::new(DensityGrid {
        axes: vec![vec![0.0, 1.0]],
        values: vec![1.0],
    });
    assert!(short.is_err());
    let unsorted = PriorSurface::new(DensityGrid {
        axes: vec![vec![1.0, 0.0]],
        values: vec![1.0, 1.0],
    });
    assert!(unsorted.is_err());
    let parsed = serde_json::from_str::<PriorSurface>(r#"{"axes":[[0.0,1.0]],"values":[1.0]}"#);
    assert!(parsed.is_err());
}

#[test]
fn prior_ratio_policy_handles_zero_densities() {
    assert!(!prior_ratio_accepts(Some(1.0), Some(0.0), 0.0));
    assert!(!prior_ratio_accepts(Some(0.0), Some(0.0), 0.0));
    assert!(!prior_ratio_accepts(None, None, 0.0));
    assert!(!prior_ratio_accepts(Some(1.0), None, 0.0));
    assert!(prior_ratio_accepts(Some(0.0), Some(0.5), 0.999));
    assert!(prior_ratio_accepts(Some(f64::NAN), Some(0.5), 0.999));
    assert!(prior_ratio_accepts(Some(1.0), Some(2.0), 0.999));
    assert!(prior_ratio_accepts(Some(2.0), Some(1.0), 0.49));
    assert!(!prior_ratio_accepts(Some(2.0), Some(1.0), 0.51));
}

#[test]
fn kde_peaks_at_the_sample_cluster() {
    let data: Vec<Vec<f64>> = (0..50)
        .map(|k| vec![0.3 + 0.01 * ((k % 5) as f64 - 2.0)])
        .collect();
    let limits = ParamBox::from_pairs(&[[0.0, 1.0]]).unwrap();
    let estimate = kde::estimate(&data, &limits, 20).unwrap();
    assert_eq!(estimate.grid.values.len(), 21);
    assert_eq!(estimate.grid.axes[0].len(), 21);
    assert!(estimate.grid.values.iter().all(|v| *v >= 0.0));
    assert!((estimate.point_estimate[0] - 0.3).abs() < 1e-9);
    assert!(PriorSurface::new(estimate.grid).is_ok());
}

#[test]
fn kde_density_integrates_to_one() {
    let data: Vec<Vec<f64>> = (0..55)
        .map(|k| vec![0.5 + 0.02 * ((k % 11) as f64 - 5.0)])
        .collect();
    let limits = ParamBox::from_pairs(&[[0.0, 1.0]]).unwrap();
    let estimate = kde::estimate(&data, &limits, 200).unwrap();
    let mass: f64 = estimate.grid.values.iter().sum::<f64>() / 200.0;
    assert!((mass - 1.0).abs() < 0.02, "mass = {mass}");
}

#[test]
fn kde_grid_covers_every_dimension() {
    let data: Vec<Vec<f64>> = (0..40)
        .map(|k| {
            let t = k as f64 / 40.0;
            vec![0.2 + 0.5 * t, 1.0 - 0.3 * t * t]
        })
        .collect();
    let limits = ParamBox::from_pairs(&[[0.0, 1.0], [0.0, 2.0]]).unwrap();
    let estimate = kde::estimate(&data, &limits, 8).unwrap();
    assert_eq!(estimate.grid.values.len(), 81);
    assert_eq!(estimate.point_estimate.len(), 2);
    assert!(limits.bounds()[1].lower <= estimate.point_estimate[1]);
}

#[test]
fn degenerate_samples_fall_back_to_a_diagonal_kernel() {
    let data = vec![vec![0.5, 0.5]; 10];
    let limits = ParamBox::from_pairs(&[[0.0, 1.0], [0.0, 1.0]]).unwrap();
    let estimate = kde::estimate(&data, &limits, 4).unwrap();
    assert_eq!(estimate.point_estimate, vec![0.5, 0.5]);
}

#[test]
fn kde_needs_two_samples() {
    let limits = ParamBox::from_pairs(&[[0.0, 1.0]]).unwrap();
    let err = kde::estimate(&[vec![0.5]], &limits, 4).unwrap_err();
    assert_eq!(err.info().code, "kde-samples");
}
