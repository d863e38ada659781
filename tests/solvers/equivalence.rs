//! The scalar and lane-batched solvers agree on the same data.

use approx::assert_relative_eq;
use decayfit::lanes::{Lane1, LaneVector};
use decayfit::lm::{LmConfig, ScalarSolver, SimdSolver, Solver};
use decayfit::model::LaneModel;
use decayfit::models::{ExponentialDecay, MultiExponentialDecay};
use decayfit::parameters::FixedColumns;
use wide::{f64x2, f64x4};

use crate::test_helpers::{decay, time_axis, with_noise};

fn compare<M, V>(model: &M, signals: &[f64], times: &[f64], start: &[f64])
where
    M: LaneModel<V>,
    V: LaneVector,
{
    let range = 3..times.len();
    let mut scalar = ScalarSolver::new(
        model,
        times,
        range.clone(),
        &FixedColumns::none(),
        LmConfig::default(),
    )
    .unwrap();
    let mut simd = SimdSolver::<M, V>::new(
        model,
        times,
        range,
        &FixedColumns::none(),
        LmConfig::default(),
    )
    .unwrap();

    scalar.initialize(signals, start).unwrap();
    simd.initialize(signals, start).unwrap();
    assert_relative_eq!(scalar.chi_square(), simd.chi_square(), max_relative = 1e-12);

    let scalar_status = scalar.fit().unwrap();
    let simd_status = simd.fit().unwrap();
    assert!(scalar_status.is_converged());
    assert!(simd_status.is_converged());

    for (a, b) in scalar.parameters().iter().zip(simd.parameters()) {
        assert_relative_eq!(*a, *b, max_relative = 1e-6);
    }
    assert_relative_eq!(scalar.chi_square(), simd.chi_square(), max_relative = 1e-6);
}

#[test]
fn test_single_decay_every_width() {
    let model = ExponentialDecay::new();
    // 197 active samples leave a partial trailing lane group
    let times = time_axis(200, 500.0);
    let signals = with_noise(&decay(&times, 100.0, 50.0), 0.5, 11);

    compare::<_, Lane1>(&model, &signals, &times, &[80.0, 70.0]);
    compare::<_, f64x2>(&model, &signals, &times, &[80.0, 70.0]);
    compare::<_, f64x4>(&model, &signals, &times, &[80.0, 70.0]);
}

#[test]
fn test_bi_exponential_every_width() {
    let model = MultiExponentialDecay::new(2).unwrap();
    let times = time_axis(250, 250.0);
    let clean: Vec<f64> = times
        .iter()
        .map(|t| 20.0 * (-t / 4.0).exp() + 10.0 * (-t / 60.0).exp() + 0.5)
        .collect();
    let signals = with_noise(&clean, 0.05, 5);
    let start = [15.0, 3.0, 12.0, 50.0, 0.0];

    compare::<_, Lane1>(&model, &signals, &times, &start);
    compare::<_, f64x2>(&model, &signals, &times, &start);
    compare::<_, f64x4>(&model, &signals, &times, &start);
}
