//! Fits of synthetic data generated from known parameters.

use approx::assert_relative_eq;
use decayfit::lanes::LaneVector;
use decayfit::lm::{ConvergenceStatus, LmConfig, ScalarSolver, SimdSolver, Solver};
use decayfit::models::{ExponentialDecay, MultiExponentialDecay};
use decayfit::parameters::FixedColumns;
use wide::{f64x2, f64x4};

use crate::test_helpers::{decay, time_axis, with_noise};

fn assert_noisy_decay_recovered(solver: &mut dyn Solver) {
    let times = time_axis(200, 500.0);
    let signals = with_noise(&decay(&times, 100.0, 50.0), 0.5, 42);

    solver.initialize(&signals, &[80.0, 70.0]).unwrap();
    let status = solver.fit().unwrap();

    assert!(status.is_converged(), "status: {:?}", status);
    assert!(solver.iterations() <= 100);
    let params = solver.parameters();
    assert!((params[0] - 100.0).abs() < 2.0, "A = {}", params[0]);
    assert!((params[1] - 50.0).abs() < 2.0, "tau = {}", params[1]);
}

#[test]
fn test_noisy_single_decay_scalar() {
    let model = ExponentialDecay::new();
    let times = time_axis(200, 500.0);
    let mut solver =
        ScalarSolver::new(&model, &times, 0..200, &FixedColumns::none(), LmConfig::default())
            .unwrap();
    assert_noisy_decay_recovered(&mut solver);
}

fn noisy_decay_simd<V: LaneVector>() {
    let model = ExponentialDecay::new();
    let times = time_axis(200, 500.0);
    let mut solver: SimdSolver<'_, ExponentialDecay, V> =
        SimdSolver::new(&model, &times, 0..200, &FixedColumns::none(), LmConfig::default())
            .unwrap();
    assert_noisy_decay_recovered(&mut solver);
}

#[test]
fn test_noisy_single_decay_simd() {
    noisy_decay_simd::<f64x2>();
    noisy_decay_simd::<f64x4>();
}

#[test]
fn test_noise_free_bi_exponential() {
    let model = MultiExponentialDecay::new(2).unwrap();
    let truth = [60.0, 5.0, 40.0, 80.0, 2.0];
    let times = time_axis(300, 400.0);
    let signals: Vec<f64> = {
        let f = decayfit::FitModel::function(&model, &truth);
        times.iter().map(|&t| f(t)).collect()
    };

    let mut solver =
        ScalarSolver::new(&model, &times, 0..300, &FixedColumns::none(), LmConfig::default())
            .unwrap();
    solver
        .initialize(&signals, &[50.0, 4.0, 50.0, 100.0, 0.0])
        .unwrap();
    let status = solver.fit().unwrap();

    assert!(status.is_converged(), "status: {:?}", status);
    for (fitted, expected) in solver.parameters().iter().zip(&truth) {
        assert_relative_eq!(*fitted, *expected, max_relative = 1e-4, epsilon = 1e-4);
    }
}

#[test]
fn test_fixed_columns_bit_identical() {
    let model = MultiExponentialDecay::new(2).unwrap();
    let times = time_axis(150, 300.0);
    let signals = with_noise(
        &times
            .iter()
            .map(|t| 30.0 * (-t / 8.0).exp() + 20.0 * (-t / 90.0).exp() + 1.0)
            .collect::<Vec<_>>(),
        0.2,
        7,
    );
    let start = [25.0, 8.123456789, 25.0, 70.0, 0.987654321];
    let fixed = FixedColumns::from_indices([1, 4]);

    let mut scalar =
        ScalarSolver::new(&model, &times, 0..150, &fixed, LmConfig::default()).unwrap();
    scalar.initialize(&signals, &start).unwrap();
    scalar.fit().unwrap();

    let mut simd: SimdSolver<'_, MultiExponentialDecay, f64x4> =
        SimdSolver::new(&model, &times, 0..150, &fixed, LmConfig::default()).unwrap();
    simd.initialize(&signals, &start).unwrap();
    simd.fit().unwrap();

    for params in [scalar.parameters(), simd.parameters()] {
        assert_eq!(params[1].to_bits(), start[1].to_bits());
        assert_eq!(params[4].to_bits(), start[4].to_bits());
        assert_ne!(params[0], start[0]);
    }
}

#[test]
fn test_refit_is_idempotent() {
    let model = ExponentialDecay::new();
    let times = time_axis(120, 300.0);
    let signals = with_noise(&decay(&times, 40.0, 25.0), 0.3, 3);

    let mut solver =
        ScalarSolver::new(&model, &times, 0..120, &FixedColumns::none(), LmConfig::default())
            .unwrap();
    solver.initialize(&signals, &[30.0, 35.0]).unwrap();
    assert!(solver.fit().unwrap().is_converged());
    let first = solver.parameters().to_vec();
    let first_chi_square = solver.chi_square();

    solver.fit().unwrap();
    for (a, b) in solver.parameters().iter().zip(&first) {
        assert_relative_eq!(*a, *b, max_relative = 1e-6);
    }
    assert!(solver.chi_square() <= first_chi_square);
}

#[test]
fn test_constraint_projection_keeps_lifetime_positive() {
    let model = ExponentialDecay::new();
    let times = time_axis(100, 50.0);
    let signals = decay(&times, 10.0, 0.5);
    let config = LmConfig::default().with_project_constraints(true);

    let mut solver =
        ScalarSolver::new(&model, &times, 0..100, &FixedColumns::none(), config).unwrap();
    solver.initialize(&signals, &[10.0, 20.0]).unwrap();
    let status = solver.fit().unwrap();

    assert!(solver.parameters()[1] > 0.0);
    assert_ne!(status, ConvergenceStatus::Running);
}
