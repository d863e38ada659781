//! Edge cases: minimal data, degenerate Jacobians and configuration errors.

use decayfit::lm::{ConvergenceStatus, LmConfig, ScalarSolver, SimdSolver, Solver};
use decayfit::models::ExponentialDecay;
use decayfit::parameters::FixedColumns;
use decayfit::FitError;
use wide::f64x4;

use crate::test_helpers::{approx_eq, decay, time_axis};

#[test]
fn test_minimum_sample_count() {
    let model = ExponentialDecay::new();
    let times = vec![0.0, 10.0, 20.0];
    let signals = decay(&times, 5.0, 12.0);

    let mut scalar =
        ScalarSolver::new(&model, &times, 0..3, &FixedColumns::none(), LmConfig::default())
            .unwrap();
    scalar.initialize(&signals, &[4.0, 10.0]).unwrap();
    let status = scalar.fit().unwrap();
    assert!(status.is_terminated());
    assert!(scalar.chi_square().is_finite());

    // Three samples fill no complete group of four lanes
    let mut simd: SimdSolver<'_, ExponentialDecay, f64x4> =
        SimdSolver::new(&model, &times, 0..3, &FixedColumns::none(), LmConfig::default())
            .unwrap();
    assert_eq!(simd.kernel().group_count(), 0);
    assert_eq!(simd.kernel().tail_len(), 3);
    simd.initialize(&signals, &[4.0, 10.0]).unwrap();
    assert!(simd.fit().unwrap().is_terminated());

    for (a, b) in scalar.parameters().iter().zip(simd.parameters()) {
        assert!(approx_eq(*a, *b, 1e-6 * a.abs().max(1.0)));
    }
}

#[test]
fn test_too_few_samples() {
    let model = ExponentialDecay::new();
    let times = time_axis(10, 9.0);

    let err = ScalarSolver::new(&model, &times, 4..5, &FixedColumns::none(), LmConfig::default())
        .unwrap_err();
    assert!(matches!(err, FitError::InvalidInput(_)));

    // One free parameter needs one sample
    assert!(ScalarSolver::new(
        &model,
        &times,
        4..5,
        &FixedColumns::from_indices([0]),
        LmConfig::default()
    )
    .is_ok());
}

#[test]
fn test_invalid_layout() {
    let model = ExponentialDecay::new();
    let times = time_axis(10, 9.0);

    #[allow(clippy::reversed_empty_ranges)]
    let reversed = 6..2;
    assert!(matches!(
        ScalarSolver::new(&model, &times, reversed, &FixedColumns::none(), LmConfig::default()),
        Err(FitError::InvalidRange { start: 6, end: 2, len: 10 })
    ));
    assert!(matches!(
        ScalarSolver::new(
            &model,
            &times,
            0..10,
            &FixedColumns::from_indices([5]),
            LmConfig::default()
        ),
        Err(FitError::FixedColumnOutOfRange { index: 5, count: 2 })
    ));

    let mut solver =
        ScalarSolver::new(&model, &times, 0..10, &FixedColumns::none(), LmConfig::default())
            .unwrap();
    assert!(matches!(
        solver.initialize(&[1.0; 9], &[1.0, 1.0]),
        Err(FitError::DimensionMismatch(_))
    ));
}

#[test]
fn test_singular_jacobian_column() {
    // At t = 0 the lifetime has no effect on the model
    let model = ExponentialDecay::new();
    let times = vec![0.0; 6];
    let signals = vec![5.0; 6];

    let mut solver =
        ScalarSolver::new(&model, &times, 0..6, &FixedColumns::none(), LmConfig::default())
            .unwrap();
    solver.initialize(&signals, &[2.0, 3.0]).unwrap();
    let status = solver.fit().unwrap();

    assert!(status.is_terminated());
    assert!(approx_eq(solver.parameters()[0], 5.0, 1e-6));
}

#[test]
fn test_zero_damping_rejected_before_fitting() {
    // Undamped, the singular column never becomes solvable
    let model = ExponentialDecay::new();
    let times = vec![0.0; 6];
    let config = LmConfig::default().with_lambda(0.0);

    let scalar = ScalarSolver::new(&model, &times, 0..6, &FixedColumns::none(), config.clone());
    assert!(matches!(scalar, Err(FitError::InvalidInput(_))));

    let simd: Result<SimdSolver<'_, ExponentialDecay, f64x4>, _> =
        SimdSolver::new(&model, &times, 0..6, &FixedColumns::none(), config);
    assert!(matches!(simd, Err(FitError::InvalidInput(_))));
}

#[test]
fn test_iteration_budget() {
    let model = ExponentialDecay::new();
    let times = time_axis(100, 400.0);
    let signals = decay(&times, 100.0, 50.0);
    let config = LmConfig::default().with_max_iterations(2);

    let mut solver =
        ScalarSolver::new(&model, &times, 0..100, &FixedColumns::none(), config).unwrap();
    solver.initialize(&signals, &[20.0, 200.0]).unwrap();
    let initial = solver.chi_square();

    let status = solver.fit().unwrap();
    assert_eq!(status, ConvergenceStatus::MaxIterationsReached);
    assert_eq!(solver.iterations(), 2);
    assert!(solver.chi_square() < initial);

    let report = solver.report();
    assert_eq!(report.params, solver.parameters());
    assert_eq!(report.status, ConvergenceStatus::MaxIterationsReached);
}

#[test]
fn test_non_finite_start() {
    let model = ExponentialDecay::new();
    let times = time_axis(20, 19.0);
    let signals = decay(&times, 1.0, 4.0);
    let mut solver =
        ScalarSolver::new(&model, &times, 0..20, &FixedColumns::none(), LmConfig::default())
            .unwrap();

    // tau = 0 turns exp(-t / tau) into NaN at t = 0
    assert!(matches!(
        solver.initialize(&signals, &[1.0, 0.0]),
        Err(FitError::InvalidInput(_))
    ));
    assert_eq!(solver.status(), ConvergenceStatus::Uninitialized);
    assert!(matches!(solver.fit(), Err(FitError::InvalidState(_))));
}

#[test]
fn test_non_finite_signal() {
    let model = ExponentialDecay::new();
    let times = time_axis(20, 19.0);
    let mut signals = decay(&times, 1.0, 4.0);
    let mut solver =
        ScalarSolver::new(&model, &times, 2..20, &FixedColumns::none(), LmConfig::default())
            .unwrap();

    // Outside the active range a NaN is ignored
    signals[0] = f64::NAN;
    solver.initialize(&signals, &[1.0, 4.0]).unwrap();

    signals[7] = f64::INFINITY;
    match solver.initialize(&signals, &[1.0, 4.0]) {
        Err(FitError::InvalidInput(message)) => {
            assert!(message.contains("Observed value at index 7"), "{}", message)
        }
        other => panic!("expected InvalidInput, got {:?}", other),
    }
    assert_eq!(solver.status(), ConvergenceStatus::Uninitialized);
}
