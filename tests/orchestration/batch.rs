//! Batch fitting through the orchestrator.

use std::collections::HashMap;
use std::ops::Range;

use approx::assert_relative_eq;
use decayfit::models::{ExponentialDecay, MultiExponentialDecay};
use decayfit::orchestrator::{DatasetBatch, SolverFlavor};
use decayfit::{BatchOutcome, DatasetStore, FitOrchestrator, FitSettings};

use crate::test_helpers::{decay, time_axis, with_noise};

/// Datasets keyed by wavelength in nanometres.
#[derive(Debug, Clone)]
struct WavelengthStore {
    times: Vec<f64>,
    range: Range<usize>,
    fixed: Vec<bool>,
    signals: HashMap<u32, Vec<f64>>,
    parameters: HashMap<u32, Vec<f64>>,
    writes: usize,
}

impl WavelengthStore {
    fn new(wavelengths: impl IntoIterator<Item = u32>) -> Self {
        let times = time_axis(200, 500.0);
        let mut signals = HashMap::new();
        let mut parameters = HashMap::new();
        for nm in wavelengths {
            let amplitude = 20.0 + (nm % 97) as f64;
            let tau = 15.0 + (nm % 41) as f64;
            signals.insert(nm, with_noise(&decay(&times, amplitude, tau), 0.2, nm as u64));
            parameters.insert(nm, vec![0.8 * amplitude, 1.3 * tau]);
        }
        Self {
            times,
            range: 2..200,
            fixed: vec![false, false],
            signals,
            parameters,
            writes: 0,
        }
    }
}

impl DatasetStore for WavelengthStore {
    type Id = u32;

    fn time_axis(&self) -> &[f64] {
        &self.times
    }

    fn active_range(&self) -> Range<usize> {
        self.range.clone()
    }

    fn fixed_flags(&self) -> Vec<bool> {
        self.fixed.clone()
    }

    fn dataset_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.signals.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn signals(&self, id: u32) -> &[f64] {
        &self.signals[&id]
    }

    fn parameters(&self, id: u32) -> Vec<f64> {
        self.parameters[&id].clone()
    }

    fn set_parameters(&mut self, id: u32, params: &[f64]) {
        self.writes += 1;
        self.parameters.insert(id, params.to_vec());
    }
}

fn fit(store: &mut WavelengthStore, settings: FitSettings) -> HashMap<u32, Vec<f64>> {
    let outcome = FitOrchestrator::new(settings)
        .fit_all(store, &ExponentialDecay::new())
        .unwrap();
    assert_eq!(outcome.reports().unwrap().len(), store.signals.len());
    store.parameters.clone()
}

#[test]
fn test_parallel_matches_sequential() {
    let wavelengths = 400..440;
    let settings = FitSettings::default().with_simd(false);

    let mut sequential = WavelengthStore::new(wavelengths.clone());
    let sequential = fit(&mut sequential, settings.clone().with_parallel_threshold(1000));

    let mut parallel = WavelengthStore::new(wavelengths);
    let parallel = fit(&mut parallel, settings.with_parallel_threshold(1));

    assert_eq!(sequential.len(), 40);
    for (nm, params) in &sequential {
        assert_eq!(params, &parallel[nm], "wavelength {}", nm);
    }
}

#[test]
fn test_results_independent_of_batch_composition() {
    let settings = FitSettings::default().with_parallel_threshold(8);

    let mut full = WavelengthStore::new(500..532);
    let full = fit(&mut full, settings.clone());

    // The same wavelengths split into a small sequential and a large parallel batch
    let mut small = WavelengthStore::new(500..504);
    let mut large = WavelengthStore::new(504..532);
    let mut split = fit(&mut small, settings.clone());
    split.extend(fit(&mut large, settings));

    for (nm, params) in &full {
        assert_eq!(params, &split[nm], "wavelength {}", nm);
    }
}

#[test]
fn test_simd_batch_matches_scalar_batch() {
    let mut scalar = WavelengthStore::new(600..620);
    let scalar = fit(&mut scalar, FitSettings::default().with_simd(false));

    let mut simd = WavelengthStore::new(600..620);
    let simd = fit(&mut simd, FitSettings::default().with_simd(true));

    for (nm, params) in &scalar {
        for (a, b) in params.iter().zip(&simd[nm]) {
            assert_relative_eq!(*a, *b, max_relative = 1e-6);
        }
    }
}

#[test]
fn test_batch_recovers_parameters() {
    let mut store = WavelengthStore::new([450, 451, 520, 633]);
    let outcome = FitOrchestrator::default()
        .fit_all(&mut store, &ExponentialDecay::new())
        .unwrap();

    let reports = outcome.reports().unwrap();
    for nm in [450u32, 451, 520, 633] {
        let params = &store.parameters[&nm];
        assert!(reports[&nm].status.is_converged());
        assert_eq!(&reports[&nm].params, params);
        assert!((params[0] - (20.0 + (nm % 97) as f64)).abs() < 0.5);
        assert!((params[1] - (15.0 + (nm % 41) as f64)).abs() < 0.5);
    }
    assert_eq!(store.writes, 4);
}

#[test]
fn test_all_fixed_reports_nothing_to_fit() {
    let mut store = WavelengthStore::new(700..710);
    store.fixed = vec![true, true];
    let before = store.parameters.clone();

    let outcome = FitOrchestrator::default()
        .fit_all(&mut store, &ExponentialDecay::new())
        .unwrap();
    assert_eq!(outcome, BatchOutcome::NothingToFit);
    assert!(outcome.reports().is_none());
    assert_eq!(store.parameters, before);
    assert_eq!(store.writes, 0);
}

#[test]
fn test_partially_fixed_batch() {
    let mut store = WavelengthStore::new(800..820);
    store.fixed = vec![true, false];
    let before = store.parameters.clone();

    FitOrchestrator::new(FitSettings::default().with_parallel_threshold(4))
        .fit_all(&mut store, &ExponentialDecay::new())
        .unwrap();
    for (nm, params) in &store.parameters {
        assert_eq!(params[0].to_bits(), before[nm][0].to_bits());
    }
}

#[test]
fn test_empty_batch() {
    let mut store = WavelengthStore::new(std::iter::empty());
    let outcome = FitOrchestrator::default()
        .fit_all(&mut store, &ExponentialDecay::new())
        .unwrap();
    assert_eq!(outcome.reports().map(HashMap::len), Some(0));
}

#[test]
fn test_mismatched_signals_fail_before_fitting() {
    let mut store = WavelengthStore::new(900..920);
    store.signals.get_mut(&905).unwrap().pop();

    let result = FitOrchestrator::default().fit_all(&mut store, &ExponentialDecay::new());
    assert!(matches!(result, Err(decayfit::FitError::DimensionMismatch(_))));
    assert_eq!(store.writes, 0);
}

#[test]
fn test_in_memory_batch_with_offset_model() {
    let model = MultiExponentialDecay::new(1).unwrap();
    let times = time_axis(120, 240.0);
    let mut batch = DatasetBatch::new(times.clone(), 0..120, 3).unwrap();
    for k in 0..5 {
        let offset = k as f64 * 0.5;
        let signals = times
            .iter()
            .map(|t| 10.0 * (-t / 30.0).exp() + offset)
            .collect();
        batch.push(signals, vec![8.0, 25.0, 0.0]).unwrap();
    }
    assert_eq!(batch.len(), 5);

    let flavor = SolverFlavor::select(true, &model);
    assert!(matches!(flavor, SolverFlavor::Scalar | SolverFlavor::Simd(_)));

    FitOrchestrator::default().fit_all(&mut batch, &model).unwrap();
    for k in 0..5 {
        assert_relative_eq!(batch.params(k).unwrap()[1], 30.0, epsilon = 1e-6);
        assert_relative_eq!(batch.params(k).unwrap()[2], k as f64 * 0.5, epsilon = 1e-6);
    }
}
