//! Batch fitting of many datasets against one model.
//!
//! Every dataset of a batch shares the time axis, the active range and the
//! fixed columns; only the signal array and the starting parameters differ
//! (one transient measurement, many wavelengths). The orchestrator:
//!
//! 1. picks the solver flavor once for the whole batch ([`SolverFlavor`]),
//! 2. fits sequentially with one reused solver below
//!    [`FitSettings::parallel_threshold`] datasets, and in parallel with one
//!    solver per rayon worker thread otherwise,
//! 3. writes the results back to the [`DatasetStore`] on the calling thread
//!    after every fit has finished.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::ops::Range;
use std::sync::{Mutex, PoisonError};

use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use wide::{f64x2, f64x4};

use crate::error::{FitError, Result};
use crate::lanes::{Lane1, LaneWidth};
use crate::lm::{FitReport, LmConfig, ScalarSolver, SimdSolver, Solver};
use crate::model::FitModel;
use crate::parameters::{initial_values, FixedColumns};
use crate::series::{check_range, ObservedSeries};

/// Settings for a batch of fits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitSettings {
    /// Use the lane-batched solver when the CPU and the model allow it.
    /// Default: true
    pub use_simd: bool,

    /// Maximum number of iterations per dataset. Overrides
    /// `lm.max_iterations`. Default: 100
    pub max_iterations: usize,

    /// Batches with at least this many datasets are fitted in parallel.
    /// Default: 16
    pub parallel_threshold: usize,

    /// Remaining solver settings.
    pub lm: LmConfig,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            use_simd: true,
            max_iterations: 100,
            parallel_threshold: 16,
            lm: LmConfig::default(),
        }
    }
}

impl FitSettings {
    /// Set whether the lane-batched solver may be used.
    pub fn with_simd(mut self, use_simd: bool) -> Self {
        self.use_simd = use_simd;
        self
    }

    /// Set the maximum number of iterations per dataset.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the dataset count at which fitting goes parallel.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Set the remaining solver settings.
    pub fn with_lm(mut self, lm: LmConfig) -> Self {
        self.lm = lm;
        self
    }

    /// The solver configuration with the iteration cap applied.
    pub fn solver_config(&self) -> LmConfig {
        self.lm.clone().with_max_iterations(self.max_iterations)
    }
}

/// Storage the orchestrator reads datasets from and writes results to.
///
/// Accessed only from the thread calling
/// [`FitOrchestrator::fit_all`].
pub trait DatasetStore {
    /// Identity of a dataset.
    type Id: Copy + Eq + Hash + Debug + Send + Sync;

    /// The time axis shared by every dataset.
    fn time_axis(&self) -> &[f64];

    /// The window of samples used in every fit.
    fn active_range(&self) -> Range<usize>;

    /// One flag per parameter column; `true` holds the column fixed.
    fn fixed_flags(&self) -> Vec<bool>;

    /// The datasets to fit.
    fn dataset_ids(&self) -> Vec<Self::Id>;

    /// The signal array of a dataset, aligned with the time axis.
    fn signals(&self, id: Self::Id) -> &[f64];

    /// The current parameters of a dataset, used as the starting guess.
    fn parameters(&self, id: Self::Id) -> Vec<f64>;

    /// Stores the fitted parameters of a dataset.
    fn set_parameters(&mut self, id: Self::Id, params: &[f64]);
}

/// The solver implementation used for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverFlavor {
    /// [`ScalarSolver`]
    Scalar,
    /// [`SimdSolver`] at the given lane width
    Simd(LaneWidth),
}

impl SolverFlavor {
    /// Picks the lane-batched solver iff `use_simd` is set, the CPU has vector
    /// registers and the model implements the vectorized contract.
    pub fn select(use_simd: bool, model: &dyn FitModel) -> Self {
        if !use_simd || model.as_vectorized().is_none() {
            return SolverFlavor::Scalar;
        }
        match LaneWidth::detect() {
            LaneWidth::Scalar => SolverFlavor::Scalar,
            width => SolverFlavor::Simd(width),
        }
    }
}

/// What a batch did.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome<Id: Eq + Hash> {
    /// Every parameter column is fixed; no dataset was touched.
    NothingToFit,
    /// One report per dataset.
    Fitted(HashMap<Id, FitReport>),
}

impl<Id: Eq + Hash> BatchOutcome<Id> {
    /// The per-dataset reports, if anything was fitted.
    pub fn reports(&self) -> Option<&HashMap<Id, FitReport>> {
        match self {
            BatchOutcome::NothingToFit => None,
            BatchOutcome::Fitted(reports) => Some(reports),
        }
    }
}

/// One dataset, gathered on the calling thread.
struct FitJob<'a, Id> {
    id: Id,
    signals: &'a [f64],
    start: Vec<f64>,
}

/// Fits one model against every dataset of a [`DatasetStore`].
#[derive(Debug, Clone, Default)]
pub struct FitOrchestrator {
    settings: FitSettings,
}

impl FitOrchestrator {
    /// Creates an orchestrator with the given settings.
    pub fn new(settings: FitSettings) -> Self {
        Self { settings }
    }

    /// The settings in use.
    pub fn settings(&self) -> &FitSettings {
        &self.settings
    }

    /// Fits `model` against every dataset in `store` and stores the results.
    ///
    /// Blocks until the whole batch is done. Parameters are written back only
    /// if every dataset was fitted; on error the store is left untouched.
    ///
    /// # Errors
    ///
    /// Fails if the store's time axis, range, fixed flags, signal arrays or
    /// starting parameters do not fit the model. Non-convergence is not an
    /// error; see [`FitReport::status`].
    pub fn fit_all<S: DatasetStore>(
        &self,
        store: &mut S,
        model: &dyn FitModel,
    ) -> Result<BatchOutcome<S::Id>> {
        let count = model.parameter_count();
        let flags = store.fixed_flags();
        if flags.len() != count {
            return Err(FitError::DimensionMismatch(format!(
                "Expected {} fixed flags for model '{}', got {}",
                count,
                model.name(),
                flags.len()
            )));
        }
        let fixed = FixedColumns::from_flags(&flags);
        if fixed.covers_all(count) {
            debug!("{}: every parameter is fixed, nothing to fit", model.name());
            return Ok(BatchOutcome::NothingToFit);
        }

        let reports = {
            let store = &*store;
            let jobs = gather_jobs(store, count)?;
            let flavor = SolverFlavor::select(self.settings.use_simd, model);
            let parallel = jobs.len() >= self.settings.parallel_threshold;
            debug!(
                "{}: fitting {} datasets with {:?} solver ({})",
                model.name(),
                jobs.len(),
                flavor,
                if parallel { "parallel" } else { "sequential" }
            );
            self.run_flavor(flavor, model, store, &fixed, &jobs, parallel)?
        };

        for (id, report) in &reports {
            store.set_parameters(*id, &report.params);
        }
        debug!("{}: stored {} results", model.name(), reports.len());
        Ok(BatchOutcome::Fitted(reports))
    }

    fn run_flavor<S: DatasetStore>(
        &self,
        flavor: SolverFlavor,
        model: &dyn FitModel,
        store: &S,
        fixed: &FixedColumns,
        jobs: &[FitJob<'_, S::Id>],
        parallel: bool,
    ) -> Result<HashMap<S::Id, FitReport>> {
        let times = store.time_axis();
        let range = store.active_range();
        let config = self.settings.solver_config();

        let vectorized = match (flavor, model.as_vectorized()) {
            (SolverFlavor::Simd(width), Some(vectorized)) => Some((width, vectorized)),
            _ => None,
        };

        match vectorized {
            None => run_batch(
                || ScalarSolver::new(model, times, range.clone(), fixed, config.clone()),
                jobs,
                parallel,
            ),
            Some((LaneWidth::X4, model)) => run_batch(
                || SimdSolver::<_, f64x4>::new(model, times, range.clone(), fixed, config.clone()),
                jobs,
                parallel,
            ),
            Some((LaneWidth::X2, model)) => run_batch(
                || SimdSolver::<_, f64x2>::new(model, times, range.clone(), fixed, config.clone()),
                jobs,
                parallel,
            ),
            Some((LaneWidth::Scalar, model)) => run_batch(
                || SimdSolver::<_, Lane1>::new(model, times, range.clone(), fixed, config.clone()),
                jobs,
                parallel,
            ),
        }
    }
}

/// Reads the signals and starting parameters of every dataset and checks
/// them against the shared layout.
fn gather_jobs<S: DatasetStore>(store: &S, count: usize) -> Result<Vec<FitJob<'_, S::Id>>> {
    let len = store.time_axis().len();
    check_range(&store.active_range(), len)?;

    store
        .dataset_ids()
        .into_iter()
        .map(|id| {
            let signals = store.signals(id);
            if signals.len() != len {
                return Err(FitError::DimensionMismatch(format!(
                    "Dataset {:?} has {} signals for a time axis of {}",
                    id,
                    signals.len(),
                    len
                )));
            }
            let start = store.parameters(id);
            if start.len() != count {
                return Err(FitError::DimensionMismatch(format!(
                    "Dataset {:?} has {} parameters, the model expects {}",
                    id,
                    start.len(),
                    count
                )));
            }
            Ok(FitJob { id, signals, start })
        })
        .collect()
}

fn fit_one<T: Solver, Id>(solver: &mut T, job: &FitJob<'_, Id>) -> Result<FitReport> {
    solver.initialize(job.signals, &job.start)?;
    solver.fit()?;
    Ok(solver.report())
}

/// Fits every job with solvers built by `factory`.
///
/// Sequentially, one solver serves every job. In parallel, each rayon worker
/// builds a solver the first time it picks up a job and keeps it for the rest
/// of the batch.
fn run_batch<T, F, Id>(
    factory: F,
    jobs: &[FitJob<'_, Id>],
    parallel: bool,
) -> Result<HashMap<Id, FitReport>>
where
    T: Solver + Send,
    F: Fn() -> Result<T> + Send + Sync,
    Id: Copy + Eq + Hash + Send + Sync,
{
    // Fail on the calling thread if the layout is invalid
    let mut solver = factory()?;

    if !parallel {
        return jobs
            .iter()
            .map(|job| Ok((job.id, fit_one(&mut solver, job)?)))
            .collect();
    }

    // Slot i is only ever locked by worker i
    let slots: Vec<Mutex<Option<T>>> = (0..rayon::current_num_threads())
        .map(|_| Mutex::new(None))
        .collect();
    if let Some(first) = slots.first() {
        *first.lock().unwrap_or_else(PoisonError::into_inner) = Some(solver);
    }

    jobs.par_iter()
        .map(|job| {
            let slot = rayon::current_thread_index().and_then(|index| slots.get(index));
            let Some(slot) = slot else {
                return Ok((job.id, fit_one(&mut factory()?, job)?));
            };
            let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            let solver = match &mut *guard {
                Some(solver) => solver,
                empty => empty.insert(factory()?),
            };
            Ok((job.id, fit_one(solver, job)?))
        })
        .collect()
}

/// Fits `model` to a single series with the scalar solver.
///
/// # Arguments
///
/// * `model` - The model to fit
/// * `series` - The observed data and its active range
/// * `start` - The starting parameters
/// * `fixed` - Parameter columns held at their starting values
/// * `config` - Iteration settings
pub fn fit_series(
    model: &dyn FitModel,
    series: &ObservedSeries,
    start: &[f64],
    fixed: &FixedColumns,
    config: LmConfig,
) -> Result<FitReport> {
    let mut solver = ScalarSolver::new(model, series.times(), series.range(), fixed, config)?;
    solver.initialize(series.signals(), start)?;
    solver.fit()?;
    Ok(solver.report())
}

/// An in-memory [`DatasetStore`]: one time axis and many signal arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetBatch {
    times: Vec<f64>,
    range: Range<usize>,
    fixed: Vec<bool>,
    signals: Vec<Vec<f64>>,
    parameters: Vec<Vec<f64>>,
}

impl DatasetBatch {
    /// Creates an empty batch over `times` with every column free.
    ///
    /// # Arguments
    ///
    /// * `times` - The shared time axis
    /// * `range` - The active sample window
    /// * `parameter_count` - Number of model parameters
    pub fn new(times: Vec<f64>, range: Range<usize>, parameter_count: usize) -> Result<Self> {
        check_range(&range, times.len())?;
        Ok(Self {
            times,
            range,
            fixed: vec![false; parameter_count],
            signals: Vec::new(),
            parameters: Vec::new(),
        })
    }

    /// Holds parameter column `index` fixed in every fit.
    pub fn fix(&mut self, index: usize, fixed: bool) -> Result<()> {
        let count = self.fixed.len();
        let flag = self
            .fixed
            .get_mut(index)
            .ok_or(FitError::FixedColumnOutOfRange { index, count })?;
        *flag = fixed;
        Ok(())
    }

    /// Adds a dataset and returns its id.
    pub fn push(&mut self, signals: Vec<f64>, start: Vec<f64>) -> Result<usize> {
        if signals.len() != self.times.len() {
            return Err(FitError::DimensionMismatch(format!(
                "Expected {} signals, got {}",
                self.times.len(),
                signals.len()
            )));
        }
        if start.len() != self.fixed.len() {
            return Err(FitError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                self.fixed.len(),
                start.len()
            )));
        }
        self.signals.push(signals);
        self.parameters.push(start);
        Ok(self.signals.len() - 1)
    }

    /// Adds a dataset starting from the model's initial parameter values.
    pub fn push_with_initial(
        &mut self,
        signals: Vec<f64>,
        model: &dyn FitModel,
    ) -> Result<usize> {
        self.push(signals, initial_values(model.parameters()))
    }

    /// Number of datasets.
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// Returns true if the batch holds no datasets.
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// The parameters of dataset `id`, or `None` for an unknown id.
    pub fn params(&self, id: usize) -> Option<&[f64]> {
        self.parameters.get(id).map(Vec::as_slice)
    }
}

impl DatasetStore for DatasetBatch {
    type Id = usize;

    fn time_axis(&self) -> &[f64] {
        &self.times
    }

    fn active_range(&self) -> Range<usize> {
        self.range.clone()
    }

    fn fixed_flags(&self) -> Vec<bool> {
        self.fixed.clone()
    }

    fn dataset_ids(&self) -> Vec<usize> {
        (0..self.signals.len()).collect()
    }

    fn signals(&self, id: usize) -> &[f64] {
        &self.signals[id]
    }

    fn parameters(&self, id: usize) -> Vec<f64> {
        self.parameters[id].clone()
    }

    fn set_parameters(&mut self, id: usize, params: &[f64]) {
        self.parameters[id].copy_from_slice(params);
    }
}
