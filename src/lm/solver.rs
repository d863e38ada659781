//! The solver interface and the shared Levenberg-Marquardt iteration.
//!
//! Both solver flavors run the same iteration ([`LmSolver`]); they differ only
//! in how residuals and Jacobian columns are evaluated, which is delegated to
//! a [`ResidualKernel`]:
//!
//! 1. the kernel accumulates `JᵀJ` and `Jᵀr` at the current parameters,
//! 2. the damped normal equations are solved for a step over the free columns,
//! 3. the kernel evaluates χ² at the trial parameters,
//! 4. a lower χ² accepts the step and shrinks λ; otherwise λ grows and step 2
//!    is retried with the same `JᵀJ` and `Jᵀr`.

use log::{debug, trace, warn};
use std::fmt;
use std::ops::Range;

use crate::error::{FitError, Result};
use crate::parameters::{Constraints, FixedColumns, Parameter};
use crate::series::check_range;

use super::config::LmConfig;
use super::convergence::{ConvergenceCriteria, ConvergenceStatus};
use super::damping::Damping;
use super::normal::NormalEquations;

/// Upper bound on rejected trials per accepted step.
const MAX_REJECTIONS: usize = 256;

/// The public surface of a fitting solver.
///
/// A solver is bound to one model, time axis, active range and set of fixed
/// columns. It can be reused for any number of datasets sharing those: each
/// [`initialize`](Solver::initialize) fully resets its state.
pub trait Solver {
    /// Loads a dataset and a starting guess.
    ///
    /// `observed` covers the full time axis; only the active range is used.
    /// The starting parameters are copied.
    fn initialize(&mut self, observed: &[f64], start: &[f64]) -> Result<()>;

    /// Iterates until convergence or the iteration budget is used up.
    ///
    /// Running out of iterations is not an error; the best parameters found
    /// are kept and the returned status says why the fit stopped.
    fn fit(&mut self) -> Result<ConvergenceStatus>;

    /// The best parameter vector found so far.
    fn parameters(&self) -> &[f64];

    /// χ² at [`parameters`](Solver::parameters).
    fn chi_square(&self) -> f64;

    /// Number of accepted steps in the last `fit()` call.
    fn iterations(&self) -> usize;

    /// The current state of the solver.
    fn status(&self) -> ConvergenceStatus;

    /// Snapshot of the current result.
    fn report(&self) -> FitReport {
        FitReport {
            params: self.parameters().to_vec(),
            chi_square: self.chi_square(),
            iterations: self.iterations(),
            status: self.status(),
        }
    }
}

/// Result of one fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    /// Optimized parameter values
    pub params: Vec<f64>,

    /// Sum of squared residuals over the active range
    pub chi_square: f64,

    /// Number of accepted steps
    pub iterations: usize,

    /// Why the fit stopped
    pub status: ConvergenceStatus,
}

impl fmt::Display for FitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fit Result:")?;
        writeln!(f, "  Status: {}", self.status.description())?;
        writeln!(f, "  Chi-square: {:.6e}", self.chi_square)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Parameters: {:?}", self.params)?;
        Ok(())
    }
}

/// Evaluates residuals and Jacobian columns over the active range.
pub trait ResidualKernel {
    /// Number of samples in the active range.
    fn sample_count(&self) -> usize;

    /// Replaces the observed values; `observed` covers the active range only.
    fn load_observed(&mut self, observed: &[f64]);

    /// Sum of squared residuals at `params`.
    fn chi_square(&mut self, params: &[f64]) -> f64;

    /// Accumulates `JᵀJ` and `Jᵀr` over the `free` columns at `params`.
    fn normal_equations(&mut self, params: &[f64], free: &[usize], normal: &mut NormalEquations);
}

/// Validated layout shared by every solver flavor.
#[derive(Debug, Clone)]
pub struct SolverSetup {
    /// Model name, for diagnostics
    pub model_name: String,

    /// Number of model parameters
    pub parameter_count: usize,

    /// Constraint flags per parameter
    pub constraints: Vec<Constraints>,

    /// Indices of the optimized parameters
    pub free: Vec<usize>,

    /// Length of the full time axis
    pub series_len: usize,

    /// Active sample window
    pub range: Range<usize>,
}

impl SolverSetup {
    /// Validates a model layout against a time axis.
    ///
    /// # Errors
    ///
    /// Fails if the model has no parameters, the range does not fit the time
    /// axis, a fixed column is out of range, or the active range has fewer
    /// samples than free parameters.
    pub fn new(
        model_name: &str,
        parameters: &[Parameter],
        series_len: usize,
        range: Range<usize>,
        fixed: &FixedColumns,
    ) -> Result<Self> {
        if parameters.is_empty() {
            return Err(FitError::InvalidInput(format!(
                "Model '{}' has no parameters",
                model_name
            )));
        }
        check_range(&range, series_len)?;
        fixed.validate(parameters.len())?;

        let free = fixed.free_indices(parameters.len());
        if range.len() < free.len() {
            return Err(FitError::InvalidInput(format!(
                "Active range has {} samples but {} parameters are free",
                range.len(),
                free.len()
            )));
        }

        Ok(Self {
            model_name: model_name.to_string(),
            parameter_count: parameters.len(),
            constraints: parameters.iter().map(Parameter::constraints).collect(),
            free,
            series_len,
            range,
        })
    }
}

/// A Levenberg-Marquardt solver over a residual kernel.
///
/// See [`ScalarSolver`](super::ScalarSolver) and
/// [`SimdSolver`](super::SimdSolver) for the concrete flavors.
#[derive(Debug)]
pub struct LmSolver<K> {
    kernel: K,
    setup: SolverSetup,
    config: LmConfig,
    criteria: ConvergenceCriteria,
    damping: Damping,
    normal: NormalEquations,
    params: Vec<f64>,
    trial: Vec<f64>,
    chi_square: f64,
    iterations: usize,
    status: ConvergenceStatus,
}

impl<K: ResidualKernel> LmSolver<K> {
    /// Assembles a solver from a validated setup and its kernel.
    ///
    /// # Errors
    ///
    /// Fails if `config` does not pass [`LmConfig::validate`].
    pub fn from_kernel(kernel: K, setup: SolverSetup, config: LmConfig) -> Result<Self> {
        config.validate()?;
        let free = setup.free.len();
        Ok(Self {
            kernel,
            criteria: ConvergenceCriteria::new(config.xtol, config.ftol, config.max_iterations),
            damping: Damping::from_config(&config),
            normal: NormalEquations::zeros(free),
            params: Vec::new(),
            trial: Vec::new(),
            chi_square: f64::INFINITY,
            iterations: 0,
            status: ConvergenceStatus::Uninitialized,
            setup,
            config,
        })
    }

    /// The residual kernel.
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// The configuration in use.
    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    /// The current damping parameter.
    pub fn lambda(&self) -> f64 {
        self.damping.lambda
    }

    /// Indices of the optimized parameters.
    pub fn free_indices(&self) -> &[usize] {
        &self.setup.free
    }

    /// The active sample window.
    pub fn range(&self) -> Range<usize> {
        self.setup.range.clone()
    }

    /// Fills `self.trial` with the current parameters moved by `delta` along
    /// the free columns. Fixed columns are copied untouched.
    fn build_trial(&mut self, delta: &ndarray::Array1<f64>) {
        self.trial.copy_from_slice(&self.params);
        for (k, &j) in self.setup.free.iter().enumerate() {
            let value = self.params[j] + delta[k];
            self.trial[j] = if self.config.project_constraints {
                self.setup.constraints[j].clamp(value)
            } else {
                value
            };
        }
    }

    /// Searches for an acceptable step from the current normal equations.
    fn step(&mut self) -> ConvergenceStatus {
        for _ in 0..MAX_REJECTIONS {
            let delta = match self.normal.solve(self.damping.lambda) {
                Some(delta) => delta,
                None => {
                    trace!(
                        "{}: singular normal equations at lambda = {:.3e}",
                        self.setup.model_name,
                        self.damping.lambda
                    );
                    if !self.damping.reject() {
                        return self.saturated();
                    }
                    continue;
                }
            };

            self.build_trial(&delta);
            let trial_chi_square = self.kernel.chi_square(&self.trial);

            if trial_chi_square.is_finite() && trial_chi_square < self.chi_square {
                let status = self.criteria.check(
                    &self.params,
                    &self.trial,
                    self.chi_square,
                    trial_chi_square,
                );
                trace!(
                    "{}: accepted step {} at lambda = {:.3e}, chi2 {:.6e} -> {:.6e}",
                    self.setup.model_name,
                    self.iterations + 1,
                    self.damping.lambda,
                    self.chi_square,
                    trial_chi_square
                );
                std::mem::swap(&mut self.params, &mut self.trial);
                self.chi_square = trial_chi_square;
                self.damping.accept();
                self.iterations += 1;
                return status;
            }

            if trial_chi_square.is_finite()
                && self.criteria.is_stalled(self.chi_square, trial_chi_square)
            {
                return ConvergenceStatus::FunctionValueConvergence;
            }

            trace!(
                "{}: rejected step at lambda = {:.3e} (chi2 {:.6e})",
                self.setup.model_name,
                self.damping.lambda,
                trial_chi_square
            );
            if !self.damping.reject() {
                return self.saturated();
            }
        }
        self.saturated()
    }

    fn saturated(&self) -> ConvergenceStatus {
        warn!(
            "{}: no step reduces chi2 {:.6e} (lambda = {:.3e})",
            self.setup.model_name, self.chi_square, self.damping.lambda
        );
        ConvergenceStatus::DampingSaturated
    }
}

impl<K: ResidualKernel> Solver for LmSolver<K> {
    fn initialize(&mut self, observed: &[f64], start: &[f64]) -> Result<()> {
        if observed.len() != self.setup.series_len {
            return Err(FitError::DimensionMismatch(format!(
                "Expected {} observed values, got {}",
                self.setup.series_len,
                observed.len()
            )));
        }
        if start.len() != self.setup.parameter_count {
            return Err(FitError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                self.setup.parameter_count,
                start.len()
            )));
        }
        if let Some(index) = start.iter().position(|v| !v.is_finite()) {
            return Err(FitError::InvalidInput(format!(
                "Starting value of parameter {} is not finite",
                index
            )));
        }

        let active = &observed[self.setup.range.clone()];
        if let Some(offset) = active.iter().position(|v| !v.is_finite()) {
            self.status = ConvergenceStatus::Uninitialized;
            return Err(FitError::InvalidInput(format!(
                "Observed value at index {} is not finite",
                self.setup.range.start + offset
            )));
        }

        self.kernel.load_observed(active);
        self.params.clear();
        self.params.extend_from_slice(start);
        self.trial.clear();
        self.trial.extend_from_slice(start);
        self.damping.reset();
        self.iterations = 0;
        self.chi_square = self.kernel.chi_square(&self.params);
        if !self.chi_square.is_finite() {
            self.status = ConvergenceStatus::Uninitialized;
            return Err(FitError::InvalidInput(format!(
                "Model '{}' is not finite at the starting parameters",
                self.setup.model_name
            )));
        }
        self.status = ConvergenceStatus::Running;
        Ok(())
    }

    fn fit(&mut self) -> Result<ConvergenceStatus> {
        if self.status == ConvergenceStatus::Uninitialized {
            return Err(FitError::InvalidState(
                "fit() called before initialize()".to_string(),
            ));
        }
        if self.setup.free.is_empty() {
            self.status = ConvergenceStatus::NoFreeParameters;
            return Ok(self.status);
        }

        self.iterations = 0;
        self.status = ConvergenceStatus::Running;

        let status = loop {
            if self.criteria.is_exhausted(self.iterations) {
                break ConvergenceStatus::MaxIterationsReached;
            }
            if self.chi_square <= f64::MIN_POSITIVE {
                break ConvergenceStatus::FunctionValueConvergence;
            }

            self.kernel
                .normal_equations(&self.params, &self.setup.free, &mut self.normal);

            match self.step() {
                ConvergenceStatus::Running => continue,
                status => break status,
            }
        };

        debug!(
            "{}: {} after {} iterations (chi2 = {:.6e})",
            self.setup.model_name,
            status.description(),
            self.iterations,
            self.chi_square
        );
        self.status = status;
        Ok(status)
    }

    fn parameters(&self) -> &[f64] {
        &self.params
    }

    fn chi_square(&self) -> f64 {
        self.chi_square
    }

    fn iterations(&self) -> usize {
        self.iterations
    }

    fn status(&self) -> ConvergenceStatus {
        self.status
    }
}
