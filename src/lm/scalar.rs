//! The scalar Levenberg-Marquardt solver.
//!
//! Evaluates the model one sample at a time through [`FitModel::function`].
//! Uses analytic derivatives when the model provides them and central finite
//! differences otherwise.

use ndarray::{Array1, Array2};
use std::ops::Range;

use crate::error::Result;
use crate::model::{DifferentiableModel, FitModel};
use crate::parameters::FixedColumns;

use super::config::LmConfig;
use super::finite_difference::central_column;
use super::normal::NormalEquations;
use super::solver::{LmSolver, ResidualKernel, SolverSetup};

/// Residuals and Jacobian of a [`FitModel`], sample by sample.
pub struct ScalarKernel<'m> {
    model: &'m dyn FitModel,
    differentiable: Option<&'m dyn DifferentiableModel>,
    diff_step: f64,
    times: Vec<f64>,
    observed: Vec<f64>,
    residuals: Array1<f64>,
    jacobian: Array2<f64>,
    derivatives: Vec<f64>,
    column: Vec<f64>,
}

impl<'m> std::fmt::Debug for ScalarKernel<'m> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalarKernel")
            .field("model", &self.model.name())
            .field("analytic", &self.differentiable.is_some())
            .field("samples", &self.times.len())
            .finish()
    }
}

impl<'m> ScalarKernel<'m> {
    /// Creates a kernel over `times`, which holds the active range only.
    pub fn new(model: &'m dyn FitModel, times: &[f64], free: usize, diff_step: f64) -> Self {
        let n = times.len();
        Self {
            model,
            differentiable: model.as_differentiable(),
            diff_step,
            times: times.to_vec(),
            observed: vec![0.0; n],
            residuals: Array1::zeros(n),
            jacobian: Array2::zeros((n, free)),
            derivatives: vec![0.0; model.parameter_count()],
            column: vec![0.0; n],
        }
    }

    /// Returns true if analytic derivatives are used.
    pub fn is_analytic(&self) -> bool {
        self.differentiable.is_some()
    }

    fn fill_jacobian(&mut self, params: &[f64], free: &[usize]) {
        match self.differentiable {
            Some(model) => {
                for (i, &t) in self.times.iter().enumerate() {
                    model.differentials_into(params, t, &mut self.derivatives);
                    for (k, &j) in free.iter().enumerate() {
                        self.jacobian[[i, k]] = self.derivatives[j];
                    }
                }
            }
            None => {
                for (k, &j) in free.iter().enumerate() {
                    central_column(
                        self.model,
                        params,
                        j,
                        self.diff_step,
                        &self.times,
                        &mut self.column,
                    );
                    for (i, &d) in self.column.iter().enumerate() {
                        self.jacobian[[i, k]] = d;
                    }
                }
            }
        }
    }
}

impl<'m> ResidualKernel for ScalarKernel<'m> {
    fn sample_count(&self) -> usize {
        self.times.len()
    }

    fn load_observed(&mut self, observed: &[f64]) {
        self.observed.copy_from_slice(observed);
    }

    fn chi_square(&mut self, params: &[f64]) -> f64 {
        let f = self.model.function(params);
        self.times
            .iter()
            .zip(&self.observed)
            .map(|(&t, &y)| {
                let r = y - f(t);
                r * r
            })
            .sum()
    }

    fn normal_equations(&mut self, params: &[f64], free: &[usize], normal: &mut NormalEquations) {
        {
            let f = self.model.function(params);
            for (i, (&t, &y)) in self.times.iter().zip(&self.observed).enumerate() {
                self.residuals[i] = y - f(t);
            }
        }
        self.fill_jacobian(params, free);
        normal.assign_from(&self.jacobian, &self.residuals);
    }
}

/// Levenberg-Marquardt solver evaluating the model one sample at a time.
pub type ScalarSolver<'m> = LmSolver<ScalarKernel<'m>>;

impl<'m> LmSolver<ScalarKernel<'m>> {
    /// Creates a scalar solver.
    ///
    /// # Arguments
    ///
    /// * `model` - The model to fit
    /// * `times` - The full time axis
    /// * `range` - The active sample window within `times`
    /// * `fixed` - Parameter columns held at their starting values
    /// * `config` - Iteration settings
    ///
    /// # Errors
    ///
    /// See [`SolverSetup::new`].
    pub fn new(
        model: &'m dyn FitModel,
        times: &[f64],
        range: Range<usize>,
        fixed: &FixedColumns,
        config: LmConfig,
    ) -> Result<Self> {
        let setup = SolverSetup::new(
            model.name(),
            model.parameters(),
            times.len(),
            range.clone(),
            fixed,
        )?;
        let kernel = ScalarKernel::new(model, &times[range], setup.free.len(), config.diff_step);
        Self::from_kernel(kernel, setup, config)
    }
}
