//! Configuration options for the Levenberg-Marquardt solvers.
//!
//! Defaults are the standard Marquardt constants: λ₀ = 1e-3, multiplied by 10
//! on a rejected step and divided by 10 on an accepted one.

use serde::{Deserialize, Serialize};

use crate::error::{FitError, Result};

/// Configuration options for the Levenberg-Marquardt solvers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmConfig {
    /// Maximum number of accepted steps per `fit()` call. Default: 100
    pub max_iterations: usize,

    /// Tolerance for the relative change in χ². Default: 1e-10
    pub ftol: f64,

    /// Tolerance for the relative change in parameter values. Default: 1e-10
    pub xtol: f64,

    /// Initial value for the damping parameter. Default: 1e-3
    pub initial_lambda: f64,

    /// Factor by which to increase lambda. Default: 10.0
    pub lambda_up_factor: f64,

    /// Factor by which to decrease lambda. Default: 0.1
    pub lambda_down_factor: f64,

    /// Minimum value for lambda. Default: 1e-12
    pub min_lambda: f64,

    /// Maximum value for lambda. Default: 1e12
    pub max_lambda: f64,

    /// Relative step for central finite differences. Default: 1e-6
    pub diff_step: f64,

    /// Project every trial step onto the parameter constraints. Default: false
    pub project_constraints: bool,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            ftol: 1e-10,
            xtol: 1e-10,
            initial_lambda: 1e-3,
            lambda_up_factor: 10.0,
            lambda_down_factor: 0.1,
            min_lambda: 1e-12,
            max_lambda: 1e12,
            diff_step: 1e-6,
            project_constraints: false,
        }
    }
}

impl LmConfig {
    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the tolerance for the relative change in χ².
    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.ftol = ftol;
        self
    }

    /// Set the tolerance for the relative change in parameter values.
    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.xtol = xtol;
        self
    }

    /// Set the initial value for the damping parameter.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.initial_lambda = lambda;
        self
    }

    /// Set the relative finite-difference step.
    pub fn with_diff_step(mut self, diff_step: f64) -> Self {
        self.diff_step = diff_step;
        self
    }

    /// Set whether trial steps are projected onto the parameter constraints.
    pub fn with_project_constraints(mut self, project: bool) -> Self {
        self.project_constraints = project;
        self
    }

    /// Checks that the damping schedule can reach `max_lambda` and that the
    /// tolerances are usable.
    ///
    /// # Errors
    ///
    /// Returns [`FitError::InvalidInput`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        fn invalid(field: &str, value: f64, requirement: &str) -> FitError {
            FitError::InvalidInput(format!(
                "LmConfig.{} = {} must be {}",
                field, value, requirement
            ))
        }

        for (field, value) in [
            ("ftol", self.ftol),
            ("xtol", self.xtol),
            ("initial_lambda", self.initial_lambda),
            ("lambda_up_factor", self.lambda_up_factor),
            ("lambda_down_factor", self.lambda_down_factor),
            ("min_lambda", self.min_lambda),
            ("max_lambda", self.max_lambda),
            ("diff_step", self.diff_step),
        ] {
            if !value.is_finite() {
                return Err(invalid(field, value, "finite"));
            }
        }

        if self.ftol < 0.0 {
            return Err(invalid("ftol", self.ftol, "non-negative"));
        }
        if self.xtol < 0.0 {
            return Err(invalid("xtol", self.xtol, "non-negative"));
        }
        if self.min_lambda <= 0.0 {
            return Err(invalid("min_lambda", self.min_lambda, "positive"));
        }
        if self.initial_lambda < self.min_lambda {
            return Err(invalid(
                "initial_lambda",
                self.initial_lambda,
                "at least min_lambda",
            ));
        }
        if self.max_lambda < self.initial_lambda {
            return Err(invalid(
                "max_lambda",
                self.max_lambda,
                "at least initial_lambda",
            ));
        }
        if self.lambda_up_factor <= 1.0 {
            return Err(invalid(
                "lambda_up_factor",
                self.lambda_up_factor,
                "greater than 1",
            ));
        }
        if self.lambda_down_factor <= 0.0 || self.lambda_down_factor >= 1.0 {
            return Err(invalid(
                "lambda_down_factor",
                self.lambda_down_factor,
                "in (0, 1)",
            ));
        }
        if self.diff_step <= 0.0 {
            return Err(invalid("diff_step", self.diff_step, "positive"));
        }
        Ok(())
    }
}
