//! Convergence criteria for the Levenberg-Marquardt solvers.

/// Possible states of a solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceStatus {
    /// `initialize()` has not been called yet.
    Uninitialized,

    /// Initialized, or iterating.
    Running,

    /// Converged due to a small parameter change.
    ParameterConvergence,

    /// Converged due to a small relative change in χ² (or χ² reached zero).
    FunctionValueConvergence,

    /// Terminated due to reaching the maximum number of iterations.
    MaxIterationsReached,

    /// Terminated because no step reduced χ² before λ reached its maximum.
    DampingSaturated,

    /// Every parameter is fixed; nothing was optimized.
    NoFreeParameters,
}

impl ConvergenceStatus {
    /// Returns true if the solver has stopped iterating.
    pub fn is_terminated(&self) -> bool {
        !matches!(
            self,
            ConvergenceStatus::Uninitialized | ConvergenceStatus::Running
        )
    }

    /// Returns true if the solver has converged.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            ConvergenceStatus::ParameterConvergence | ConvergenceStatus::FunctionValueConvergence
        )
    }

    /// Returns a description of the status.
    pub fn description(&self) -> &'static str {
        match self {
            ConvergenceStatus::Uninitialized => "Solver has not been initialized",
            ConvergenceStatus::Running => "Optimization is still running",
            ConvergenceStatus::ParameterConvergence => "Converged: small parameter change",
            ConvergenceStatus::FunctionValueConvergence => "Converged: small chi-square change",
            ConvergenceStatus::MaxIterationsReached => "Terminated: maximum iterations reached",
            ConvergenceStatus::DampingSaturated => "Terminated: damping parameter saturated",
            ConvergenceStatus::NoFreeParameters => "Terminated: every parameter is fixed",
        }
    }
}

/// Criteria for deciding when an accepted step ends the fit.
#[derive(Debug, Clone)]
pub struct ConvergenceCriteria {
    /// Tolerance for the relative change in parameter values.
    pub xtol: f64,

    /// Tolerance for the relative change in χ².
    pub ftol: f64,

    /// Maximum number of iterations.
    pub max_iterations: usize,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self {
            xtol: 1e-10,
            ftol: 1e-10,
            max_iterations: 100,
        }
    }
}

impl ConvergenceCriteria {
    /// Creates a new set of convergence criteria with the given tolerances.
    pub fn new(xtol: f64, ftol: f64, max_iterations: usize) -> Self {
        Self {
            xtol,
            ftol,
            max_iterations,
        }
    }

    /// Checks an accepted step for convergence.
    ///
    /// # Arguments
    ///
    /// * `params` - The parameter values before the step
    /// * `new_params` - The parameter values after the step
    /// * `cost` - χ² before the step
    /// * `new_cost` - χ² after the step
    ///
    /// # Returns
    ///
    /// * The convergence status, `Running` if the fit should continue
    pub fn check(
        &self,
        params: &[f64],
        new_params: &[f64],
        cost: f64,
        new_cost: f64,
    ) -> ConvergenceStatus {
        if new_cost <= f64::MIN_POSITIVE {
            return ConvergenceStatus::FunctionValueConvergence;
        }

        let cost_change = (cost - new_cost).abs() / cost.max(f64::MIN_POSITIVE);
        if cost_change < self.ftol {
            return ConvergenceStatus::FunctionValueConvergence;
        }

        let param_change = new_params
            .iter()
            .zip(params)
            .map(|(a, b)| (a - b).abs() / b.abs().max(1.0))
            .fold(0.0, f64::max);
        if param_change < self.xtol {
            return ConvergenceStatus::ParameterConvergence;
        }

        ConvergenceStatus::Running
    }

    /// Returns true if a rejected trial changed χ² by less than `ftol`
    /// relative, so no further step can make measurable progress.
    pub fn is_stalled(&self, cost: f64, new_cost: f64) -> bool {
        (new_cost - cost).abs() <= self.ftol * cost.max(f64::MIN_POSITIVE)
    }

    /// Returns true if `iterations` has used up the budget.
    pub fn is_exhausted(&self, iterations: usize) -> bool {
        iterations >= self.max_iterations
    }
}
