//! Damping parameter adaptation.

use super::config::LmConfig;

/// The Levenberg-Marquardt damping parameter λ.
///
/// λ shrinks after an accepted step (towards Gauss-Newton) and grows after a
/// rejected one (towards gradient descent), clamped to `[min, max]`.
#[derive(Debug, Clone)]
pub struct Damping {
    /// Current value of the damping parameter
    pub lambda: f64,

    /// Value restored by [`reset`](Self::reset)
    pub initial: f64,

    /// Minimum allowed value for the damping parameter
    pub lambda_min: f64,

    /// Maximum allowed value for the damping parameter
    pub lambda_max: f64,

    /// Factor to increase lambda by when a step is rejected
    pub increase_factor: f64,

    /// Factor to decrease lambda by when a step is accepted
    pub decrease_factor: f64,
}

impl Damping {
    /// Creates the damping state described by `config`.
    pub fn from_config(config: &LmConfig) -> Self {
        Self {
            lambda: config.initial_lambda,
            initial: config.initial_lambda,
            lambda_min: config.min_lambda,
            lambda_max: config.max_lambda,
            increase_factor: config.lambda_up_factor,
            decrease_factor: config.lambda_down_factor,
        }
    }

    /// Restores the initial value.
    pub fn reset(&mut self) {
        self.lambda = self.initial;
    }

    /// Records an accepted step.
    pub fn accept(&mut self) {
        self.lambda = (self.lambda * self.decrease_factor).max(self.lambda_min);
    }

    /// Records a rejected step.
    ///
    /// Returns false if λ was already at its maximum, in which case no
    /// further rejection can change the step.
    pub fn reject(&mut self) -> bool {
        if self.lambda >= self.lambda_max {
            return false;
        }
        self.lambda = (self.lambda * self.increase_factor).min(self.lambda_max);
        true
    }
}
