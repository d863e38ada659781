//! Exponential decay models for transient signals.

use crate::error::{FitError, Result};
use crate::lanes::LaneVector;
use crate::model::{
    DifferentiableModel, FitModel, LaneDerivativesFn, LaneFn, LaneModel, ModelFn, VectorizedModel,
};
use crate::parameters::{Constraints, Parameter};

/// A single exponential decay.
///
/// The function is defined as:
///
/// f(t) = amplitude * exp(-t/tau)
///
/// Where:
/// - amplitude: signal at t = 0
/// - tau: the decay lifetime
#[derive(Debug, Clone)]
pub struct ExponentialDecay {
    parameters: Vec<Parameter>,
}

impl ExponentialDecay {
    /// Create a new single exponential decay model.
    pub fn new() -> Self {
        Self {
            parameters: vec![
                Parameter::new("A", 1.0),
                Parameter::with_constraints("tau", 1.0, Constraints::POSITIVE),
            ],
        }
    }

    /// Estimates `[amplitude, tau]` from data by linear regression of
    /// `ln(y)` against `t`.
    ///
    /// Only strictly positive samples take part. Returns an error if fewer
    /// than two remain or the data does not decay.
    pub fn guess(times: &[f64], signals: &[f64]) -> Result<Vec<f64>> {
        if times.len() != signals.len() {
            return Err(FitError::DimensionMismatch(format!(
                "Expected {} signals, got {}",
                times.len(),
                signals.len()
            )));
        }

        let points: Vec<(f64, f64)> = times
            .iter()
            .zip(signals)
            .filter(|(_, &y)| y > 0.0)
            .map(|(&t, &y)| (t, y.ln()))
            .collect();

        if points.len() < 2 {
            return Err(FitError::InvalidInput(
                "Need at least 2 positive samples for parameter guessing".to_string(),
            ));
        }

        let n = points.len() as f64;
        let sum_t: f64 = points.iter().map(|&(t, _)| t).sum();
        let sum_ln_y: f64 = points.iter().map(|&(_, ln_y)| ln_y).sum();
        let sum_t_ln_y: f64 = points.iter().map(|&(t, ln_y)| t * ln_y).sum();
        let sum_t2: f64 = points.iter().map(|&(t, _)| t * t).sum();

        let denominator = n * sum_t2 - sum_t * sum_t;
        if denominator.abs() < f64::EPSILON {
            return Err(FitError::InvalidInput(
                "Samples share a single time value".to_string(),
            ));
        }

        // ln(y) = ln(amplitude) - t/tau
        let slope = (n * sum_t_ln_y - sum_t * sum_ln_y) / denominator;
        let intercept = (sum_ln_y - slope * sum_t) / n;
        if slope >= 0.0 {
            return Err(FitError::InvalidInput(
                "Signal does not decay".to_string(),
            ));
        }

        Ok(vec![intercept.exp(), -1.0 / slope])
    }
}

impl Default for ExponentialDecay {
    fn default() -> Self {
        Self::new()
    }
}

impl FitModel for ExponentialDecay {
    fn name(&self) -> &str {
        "exponential"
    }

    fn description(&self) -> &str {
        "A * exp(-t / tau)"
    }

    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn function<'a>(&'a self, params: &'a [f64]) -> ModelFn<'a> {
        let (amplitude, tau) = (params[0], params[1]);
        Box::new(move |t| amplitude * (-t / tau).exp())
    }

    fn as_differentiable(&self) -> Option<&dyn DifferentiableModel> {
        Some(self)
    }

    fn as_vectorized(&self) -> Option<&dyn VectorizedModel> {
        Some(self)
    }
}

impl DifferentiableModel for ExponentialDecay {
    fn differentials_into(&self, params: &[f64], t: f64, out: &mut [f64]) {
        let (amplitude, tau) = (params[0], params[1]);
        let e = (-t / tau).exp();
        out[0] = e;
        out[1] = amplitude * e * t / (tau * tau);
    }
}

impl<V: LaneVector> LaneModel<V> for ExponentialDecay {
    fn lane_function<'a>(&'a self, params: &'a [f64]) -> LaneFn<'a, V> {
        let amplitude = V::splat(params[0]);
        let tau = V::splat(params[1]);
        Box::new(move |t| amplitude * (V::zero() - t / tau).exp())
    }

    fn lane_derivatives<'a>(&'a self, params: &'a [f64]) -> LaneDerivativesFn<'a, V> {
        let amplitude = V::splat(params[0]);
        let tau = V::splat(params[1]);
        let tau_sq = tau * tau;
        Box::new(move |t, out| {
            let e = (V::zero() - t / tau).exp();
            out[0] = e;
            out[1] = amplitude * e * t / tau_sq;
        })
    }
}

/// A sum of exponential decays on a constant offset.
///
/// The function is defined as:
///
/// f(t) = A1 * exp(-t/tau1) + ... + An * exp(-t/taun) + offset
///
/// Parameters are ordered `[A1, tau1, ..., An, taun, offset]`.
#[derive(Debug, Clone)]
pub struct MultiExponentialDecay {
    components: usize,
    parameters: Vec<Parameter>,
    description: String,
}

impl MultiExponentialDecay {
    /// Create a model with `components` exponential terms.
    ///
    /// # Errors
    ///
    /// Returns an error if `components` is zero.
    pub fn new(components: usize) -> Result<Self> {
        if components == 0 {
            return Err(FitError::InvalidInput(
                "A multi-exponential model needs at least one component".to_string(),
            ));
        }

        let mut parameters = Vec::with_capacity(2 * components + 1);
        let mut terms = Vec::with_capacity(components + 1);
        for k in 1..=components {
            parameters.push(Parameter::new(&format!("A{}", k), 1.0));
            parameters.push(Parameter::with_constraints(
                &format!("tau{}", k),
                10f64.powi(k as i32 - 1),
                Constraints::POSITIVE,
            ));
            terms.push(format!("A{k} * exp(-t / tau{k})"));
        }
        parameters.push(Parameter::new("offset", 0.0));
        terms.push("offset".to_string());

        Ok(Self {
            components,
            parameters,
            description: terms.join(" + "),
        })
    }

    /// Number of exponential components.
    pub fn components(&self) -> usize {
        self.components
    }
}

impl FitModel for MultiExponentialDecay {
    fn name(&self) -> &str {
        "multi-exponential"
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn function<'a>(&'a self, params: &'a [f64]) -> ModelFn<'a> {
        let offset = params[2 * self.components];
        Box::new(move |t| {
            params[..2 * self.components]
                .chunks_exact(2)
                .fold(offset, |acc, term| acc + term[0] * (-t / term[1]).exp())
        })
    }

    fn as_differentiable(&self) -> Option<&dyn DifferentiableModel> {
        Some(self)
    }

    fn as_vectorized(&self) -> Option<&dyn VectorizedModel> {
        Some(self)
    }
}

impl DifferentiableModel for MultiExponentialDecay {
    fn differentials_into(&self, params: &[f64], t: f64, out: &mut [f64]) {
        for k in 0..self.components {
            let (amplitude, tau) = (params[2 * k], params[2 * k + 1]);
            let e = (-t / tau).exp();
            out[2 * k] = e;
            out[2 * k + 1] = amplitude * e * t / (tau * tau);
        }
        out[2 * self.components] = 1.0;
    }
}

impl<V: LaneVector> LaneModel<V> for MultiExponentialDecay {
    fn lane_function<'a>(&'a self, params: &'a [f64]) -> LaneFn<'a, V> {
        let offset = V::splat(params[2 * self.components]);
        Box::new(move |t| {
            params[..2 * self.components]
                .chunks_exact(2)
                .fold(offset, |acc, term| {
                    acc + V::splat(term[0]) * (V::zero() - t / V::splat(term[1])).exp()
                })
        })
    }

    fn lane_derivatives<'a>(&'a self, params: &'a [f64]) -> LaneDerivativesFn<'a, V> {
        Box::new(move |t, out| {
            for k in 0..self.components {
                let amplitude = V::splat(params[2 * k]);
                let tau = V::splat(params[2 * k + 1]);
                let e = (V::zero() - t / tau).exp();
                out[2 * k] = e;
                out[2 * k + 1] = amplitude * e * t / (tau * tau);
            }
            out[2 * self.components] = V::splat(1.0);
        })
    }
}
