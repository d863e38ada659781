//! Fitting model contracts.
//!
//! A model is split into capability traits instead of one interface with
//! optional members:
//!
//! - [`FitModel`]: name, description, parameter list and the scalar function
//!   `f(x; θ)`. Every model implements it.
//! - [`DifferentiableModel`]: analytic partial derivatives `∂f/∂θⱼ`. Without
//!   it the scalar solver falls back to central finite differences.
//! - [`LaneModel`] / [`VectorizedModel`]: the function and all derivatives
//!   evaluated over a whole [`LaneVector`] of x values. Required by the SIMD
//!   solver.
//!
//! A model advertises its optional capabilities through
//! [`FitModel::as_differentiable`] and [`FitModel::as_vectorized`], which is
//! what the solver factory inspects.

use crate::lanes::{Lane1, LaneVector};
use crate::parameters::Parameter;
use wide::{f64x2, f64x4};

/// Scalar model function for a fixed parameter vector.
pub type ModelFn<'a> = Box<dyn Fn(f64) -> f64 + Send + Sync + 'a>;

/// Lane-wise model function for a fixed parameter vector.
pub type LaneFn<'a, V> = Box<dyn Fn(V) -> V + Send + Sync + 'a>;

/// Lane-wise derivatives for a fixed parameter vector.
///
/// Called as `derivatives(x, out)`; writes `∂f/∂θⱼ` for every lane into
/// `out[j]`, with `out.len()` equal to the parameter count.
pub type LaneDerivativesFn<'a, V> = Box<dyn Fn(V, &mut [V]) + Send + Sync + 'a>;

/// A named parametric model `y = f(x; θ)`.
///
/// Models are shared read-only between worker threads, so implementations
/// must not keep mutable per-call state.
pub trait FitModel: Send + Sync {
    /// Short name of the model.
    fn name(&self) -> &str;

    /// Human readable description, usually the formula.
    fn description(&self) -> &str;

    /// The parameters, in the order used by every parameter vector.
    fn parameters(&self) -> &[Parameter];

    /// Returns the model function evaluated with `params`.
    fn function<'a>(&'a self, params: &'a [f64]) -> ModelFn<'a>;

    /// Number of parameters.
    fn parameter_count(&self) -> usize {
        self.parameters().len()
    }

    /// Returns the analytic derivative capability, if implemented.
    fn as_differentiable(&self) -> Option<&dyn DifferentiableModel> {
        None
    }

    /// Returns the vectorized capability, if implemented.
    fn as_vectorized(&self) -> Option<&dyn VectorizedModel> {
        None
    }

    /// Evaluates the model at every `x` into `out`.
    fn evaluate(&self, params: &[f64], x: &[f64], out: &mut [f64]) {
        let f = self.function(params);
        for (y, &xi) in out.iter_mut().zip(x) {
            *y = f(xi);
        }
    }
}

/// A model with analytic partial derivatives.
pub trait DifferentiableModel: FitModel {
    /// Writes `∂f/∂θⱼ` evaluated at `x` into `out[j]`.
    fn differentials_into(&self, params: &[f64], x: f64, out: &mut [f64]);

    /// Returns `∂f/∂θⱼ` evaluated at `x`, one entry per parameter.
    fn compute_differentials(&self, params: &[f64], x: f64) -> Vec<f64> {
        let mut out = vec![0.0; self.parameter_count()];
        self.differentials_into(params, x, &mut out);
        out
    }
}

/// A model evaluated over a full lane vector of x values at once.
pub trait LaneModel<V: LaneVector>: FitModel {
    /// Returns the lane-wise model function evaluated with `params`.
    fn lane_function<'a>(&'a self, params: &'a [f64]) -> LaneFn<'a, V>;

    /// Returns the lane-wise derivatives evaluated with `params`.
    fn lane_derivatives<'a>(&'a self, params: &'a [f64]) -> LaneDerivativesFn<'a, V>;
}

/// A model implementing [`LaneModel`] for every supported lane width.
///
/// Implemented automatically; a model only needs a generic
/// `impl<V: LaneVector> LaneModel<V> for MyModel`.
pub trait VectorizedModel: LaneModel<Lane1> + LaneModel<f64x2> + LaneModel<f64x4> {}

impl<T> VectorizedModel for T where T: LaneModel<Lane1> + LaneModel<f64x2> + LaneModel<f64x4> {}
