//! Central finite differences for models without analytic derivatives.

use crate::model::FitModel;

/// Step used to perturb a parameter of value `value`.
///
/// Relative to the parameter's magnitude, with `rel_step` as an absolute
/// floor for parameters near zero.
pub fn step_size(value: f64, rel_step: f64) -> f64 {
    if value.abs() > rel_step {
        value.abs() * rel_step
    } else {
        rel_step
    }
}

/// Fills `out[i]` with `∂f/∂θ_index` at `times[i]` by central differences.
///
/// # Arguments
///
/// * `model` - The model to differentiate
/// * `params` - The parameter values at which to differentiate
/// * `index` - The parameter to perturb
/// * `rel_step` - Relative perturbation size
/// * `times` - The x values
/// * `out` - Output column, same length as `times`
pub fn central_column(
    model: &dyn FitModel,
    params: &[f64],
    index: usize,
    rel_step: f64,
    times: &[f64],
    out: &mut [f64],
) {
    let h = step_size(params[index], rel_step);

    let mut forward = params.to_vec();
    forward[index] += h;
    let mut backward = params.to_vec();
    backward[index] -= h;

    // The perturbation actually applied after rounding
    let span = forward[index] - backward[index];

    let f_forward = model.function(&forward);
    let f_backward = model.function(&backward);
    for (d, &t) in out.iter_mut().zip(times) {
        *d = (f_forward(t) - f_backward(t)) / span;
    }
}
