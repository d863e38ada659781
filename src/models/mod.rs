//! Built-in decay models.
//!
//! Every model here implements the scalar, analytic-derivative and vectorized
//! contracts, so it can run on either solver.

mod exponential;

pub use exponential::{ExponentialDecay, MultiExponentialDecay};
