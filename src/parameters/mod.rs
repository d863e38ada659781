//! # Parameter Metadata
//!
//! Describes the scalar parameters of a fitting model and which of them are
//! held constant during a fit.
//!
//! - [`Parameter`]: name, constraint flags and initial value of one parameter
//! - [`Constraints`]: advisory flag set (integer, positive, non-negative)
//! - [`FixedColumns`]: parameter indices excluded from optimization for one fit
//!
//! ## Example Usage
//!
//! ```rust
//! use decayfit::parameters::{Constraints, FixedColumns, Parameter};
//!
//! let amplitude = Parameter::new("A", 100.0);
//! let lifetime = Parameter::with_constraints("tau", 50.0, Constraints::POSITIVE);
//! assert_eq!(lifetime.constraints().clamp(-3.0), f64::MIN_POSITIVE);
//!
//! // Hold the amplitude fixed
//! let fixed = FixedColumns::from_flags(&[true, false]);
//! assert!(fixed.contains(0));
//! assert_eq!(fixed.free_indices(2), vec![1]);
//! # let _ = amplitude;
//! ```

pub mod fixed;
pub mod parameter;

// Re-export key types
pub use fixed::FixedColumns;
pub use parameter::{initial_values, Constraints, Parameter};
