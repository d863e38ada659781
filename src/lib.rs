//! # decayfit
//!
//! `decayfit` fits parametric decay models to transient signals with the
//! Levenberg-Marquardt algorithm, across many datasets at once.
//!
//! The library provides:
//! - Capability traits for fitting models: scalar, analytically
//!   differentiable, and vectorized over SIMD lanes
//! - A scalar Levenberg-Marquardt solver with finite-difference fallback
//! - A lane-batched solver evaluating the model over SIMD-width groups
//! - A batch orchestrator fitting one model to many datasets in parallel
//!
//! ## Basic Usage
//!
//! ```
//! use decayfit::lm::{LmConfig, ScalarSolver, Solver};
//! use decayfit::models::ExponentialDecay;
//! use decayfit::parameters::FixedColumns;
//!
//! let times: Vec<f64> = (0..100).map(|i| i as f64 * 5.0).collect();
//! let signals: Vec<f64> = times.iter().map(|t| 100.0 * (-t / 50.0).exp()).collect();
//!
//! let model = ExponentialDecay::new();
//! let mut solver = ScalarSolver::new(
//!     &model,
//!     &times,
//!     0..times.len(),
//!     &FixedColumns::none(),
//!     LmConfig::default(),
//! )?;
//! solver.initialize(&signals, &[80.0, 70.0])?;
//! solver.fit()?;
//!
//! assert!((solver.parameters()[1] - 50.0).abs() < 1e-6);
//! # Ok::<(), decayfit::FitError>(())
//! ```

// Public modules
pub mod error;

// Parameter system
pub mod parameters;

pub mod lanes;
pub mod lm;
pub mod model;
pub mod models;
pub mod orchestrator;
pub mod series;

// Re-exports for convenience
pub use error::{FitError, Result};
pub use lm::{ConvergenceStatus, FitReport, LmConfig, ScalarSolver, SimdSolver, Solver};
pub use model::{DifferentiableModel, FitModel, LaneModel, VectorizedModel};
pub use orchestrator::{BatchOutcome, DatasetStore, FitOrchestrator, FitSettings};
pub use series::ObservedSeries;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
