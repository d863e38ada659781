//! Levenberg-Marquardt solvers.
//!
//! Two solver flavors share one iteration driver ([`LmSolver`]):
//!
//! - [`ScalarSolver`] evaluates any [`FitModel`](crate::model::FitModel) one
//!   sample at a time, with analytic or finite-difference derivatives.
//! - [`SimdSolver`] evaluates a [`LaneModel`](crate::model::LaneModel) over
//!   lane-width groups of samples.
//!
//! Each iteration solves `(JᵀJ + λ·diag(JᵀJ)) δ = Jᵀr` over the free parameter
//! columns. A step that lowers χ² is accepted and λ shrinks; otherwise λ grows
//! and the step is recomputed from the same `JᵀJ` and `Jᵀr`.

pub mod config;
pub mod convergence;
pub mod damping;
pub mod finite_difference;
pub mod normal;
pub mod scalar;
pub mod simd;
pub mod solver;

pub use config::LmConfig;
pub use convergence::{ConvergenceCriteria, ConvergenceStatus};
pub use damping::Damping;
pub use normal::NormalEquations;
pub use scalar::{ScalarKernel, ScalarSolver};
pub use simd::{SimdKernel, SimdSolver};
pub use solver::{FitReport, LmSolver, ResidualKernel, Solver, SolverSetup};
