use thiserror::Error;

/// Error types for the decayfit library.
///
/// Only configuration problems are errors. A singular normal-equations matrix
/// is handled inside the solver by raising the damping parameter, and running
/// out of iterations is reported through
/// [`ConvergenceStatus`](crate::lm::ConvergenceStatus).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    /// Error indicating a mismatch in array lengths.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// The active range does not fit inside the series.
    #[error("Invalid range: {start}..{end} for a series of length {len}")]
    InvalidRange {
        start: usize,
        end: usize,
        len: usize,
    },

    /// A fixed column index points past the parameter vector.
    #[error("Fixed column {index} is out of range for {count} parameters")]
    FixedColumnOutOfRange { index: usize, count: usize },

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid state in the solver.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias for decayfit operations.
pub type Result<T> = std::result::Result<T, FitError>;
