//! Observed transient series.

use crate::error::{FitError, Result};
use std::ops::Range;

/// Checks that `range` lies inside a series of `len` samples.
pub fn check_range(range: &Range<usize>, len: usize) -> Result<()> {
    if range.start > range.end || range.end > len {
        return Err(FitError::InvalidRange {
            start: range.start,
            end: range.end,
            len,
        });
    }
    Ok(())
}

/// Paired time and signal arrays with the window of samples used in a fit.
///
/// Samples outside `range` (e.g. pre-trigger noise) take no part in residual
/// computation.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedSeries {
    times: Vec<f64>,
    signals: Vec<f64>,
    range: Range<usize>,
}

impl ObservedSeries {
    /// Creates a series whose active range covers every sample.
    pub fn new(times: Vec<f64>, signals: Vec<f64>) -> Result<Self> {
        let len = times.len();
        Self::with_range(times, signals, 0..len)
    }

    /// Creates a series with an explicit active range.
    ///
    /// # Errors
    ///
    /// Returns an error if the arrays differ in length or the range does not
    /// fit inside them.
    pub fn with_range(times: Vec<f64>, signals: Vec<f64>, range: Range<usize>) -> Result<Self> {
        if times.len() != signals.len() {
            return Err(FitError::DimensionMismatch(format!(
                "Expected {} signals to match the time axis, got {}",
                times.len(),
                signals.len()
            )));
        }
        check_range(&range, times.len())?;
        Ok(Self {
            times,
            signals,
            range,
        })
    }

    /// Moves the active range.
    pub fn set_range(&mut self, range: Range<usize>) -> Result<()> {
        check_range(&range, self.times.len())?;
        self.range = range;
        Ok(())
    }

    /// All time values.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// All signal values.
    pub fn signals(&self) -> &[f64] {
        &self.signals
    }

    /// The active index window.
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// Time values inside the active range.
    pub fn active_times(&self) -> &[f64] {
        &self.times[self.range.clone()]
    }

    /// Signal values inside the active range.
    pub fn active_signals(&self) -> &[f64] {
        &self.signals[self.range.clone()]
    }

    /// Total number of samples.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Returns true if the series has no samples.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}
