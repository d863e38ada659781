//! Width-1 lane vector.

use super::LaneVector;
use std::ops::{Add, Div, Mul, Sub};

/// A single `f64` behind the [`LaneVector`] interface.
///
/// Lets the SIMD solver run on hardware without vector registers using the
/// same code path.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Lane1(pub f64);

impl Add for Lane1 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Lane1(self.0 + rhs.0)
    }
}

impl Sub for Lane1 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Lane1(self.0 - rhs.0)
    }
}

impl Mul for Lane1 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Lane1(self.0 * rhs.0)
    }
}

impl Div for Lane1 {
    type Output = Self;

    #[inline]
    fn div(self, rhs: Self) -> Self {
        Lane1(self.0 / rhs.0)
    }
}

impl LaneVector for Lane1 {
    const LANES: usize = 1;

    fn is_supported() -> bool {
        true
    }

    #[inline]
    fn splat(value: f64) -> Self {
        Lane1(value)
    }

    #[inline]
    fn from_slice(values: &[f64]) -> Self {
        Lane1(values[0])
    }

    #[inline]
    fn write_to(self, out: &mut [f64]) {
        out[0] = self.0;
    }

    #[inline]
    fn sum(self) -> f64 {
        self.0
    }

    #[inline]
    fn map<F: Fn(f64) -> f64>(self, f: F) -> Self {
        Lane1(f(self.0))
    }
}
