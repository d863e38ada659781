//! Numeric lane vectors.
//!
//! A lane vector holds a fixed number of `f64` values matching the width of a
//! hardware SIMD register. The solver code is written once against the
//! [`LaneVector`] trait and instantiated for each width in a small closed set:
//!
//! | Type | Lanes | Hardware |
//! |------|-------|----------|
//! | [`Lane1`] | 1 | any (scalar fallback) |
//! | `wide::f64x2` | 2 | SSE2 / NEON |
//! | `wide::f64x4` | 4 | AVX |
//!
//! [`LaneWidth::detect`] probes the running CPU once and picks the widest
//! supported type.
//!
//! Only the arithmetic operators run on the vector registers. [`LaneVector::exp`]
//! goes through `f64::exp` one lane at a time, not `wide`'s own `exp`, so lane
//! results stay bit-identical to the scalar path.

mod scalar;
mod wide_lanes;

use std::fmt::Debug;
use std::ops::{Add, Deref, Div, Mul, Sub};

pub use scalar::Lane1;

/// Upper bound on the lane count of any implementation.
pub const MAX_LANES: usize = 8;

/// A fixed-width vector of `f64` lanes.
///
/// Values are `Copy` register-sized types, so arithmetic never allocates. The
/// `*_into` functions write into a caller-owned destination for hot loops that
/// keep a set of scratch vectors alive across iterations.
pub trait LaneVector:
    Copy
    + Debug
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
{
    /// Number of `f64` values per vector.
    const LANES: usize;

    /// Returns true if the running CPU exposes the instruction set this
    /// implementation is written for.
    fn is_supported() -> bool;

    /// Broadcasts `value` into every lane.
    fn splat(value: f64) -> Self;

    /// Builds a vector from exactly [`LANES`](Self::LANES) values.
    ///
    /// # Panics
    ///
    /// Panics if `values` is shorter than `LANES`.
    fn from_slice(values: &[f64]) -> Self;

    /// Writes every lane into `out[..LANES]`.
    fn write_to(self, out: &mut [f64]);

    /// Sums all lanes.
    fn sum(self) -> f64;

    /// Number of `f64` values per vector.
    fn capacity() -> usize {
        Self::LANES
    }

    /// A vector of zeros.
    fn zero() -> Self {
        Self::splat(0.0)
    }

    /// Builds a vector from up to `LANES` values, filling the remaining lanes
    /// with `fill`.
    fn from_partial(values: &[f64], fill: f64) -> Self {
        debug_assert!(values.len() <= Self::LANES);
        let mut buf = [fill; MAX_LANES];
        buf[..values.len()].copy_from_slice(values);
        Self::from_slice(&buf[..Self::LANES])
    }

    /// Copies the lanes into a stack buffer; only the first `LANES` entries
    /// are meaningful.
    fn to_buffer(self) -> [f64; MAX_LANES] {
        let mut buf = [0.0; MAX_LANES];
        self.write_to(&mut buf[..Self::LANES]);
        buf
    }

    /// Applies `f` to every lane.
    fn map<F: Fn(f64) -> f64>(self, f: F) -> Self {
        let mut buf = self.to_buffer();
        for value in buf[..Self::LANES].iter_mut() {
            *value = f(*value);
        }
        Self::from_slice(&buf[..Self::LANES])
    }

    /// Elementwise exponential.
    ///
    /// Evaluated lane by lane with `f64::exp` so every width produces results
    /// bit-identical to the scalar model function.
    fn exp(self) -> Self {
        self.map(f64::exp)
    }

    /// Dot product of two vectors.
    fn inner_product(self, other: Self) -> f64 {
        (self * other).sum()
    }

    /// `result = left + right`
    #[inline]
    fn add_into(left: Self, right: Self, result: &mut Self) {
        *result = left + right;
    }

    /// `result = left - right`
    #[inline]
    fn sub_into(left: Self, right: Self, result: &mut Self) {
        *result = left - right;
    }

    /// `result = left * right`
    #[inline]
    fn mul_into(left: Self, right: Self, result: &mut Self) {
        *result = left * right;
    }

    /// `result = left / right`
    #[inline]
    fn div_into(left: Self, right: Self, result: &mut Self) {
        *result = left / right;
    }

    /// `result = left + right` for a broadcast scalar `right`
    #[inline]
    fn add_scalar_into(left: Self, right: f64, result: &mut Self) {
        *result = left + Self::splat(right);
    }

    /// `result = left - right` for a broadcast scalar `right`
    #[inline]
    fn sub_scalar_into(left: Self, right: f64, result: &mut Self) {
        *result = left - Self::splat(right);
    }

    /// `result = left - right` for a broadcast scalar `left`
    #[inline]
    fn scalar_sub_into(left: f64, right: Self, result: &mut Self) {
        *result = Self::splat(left) - right;
    }

    /// `result = left * right` for a broadcast scalar `right`
    #[inline]
    fn mul_scalar_into(left: Self, right: f64, result: &mut Self) {
        *result = left * Self::splat(right);
    }

    /// `result = left / right` for a broadcast scalar `right`
    #[inline]
    fn div_scalar_into(left: Self, right: f64, result: &mut Self) {
        *result = left / Self::splat(right);
    }

    /// `result = left / right` for a broadcast scalar `left`
    #[inline]
    fn scalar_div_into(left: f64, right: Self, result: &mut Self) {
        *result = Self::splat(left) / right;
    }

    /// `result = exp(value)`
    #[inline]
    fn exp_into(value: Self, result: &mut Self) {
        *result = value.exp();
    }
}

/// A lane vector frozen at construction.
///
/// Only shared access is handed out, so operands such as the broadcast time
/// axis can be reused across every evaluation of a fit without being mutated.
#[derive(Debug, Clone, Copy)]
pub struct Frozen<V: LaneVector>(V);

impl<V: LaneVector> Frozen<V> {
    /// Freezes `value`.
    pub fn new(value: V) -> Self {
        Self(value)
    }

    /// Freezes a vector built from exactly `LANES` values.
    pub fn from_slice(values: &[f64]) -> Self {
        Self(V::from_slice(values))
    }

    /// Freezes a broadcast scalar.
    pub fn splat(value: f64) -> Self {
        Self(V::splat(value))
    }

    /// Returns a copy of the frozen value.
    pub fn get(&self) -> V {
        self.0
    }
}

impl<V: LaneVector> Deref for Frozen<V> {
    type Target = V;

    fn deref(&self) -> &V {
        &self.0
    }
}

/// The lane widths available to the SIMD solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LaneWidth {
    /// One lane, plain scalar arithmetic.
    Scalar,
    /// Two lanes (128-bit registers).
    X2,
    /// Four lanes (256-bit registers).
    X4,
}

impl LaneWidth {
    /// Picks the widest lane width the running CPU supports.
    pub fn detect() -> Self {
        if <wide::f64x4 as LaneVector>::is_supported() {
            LaneWidth::X4
        } else if <wide::f64x2 as LaneVector>::is_supported() {
            LaneWidth::X2
        } else {
            LaneWidth::Scalar
        }
    }

    /// Number of `f64` values per vector at this width.
    pub fn capacity(self) -> usize {
        match self {
            LaneWidth::Scalar => <Lane1 as LaneVector>::LANES,
            LaneWidth::X2 => <wide::f64x2 as LaneVector>::LANES,
            LaneWidth::X4 => <wide::f64x4 as LaneVector>::LANES,
        }
    }

    /// Returns true if this width uses hardware vector registers.
    pub fn is_vectorized(self) -> bool {
        self != LaneWidth::Scalar
    }
}
