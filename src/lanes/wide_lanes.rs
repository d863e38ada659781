//! [`LaneVector`] implementations for the `wide` crate's `f64` vectors.
//!
//! `wide` picks the instruction set at compile time (SSE2/AVX on x86_64, NEON
//! on aarch64) and falls back to plain arrays elsewhere. `is_supported`
//! reports whether the running CPU actually has the matching registers.

use super::LaneVector;
use wide::{f64x2, f64x4};

impl LaneVector for f64x2 {
    const LANES: usize = 2;

    fn is_supported() -> bool {
        #[cfg(target_arch = "x86_64")]
        {
            std::arch::is_x86_feature_detected!("sse2")
        }
        #[cfg(target_arch = "aarch64")]
        {
            std::arch::is_aarch64_feature_detected!("neon")
        }
        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        {
            false
        }
    }

    #[inline]
    fn splat(value: f64) -> Self {
        f64x2::splat(value)
    }

    #[inline]
    fn from_slice(values: &[f64]) -> Self {
        f64x2::from([values[0], values[1]])
    }

    #[inline]
    fn write_to(self, out: &mut [f64]) {
        let lanes: [f64; 2] = self.into();
        out[..2].copy_from_slice(&lanes);
    }

    #[inline]
    fn sum(self) -> f64 {
        let lanes: [f64; 2] = self.into();
        lanes[0] + lanes[1]
    }
}

impl LaneVector for f64x4 {
    const LANES: usize = 4;

    fn is_supported() -> bool {
        #[cfg(target_arch = "x86_64")]
        {
            std::arch::is_x86_feature_detected!("avx")
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            false
        }
    }

    #[inline]
    fn splat(value: f64) -> Self {
        f64x4::splat(value)
    }

    #[inline]
    fn from_slice(values: &[f64]) -> Self {
        f64x4::from([values[0], values[1], values[2], values[3]])
    }

    #[inline]
    fn write_to(self, out: &mut [f64]) {
        let lanes: [f64; 4] = self.into();
        out[..4].copy_from_slice(&lanes);
    }

    #[inline]
    fn sum(self) -> f64 {
        let lanes: [f64; 4] = self.into();
        (lanes[0] + lanes[1]) + (lanes[2] + lanes[3])
    }
}
