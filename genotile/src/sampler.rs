//! Cache-dimension quantizers.
//!
//! A [`Sampler`] maps a continuous request parameter (sampling rate, track
//! height, ...) onto a discrete bucket so that nearby requests share a cache
//! entry. All samplers are pure: the same input always yields the same bucket.
//! The exponential and linear variants are monotonic non-decreasing in `x`.
//!
//! # Example
//!
//! ```
//! use genotile::sampler::Sampler;
//!
//! let zoom = Sampler::exponential(4, 1);
//! assert_eq!(zoom.sample(70.0), 64);
//! assert_eq!(zoom.sample(0.3), 1);
//!
//! let height = Sampler::fixed(0);
//! assert_eq!(height.sample(512.0), 0);
//! ```

use std::fmt;

/// Default base for [`Sampler::Exponential`].
pub const DEFAULT_EXPONENTIAL_BASE: u64 = 4;

/// Default step for [`Sampler::Linear`].
pub const DEFAULT_LINEAR_STEP: u64 = 4096;

/// Quantizes one cache dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampler {
    /// `max(min, k^floor(log_k(x)))`.
    Exponential { base: u64, min: u64 },

    /// Always `value`; collapses the dimension.
    Fixed { value: u64 },

    /// `max(min, floor(x / k) * k)`.
    Linear { step: u64, min: u64 },
}

impl Sampler {
    /// Powers of `base`, never below `min`.
    ///
    /// Bases below 2 are treated as 2.
    pub fn exponential(base: u64, min: u64) -> Self {
        Sampler::Exponential {
            base: base.max(2),
            min,
        }
    }

    /// A constant bucket.
    pub fn fixed(value: u64) -> Self {
        Sampler::Fixed { value }
    }

    /// Multiples of `step`, never below `min`.
    ///
    /// A zero step is treated as 1.
    pub fn linear(step: u64, min: u64) -> Self {
        Sampler::Linear {
            step: step.max(1),
            min,
        }
    }

    /// Map `x` to its bucket.
    ///
    /// Negative and NaN inputs fall into the lowest bucket.
    pub fn sample(&self, x: f64) -> u64 {
        match *self {
            Sampler::Exponential { base, min } => floor_to_power(x, base).max(min),
            Sampler::Fixed { value } => value,
            Sampler::Linear { step, min } => floor_to_multiple(x, step).max(min),
        }
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Sampler::exponential(DEFAULT_EXPONENTIAL_BASE, 1)
    }
}

impl fmt::Display for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sampler::Exponential { base, min } => write!(f, "exponential(k={}, min={})", base, min),
            Sampler::Fixed { value } => write!(f, "fixed({})", value),
            Sampler::Linear { step, min } => write!(f, "linear(k={}, min={})", step, min),
        }
    }
}

/// Largest power of `base` that is `<= x`, or 0 when `x < 1`.
///
/// Computed by repeated multiplication so that exact powers never round
/// down through a floating-point logarithm.
pub fn floor_to_power(x: f64, base: u64) -> u64 {
    if !(x >= 1.0) {
        return 0;
    }
    let base = base.max(2);
    let mut power: u64 = 1;
    while let Some(next) = power.checked_mul(base) {
        if next as f64 > x {
            break;
        }
        power = next;
    }
    power
}

/// Largest multiple of `step` that is `<= x`, or 0 when `x < step`.
pub fn floor_to_multiple(x: f64, step: u64) -> u64 {
    if !(x >= 0.0) {
        return 0;
    }
    let step = step.max(1);
    let multiples = (x / step as f64).floor();
    // float-to-int casts saturate, so huge inputs land in the top bucket
    (multiples as u64).saturating_mul(step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_floor_to_power_exact_powers() {
        assert_eq!(floor_to_power(1.0, 4), 1);
        assert_eq!(floor_to_power(4.0, 4), 4);
        assert_eq!(floor_to_power(64.0, 4), 64);
        assert_eq!(floor_to_power(1024.0, 2), 1024);
    }

    #[test]
    fn test_floor_to_power_between_powers() {
        assert_eq!(floor_to_power(63.9, 4), 16);
        assert_eq!(floor_to_power(65.0, 4), 64);
        assert_eq!(floor_to_power(3.0, 2), 2);
    }

    #[test]
    fn test_floor_to_power_below_one() {
        assert_eq!(floor_to_power(0.0, 4), 0);
        assert_eq!(floor_to_power(0.99, 4), 0);
        assert_eq!(floor_to_power(-5.0, 4), 0);
        assert_eq!(floor_to_power(f64::NAN, 4), 0);
    }

    #[test]
    fn test_floor_to_multiple() {
        assert_eq!(floor_to_multiple(0.0, 4096), 0);
        assert_eq!(floor_to_multiple(4095.0, 4096), 0);
        assert_eq!(floor_to_multiple(4096.0, 4096), 4096);
        assert_eq!(floor_to_multiple(10_000.0, 4096), 8192);
    }

    #[test]
    fn test_exponential_respects_min() {
        let sampler = Sampler::exponential(4, 16);
        assert_eq!(sampler.sample(1.0), 16);
        assert_eq!(sampler.sample(63.0), 16);
        assert_eq!(sampler.sample(64.0), 64);
    }

    #[test]
    fn test_linear_respects_min() {
        let sampler = Sampler::linear(4096, 4096);
        assert_eq!(sampler.sample(0.0), 4096);
        assert_eq!(sampler.sample(9000.0), 8192);
    }

    #[test]
    fn test_fixed_ignores_input() {
        let sampler = Sampler::fixed(7);
        assert_eq!(sampler.sample(0.0), 7);
        assert_eq!(sampler.sample(1e12), 7);
    }

    #[test]
    fn test_degenerate_parameters_are_normalised() {
        assert_eq!(Sampler::exponential(1, 1), Sampler::Exponential { base: 2, min: 1 });
        assert_eq!(Sampler::linear(0, 0), Sampler::Linear { step: 1, min: 0 });
    }

    #[test]
    fn test_display() {
        assert_eq!(Sampler::default().to_string(), "exponential(k=4, min=1)");
        assert_eq!(Sampler::fixed(0).to_string(), "fixed(0)");
    }

    proptest! {
        #[test]
        fn prop_exponential_is_monotonic(a in 0.0f64..1e9, b in 0.0f64..1e9, k in 2u64..10) {
            let sampler = Sampler::exponential(k, 1);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(sampler.sample(lo) <= sampler.sample(hi));
        }

        #[test]
        fn prop_linear_is_monotonic(a in 0.0f64..1e9, b in 0.0f64..1e9, k in 1u64..100_000) {
            let sampler = Sampler::linear(k, 0);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(sampler.sample(lo) <= sampler.sample(hi));
        }

        #[test]
        fn prop_buckets_never_exceed_input(x in 1.0f64..1e12, k in 2u64..10) {
            prop_assert!(floor_to_power(x, k) as f64 <= x);
            prop_assert!(floor_to_multiple(x, k) as f64 <= x);
        }

        #[test]
        fn prop_sampling_is_deterministic(x in -10.0f64..1e9) {
            let sampler = Sampler::default();
            prop_assert_eq!(sampler.sample(x), sampler.sample(x));
        }
    }
}
