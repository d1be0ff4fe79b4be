//! Core type definitions shared across the HIBF crates.
//!
//! Keeping these in one leaf crate avoids every downstream crate agreeing on
//! a newtype shape by convention; `hibf-bitvector`, `hibf-ibf`, `hibf-layout`
//! and friends all depend on this crate and nothing else upstream.

pub mod hash;
pub mod ids;
pub mod timer;

pub use hash::H64;
pub use ids::{TechnicalBinId, UserBinId};
pub use timer::{ConcurrentTimer, SerialTimer};

/// Rounds `value` up to the next multiple of 64 (0 stays 0).
#[must_use]
pub const fn next_multiple_of_64(value: usize) -> usize {
    (value + 63) & !63
}

/// Ceiling division for unsigned integers: `ceil(numerator / denominator)`.
#[must_use]
pub const fn div_ceil_usize(numerator: usize, denominator: usize) -> usize {
    (numerator + denominator - 1) / denominator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_multiple_of_64_boundaries() {
        assert_eq!(next_multiple_of_64(0), 0);
        assert_eq!(next_multiple_of_64(1), 64);
        assert_eq!(next_multiple_of_64(64), 64);
        assert_eq!(next_multiple_of_64(65), 128);
    }

    #[test]
    fn div_ceil_matches_naive() {
        for n in 0..200usize {
            for d in 1..17usize {
                assert_eq!(div_ceil_usize(n, d), (n as f64 / d as f64).ceil() as usize);
            }
        }
    }
}
