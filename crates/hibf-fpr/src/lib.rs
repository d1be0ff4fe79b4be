//! False-positive-rate accounting: the per-bin size formula and the
//! correction tables that keep split/merged bins at the configured
//! overall FPR.
//!
//! The naive `ln(1 - f^(1/k))` form loses precision once `f` is small and
//! `1 - f^(1/k)` sits close to `1.0`; every formula here is reformulated
//! with `ln_1p`/`exp` to stay numerically stable at the default `fpr =
//! 0.05`.

use hibf_types::next_multiple_of_64;

/// Bits needed to store `elements` items at `fpr` false-positive rate
/// using `hash_count` hash functions, per the standard Bloom filter
/// sizing formula `ceil(-n*k / ln(1 - f^(1/k)))`.
#[must_use]
pub fn bin_size_in_bits(fpr: f64, hash_count: usize, elements: usize) -> usize {
    debug_assert!(hash_count > 0, "hash_count must be positive");
    debug_assert!(fpr > 0.0 && fpr < 1.0, "fpr must be in (0, 1)");

    let numerator = -((elements * hash_count) as f64);
    let denominator = (1.0 - (fpr.ln() / hash_count as f64).exp()).ln();
    (numerator / denominator).ceil() as usize
}

/// Per-split correction factors `f_h[s]`, `s` in `[1, next_multiple_of_64(t_max)]`,
/// such that an element logically split across `s` technical bins still
/// yields an overall false-positive rate `<= fpr`. `f_h[0]` is unused
/// (kept `0.0`), `f_h[1] == 1.0`, and the table is monotonically
/// non-decreasing.
#[must_use]
pub fn compute_fpr_correction(fpr: f64, hash_count: usize, t_max: usize) -> Vec<f64> {
    debug_assert!(fpr > 0.0 && fpr <= 1.0, "fpr must be in (0, 1]");
    debug_assert!(hash_count > 0, "hash_count must be positive");

    let max_tb = next_multiple_of_64(t_max);
    let mut correction = vec![0.0f64; max_tb + 1];
    if max_tb == 0 {
        return correction;
    }
    correction[1] = 1.0;

    let numerator = (-((fpr.ln() / hash_count as f64).exp())).ln_1p();

    for split in 2..=max_tb {
        let log_target_fpr = (-((-fpr).ln_1p() / split as f64).exp()).ln_1p();
        correction[split] = numerator / (-((log_target_fpr / hash_count as f64).exp())).ln_1p();
        debug_assert!(correction[split] >= 1.0);
    }

    correction
}

/// Correction factor for a merged bin allowed a relaxed false-positive
/// rate `relaxed_fpr >= fpr`: `c = ln(1 - fpr^(1/k)) / ln(1 -
/// relaxed_fpr^(1/k))`, always in `(0, 1]`.
#[must_use]
pub fn compute_relaxed_fpr_correction(fpr: f64, relaxed_fpr: f64, hash_count: usize) -> f64 {
    debug_assert!(fpr > 0.0 && fpr <= 1.0);
    debug_assert!(relaxed_fpr > 0.0 && relaxed_fpr <= 1.0);
    debug_assert!(hash_count > 0);
    debug_assert!(fpr <= relaxed_fpr);

    let numerator = (-((fpr.ln() / hash_count as f64).exp())).ln_1p();
    let denominator = (-((relaxed_fpr.ln() / hash_count as f64).exp())).ln_1p();
    let correction = numerator / denominator;
    debug_assert!(correction > 0.0 && correction <= 1.0);
    correction
}
