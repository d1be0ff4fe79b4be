//! HyperLogLog cardinality sketches used to estimate k-mer set sizes and
//! unions without materializing the sets themselves.

use hibf_types::H64;

/// Lowest precision accepted by [`HyperLogLog::new`].
pub const MIN_PRECISION: u8 = 5;
/// Highest precision accepted by [`HyperLogLog::new`].
pub const MAX_PRECISION: u8 = 16;

/// A HyperLogLog cardinality sketch with `2^precision` 8-bit registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HyperLogLog {
    precision: u8,
    registers: Vec<u8>,
}

impl HyperLogLog {
    /// Creates an empty sketch. `precision` must be in `[5, 16]`.
    #[must_use]
    pub fn new(precision: u8) -> Self {
        assert!(
            (MIN_PRECISION..=MAX_PRECISION).contains(&precision),
            "precision {precision} out of range [{MIN_PRECISION}, {MAX_PRECISION}]"
        );
        Self {
            precision,
            registers: vec![0u8; 1usize << precision],
        }
    }

    /// The configured precision.
    #[must_use]
    pub const fn precision(&self) -> u8 {
        self.precision
    }

    /// Number of registers, `2^precision`.
    #[must_use]
    pub fn register_count(&self) -> usize {
        self.registers.len()
    }

    /// Folds one hash into the sketch. The top `precision` bits select the
    /// register; the register value is `1 + leading-zeros` of the
    /// remaining `64 - precision` bits, saturating at 255.
    pub fn add(&mut self, h: H64) {
        let (index, rho) = self.index_and_rho(h.get());
        let slot = &mut self.registers[index];
        *slot = (*slot).max(rho);
    }

    fn index_and_rho(&self, h: u64) -> (usize, u8) {
        let p = u32::from(self.precision);
        let index = (h >> (64 - p)) as usize;
        let width = 64 - p;
        let lower = if width == 0 { 0 } else { h << p >> p };
        let rho = (lower.leading_zeros() - p + 1).min(255) as u8;
        (index, rho)
    }

    /// Register-wise max merge; registers at the same index in both
    /// sketches take the larger value. Both sketches must share a
    /// precision.
    pub fn merge(&mut self, other: &HyperLogLog) {
        assert_eq!(self.precision, other.precision, "precision mismatch");
        for (a, b) in self.registers.iter_mut().zip(&other.registers) {
            *a = (*a).max(*b);
        }
    }

    /// `merge` followed by `estimate`, computed without an intermediate
    /// clone when called on an owned scratch sketch.
    #[must_use]
    pub fn merge_and_estimate(&self, other: &HyperLogLog) -> f64 {
        let mut scratch = self.clone();
        scratch.merge(other);
        scratch.estimate()
    }

    fn alpha_m(m: f64) -> f64 {
        match m as u64 {
            16 => 0.673,
            32 => 0.697,
            64 => 0.709,
            _ => 0.7213 / (1.0 + 1.079 / m),
        }
    }

    /// Estimates the cardinality of the set folded into this sketch.
    ///
    /// Uses the standard alpha_m-corrected harmonic-mean estimator, with
    /// linear counting for small cardinalities; this implementation skips
    /// the classic large-range (2^32) correction entirely, since with
    /// 64-bit hashes and p <= 16 the raw estimate never approaches that
    /// regime.
    #[must_use]
    pub fn estimate(&self) -> f64 {
        let m = self.registers.len() as f64;
        let alpha_m = Self::alpha_m(m);
        let sum: f64 = self.registers.iter().map(|&r| 2f64.powi(-i32::from(r))).sum();
        let raw = alpha_m * m * m / sum;

        let zero_registers = self.registers.iter().filter(|&&r| r == 0).count();
        if raw <= 2.5 * m && zero_registers > 0 {
            m * (m / zero_registers as f64).ln()
        } else {
            raw
        }
    }
}
