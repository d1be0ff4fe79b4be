//! Eagerly-validated configuration: every [`ConfigInvalid`](hibf_error::HibfError::ConfigInvalid)
//! condition from the error taxonomy is checked once, in [`ConfigBuilder::build`],
//! rather than discovered partway through a build.

use hibf_error::{HibfError, Result};
use hibf_types::next_multiple_of_64;

/// A fully-resolved, validated configuration. Construct via [`ConfigBuilder`].
#[derive(Debug, Clone)]
pub struct Config {
    pub number_of_user_bins: usize,
    pub number_of_hash_functions: usize,
    pub maximum_false_positive_rate: f64,
    pub relaxed_fpr: f64,
    pub threads: usize,
    pub sketch_bits: u8,
    /// Resolved: never `0` after construction.
    pub tmax: usize,
    pub alpha: f64,
    pub max_rearrangement_ratio: f64,
    pub disable_estimate_union: bool,
    pub disable_rearrangement: bool,
    pub empty_bin_fraction: f64,
}

impl Config {
    /// Starts a [`ConfigBuilder`] for `number_of_user_bins` user bins.
    #[must_use]
    pub fn builder(number_of_user_bins: usize) -> ConfigBuilder {
        ConfigBuilder::new(number_of_user_bins)
    }

    /// The number of technical bins the DP may actually place into at the
    /// top level, after reserving `empty_bin_fraction` of `tmax` as
    /// trailing headroom.
    #[must_use]
    pub fn effective_tmax(&self) -> usize {
        let reserved = (self.tmax as f64 * self.empty_bin_fraction).floor() as usize;
        self.tmax.saturating_sub(reserved).max(1)
    }
}

/// Builder for [`Config`]; mirrors §6.2's defaults.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    number_of_user_bins: usize,
    number_of_hash_functions: usize,
    maximum_false_positive_rate: f64,
    relaxed_fpr: f64,
    threads: usize,
    sketch_bits: u8,
    tmax: usize,
    alpha: f64,
    max_rearrangement_ratio: f64,
    disable_estimate_union: bool,
    disable_rearrangement: bool,
    empty_bin_fraction: f64,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new(number_of_user_bins: usize) -> Self {
        Self {
            number_of_user_bins,
            number_of_hash_functions: 2,
            maximum_false_positive_rate: 0.05,
            relaxed_fpr: 0.3,
            threads: 1,
            sketch_bits: 12,
            tmax: 0,
            alpha: 1.2,
            max_rearrangement_ratio: 0.5,
            disable_estimate_union: false,
            disable_rearrangement: false,
            empty_bin_fraction: 0.0,
        }
    }

    #[must_use]
    pub fn number_of_hash_functions(mut self, k: usize) -> Self {
        self.number_of_hash_functions = k;
        self
    }

    #[must_use]
    pub fn maximum_false_positive_rate(mut self, fpr: f64) -> Self {
        self.maximum_false_positive_rate = fpr;
        self
    }

    #[must_use]
    pub fn relaxed_fpr(mut self, fpr: f64) -> Self {
        self.relaxed_fpr = fpr;
        self
    }

    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    #[must_use]
    pub fn sketch_bits(mut self, bits: u8) -> Self {
        self.sketch_bits = bits;
        self
    }

    #[must_use]
    pub fn tmax(mut self, tmax: usize) -> Self {
        self.tmax = tmax;
        self
    }

    #[must_use]
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    #[must_use]
    pub fn max_rearrangement_ratio(mut self, ratio: f64) -> Self {
        self.max_rearrangement_ratio = ratio;
        self
    }

    #[must_use]
    pub fn disable_estimate_union(mut self, disable: bool) -> Self {
        self.disable_estimate_union = disable;
        self
    }

    #[must_use]
    pub fn disable_rearrangement(mut self, disable: bool) -> Self {
        self.disable_rearrangement = disable;
        self
    }

    #[must_use]
    pub fn empty_bin_fraction(mut self, fraction: f64) -> Self {
        self.empty_bin_fraction = fraction;
        self
    }

    /// Validates every field and resolves `tmax == 0` to
    /// `next_multiple_of_64(ceil(sqrt(U)))`, per §6.2.
    pub fn build(self) -> Result<Config> {
        if self.number_of_user_bins == 0 {
            return Err(HibfError::config_invalid("number_of_user_bins must be > 0"));
        }
        if !(self.maximum_false_positive_rate > 0.0 && self.maximum_false_positive_rate < 1.0) {
            return Err(HibfError::config_invalid(
                "maximum_false_positive_rate must lie in (0, 1)",
            ));
        }
        if self.number_of_hash_functions == 0 {
            return Err(HibfError::config_invalid("number_of_hash_functions must be > 0"));
        }
        if self.relaxed_fpr < self.maximum_false_positive_rate {
            return Err(HibfError::config_invalid(
                "relaxed_fpr must be >= maximum_false_positive_rate",
            ));
        }
        if !(5..=16).contains(&self.sketch_bits) {
            return Err(HibfError::config_invalid("sketch_bits must lie in [5, 16]"));
        }
        if self.tmax != 0 && self.tmax < 2 && self.number_of_user_bins > 1 {
            return Err(HibfError::config_invalid(
                "tmax must be at least 2 when number_of_user_bins > 1",
            ));
        }

        let tmax = if self.tmax == 0 {
            next_multiple_of_64((self.number_of_user_bins as f64).sqrt().ceil() as usize).max(64)
        } else {
            self.tmax
        };

        Ok(Config {
            number_of_user_bins: self.number_of_user_bins,
            number_of_hash_functions: self.number_of_hash_functions,
            maximum_false_positive_rate: self.maximum_false_positive_rate,
            relaxed_fpr: self.relaxed_fpr,
            threads: self.threads.max(1),
            sketch_bits: self.sketch_bits,
            tmax,
            alpha: self.alpha,
            max_rearrangement_ratio: self.max_rearrangement_ratio,
            disable_estimate_union: self.disable_estimate_union,
            disable_rearrangement: self.disable_rearrangement,
            empty_bin_fraction: self.empty_bin_fraction,
        })
    }
}
