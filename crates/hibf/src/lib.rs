//! A hierarchical interleaved Bloom filter index over `U` user bins.
//!
//! [`Hibf::build`] runs the full pipeline: sketch computation
//! (`hibf-build::compute_sketches`), hierarchical layout planning
//! (`hibf-binning::hierarchical_binning`), and bottom-up IBF construction
//! (`hibf-build::build`). [`Hibf::query`] runs a threshold membership
//! query over the result (`hibf-query`).

pub mod config;
pub mod inserter;

pub use config::{Config, ConfigBuilder};
pub use hibf_binning::{HierarchicalBinningConfig, HierarchicalBinningResult};
pub use hibf_build::{BuildStats, BuiltHibf, HibfNode};
pub use hibf_error::{HibfError, Result};
pub use hibf_hll::HyperLogLog;
pub use hibf_ibf::InterleavedBloomFilter;
pub use hibf_layout::{text, MaxBin, UserBin};
pub use hibf_layout::Layout;
pub use hibf_query::QueryAgent;
pub use hibf_types::{TechnicalBinId, UserBinId, H64};
pub use inserter::Inserter;

use hashbrown::HashSet;
use hibf_build::InputSource;
use std::sync::Arc;

struct ClosureSource<F: ?Sized> {
    input_fn: Arc<F>,
}

impl<F> InputSource for ClosureSource<F>
where
    F: Fn(UserBinId, &mut Inserter) + Send + Sync + ?Sized,
{
    fn collect(&self, user_bin: UserBinId, sink: &mut HashSet<u64>) -> Result<()> {
        let mut inserter = Inserter::from_hash_set(sink);
        (self.input_fn)(user_bin, &mut inserter);
        Ok(())
    }
}

/// A built index: a validated [`Config`] plus the resulting forest of
/// IBFs, ready to query.
pub struct Hibf {
    config: Config,
    built: BuiltHibf,
}

impl Hibf {
    /// Runs sketch computation, layout planning and construction,
    /// calling `input_fn` once per user bin in each of the two phases
    /// (it must be reentrant, per §6.1).
    #[tracing::instrument(skip(config, input_fn), fields(user_bins = config.number_of_user_bins))]
    pub fn build<F>(config: Config, input_fn: F) -> Result<Self>
    where
        F: Fn(UserBinId, &mut Inserter) + Send + Sync + 'static,
    {
        let input_fn = Arc::new(input_fn);
        let ids: Vec<UserBinId> = (0..config.number_of_user_bins as u32).map(UserBinId::new).collect();

        let sketch_source = ClosureSource {
            input_fn: Arc::clone(&input_fn),
        };
        let sketches = hibf_build::compute_sketches(&ids, config.sketch_bits, &sketch_source)?;

        let fpr_correction = hibf_fpr::compute_fpr_correction(
            config.maximum_false_positive_rate,
            config.number_of_hash_functions,
            config.tmax,
        );
        let relaxed_fpr_correction = hibf_fpr::compute_relaxed_fpr_correction(
            config.maximum_false_positive_rate,
            config.relaxed_fpr,
            config.number_of_hash_functions,
        );

        let binning_config = HierarchicalBinningConfig {
            t_max: config.effective_tmax(),
            alpha: config.alpha,
            fpr_correction: fpr_correction.clone(),
            relaxed_fpr_correction,
            disable_estimate_union: config.disable_estimate_union,
            disable_rearrangement: config.disable_rearrangement,
            max_rearrangement_ratio: config.max_rearrangement_ratio,
        };
        let planned = hibf_binning::hierarchical_binning(&ids, &sketches.kmer_counts, &sketches.hll, &binning_config)?;

        let layout = Layout {
            top_level_max_bin_id: planned.top_level_max_bin_id,
            max_bins: planned.max_bins,
            user_bins: planned.user_bins,
        };

        let build_params = hibf_build::BuildParams {
            hash_count: config.number_of_hash_functions,
            fpr: config.maximum_false_positive_rate,
            fpr_correction,
            relaxed_fpr_correction,
            threads: config.threads,
        };
        let fill_source = ClosureSource { input_fn };
        let built = hibf_build::build(&layout, build_params, fill_source)?;

        Ok(Self { config, built })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn built(&self) -> &BuiltHibf {
        &self.built
    }

    /// One-shot membership query; prefer [`Hibf::query_agent`] for many
    /// queries against the same index.
    #[must_use]
    pub fn query(&self, hashes: &[u64], threshold: u32) -> Vec<UserBinId> {
        hibf_query::query::<u32>(&self.built, hashes, threshold)
    }

    /// Builds a reusable [`QueryAgent`] sharing this index's underlying
    /// IBFs, avoiding per-query scratch allocation.
    #[must_use]
    pub fn query_agent(&self) -> QueryAgent<'_, u32> {
        QueryAgent::new(&self.built.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn builds_and_queries_a_small_index() {
        let config = Config::builder(4).number_of_hash_functions(2).threads(2).build().expect("valid config");

        let data: Vec<Vec<u64>> = vec![vec![1, 2, 3], vec![4, 5, 6], vec![7, 8, 9], vec![10, 11, 12]];
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_for_fn = Arc::clone(&calls);
        let data_for_fn = data.clone();
        let hibf = Hibf::build(config, move |user_bin, inserter| {
            calls_for_fn.fetch_add(1, Ordering::Relaxed);
            for &h in &data_for_fn[user_bin.as_usize()] {
                inserter.emit(h);
            }
        })
        .expect("build succeeds");

        // Called once per user bin in each of the two phases.
        assert_eq!(calls.load(Ordering::Relaxed), 8);

        let hits = hibf.query(&[4, 5], 2);
        assert_eq!(hits, vec![UserBinId::new(1)]);

        let none = hibf.query(&[9999], 1);
        assert!(none.is_empty());
    }

    #[test]
    fn rejects_invalid_config_before_any_callback_runs() {
        let err = Config::builder(0).build().unwrap_err();
        assert!(matches!(err, HibfError::ConfigInvalid(_)));
    }
}
