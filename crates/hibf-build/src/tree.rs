//! Phase 2 of the build pipeline: walk a [`Layout`] bottom-up, filling
//! one [`InterleavedBloomFilter`] per node and folding each node's exact
//! hash union into its parent (`update_parent_kmers`).

use crate::pool::Pool;
use crate::sketch::InputSource;
use hashbrown::HashMap as FastMap;
use hashbrown::HashSet;
use hibf_error::{HibfError, Result};
use hibf_ibf::InterleavedBloomFilter;
use hibf_layout::Layout;
use hibf_types::{div_ceil_usize, TechnicalBinId, UserBinId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Tunables the tree builder needs, shared read-only across every
/// recursive call and worker thread.
pub struct BuildParams {
    pub hash_count: usize,
    pub fpr: f64,
    /// `fpr_correction[s]`, shared with `hibf-binning`'s DP.
    pub fpr_correction: Vec<f64>,
    /// Precomputed once: `compute_relaxed_fpr_correction(fpr, relaxed_fpr, hash_count)`.
    pub relaxed_fpr_correction: f64,
    pub threads: usize,
}

/// One constructed IBF plus how its technical bins resolve: either to a
/// user bin directly, or to a nested child node (a merged bin).
pub struct HibfNode {
    pub ibf: InterleavedBloomFilter,
    pub technical_bin_to_user_bin: Vec<Option<UserBinId>>,
    pub children: FastMap<usize, HibfNode>,
}

/// Counters updated during a build; currently just the number of IBFs
/// materialized, read back for diagnostics/logging.
pub struct BuildStats {
    pub ibf_count: AtomicUsize,
}

impl BuildStats {
    fn new() -> Self {
        Self {
            ibf_count: AtomicUsize::new(0),
        }
    }
}

pub struct BuiltHibf {
    pub root: HibfNode,
    pub stats: BuildStats,
}

struct LayoutIndex {
    user_bins_by_path: FastMap<Vec<usize>, Vec<hibf_layout::UserBin>>,
    children_by_parent_path: FastMap<Vec<usize>, Vec<usize>>,
}

impl LayoutIndex {
    fn from_layout(layout: &Layout) -> Self {
        let mut user_bins_by_path: FastMap<Vec<usize>, Vec<hibf_layout::UserBin>> = FastMap::new();
        for ub in &layout.user_bins {
            user_bins_by_path.entry(ub.previous_tb_indices.clone()).or_default().push(ub.clone());
        }
        let mut children_by_parent_path: FastMap<Vec<usize>, Vec<usize>> = FastMap::new();
        for mb in &layout.max_bins {
            let mut parent = mb.previous_tb_indices.clone();
            if let Some(tb_id) = parent.pop() {
                children_by_parent_path.entry(parent).or_default().push(tb_id);
            }
        }
        Self {
            user_bins_by_path,
            children_by_parent_path,
        }
    }
}

type ChildBuild = Result<(usize, HibfNode, HashSet<u64>)>;

#[allow(clippy::too_many_arguments)]
fn build_node(
    path: Vec<usize>,
    index: Arc<LayoutIndex>,
    input: Arc<dyn InputSource>,
    params: Arc<BuildParams>,
    pool: Arc<Pool>,
    stats: Arc<BuildStats>,
) -> Result<(HibfNode, HashSet<u64>)> {
    let user_bins = index.user_bins_by_path.get(&path).cloned().unwrap_or_default();
    let child_tb_ids = index.children_by_parent_path.get(&path).cloned().unwrap_or_default();

    if user_bins.is_empty() && child_tb_ids.is_empty() {
        return Err(HibfError::layout_infeasible(format!(
            "no layout entries found at path {path:?}"
        )));
    }

    let child_jobs: Vec<Box<dyn FnOnce() -> ChildBuild + Send>> = child_tb_ids
        .iter()
        .map(|&tb_id| {
            let mut child_path = path.clone();
            child_path.push(tb_id);
            let index = Arc::clone(&index);
            let input = Arc::clone(&input);
            let params = Arc::clone(&params);
            let pool = Arc::clone(&pool);
            let stats = Arc::clone(&stats);
            Box::new(move || {
                build_node(child_path, index, input, params, pool, stats)
                    .map(|(node, union)| (tb_id, node, union))
            }) as Box<dyn FnOnce() -> ChildBuild + Send>
        })
        .collect();

    let child_results = pool.run_all(child_jobs);
    let mut children = Vec::with_capacity(child_results.len());
    for result in child_results {
        children.push(result?);
    }

    let mut leaf_hashes: Vec<(usize, usize, Vec<u64>, UserBinId)> = Vec::with_capacity(user_bins.len());
    for ub in &user_bins {
        let mut set: HashSet<u64> = HashSet::new();
        input.collect(ub.idx, &mut set)?;
        let mut sorted: Vec<u64> = set.into_iter().collect();
        sorted.sort_unstable();
        leaf_hashes.push((ub.storage_tb_id, ub.number_of_technical_bins, sorted, ub.idx));
    }

    let mut max_bin_size: u64 = 0;
    let mut bin_to_hashes: Vec<(usize, Vec<u64>)> = Vec::new();
    let mut tb_to_user_bin: Vec<(usize, UserBinId)> = Vec::new();

    for (storage_tb_id, splits, sorted, idx) in &leaf_hashes {
        let correction = params.fpr_correction.get(*splits).copied().unwrap_or(1.0);
        let chunk_size = div_ceil_usize(sorted.len(), *splits).max(1);
        for k in 0..*splits {
            tb_to_user_bin.push((storage_tb_id + k, *idx));
        }
        for (k, chunk) in sorted.chunks(chunk_size).enumerate() {
            let tb_id = storage_tb_id + k;
            let base_bits = hibf_fpr::bin_size_in_bits(params.fpr, params.hash_count, chunk.len());
            let bits = (base_bits as f64 * correction).ceil() as u64;
            max_bin_size = max_bin_size.max(bits);
            bin_to_hashes.push((tb_id, chunk.to_vec()));
        }
    }

    let mut node_union: HashSet<u64> = HashSet::new();
    let mut child_nodes: FastMap<usize, HibfNode> = FastMap::new();
    for (tb_id, node, union) in children {
        let base_bits = hibf_fpr::bin_size_in_bits(params.fpr, params.hash_count, union.len());
        let bits = (base_bits as f64 * params.relaxed_fpr_correction).ceil() as u64;
        max_bin_size = max_bin_size.max(bits);
        bin_to_hashes.push((tb_id, union.iter().copied().collect()));
        node_union.extend(union.iter().copied());
        child_nodes.insert(tb_id, node);
    }
    for (_, _, sorted, _) in &leaf_hashes {
        node_union.extend(sorted.iter().copied());
    }

    let max_used_id = bin_to_hashes
        .iter()
        .map(|(id, _)| *id)
        .chain(tb_to_user_bin.iter().map(|(id, _)| *id))
        .max()
        .unwrap_or(0);
    let bin_count = max_used_id + 1;
    let bin_size = (max_bin_size as usize).max(1);

    let mut ibf = InterleavedBloomFilter::new(bin_count, bin_size, params.hash_count);
    for (tb_id, hashes) in &bin_to_hashes {
        for &h in hashes {
            ibf.emplace(h, TechnicalBinId::new(*tb_id as u32));
        }
    }

    let mut technical_bin_to_user_bin = vec![None; ibf.bin_count()];
    for (tb_id, idx) in tb_to_user_bin {
        technical_bin_to_user_bin[tb_id] = Some(idx);
    }

    stats.ibf_count.fetch_add(1, Ordering::Relaxed);

    Ok((
        HibfNode {
            ibf,
            technical_bin_to_user_bin,
            children: child_nodes,
        },
        node_union,
    ))
}

/// Builds a full [`BuiltHibf`] from `layout`, calling `input` to gather
/// each user bin's exact hashes. Sibling subtrees build in parallel over
/// `params.threads` worker threads.
pub fn build(layout: &Layout, params: BuildParams, input: impl InputSource + 'static) -> Result<BuiltHibf> {
    let index = Arc::new(LayoutIndex::from_layout(layout));
    let input: Arc<dyn InputSource> = Arc::new(input);
    let params = Arc::new(params);
    let pool = Arc::new(Pool::new(params.threads));
    let stats = Arc::new(BuildStats::new());

    let (root, _root_union) = build_node(
        Vec::new(),
        index,
        input,
        Arc::clone(&params),
        Arc::clone(&pool),
        Arc::clone(&stats),
    )?;

    pool.shutdown();

    let stats = Arc::try_unwrap(stats).unwrap_or_else(|arc| BuildStats {
        ibf_count: AtomicUsize::new(arc.ibf_count.load(Ordering::Relaxed)),
    });

    Ok(BuiltHibf { root, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hibf_layout::UserBin;

    struct FixedSource(FastMap<u32, Vec<u64>>);

    impl InputSource for FixedSource {
        fn collect(&self, user_bin: UserBinId, sink: &mut HashSet<u64>) -> Result<()> {
            if let Some(values) = self.0.get(&user_bin.0) {
                sink.extend(values.iter().copied());
            }
            Ok(())
        }
    }

    fn flat_params(hash_count: usize) -> BuildParams {
        BuildParams {
            hash_count,
            fpr: 0.05,
            fpr_correction: vec![1.0; 65],
            relaxed_fpr_correction: 1.0,
            threads: 2,
        }
    }

    #[test]
    fn builds_single_level_layout_with_queryable_bins() {
        let layout = Layout {
            top_level_max_bin_id: 0,
            max_bins: Vec::new(),
            user_bins: vec![
                UserBin {
                    previous_tb_indices: vec![],
                    storage_tb_id: 0,
                    number_of_technical_bins: 1,
                    idx: UserBinId::new(0),
                },
                UserBin {
                    previous_tb_indices: vec![],
                    storage_tb_id: 1,
                    number_of_technical_bins: 1,
                    idx: UserBinId::new(1),
                },
            ],
        };

        let mut source = FastMap::new();
        source.insert(0u32, vec![1, 2, 3, 4, 5]);
        source.insert(1u32, vec![100, 200]);

        let built = build(&layout, flat_params(2), FixedSource(source)).expect("build succeeds");

        assert_eq!(built.root.ibf.bin_count(), 64);
        assert_eq!(built.stats.ibf_count.load(Ordering::Relaxed), 1);

        let mut agent = built.root.ibf.containment_agent();
        assert!(agent.bulk_contains(1).get(0));
        assert!(agent.bulk_contains(100).get(1));
        assert!(!agent.bulk_contains(1).get(1));

        assert_eq!(
            built.root.technical_bin_to_user_bin[0],
            Some(UserBinId::new(0))
        );
        assert_eq!(
            built.root.technical_bin_to_user_bin[1],
            Some(UserBinId::new(1))
        );
        assert!(built.root.children.is_empty());
    }

    #[test]
    fn builds_nested_layout_with_merged_bin_containing_union() {
        let layout = Layout {
            top_level_max_bin_id: 0,
            max_bins: vec![hibf_layout::MaxBin {
                previous_tb_indices: vec![0],
                id: 0,
            }],
            user_bins: vec![
                UserBin {
                    previous_tb_indices: vec![0],
                    storage_tb_id: 0,
                    number_of_technical_bins: 1,
                    idx: UserBinId::new(0),
                },
                UserBin {
                    previous_tb_indices: vec![0],
                    storage_tb_id: 1,
                    number_of_technical_bins: 1,
                    idx: UserBinId::new(1),
                },
            ],
        };

        let mut source = FastMap::new();
        source.insert(0u32, vec![1, 2, 3]);
        source.insert(1u32, vec![4, 5, 6]);

        let built = build(&layout, flat_params(2), FixedSource(source)).expect("build succeeds");

        assert!(built.root.children.contains_key(&0));
        let child = &built.root.children[&0];
        assert_eq!(built.stats.ibf_count.load(Ordering::Relaxed), 2);

        let mut root_agent = built.root.ibf.containment_agent();
        assert!(root_agent.bulk_contains(1).get(0));
        assert!(root_agent.bulk_contains(4).get(0));
        assert!(!root_agent.bulk_contains(1).get(1));

        let mut child_agent = child.ibf.containment_agent();
        assert!(child_agent.bulk_contains(1).get(0));
        assert!(child_agent.bulk_contains(4).get(1));
    }

    #[test]
    fn rejects_empty_layout_path() {
        let layout = Layout::new();
        let err = build(&layout, flat_params(2), FixedSource(FastMap::new())).unwrap_err();
        assert!(matches!(err, HibfError::LayoutInfeasible(_)));
    }
}
