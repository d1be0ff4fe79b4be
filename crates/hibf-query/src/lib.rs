//! Membership queries over a built HIBF (`hibf-build::BuiltHibf`).
//!
//! A query starts at the root IBF's counting agent. Bins whose count
//! clears the threshold either resolve directly to a [`UserBinId`] (a
//! single or split user bin) or recurse into a merged bin's child IBF
//! with the same query set. [`QueryAgent`] mirrors the build tree and
//! caches one `hibf-ibf` agent per node so repeated queries reuse their
//! scratch buffers.

use hibf_bitvector::Counter;
use hibf_build::{BuiltHibf, HibfNode};
use hibf_ibf::MembershipAgent;
use hibf_types::UserBinId;
use std::collections::HashMap;

/// A query agent mirroring one [`HibfNode`] and its children, each
/// holding its own `hibf-ibf` membership agent.
pub struct QueryAgent<'h, T: Counter> {
    agent: MembershipAgent<'h, T>,
    technical_bin_to_user_bin: &'h [Option<UserBinId>],
    children: HashMap<usize, QueryAgent<'h, T>>,
}

impl<'h, T: Counter> QueryAgent<'h, T> {
    /// Builds an agent tree mirroring `node`, one `hibf-ibf` membership
    /// agent per (possibly nested) IBF.
    #[must_use]
    pub fn new(node: &'h HibfNode) -> Self {
        let children = node
            .children
            .iter()
            .map(|(&tb_id, child)| (tb_id, QueryAgent::new(child)))
            .collect();
        Self {
            agent: node.ibf.membership_agent::<T>(),
            technical_bin_to_user_bin: &node.technical_bin_to_user_bin,
            children,
        }
    }

    /// Returns every [`UserBinId`] whose estimated count over `hashes`
    /// is `>= threshold`, in ascending order.
    ///
    /// A threshold of zero short-circuits: every user bin reachable from
    /// this node is returned without running any counting query.
    pub fn query(&mut self, hashes: &[u64], threshold: T) -> Vec<UserBinId> {
        let mut results = Vec::new();
        if threshold == T::default() {
            self.collect_all(&mut results);
        } else {
            self.query_into(hashes, threshold, &mut results);
        }
        results.sort_unstable();
        results
    }

    fn query_into(&mut self, hashes: &[u64], threshold: T, out: &mut Vec<UserBinId>) {
        let hits = self.agent.membership_for(hashes.iter().copied(), threshold);
        let mut merged_hits: Vec<usize> = Vec::new();
        for &bin in hits {
            match self.technical_bin_to_user_bin.get(bin).copied().flatten() {
                Some(user_bin) => out.push(user_bin),
                None => merged_hits.push(bin),
            }
        }
        for bin in merged_hits {
            if let Some(child) = self.children.get_mut(&bin) {
                child.query_into(hashes, threshold, out);
            }
        }
    }

    fn collect_all(&self, out: &mut Vec<UserBinId>) {
        out.extend(self.technical_bin_to_user_bin.iter().flatten().copied());
        for child in self.children.values() {
            child.collect_all(out);
        }
    }
}

/// One-shot convenience wrapper: builds a fresh [`QueryAgent`] over
/// `built` and runs a single query. Prefer [`QueryAgent`] directly when
/// issuing many queries against the same index.
pub fn query<T: Counter>(built: &BuiltHibf, hashes: &[u64], threshold: T) -> Vec<UserBinId> {
    QueryAgent::new(&built.root).query(hashes, threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::HashMap as FastMap;
    use hashbrown::HashSet;
    use hibf_build::{build, BuildParams, InputSource};
    use hibf_error::Result;
    use hibf_layout::{Layout, MaxBin, UserBin};

    struct FixedSource(FastMap<u32, Vec<u64>>);

    impl InputSource for FixedSource {
        fn collect(&self, user_bin: UserBinId, sink: &mut HashSet<u64>) -> Result<()> {
            if let Some(values) = self.0.get(&user_bin.0) {
                sink.extend(values.iter().copied());
            }
            Ok(())
        }
    }

    fn flat_params() -> BuildParams {
        BuildParams {
            hash_count: 2,
            fpr: 0.05,
            fpr_correction: vec![1.0; 65],
            relaxed_fpr_correction: 1.0,
            threads: 2,
        }
    }

    #[test]
    fn finds_hits_in_flat_layout() {
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
        let built = build(&layout, flat_params(), FixedSource(source)).expect("build succeeds");

        let hits = query::<u8>(&built, &[1, 2], 2);
        assert_eq!(hits, vec![UserBinId::new(0)]);

        let none = query::<u8>(&built, &[999], 1);
        assert!(none.is_empty());
    }

    #[test]
    fn recurses_into_merged_bin() {
        let layout = Layout {
            top_level_max_bin_id: 0,
            max_bins: vec![MaxBin {
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
        let built = build(&layout, flat_params(), FixedSource(source)).expect("build succeeds");

        let hits = query::<u8>(&built, &[4, 5], 2);
        assert_eq!(hits, vec![UserBinId::new(1)]);
    }

    #[test]
    fn zero_threshold_short_circuits_to_every_user_bin() {
        let layout = Layout {
            top_level_max_bin_id: 0,
            max_bins: vec![MaxBin {
                previous_tb_indices: vec![0],
                id: 0,
            }],
            user_bins: vec![
                UserBin {
                    previous_tb_indices: vec![],
                    storage_tb_id: 1,
                    number_of_technical_bins: 1,
                    idx: UserBinId::new(0),
                },
                UserBin {
                    previous_tb_indices: vec![0],
                    storage_tb_id: 0,
                    number_of_technical_bins: 1,
                    idx: UserBinId::new(1),
                },
            ],
        };
        let mut source = FastMap::new();
        source.insert(0u32, vec![1]);
        source.insert(1u32, vec![2]);
        let built = build(&layout, flat_params(), FixedSource(source)).expect("build succeeds");

        let hits = query::<u8>(&built, &[], 0);
        assert_eq!(hits, vec![UserBinId::new(0), UserBinId::new(1)]);
    }
}
