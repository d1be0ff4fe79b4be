//! Phase 1 of the build pipeline: invoke the user's hash callback once
//! per user bin to produce the HyperLogLog and MinHash sketches the
//! hierarchical binning DP (`hibf-binning`) needs, plus an exact k-mer
//! count per user bin.

use hashbrown::HashSet;
use hibf_error::Result;
use hibf_hll::HyperLogLog;
use hibf_minhash::MinHashes;
use hibf_types::UserBinId;

/// Delivers every hash a user bin should index. Implementors must be
/// reentrant: the builder calls `collect` once per user bin during
/// sketch computation and again during the fill step, possibly from
/// different threads.
pub trait InputSource: Send + Sync {
    fn collect(&self, user_bin: UserBinId, sink: &mut HashSet<u64>) -> Result<()>;
}

impl<F> InputSource for F
where
    F: Fn(UserBinId, &mut HashSet<u64>) -> Result<()> + Send + Sync,
{
    fn collect(&self, user_bin: UserBinId, sink: &mut HashSet<u64>) -> Result<()> {
        self(user_bin, sink)
    }
}

/// Per-user-bin sketches plus the exact k-mer count the DP prices splits
/// and merges against.
pub struct UserBinSketches {
    pub hll: Vec<HyperLogLog>,
    pub minhash: Vec<MinHashes>,
    pub kmer_counts: Vec<u64>,
}

/// Computes [`UserBinSketches`] for `user_bin_ids` by calling `input`
/// once per id into a scratch `HashSet`.
pub fn compute_sketches(
    user_bin_ids: &[UserBinId],
    sketch_bits: u8,
    input: &dyn InputSource,
) -> Result<UserBinSketches> {
    let mut hll = Vec::with_capacity(user_bin_ids.len());
    let mut minhash = Vec::with_capacity(user_bin_ids.len());
    let mut kmer_counts = Vec::with_capacity(user_bin_ids.len());

    for &user_bin in user_bin_ids {
        let mut hashes: HashSet<u64> = HashSet::new();
        input.collect(user_bin, &mut hashes)?;

        let mut sketch = HyperLogLog::new(sketch_bits);
        for &h in &hashes {
            sketch.add(h.into());
        }

        let mut sorted: Vec<u64> = hashes.iter().copied().collect();
        sorted.sort_unstable();

        hll.push(sketch);
        minhash.push(MinHashes::from_sorted_hashes(&sorted));
        kmer_counts.push(sorted.len() as u64);
    }

    Ok(UserBinSketches {
        hll,
        minhash,
        kmer_counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource(Vec<Vec<u64>>);

    impl InputSource for FixedSource {
        fn collect(&self, user_bin: UserBinId, sink: &mut HashSet<u64>) -> Result<()> {
            sink.extend(self.0[user_bin.as_usize()].iter().copied());
            Ok(())
        }
    }

    #[test]
    fn counts_match_distinct_hash_totals() {
        let source = FixedSource(vec![vec![1, 2, 3], vec![1, 2, 2, 2]]);
        let ids = [UserBinId::new(0), UserBinId::new(1)];
        let sketches = compute_sketches(&ids, 10, &source).expect("ok");
        assert_eq!(sketches.kmer_counts, vec![3, 2]);
        assert_eq!(sketches.hll.len(), 2);
        assert_eq!(sketches.minhash.len(), 2);
    }

    #[test]
    fn empty_user_bin_produces_empty_sketch() {
        let source = FixedSource(vec![vec![]]);
        let ids = [UserBinId::new(0)];
        let sketches = compute_sketches(&ids, 10, &source).expect("ok");
        assert_eq!(sketches.kmer_counts, vec![0]);
        assert!((sketches.hll[0].estimate()).abs() < 1e-9);
    }
}
