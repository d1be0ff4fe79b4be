//! The interleaved Bloom filter: `B` technical bins sharing `m`
//! hash-position rows, bit-packed so that all `B` bins at a given row
//! occupy `ceil(B/64)` contiguous words.

pub mod binary;
mod mixing;

use hibf_bitvector::{BitVector, Counter, CountingVector};
use hibf_types::{next_multiple_of_64, TechnicalBinId};

/// A bit-packed interleaved Bloom filter with `bin_count` technical bins,
/// each a `bin_size`-bit Bloom filter with `hash_count` hash functions.
#[derive(Debug, Clone)]
pub struct InterleavedBloomFilter {
    bin_count: usize,
    allocated_bin_count: usize,
    words_per_row: usize,
    bin_size: usize,
    hash_count: usize,
    words: Vec<u64>,
    generation: u64,
}

impl InterleavedBloomFilter {
    /// Builds an empty filter. `bin_count` is rounded up to the next
    /// multiple of 64.
    #[must_use]
    pub fn new(bin_count: usize, bin_size: usize, hash_count: usize) -> Self {
        assert!(hash_count > 0, "hash_count must be positive");
        let bin_count = next_multiple_of_64(bin_count.max(1));
        let words_per_row = bin_count / 64;
        Self {
            bin_count,
            allocated_bin_count: bin_count,
            words_per_row,
            bin_size,
            hash_count,
            words: vec![0u64; words_per_row * bin_size],
            generation: 0,
        }
    }

    #[must_use]
    pub const fn bin_count(&self) -> usize {
        self.bin_count
    }

    #[must_use]
    pub const fn bin_size(&self) -> usize {
        self.bin_size
    }

    #[must_use]
    pub const fn hash_count(&self) -> usize {
        self.hash_count
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    fn row_index(&self, hash: u64, hash_position: usize) -> usize {
        (mixing::hash_i(hash, hash_position) % self.bin_size as u64) as usize
    }

    fn row_words(&self, row: usize) -> &[u64] {
        let start = row * self.words_per_row;
        &self.words[start..start + self.words_per_row]
    }

    fn row_words_mut(&mut self, row: usize) -> &mut [u64] {
        let start = row * self.words_per_row;
        &mut self.words[start..start + self.words_per_row]
    }

    /// Inserts `hash` into `bin` by setting one bit in each of the
    /// `hash_count` rows.
    pub fn emplace(&mut self, hash: u64, bin: TechnicalBinId) {
        assert!(bin.as_usize() < self.bin_count, "bin index out of range");
        let word_col = bin.as_usize() / 64;
        let bit = bin.as_usize() % 64;
        for i in 0..self.hash_count {
            let row = self.row_index(hash, i);
            self.row_words_mut(row)[word_col] |= 1u64 << bit;
        }
        self.generation += 1;
    }

    /// Zeroes every row's bit for `bin`.
    pub fn clear(&mut self, bin: TechnicalBinId) {
        assert!(bin.as_usize() < self.bin_count, "bin index out of range");
        let word_col = bin.as_usize() / 64;
        let bit_mask = !(1u64 << (bin.as_usize() % 64));
        for row in 0..self.bin_size {
            self.row_words_mut(row)[word_col] &= bit_mask;
        }
        self.generation += 1;
    }

    /// Zeroes every row's bit for each bin in `bins`.
    pub fn clear_bins(&mut self, bins: &[TechnicalBinId]) {
        for &bin in bins {
            assert!(bin.as_usize() < self.bin_count, "bin index out of range");
            let word_col = bin.as_usize() / 64;
            let bit_mask = !(1u64 << (bin.as_usize() % 64));
            for row in 0..self.bin_size {
                self.row_words_mut(row)[word_col] &= bit_mask;
            }
        }
        self.generation += 1;
    }

    /// Grows `bin_count` to at least `new_bin_count` only if it does not
    /// require reallocating the backing storage.
    ///
    /// Returns `true` if the growth happened in place (or `new_bin_count`
    /// already matched the current count) and `false` if either nothing
    /// changed because `new_bin_count` was smaller, or a reallocation was
    /// needed and skipped.
    pub fn try_increase_bin_number_to(&mut self, new_bin_count: usize) -> bool {
        let new_bin_count = next_multiple_of_64(new_bin_count.max(1));
        if new_bin_count < self.bin_count {
            return false;
        }
        if new_bin_count == self.bin_count {
            return true;
        }
        if new_bin_count <= self.allocated_bin_count {
            self.bin_count = new_bin_count;
            self.generation += 1;
            true
        } else {
            false
        }
    }

    /// Grows `bin_count` to at least `new_bin_count`, reallocating if the
    /// existing capacity is insufficient. Invalidates every outstanding
    /// agent.
    pub fn increase_bin_number_to(&mut self, new_bin_count: usize) {
        let new_bin_count = next_multiple_of_64(new_bin_count.max(1));
        if new_bin_count <= self.bin_count {
            return;
        }
        if new_bin_count <= self.allocated_bin_count {
            self.bin_count = new_bin_count;
        } else {
            self.reallocate_to(new_bin_count);
        }
        self.generation += 1;
    }

    fn reallocate_to(&mut self, new_bin_count: usize) {
        let new_words_per_row = new_bin_count / 64;
        let mut new_words = vec![0u64; new_words_per_row * self.bin_size];
        for row in 0..self.bin_size {
            let old_start = row * self.words_per_row;
            let new_start = row * new_words_per_row;
            new_words[new_start..new_start + self.words_per_row]
                .copy_from_slice(&self.words[old_start..old_start + self.words_per_row]);
        }
        self.words = new_words;
        self.words_per_row = new_words_per_row;
        self.bin_count = new_bin_count;
        self.allocated_bin_count = new_bin_count;
    }

    /// Creates a containment agent holding a scratch buffer sized to this
    /// filter's current `bin_count`.
    #[must_use]
    pub fn containment_agent(&self) -> ContainmentAgent<'_> {
        ContainmentAgent::new(self)
    }

    /// Creates a counting agent for `T`-wide saturating counters.
    #[must_use]
    pub fn counting_agent<T: Counter>(&self) -> CountingAgent<'_, T> {
        CountingAgent::new(self)
    }

    /// Creates a membership agent for `T`-wide saturating counters.
    #[must_use]
    pub fn membership_agent<T: Counter>(&self) -> MembershipAgent<'_, T> {
        MembershipAgent::new(self)
    }
}

/// A per-IBF scratch object computing `bulk_contains` queries. Becomes
/// stale after any mutating call on its filter; in debug builds using a
/// stale agent panics rather than silently returning wrong results.
pub struct ContainmentAgent<'ibf> {
    ibf: &'ibf InterleavedBloomFilter,
    generation: u64,
    scratch: BitVector,
}

impl<'ibf> ContainmentAgent<'ibf> {
    fn new(ibf: &'ibf InterleavedBloomFilter) -> Self {
        Self {
            ibf,
            generation: ibf.generation,
            scratch: BitVector::new(ibf.bin_count),
        }
    }

    fn assert_fresh(&self) {
        debug_assert_eq!(
            self.generation, self.ibf.generation,
            "containment agent used after the filter was mutated; create a new agent"
        );
    }

    /// For each of the filter's `hash_count` hash positions, ANDs that
    /// row's words together, yielding a bit per technical bin indicating
    /// probable membership.
    pub fn bulk_contains(&mut self, hash: u64) -> &BitVector {
        self.assert_fresh();
        for i in 0..self.ibf.hash_count {
            let row = self.ibf.row_index(hash, i);
            let row_words = self.ibf.row_words(row);
            if i == 0 {
                self.scratch.copy_from_words(row_words);
            } else {
                self.scratch.and_with_words(row_words);
            }
        }
        &self.scratch
    }
}

/// A per-IBF scratch object accumulating containment rows across many
/// hashes into per-bin counts.
pub struct CountingAgent<'ibf, T: Counter> {
    ibf: &'ibf InterleavedBloomFilter,
    generation: u64,
    row_scratch: BitVector,
    counts: CountingVector<T>,
}

impl<'ibf, T: Counter> CountingAgent<'ibf, T> {
    fn new(ibf: &'ibf InterleavedBloomFilter) -> Self {
        Self {
            ibf,
            generation: ibf.generation,
            row_scratch: BitVector::new(ibf.bin_count),
            counts: CountingVector::new(ibf.bin_count),
        }
    }

    fn assert_fresh(&self) {
        debug_assert_eq!(
            self.generation, self.ibf.generation,
            "counting agent used after the filter was mutated; create a new agent"
        );
    }

    /// Accumulates the containment bit-vector of every hash in `hashes`
    /// into a fresh counting vector, returning how many of `hash_count`
    /// rows matched per bin, summed across all hashes.
    pub fn bulk_count(&mut self, hashes: impl IntoIterator<Item = u64>) -> &CountingVector<T> {
        self.assert_fresh();
        self.counts.clear();
        for hash in hashes {
            for i in 0..self.ibf.hash_count {
                let row = self.ibf.row_index(hash, i);
                let row_words = self.ibf.row_words(row);
                if i == 0 {
                    self.row_scratch.copy_from_words(row_words);
                } else {
                    self.row_scratch.and_with_words(row_words);
                }
            }
            self.counts.accumulate(&self.row_scratch);
        }
        &self.counts
    }
}

/// A per-IBF scratch object turning a counting query into the sorted list
/// of bins whose count passes a threshold.
pub struct MembershipAgent<'ibf, T: Counter> {
    counting_agent: CountingAgent<'ibf, T>,
    results: Vec<usize>,
}

impl<'ibf, T: Counter> MembershipAgent<'ibf, T> {
    fn new(ibf: &'ibf InterleavedBloomFilter) -> Self {
        Self {
            counting_agent: CountingAgent::new(ibf),
            results: Vec::new(),
        }
    }

    /// Runs `bulk_count` over `hashes`, then emits every bin index whose
    /// count is `>= threshold`, already in ascending order.
    pub fn membership_for(
        &mut self,
        hashes: impl IntoIterator<Item = u64>,
        threshold: T,
    ) -> &[usize] {
        let counts = self.counting_agent.bulk_count(hashes);
        self.results = counts.indices_at_least(threshold);
        self.sort_results();
        &self.results
    }

    /// Sorts the last emitted result list ascending. `membership_for`
    /// already leaves it sorted (bins are scanned in index order); this
    /// is exposed for callers that mutate `results` via other means.
    pub fn sort_results(&mut self) {
        self.results.sort_unstable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emplace_then_contains_reports_bin() {
        let mut ibf = InterleavedBloomFilter::new(12, 8192, 2);
        ibf.emplace(126, TechnicalBinId::new(0));
        ibf.emplace(712, TechnicalBinId::new(3));
        ibf.emplace(237, TechnicalBinId::new(9));

        let mut agent = ibf.containment_agent();
        assert!(agent.bulk_contains(126).get(0));
        assert!(agent.bulk_contains(712).get(3));
        assert!(agent.bulk_contains(237).get(9));
        assert!(!agent.bulk_contains(126).get(1));
    }

    #[test]
    fn clear_removes_all_rows_for_a_bin() {
        let mut ibf = InterleavedBloomFilter::new(64, 1024, 2);
        ibf.emplace(99, TechnicalBinId::new(5));
        assert!(ibf.containment_agent().bulk_contains(99).get(5));
        ibf.clear(TechnicalBinId::new(5));
        assert!(!ibf.containment_agent().bulk_contains(99).get(5));
    }

    #[test]
    fn try_increase_bin_number_semantics() {
        let mut ibf = InterleavedBloomFilter::new(64, 512, 2);
        assert!(ibf.try_increase_bin_number_to(64));
        assert!(!ibf.try_increase_bin_number_to(32));
        assert!(!ibf.try_increase_bin_number_to(128));
        assert_eq!(ibf.bin_count(), 64);
    }

    #[test]
    fn increase_bin_number_preserves_existing_bits() {
        let mut ibf = InterleavedBloomFilter::new(64, 512, 2);
        ibf.emplace(7, TechnicalBinId::new(10));
        ibf.increase_bin_number_to(256);
        assert_eq!(ibf.bin_count(), 256);
        assert!(ibf.containment_agent().bulk_contains(7).get(10));
        assert!(!ibf.containment_agent().bulk_contains(7).get(200));
    }

    #[test]
    fn generation_bumps_on_every_mutation() {
        let mut ibf = InterleavedBloomFilter::new(64, 128, 2);
        let g0 = ibf.generation();
        ibf.emplace(1, TechnicalBinId::new(0));
        assert!(ibf.generation() > g0);
        let g1 = ibf.generation();
        ibf.clear(TechnicalBinId::new(0));
        assert!(ibf.generation() > g1);
    }

    #[test]
    #[should_panic(expected = "used after the filter was mutated")]
    fn stale_agent_panics_in_debug() {
        let mut ibf = InterleavedBloomFilter::new(64, 128, 2);
        let mut agent = ibf.containment_agent();
        ibf.emplace(1, TechnicalBinId::new(0));
        agent.bulk_contains(1);
    }

    #[test]
    fn membership_agent_reports_sorted_bins_above_threshold() {
        let mut ibf = InterleavedBloomFilter::new(64, 2048, 2);
        for bin in [1u32, 2, 3] {
            ibf.emplace(555, TechnicalBinId::new(bin));
        }
        let mut agent = ibf.membership_agent::<u8>();
        let hits = agent.membership_for([555], 1u8);
        assert_eq!(hits, &[1, 2, 3]);
    }
}
