//! Packed bit and counting vectors over 64-bit words.
//!
//! `BitVector` is the storage backing a single hash-position row of an
//! interleaved Bloom filter; `CountingVector<T>` accumulates one row per
//! query hash into per-technical-bin counts.

use hibf_types::next_multiple_of_64;

mod counter;

pub use counter::Counter;

/// A packed, growable vector of bits backed by 64-bit words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitVector {
    words: Vec<u64>,
    len: usize,
}

impl BitVector {
    /// Creates a zeroed bit vector of `len` bits.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0u64; next_multiple_of_64(len) / 64],
            len,
        }
    }

    /// Number of addressable bits (not necessarily a multiple of 64).
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The underlying 64-bit words, `ceil(len / 64)` of them.
    #[must_use]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Mutable access to the underlying words.
    pub fn words_mut(&mut self) -> &mut [u64] {
        &mut self.words
    }

    #[must_use]
    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.len, "bit index {index} out of bounds ({})", self.len);
        (self.words[index / 64] >> (index % 64)) & 1 == 1
    }

    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < self.len, "bit index {index} out of bounds ({})", self.len);
        let word = &mut self.words[index / 64];
        if value {
            *word |= 1u64 << (index % 64);
        } else {
            *word &= !(1u64 << (index % 64));
        }
    }

    /// Zeroes every bit without changing `len`.
    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    /// Grows the vector to `new_len`, zero-extending. `new_len` must be
    /// `>= len`.
    pub fn grow(&mut self, new_len: usize) {
        assert!(new_len >= self.len, "grow is not a truncation");
        self.words.resize(next_multiple_of_64(new_len) / 64, 0);
        self.len = new_len;
    }

    /// Bitwise ANDs `other` into `self`, word by word. Both vectors must
    /// have the same word count.
    pub fn and_assign(&mut self, other: &BitVector) {
        assert_eq!(self.words.len(), other.words.len(), "word-count mismatch");
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a &= b;
        }
    }

    /// Overwrites this vector's words with `words`, e.g. to seed a scratch
    /// buffer from one row of an interleaved Bloom filter's storage.
    pub fn copy_from_words(&mut self, words: &[u64]) {
        assert_eq!(self.words.len(), words.len(), "word-count mismatch");
        self.words.copy_from_slice(words);
    }

    /// Bitwise ANDs a raw word slice into `self`, e.g. a subsequent hash
    /// row in a multi-hash containment query.
    pub fn and_with_words(&mut self, words: &[u64]) {
        assert_eq!(self.words.len(), words.len(), "word-count mismatch");
        for (a, b) in self.words.iter_mut().zip(words) {
            *a &= b;
        }
    }

    /// Number of set bits.
    #[must_use]
    pub fn count_ones(&self) -> u64 {
        self.words.iter().map(|w| u64::from(w.count_ones())).sum()
    }
}

/// A dense vector of saturating counters, one per technical bin, used to
/// accumulate `k` containment rows for a multi-hash query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountingVector<T: Counter> {
    counts: Vec<T>,
}

impl<T: Counter> CountingVector<T> {
    /// Creates a vector of `len` zeroed counters.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            counts: vec![T::default(); len],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> T {
        self.counts[index]
    }

    /// Zeroes every counter.
    pub fn clear(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = T::default());
    }

    /// Increments the counter at every index set in `bits`, saturating at
    /// `T::MAX`. Walks each word's set bits via `trailing_zeros`, so the
    /// cost is proportional to the number of set bits rather than `len`.
    pub fn accumulate(&mut self, bits: &BitVector) {
        for (word_idx, &word) in bits.words().iter().enumerate() {
            let mut remaining = word;
            while remaining != 0 {
                let bit = remaining.trailing_zeros() as usize;
                let index = word_idx * 64 + bit;
                if index < self.counts.len() {
                    self.counts[index] = self.counts[index].saturating_increment();
                }
                remaining &= remaining - 1;
            }
        }
    }

    /// Indices whose counter is `>= threshold`, in ascending order.
    #[must_use]
    pub fn indices_at_least(&self, threshold: T) -> Vec<usize> {
        self.counts
            .iter()
            .enumerate()
            .filter_map(|(i, &c)| (c >= threshold).then_some(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn set_and_get_roundtrip() {
        let mut bv = BitVector::new(130);
        bv.set(0, true);
        bv.set(64, true);
        bv.set(129, true);
        assert!(bv.get(0));
        assert!(bv.get(64));
        assert!(bv.get(129));
        assert!(!bv.get(1));
        assert_eq!(bv.count_ones(), 3);
    }

    #[test]
    fn grow_zero_extends() {
        let mut bv = BitVector::new(10);
        bv.set(5, true);
        bv.grow(200);
        assert_eq!(bv.len(), 200);
        assert!(bv.get(5));
        assert!(!bv.get(150));
    }

    #[test]
    fn and_assign_intersects_rows() {
        let mut a = BitVector::new(64);
        a.set(3, true);
        a.set(4, true);
        let mut b = BitVector::new(64);
        b.set(4, true);
        b.set(5, true);
        a.and_assign(&b);
        assert!(!a.get(3));
        assert!(a.get(4));
        assert!(!a.get(5));
    }

    #[test]
    fn counting_vector_accumulates_multiple_rows() {
        let mut counts = CountingVector::<u8>::new(70);
        let mut row1 = BitVector::new(70);
        row1.set(0, true);
        row1.set(69, true);
        let mut row2 = BitVector::new(70);
        row2.set(69, true);

        counts.accumulate(&row1);
        counts.accumulate(&row2);

        assert_eq!(counts.get(0), 1);
        assert_eq!(counts.get(69), 2);
        assert_eq!(counts.indices_at_least(2), vec![69]);
    }

    proptest! {
        #[test]
        fn count_ones_matches_set_bits(indices in prop::collection::vec(0usize..500, 0..50)) {
            let mut bv = BitVector::new(500);
            let mut expected = std::collections::HashSet::new();
            for i in &indices {
                bv.set(*i, true);
                expected.insert(*i);
            }
            prop_assert_eq!(bv.count_ones(), expected.len() as u64);
        }
    }
}
