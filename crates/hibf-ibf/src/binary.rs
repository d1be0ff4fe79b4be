//! A minimal hand-rolled binary codec for a built
//! [`InterleavedBloomFilter`], mirroring `hibf-layout::binary`'s
//! fixed-width-LE-scalar/length-prefixed-vector shape. `words_per_row`
//! and `allocated_bin_count` are reconstructed from `bin_size` and the
//! decoded word count rather than stored, since they are always
//! derivable and storing them would let a corrupt stream disagree with
//! itself.

use crate::InterleavedBloomFilter;
use hibf_error::{HibfError, Result};

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read_u64(&mut self) -> Result<u64> {
        let end = self.pos + 8;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or_else(|| HibfError::serialization("truncated stream reading u64"))?;
        self.pos = end;
        Ok(u64::from_le_bytes(slice.try_into().unwrap()))
    }

    fn finish(&self) -> Result<()> {
        if self.pos != self.bytes.len() {
            return Err(HibfError::serialization("trailing bytes after interleaved bloom filter"));
        }
        Ok(())
    }
}

/// Encodes `ibf` into the hand-rolled binary format: `bin_count`,
/// `bin_size`, `hash_count`, a `u64` word count, then that many `u64`
/// words.
#[must_use]
pub fn encode(ibf: &InterleavedBloomFilter) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_u64(ibf.bin_count as u64);
    w.write_u64(ibf.bin_size as u64);
    w.write_u64(ibf.hash_count as u64);
    w.write_u64(ibf.words.len() as u64);
    for &word in &ibf.words {
        w.write_u64(word);
    }
    w.buf
}

/// Decodes an [`InterleavedBloomFilter`] previously produced by
/// [`encode`]. Fails with [`HibfError::Serialization`] on truncation, a
/// trailing-byte mismatch, or a word count inconsistent with `bin_size`.
/// The decoded filter starts at generation `0`.
pub fn decode(bytes: &[u8]) -> Result<InterleavedBloomFilter> {
    let mut r = Reader::new(bytes);

    let bin_count = r.read_u64()? as usize;
    let bin_size = r.read_u64()? as usize;
    let hash_count = r.read_u64()? as usize;
    let word_count = r.read_u64()? as usize;

    if bin_size == 0 || word_count % bin_size != 0 {
        return Err(HibfError::serialization("word count is not a multiple of bin_size"));
    }
    let words_per_row = word_count / bin_size;
    let allocated_bin_count = words_per_row * 64;
    if bin_count > allocated_bin_count {
        return Err(HibfError::serialization("bin_count exceeds allocated capacity"));
    }

    let mut words = Vec::with_capacity(word_count);
    for _ in 0..word_count {
        words.push(r.read_u64()?);
    }

    r.finish()?;

    Ok(InterleavedBloomFilter {
        bin_count,
        allocated_bin_count,
        words_per_row,
        bin_size,
        hash_count,
        words,
        generation: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hibf_types::TechnicalBinId;

    fn sample_ibf() -> InterleavedBloomFilter {
        let mut ibf = InterleavedBloomFilter::new(70, 128, 3);
        ibf.emplace(42, TechnicalBinId::new(5));
        ibf.emplace(1234, TechnicalBinId::new(67));
        ibf
    }

    #[test]
    fn round_trips_through_binary() {
        let ibf = sample_ibf();
        let bytes = encode(&ibf);
        let decoded = decode(&bytes).expect("valid ibf bytes");

        assert_eq!(decoded.bin_count(), ibf.bin_count());
        assert_eq!(decoded.bin_size(), ibf.bin_size());
        assert_eq!(decoded.hash_count(), ibf.hash_count());
        assert_eq!(decoded.words, ibf.words);
    }

    #[test]
    fn round_trip_preserves_query_results() {
        let ibf = sample_ibf();
        let bytes = encode(&ibf);
        let mut decoded = decode(&bytes).expect("valid ibf bytes");

        let original = ibf.clone();
        let mut original_agent = original.containment_agent();
        let mut decoded_agent = decoded.containment_agent();
        assert_eq!(original_agent.bulk_contains(42).clone(), decoded_agent.bulk_contains(42).clone());
        assert_eq!(original_agent.bulk_contains(1234).clone(), decoded_agent.bulk_contains(1234).clone());

        decoded.emplace(99, TechnicalBinId::new(10));
        assert!(decoded.containment_agent().bulk_contains(99).get(10));
    }

    #[test]
    fn rejects_truncated_bytes() {
        let ibf = sample_ibf();
        let mut bytes = encode(&ibf);
        bytes.truncate(bytes.len() - 2);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn rejects_trailing_bytes() {
        let ibf = sample_ibf();
        let mut bytes = encode(&ibf);
        bytes.push(0xFF);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn rejects_word_count_inconsistent_with_bin_size() {
        let ibf = sample_ibf();
        let mut bytes = encode(&ibf);
        // Corrupt the word-count field (bytes 24..32) to something not a
        // multiple of bin_size.
        let bad = (ibf.bin_size() as u64 / 2).max(1).to_le_bytes();
        bytes[24..32].copy_from_slice(&bad);
        assert!(decode(&bytes).is_err());
    }
}
