//! A minimal hand-rolled binary codec: every variable-length field is a
//! `u32` LE count followed by its elements, every scalar a fixed-width LE
//! integer. Good enough for an internal archive format; callers wanting
//! JSON or bincode can use the `serde` feature on [`crate::Layout`]
//! instead of this module.

use crate::{Layout, MaxBin, UserBin};
use hibf_error::{HibfError, Result};
use hibf_types::UserBinId;

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn write_usize_vec(&mut self, values: &[usize]) {
        self.write_u32(values.len() as u32);
        for &v in values {
            self.write_u64(v as u64);
        }
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

    fn read_u32(&mut self) -> Result<u32> {
        let end = self.pos + 4;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or_else(|| HibfError::serialization("truncated stream reading u32"))?;
        self.pos = end;
        Ok(u32::from_le_bytes(slice.try_into().unwrap()))
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

    fn read_usize_vec(&mut self) -> Result<Vec<usize>> {
        let len = self.read_u32()? as usize;
        (0..len).map(|_| self.read_u64().map(|v| v as usize)).collect()
    }

    fn finish(&self) -> Result<()> {
        if self.pos != self.bytes.len() {
            return Err(HibfError::serialization("trailing bytes after layout"));
        }
        Ok(())
    }
}

/// Encodes `layout` into the hand-rolled binary format.
#[must_use]
pub fn encode(layout: &Layout) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_u64(layout.top_level_max_bin_id as u64);

    w.write_u32(layout.max_bins.len() as u32);
    for max_bin in &layout.max_bins {
        w.write_usize_vec(&max_bin.previous_tb_indices);
        w.write_u64(max_bin.id as u64);
    }

    w.write_u32(layout.user_bins.len() as u32);
    for user_bin in &layout.user_bins {
        w.write_usize_vec(&user_bin.previous_tb_indices);
        w.write_u64(user_bin.storage_tb_id as u64);
        w.write_u64(user_bin.number_of_technical_bins as u64);
        w.write_u32(user_bin.idx.as_usize() as u32);
    }

    w.buf
}

/// Decodes a layout previously produced by [`encode`]. Fails with
/// [`HibfError::Serialization`] on any truncation or trailing-byte
/// mismatch.
pub fn decode(bytes: &[u8]) -> Result<Layout> {
    let mut r = Reader::new(bytes);

    let top_level_max_bin_id = r.read_u64()? as usize;

    let max_bin_count = r.read_u32()? as usize;
    let mut max_bins = Vec::with_capacity(max_bin_count);
    for _ in 0..max_bin_count {
        let previous_tb_indices = r.read_usize_vec()?;
        let id = r.read_u64()? as usize;
        max_bins.push(MaxBin {
            previous_tb_indices,
            id,
        });
    }

    let user_bin_count = r.read_u32()? as usize;
    let mut user_bins = Vec::with_capacity(user_bin_count);
    for _ in 0..user_bin_count {
        let previous_tb_indices = r.read_usize_vec()?;
        let storage_tb_id = r.read_u64()? as usize;
        let number_of_technical_bins = r.read_u64()? as usize;
        let idx = r.read_u32()?;
        user_bins.push(UserBin {
            previous_tb_indices,
            storage_tb_id,
            number_of_technical_bins,
            idx: UserBinId::new(idx),
        });
    }

    r.finish()?;

    Ok(Layout {
        top_level_max_bin_id,
        max_bins,
        user_bins,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_layout() -> Layout {
        Layout {
            top_level_max_bin_id: 4,
            max_bins: vec![MaxBin {
                previous_tb_indices: vec![2, 5],
                id: 7,
            }],
            user_bins: vec![UserBin {
                previous_tb_indices: vec![2],
                storage_tb_id: 9,
                number_of_technical_bins: 3,
                idx: UserBinId::new(1),
            }],
        }
    }

    #[test]
    fn round_trips_through_binary() {
        let layout = sample_layout();
        let bytes = encode(&layout);
        let decoded = decode(&bytes).expect("valid layout bytes");
        assert_eq!(layout, decoded);
    }

    #[test]
    fn rejects_truncated_bytes() {
        let layout = sample_layout();
        let mut bytes = encode(&layout);
        bytes.truncate(bytes.len() - 2);
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn rejects_trailing_bytes() {
        let layout = sample_layout();
        let mut bytes = encode(&layout);
        bytes.push(0xFF);
        assert!(decode(&bytes).is_err());
    }
}
