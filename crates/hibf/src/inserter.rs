//! The polymorphic insertion endpoint handed to the user's callback: a
//! tagged variant over {hash-set insert, HLL add, IBF emplace-at-bin,
//! arbitrary closure} rather than a trait object, per SPEC_FULL §9.

use hashbrown::HashSet;
use hibf_hll::HyperLogLog;
use hibf_ibf::InterleavedBloomFilter;
use hibf_types::TechnicalBinId;

enum Target<'a> {
    HashSet(&'a mut HashSet<u64>),
    Hll(&'a mut HyperLogLog),
    IbfBin {
        ibf: &'a mut InterleavedBloomFilter,
        bin: TechnicalBinId,
    },
    Closure(&'a mut dyn FnMut(u64)),
}

/// A short-lived handle the build callback emits hashes through. The
/// caller never sees which backing store it wraps; only [`Inserter::emit`]
/// is exposed.
pub struct Inserter<'a> {
    target: Target<'a>,
}

impl<'a> Inserter<'a> {
    #[must_use]
    pub fn from_hash_set(set: &'a mut HashSet<u64>) -> Self {
        Self {
            target: Target::HashSet(set),
        }
    }

    #[must_use]
    pub fn from_hll(hll: &'a mut HyperLogLog) -> Self {
        Self {
            target: Target::Hll(hll),
        }
    }

    #[must_use]
    pub fn from_ibf_bin(ibf: &'a mut InterleavedBloomFilter, bin: TechnicalBinId) -> Self {
        Self {
            target: Target::IbfBin { ibf, bin },
        }
    }

    #[must_use]
    pub fn from_closure(f: &'a mut dyn FnMut(u64)) -> Self {
        Self {
            target: Target::Closure(f),
        }
    }

    /// Routes `hash` to whichever backing store this inserter wraps.
    pub fn emit(&mut self, hash: u64) {
        match &mut self.target {
            Target::HashSet(set) => {
                set.insert(hash);
            }
            Target::Hll(hll) => hll.add(hash.into()),
            Target::IbfBin { ibf, bin } => ibf.emplace(hash, *bin),
            Target::Closure(f) => f(hash),
        }
    }
}
