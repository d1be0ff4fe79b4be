//! The opaque 64-bit hash type that flows through every layer of the index.

use std::fmt;

/// An opaque 64-bit hash produced by the caller's `input_fn` (e.g. a hashed
/// k-mer). The index never interprets its bits beyond the bespoke mixing
/// functions in `hibf-ibf`; ordering is only used for deterministic split
/// chunking during the build (see `hibf-build`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct H64(pub u64);

impl H64 {
    /// Wraps a raw `u64`.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the underlying `u64`.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for H64 {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<H64> for u64 {
    fn from(value: H64) -> Self {
        value.0
    }
}

impl fmt::Display for H64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
