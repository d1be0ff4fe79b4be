//! Bottom-up construction: turn a [`hibf_layout::Layout`] plus a hash
//! callback into a forest of filled [`hibf_ibf::InterleavedBloomFilter`]s.
//!
//! Building happens in two phases. [`sketch::compute_sketches`] (phase 1)
//! calls the caller's [`InputSource`] once per user bin to produce the
//! HyperLogLog/MinHash sketches the hierarchical binning DP
//! (`hibf-binning`) needs to decide the layout. [`tree::build`] (phase 2)
//! re-invokes the same callback per user bin to get exact hashes and fills
//! every technical bin, propagating each merged bin's exact union upward
//! per `update_parent_kmers`. [`pool::Pool`] is the work-stealing thread
//! pool sibling subtrees build on.

pub mod pool;
pub mod sketch;
pub mod tree;

pub use pool::Pool;
pub use sketch::{compute_sketches, InputSource, UserBinSketches};
pub use tree::{build, BuildParams, BuildStats, BuiltHibf, HibfNode};
