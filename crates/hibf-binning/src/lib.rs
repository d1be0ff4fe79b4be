//! The two binning layers: [`simple`] fills one IBF's technical bins
//! from a flat list of user bins, and [`hierarchical`] recurses into
//! nested IBFs when there are more user bins than technical bins to
//! hold them.

pub mod hierarchical;
pub mod simple;

pub use hierarchical::{hierarchical_binning, HierarchicalBinningConfig, HierarchicalBinningResult};
pub use simple::{simple_binning, SimpleBinningResult};
