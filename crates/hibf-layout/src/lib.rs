//! The layout: a canonical, serializable description of the decision
//! tree the hierarchical binning DP produces and the builder later
//! consumes to construct actual IBFs.

pub mod binary;
pub mod text;

use hibf_types::UserBinId;

/// Identifies the technical bin with the greatest k-mer content inside
/// one (possibly nested) IBF, which drives that IBF's sizing. Lower-level
/// (nested) IBFs are identified by `previous_tb_indices`, the path of
/// merged-bin indices from the root; the top-level IBF's max bin is
/// tracked separately on [`Layout::top_level_max_bin_id`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MaxBin {
    /// Path of merged-bin indices from the root identifying the IBF this
    /// max bin belongs to.
    pub previous_tb_indices: Vec<usize>,
    /// The technical bin id with the greatest k-mer content.
    pub id: usize,
}

/// One user bin's placement: which (possibly nested) IBF it lives in,
/// which technical bin(s) it occupies, and whether it was split.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UserBin {
    /// Path of merged-bin indices from the root identifying the IBF this
    /// user bin is stored in.
    pub previous_tb_indices: Vec<usize>,
    /// The first (or only, if not split) technical bin this user bin is
    /// stored in.
    pub storage_tb_id: usize,
    /// Number of technical bins occupied: `1` for a single assignment,
    /// `> 1` for a split.
    pub number_of_technical_bins: usize,
    /// The user bin this record describes.
    pub idx: UserBinId,
}

/// The full decision tree produced by the hierarchical binning DP: which
/// IBF (if any, beyond the root) each user bin lives in, and which
/// technical bin in each (possibly nested) IBF holds the greatest k-mer
/// content.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Layout {
    /// The root IBF's fullest technical bin.
    pub top_level_max_bin_id: usize,
    /// One entry per nested (lower-level) IBF.
    pub max_bins: Vec<MaxBin>,
    /// One entry per user bin, across every level.
    pub user_bins: Vec<UserBin>,
}

impl Layout {
    /// An empty layout with no nested IBFs and no user bins.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_compare_by_deep_equality() {
        let a = Layout {
            top_level_max_bin_id: 3,
            max_bins: vec![MaxBin {
                previous_tb_indices: vec![1],
                id: 2,
            }],
            user_bins: vec![UserBin {
                previous_tb_indices: vec![],
                storage_tb_id: 0,
                number_of_technical_bins: 1,
                idx: UserBinId::new(0),
            }],
        };
        let b = a.clone();
        assert_eq!(a, b);
    }
}
