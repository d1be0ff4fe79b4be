//! Single-level binning: distribute `U` user bins across `B` technical
//! bins of one IBF, splitting large user bins across consecutive
//! technical bins so that the largest resulting bin is as small as
//! possible.

use hibf_error::{HibfError, Result};
use hibf_layout::UserBin;
use hibf_types::UserBinId;

/// Per-split-count cost of user bin `count` occupying `splits` technical
/// bins, corrected for the false positive rate lost to splitting.
fn split_cost(count: u64, splits: usize, fpr_correction: &[f64]) -> u64 {
    let correction = fpr_correction[splits];
    ((count as f64 * correction) / splits as f64).ceil() as u64
}

/// Result of [`simple_binning`]: one [`UserBin`] record per input bin,
/// in descending-index order, plus the id of the technical bin holding
/// the greatest k-mer content (ties broken towards the smallest id).
pub struct SimpleBinningResult {
    pub user_bins: Vec<UserBin>,
    pub max_technical_bin_id: usize,
}

/// Assigns `kmer_counts.len()` user bins (assumed pre-sorted by
/// descending count) to at most `t_max` technical bins, minimizing the
/// largest per-bin cost. `fpr_correction[s]` is the split-correction
/// factor for `s` technical bins, as produced by
/// `hibf_fpr::compute_fpr_correction`.
///
/// Fails with [`HibfError::LayoutInfeasible`] when there are more user
/// bins than technical bins.
pub fn simple_binning(
    kmer_counts: &[u64],
    fpr_correction: &[f64],
    t_max: usize,
) -> Result<SimpleBinningResult> {
    let u = kmer_counts.len();
    if u == 0 {
        return Ok(SimpleBinningResult {
            user_bins: Vec::new(),
            max_technical_bin_id: 0,
        });
    }
    if u > t_max {
        return Err(HibfError::layout_infeasible(format!(
            "{u} user bins do not fit into {t_max} technical bins"
        )));
    }

    const INFEASIBLE: u64 = u64::MAX;
    let max_split = fpr_correction.len() - 1;

    // dp[i][j]: minimum achievable maximum bin cost, assigning the first
    // `i` user bins (by input order) to exactly `j` technical bins.
    let mut dp = vec![vec![INFEASIBLE; t_max + 1]; u + 1];
    let mut choice = vec![vec![0usize; t_max + 1]; u + 1];
    dp[0][0] = 0;

    for i in 1..=u {
        let count = kmer_counts[i - 1];
        for j in i..=t_max {
            let max_splits = (j - (i - 1)).min(max_split);
            for s in 1..=max_splits {
                let prev = dp[i - 1][j - s];
                if prev == INFEASIBLE {
                    continue;
                }
                let cost = split_cost(count, s, fpr_correction);
                let candidate = prev.max(cost);
                if candidate < dp[i][j] {
                    dp[i][j] = candidate;
                    choice[i][j] = s;
                }
            }
        }
    }

    if dp[u][t_max] == INFEASIBLE {
        return Err(HibfError::layout_infeasible(format!(
            "no assignment of {u} user bins into {t_max} technical bins satisfies the fpr correction table"
        )));
    }

    let mut user_bins = Vec::with_capacity(u);
    let mut bin_costs: Vec<(usize, u64)> = Vec::new();
    let mut next_bin = 0usize;
    let mut j = t_max;

    for i in (1..=u).rev() {
        let s = choice[i][j];
        let count = kmer_counts[i - 1];
        let cost = split_cost(count, s, fpr_correction);
        let storage_tb_id = next_bin;
        for k in 0..s {
            bin_costs.push((storage_tb_id + k, cost));
        }
        user_bins.push(UserBin {
            previous_tb_indices: Vec::new(),
            storage_tb_id,
            number_of_technical_bins: s,
            idx: UserBinId::new((i - 1) as u32),
        });
        next_bin += s;
        j -= s;
    }
    debug_assert_eq!(next_bin, t_max);
    debug_assert_eq!(j, 0);

    let max_technical_bin_id = bin_costs
        .into_iter()
        .fold((0usize, 0u64), |(best_id, best_cost), (id, cost)| {
            if cost > best_cost || (cost == best_cost && id < best_id) {
                (id, cost)
            } else {
                (best_id, best_cost)
            }
        })
        .0;

    Ok(SimpleBinningResult {
        user_bins,
        max_technical_bin_id,
    })
}
