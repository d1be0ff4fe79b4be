//! Hierarchical binning: the recursive DP that lets `U` user bins exceed
//! `t_max` technical bins by folding runs of similar, low-traffic user
//! bins into the merged bin of a nested IBF.

use hibf_error::{HibfError, Result};
use hibf_hll::HyperLogLog;
use hibf_layout::{MaxBin, UserBin};
use hibf_sketch::{estimate_union_cardinality, rearrange_by_similarity};
use hibf_types::UserBinId;

/// Tunables threaded down through every recursion level.
#[derive(Debug, Clone)]
pub struct HierarchicalBinningConfig {
    /// Technical bins available at the top level. Nested IBFs reuse the
    /// same value; real deployments may want to shrink it with depth, but
    /// nothing here requires that.
    pub t_max: usize,
    /// Weight applied to a merged bin's estimated cost, biasing the DP
    /// away from merging unless it meaningfully shrinks the result.
    pub alpha: f64,
    /// `fpr_correction[s]` is the split-correction factor for `s`
    /// technical bins, shared with [`crate::simple::simple_binning`].
    pub fpr_correction: Vec<f64>,
    /// Correction factor applied to a merged bin's union-cardinality
    /// estimate, accounting for the relaxed FPR merged bins are built
    /// against.
    pub relaxed_fpr_correction: f64,
    /// Skip the merge transition entirely, forcing every user bin into a
    /// single top-level IBF (degrades to [`crate::simple::simple_binning`]
    /// plus splitting).
    pub disable_estimate_union: bool,
    /// Skip the similarity-based reordering pass.
    pub disable_rearrangement: bool,
    /// Passed straight through to [`rearrange_by_similarity`].
    pub max_rearrangement_ratio: f64,
}

/// Result of [`hierarchical_binning`]: every user bin's placement (at
/// whatever depth it ended up at) plus every nested IBF's fullest
/// technical bin, and the root IBF's own fullest technical bin.
pub struct HierarchicalBinningResult {
    pub user_bins: Vec<UserBin>,
    pub max_bins: Vec<MaxBin>,
    pub top_level_max_bin_id: usize,
}

fn split_cost(count: u64, splits: usize, fpr_correction: &[f64]) -> u64 {
    let correction = fpr_correction[splits];
    ((count as f64 * correction) / splits as f64).ceil() as u64
}

fn merge_cost(union_estimate: f64, relaxed_fpr_correction: f64) -> u64 {
    (union_estimate * relaxed_fpr_correction).ceil() as u64
}

#[derive(Clone, Copy)]
enum Choice {
    /// Carried over from one fewer technical bin; this bin's capacity
    /// went unused.
    Unused,
    Single,
    Split(usize),
    /// Merges user bins `[l, i)` (0-based, exclusive end) into one
    /// technical bin that becomes the root of a nested IBF.
    Merge(usize),
}

struct DpCell {
    max_cost: u64,
    merged_blocks: usize,
}

const INFEASIBLE: u64 = u64::MAX;

/// Orders two DP candidates by (max bin size, merged-block count) — tie-
/// break rules (a) and (b). Rule (c), "lexicographically smaller
/// assignment", is not compared explicitly anywhere in this module: a
/// tie on (a) and (b) is broken by `solve_dp`'s fixed consideration
/// order (`Unused`, then `Single`, then `Split(s)` for `s` ascending,
/// then `Merge(l)` for `l` ascending), since `best` is only replaced
/// when `dominates` returns `true` and a tie keeps whichever candidate
/// was found first. This relies on that evaluation order, not on an
/// explicit comparison of the resulting assignments, to be deterministic.
fn dominates(a: (u64, usize), b: (u64, usize)) -> bool {
    a.0 < b.0 || (a.0 == b.0 && a.1 < b.1)
}

/// Solves the single/split/merge DP for one level, given this level's
/// already-rearranged user bins. Returns per-(user bin range) choices
/// that [`build_level`] turns into technical bin assignments.
#[allow(clippy::too_many_lines)]
fn solve_dp(
    counts: &[u64],
    sketches: &[HyperLogLog],
    config: &HierarchicalBinningConfig,
    t_max: usize,
) -> Result<(Vec<Vec<DpCell>>, Vec<Vec<Choice>>)> {
    let u = counts.len();
    let max_split = config.fpr_correction.len() - 1;

    let mut dp: Vec<Vec<DpCell>> = (0..=u)
        .map(|_| {
            (0..=t_max)
                .map(|_| DpCell {
                    max_cost: INFEASIBLE,
                    merged_blocks: 0,
                })
                .collect()
        })
        .collect();
    let mut choice: Vec<Vec<Choice>> = (0..=u)
        .map(|_| (0..=t_max).map(|_| Choice::Unused).collect())
        .collect();

    dp[0][0].max_cost = 0;
    dp[0][0].merged_blocks = 0;
    for j in 1..=t_max {
        dp[0][j].max_cost = 0;
        dp[0][j].merged_blocks = 0;
    }

    for i in 1..=u {
        let count = counts[i - 1];
        for j in 1..=t_max {
            let mut best: Option<(u64, usize)> = None;
            let mut best_choice = Choice::Unused;

            // Unused capacity carried forward.
            if dp[i][j - 1].max_cost != INFEASIBLE {
                let candidate = (dp[i][j - 1].max_cost, dp[i][j - 1].merged_blocks);
                best = Some(candidate);
                best_choice = Choice::Unused;
            }

            // Single technical bin for user bin i-1.
            if dp[i - 1][j - 1].max_cost != INFEASIBLE {
                let cost = split_cost(count, 1, &config.fpr_correction);
                let candidate = (
                    dp[i - 1][j - 1].max_cost.max(cost),
                    dp[i - 1][j - 1].merged_blocks,
                );
                if best.map_or(true, |b| dominates(candidate, b)) {
                    best = Some(candidate);
                    best_choice = Choice::Single;
                }
            }

            // Split across s >= 2 consecutive technical bins.
            for s in 2..=max_split.min(j) {
                if dp[i - 1][j - s].max_cost == INFEASIBLE {
                    continue;
                }
                let cost = split_cost(count, s, &config.fpr_correction);
                let candidate = (
                    dp[i - 1][j - s].max_cost.max(cost),
                    dp[i - 1][j - s].merged_blocks,
                );
                if best.map_or(true, |b| dominates(candidate, b)) {
                    best = Some(candidate);
                    best_choice = Choice::Split(s);
                }
            }

            // Merge user bins [l, i) into a single nested-IBF root bin.
            if !config.disable_estimate_union {
                for l in 1..=i {
                    if dp[l - 1][j - 1].max_cost == INFEASIBLE {
                        continue;
                    }
                    let refs: Vec<&HyperLogLog> = sketches[l - 1..i].iter().collect();
                    let union = estimate_union_cardinality(&refs);
                    let raw_cost = merge_cost(union, config.relaxed_fpr_correction);
                    let priced_cost = (raw_cost as f64 * config.alpha).ceil() as u64;
                    let candidate = (
                        dp[l - 1][j - 1].max_cost.max(priced_cost),
                        dp[l - 1][j - 1].merged_blocks + 1,
                    );
                    if best.map_or(true, |b| dominates(candidate, b)) {
                        best = Some(candidate);
                        best_choice = Choice::Merge(l - 1);
                    }
                }
            }

            if let Some((max_cost, merged_blocks)) = best {
                dp[i][j].max_cost = max_cost;
                dp[i][j].merged_blocks = merged_blocks;
                choice[i][j] = best_choice;
            }
        }
    }

    if dp[u][t_max].max_cost == INFEASIBLE {
        return Err(HibfError::layout_infeasible(format!(
            "no hierarchical assignment of {u} user bins into {t_max} technical bins was found"
        )));
    }

    Ok((dp, choice))
}

/// One resolved block produced by tracing back the DP: either a plain
/// single/split assignment, or a merged range that still needs its own
/// recursive layout.
enum Block {
    Plain { first: usize, splits: usize },
    Merged { first: usize, last: usize },
}

fn traceback(choice: &[Vec<Choice>], u: usize, t_max: usize) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut i = u;
    let mut j = t_max;
    while i > 0 {
        match choice[i][j] {
            Choice::Unused => {
                j -= 1;
            }
            Choice::Single => {
                blocks.push(Block::Plain {
                    first: i - 1,
                    splits: 1,
                });
                i -= 1;
                j -= 1;
            }
            Choice::Split(s) => {
                blocks.push(Block::Plain { first: i - 1, splits: s });
                i -= 1;
                j -= s;
            }
            Choice::Merge(l) => {
                blocks.push(Block::Merged { first: l, last: i - 1 });
                i = l;
                j -= 1;
            }
        }
    }
    blocks
}

/// Builds one level of the layout: rearranges, solves the DP, traces it
/// back, and recurses into merged ranges.
fn build_level(
    user_bin_ids: &[UserBinId],
    kmer_counts: &[u64],
    sketches: &[HyperLogLog],
    config: &HierarchicalBinningConfig,
    path: &[usize],
) -> Result<(Vec<UserBin>, Vec<MaxBin>, usize)> {
    let u = user_bin_ids.len();
    let t_max = config.t_max.max(1);

    let (order, counts, hlls): (Vec<UserBinId>, Vec<u64>, Vec<HyperLogLog>) = rearranged(
        user_bin_ids,
        kmer_counts,
        sketches,
        config,
    );

    let (_dp, choice) = solve_dp(&counts, &hlls, config, t_max)?;
    let blocks = traceback(&choice, u, t_max);

    let mut user_bins = Vec::with_capacity(u);
    let mut max_bins = Vec::new();
    let mut bin_costs: Vec<(usize, u64)> = Vec::new();
    let mut next_bin = 0usize;

    for block in blocks {
        match block {
            Block::Plain { first, splits } => {
                let count = counts[first];
                let cost = split_cost(count, splits, &config.fpr_correction);
                let storage_tb_id = next_bin;
                for k in 0..splits {
                    bin_costs.push((storage_tb_id + k, cost));
                }
                user_bins.push(UserBin {
                    previous_tb_indices: path.to_vec(),
                    storage_tb_id,
                    number_of_technical_bins: splits,
                    idx: order[first],
                });
                next_bin += splits;
            }
            Block::Merged { first, last } => {
                let storage_tb_id = next_bin;
                let refs: Vec<&HyperLogLog> = hlls[first..=last].iter().collect();
                let union = estimate_union_cardinality(&refs);
                let raw_cost = merge_cost(union, config.relaxed_fpr_correction);
                bin_costs.push((storage_tb_id, raw_cost));

                let mut child_path = path.to_vec();
                child_path.push(storage_tb_id);

                let (child_user_bins, child_max_bins, child_top_level) = build_level(
                    &order[first..=last],
                    &counts[first..=last],
                    &hlls[first..=last],
                    config,
                    &child_path,
                )?;

                max_bins.push(MaxBin {
                    previous_tb_indices: child_path,
                    id: child_top_level,
                });
                max_bins.extend(child_max_bins);
                user_bins.extend(child_user_bins);
                next_bin += 1;
            }
        }
    }

    let top_level_max_bin_id = bin_costs
        .into_iter()
        .fold((0usize, 0u64), |(best_id, best_cost), (id, cost)| {
            if cost > best_cost || (cost == best_cost && id < best_id) {
                (id, cost)
            } else {
                (best_id, best_cost)
            }
        })
        .0;

    Ok((user_bins, max_bins, top_level_max_bin_id))
}

fn rearranged(
    user_bin_ids: &[UserBinId],
    kmer_counts: &[u64],
    sketches: &[HyperLogLog],
    config: &HierarchicalBinningConfig,
) -> (Vec<UserBinId>, Vec<u64>, Vec<HyperLogLog>) {
    let n = user_bin_ids.len();
    let mut local_order: Vec<UserBinId> = (0..n as u32).map(UserBinId::new).collect();

    if !config.disable_rearrangement {
        rearrange_by_similarity(&mut local_order, config.max_rearrangement_ratio, |a, b| {
            let refs = [&sketches[a.as_usize()], &sketches[b.as_usize()]];
            let a_est = sketches[a.as_usize()].estimate();
            let b_est = sketches[b.as_usize()].estimate();
            let union = estimate_union_cardinality(&refs);
            let intersection = (a_est + b_est - union).max(0.0);
            if union <= 0.0 {
                0.0
            } else {
                intersection / union
            }
        });
    }

    let order: Vec<UserBinId> = local_order.iter().map(|local| user_bin_ids[local.as_usize()]).collect();
    let counts: Vec<u64> = local_order.iter().map(|local| kmer_counts[local.as_usize()]).collect();
    let hlls: Vec<HyperLogLog> = local_order
        .iter()
        .map(|local| sketches[local.as_usize()].clone())
        .collect();

    (order, counts, hlls)
}

/// Entry point: lays out `kmer_counts.len()` user bins (with their
/// `sketches` for union/similarity estimation) across a hierarchy of
/// IBFs bounded by `config.t_max` technical bins per level.
pub fn hierarchical_binning(
    user_bin_ids: &[UserBinId],
    kmer_counts: &[u64],
    sketches: &[HyperLogLog],
    config: &HierarchicalBinningConfig,
) -> Result<HierarchicalBinningResult> {
    if user_bin_ids.len() != kmer_counts.len() || user_bin_ids.len() != sketches.len() {
        return Err(HibfError::config_invalid(
            "user_bin_ids, kmer_counts and sketches must have matching lengths",
        ));
    }
    if user_bin_ids.is_empty() {
        return Ok(HierarchicalBinningResult {
            user_bins: Vec::new(),
            max_bins: Vec::new(),
            top_level_max_bin_id: 0,
        });
    }

    let (user_bins, max_bins, top_level_max_bin_id) =
        build_level(user_bin_ids, kmer_counts, sketches, config, &[])?;

    Ok(HierarchicalBinningResult {
        user_bins,
        max_bins,
        top_level_max_bin_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_config(t_max: usize) -> HierarchicalBinningConfig {
        HierarchicalBinningConfig {
            t_max,
            alpha: 1.0,
            fpr_correction: vec![1.0; 65],
            relaxed_fpr_correction: 1.0,
            disable_estimate_union: false,
            disable_rearrangement: true,
            max_rearrangement_ratio: 0.5,
        }
    }

    fn sketch_with(values: impl Iterator<Item = u64>) -> HyperLogLog {
        let mut hll = HyperLogLog::new(10);
        for v in values {
            hll.add(v.into());
        }
        hll
    }

    #[test]
    fn degrades_to_simple_binning_when_merges_are_disabled() {
        let ids: Vec<UserBinId> = (0..4u32).map(UserBinId::new).collect();
        let counts = vec![100u64, 40, 20, 20];
        let sketches: Vec<HyperLogLog> = counts
            .iter()
            .enumerate()
            .map(|(i, &c)| sketch_with((i as u64 * 10_000)..(i as u64 * 10_000 + c)))
            .collect();

        let mut config = flat_config(9);
        config.disable_estimate_union = true;

        let result = hierarchical_binning(&ids, &counts, &sketches, &config).expect("feasible");
        assert!(result.max_bins.is_empty());
        assert_eq!(result.user_bins.len(), 4);
        for bin in &result.user_bins {
            assert!(bin.previous_tb_indices.is_empty());
        }
    }

    #[test]
    fn merges_when_too_few_technical_bins_for_one_per_user_bin() {
        let ids: Vec<UserBinId> = (0..6u32).map(UserBinId::new).collect();
        let counts = vec![5u64, 5, 5, 5, 5, 5];
        let sketches: Vec<HyperLogLog> = counts
            .iter()
            .enumerate()
            .map(|(i, &c)| sketch_with((i as u64 * 10_000)..(i as u64 * 10_000 + c)))
            .collect();

        let config = flat_config(3);
        let result = hierarchical_binning(&ids, &counts, &sketches, &config).expect("feasible");

        assert!(!result.max_bins.is_empty(), "expected at least one merged bin");
        assert_eq!(result.user_bins.len(), 6);

        let mut seen: Vec<u32> = result.user_bins.iter().map(|b| b.idx.0).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn rejects_mismatched_input_lengths() {
        let ids: Vec<UserBinId> = (0..2u32).map(UserBinId::new).collect();
        let counts = vec![1u64];
        let sketches = vec![sketch_with(0..1), sketch_with(0..1)];
        let config = flat_config(4);
        let err = hierarchical_binning(&ids, &counts, &sketches, &config).unwrap_err();
        assert!(matches!(err, HibfError::ConfigInvalid(_)));
    }

    #[test]
    fn empty_input_is_trivially_feasible() {
        let config = flat_config(4);
        let result = hierarchical_binning(&[], &[], &[], &config).expect("feasible");
        assert!(result.user_bins.is_empty());
        assert!(result.max_bins.is_empty());
    }

    #[test]
    fn fails_without_merges_when_outnumbering_technical_bins() {
        let ids: Vec<UserBinId> = (0..4u32).map(UserBinId::new).collect();
        let counts = vec![5u64, 5, 5, 5];
        let sketches: Vec<HyperLogLog> = counts
            .iter()
            .enumerate()
            .map(|(i, &c)| sketch_with((i as u64 * 10_000)..(i as u64 * 10_000 + c)))
            .collect();

        let mut config = flat_config(2);
        config.disable_estimate_union = true;
        let err = hierarchical_binning(&ids, &counts, &sketches, &config).unwrap_err();
        assert!(matches!(err, HibfError::LayoutInfeasible(_)));
    }
}
