//! Union cardinality estimation and similarity-based rearrangement, the
//! two pieces of sketch toolbox the hierarchical binning DP prices merge
//! candidates with.

use hibf_hll::HyperLogLog;
use hibf_minhash::MinHashes;
use hibf_types::UserBinId;
use std::collections::HashSet;

/// Estimates `|union of sketches|` by register-wise-max-merging every
/// sketch into a scratch copy and reading its cardinality estimate.
/// Returns `0.0` for an empty slice.
#[must_use]
pub fn estimate_union_cardinality(sketches: &[&HyperLogLog]) -> f64 {
    let Some((first, rest)) = sketches.split_first() else {
        return 0.0;
    };
    let mut merged = (*first).clone();
    for sketch in rest {
        merged.merge(sketch);
    }
    merged.estimate()
}

/// Estimates the Jaccard similarity of two user bins from their MinHash
/// tables: for each pair of matching sub-sketches, takes the smallest `k`
/// elements of their union (`k` = the smaller sub-sketch's size) and
/// measures what fraction of those also appear in both sub-sketches —
/// the standard bottom-k MinHash Jaccard estimator. The per-sub-sketch
/// estimates are averaged across the 16 buckets.
#[must_use]
pub fn estimate_similarity(a: &MinHashes, b: &MinHashes) -> f64 {
    let mut total = 0.0;
    let mut considered = 0usize;

    for (sub_a, sub_b) in a.table().iter().zip(b.table()) {
        if sub_a.is_empty() || sub_b.is_empty() {
            continue;
        }

        let set_a: HashSet<u64> = sub_a.iter().copied().collect();
        let set_b: HashSet<u64> = sub_b.iter().copied().collect();

        let mut union: Vec<u64> = set_a.union(&set_b).copied().collect();
        union.sort_unstable();

        let k = sub_a.len().min(sub_b.len()).min(union.len());
        if k == 0 {
            continue;
        }

        let hits = union[..k]
            .iter()
            .filter(|v| set_a.contains(v) && set_b.contains(v))
            .count();
        total += hits as f64 / k as f64;
        considered += 1;
    }

    if considered == 0 {
        0.0
    } else {
        total / considered as f64
    }
}

/// Minimum number of user bins for which rearrangement is worth running.
pub const MIN_BINS_FOR_REARRANGEMENT: usize = 3;

/// Greedily reorders `order` so that similar user bins end up adjacent,
/// constrained to a forward-looking window of `max_rearrangement_ratio *
/// len` positions so the size-based locality of the incoming order is
/// never fully discarded. A no-op below [`MIN_BINS_FOR_REARRANGEMENT`]
/// bins or when `max_rearrangement_ratio <= 0.0`.
pub fn rearrange_by_similarity(
    order: &mut Vec<UserBinId>,
    max_rearrangement_ratio: f64,
    similarity: impl Fn(UserBinId, UserBinId) -> f64,
) {
    let n = order.len();
    if n < MIN_BINS_FOR_REARRANGEMENT || max_rearrangement_ratio <= 0.0 {
        return;
    }

    let window = ((n as f64) * max_rearrangement_ratio).ceil().max(1.0) as usize;
    let mut remaining = order.clone();
    let mut result = Vec::with_capacity(n);

    let mut current = remaining.remove(0);
    result.push(current);

    while !remaining.is_empty() {
        let look_ahead = window.min(remaining.len());
        let best_offset = remaining[..look_ahead]
            .iter()
            .enumerate()
            .map(|(i, &candidate)| (i, similarity(current, candidate)))
            .fold((0usize, f64::MIN), |best, next| if next.1 > best.1 { next } else { best })
            .0;
        current = remaining.remove(best_offset);
        result.push(current);
    }

    *order = result;
}
