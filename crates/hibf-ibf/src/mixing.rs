//! The bespoke linear hash mixers an interleaved Bloom filter uses to turn
//! one opaque 64-bit hash into `k` bin-row positions.

/// Fixed, odd mixing constants for the two independent base hash
/// functions; every build and every query uses the same pair.
const MIX_A: [u64; 2] = [0x9E37_79B9_7F4A_7C15, 0xC2B2_AE3D_27D4_EB4F];
const MIX_C: [u64; 2] = [0xBF58_476D_1CE4_E5B9, 0x94D0_49BB_1331_11EB];

/// The `i`-th hash position for `h`. `i == 0` and `i == 1` use the two
/// independent linear mixers `h * A_i + C_i`; further hashes are derived
/// as `hash_0(h) + i * hash_1(h)`, matching a standard double-hashing
/// scheme.
#[must_use]
pub fn hash_i(h: u64, i: usize) -> u64 {
    match i {
        0 => h.wrapping_mul(MIX_A[0]).wrapping_add(MIX_C[0]),
        1 => h.wrapping_mul(MIX_A[1]).wrapping_add(MIX_C[1]),
        _ => {
            let h0 = hash_i(h, 0);
            let h1 = hash_i(h, 1);
            h0.wrapping_add((i as u64).wrapping_mul(h1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_hashes_are_deterministic() {
        assert_eq!(hash_i(42, 0), hash_i(42, 0));
        assert_ne!(hash_i(42, 0), hash_i(42, 1));
    }

    #[test]
    fn derived_hashes_depend_on_index() {
        assert_ne!(hash_i(42, 2), hash_i(42, 3));
    }
}
