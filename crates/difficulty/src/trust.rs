//! Per-block trust weighting for chain comparison.

use primitive_types::U256;

use crate::compact::compact_to_u256;

/// Trust contributed by a block toward cumulative chain trust.
///
/// Proof-of-work blocks count a flat 1; proof-of-stake blocks count
/// `⌊2²⁵⁶ / (target + 1)⌋`, so the chain with the most stake-weighted
/// difficulty wins. An undecodable or zero target contributes nothing.
pub fn block_trust(bits: u32, proof_of_stake: bool) -> U256 {
    let target = match compact_to_u256(bits) {
        Ok(target) => target,
        Err(_) => return U256::zero(),
    };
    if target.is_zero() {
        return U256::zero();
    }
    if !proof_of_stake {
        return U256::one();
    }
    // (!target / (target + 1)) + 1 == floor(2^256 / (target + 1)).
    (!target / (target + U256::one())) + U256::one()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_blocks_are_flat() {
        assert_eq!(block_trust(0x1d00ffff, false), U256::one());
        assert_eq!(block_trust(0x1b0e7256, false), U256::one());
    }

    #[test]
    fn stake_trust_inverts_target() {
        assert_eq!(
            block_trust(0x1b0e7256, true),
            U256::from(0x11b8_6c46_0810u64)
        );
    }

    #[test]
    fn degenerate_targets_contribute_nothing() {
        assert_eq!(block_trust(0, true), U256::zero());
        assert_eq!(block_trust(0x0180_0000, true), U256::zero());
    }
}
