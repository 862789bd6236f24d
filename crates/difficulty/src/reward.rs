//! Proof-of-work subsidy schedule.

use ppcd_consensus::money::{Amount, CENT, MAX_MINT_PROOF_OF_WORK};
use ppcd_consensus::ChainParams;
use primitive_types::{U256, U512};

use crate::compact::{compact_to_u256, target_to_compact};

fn fourth_power_times(value: Amount, scale: U256) -> U512 {
    let value = U512::from(value as u64);
    value * value * value * value * U512::from(scale)
}

/// Proof-of-work block subsidy for the given difficulty bits.
///
/// The subsidy is cut in half every 16x multiply of difficulty, following
/// `(subsidy_limit / subsidy)^4 == pow_limit / target` on a continuous
/// curve, searched to cent precision and capped at the mint limit.
pub fn proof_of_work_reward(bits: u32, params: &ChainParams) -> Amount {
    let target = match compact_to_u256(bits) {
        Ok(target) => target,
        Err(_) => return 0,
    };
    // The limit is squeezed through its compact form first, like the
    // legacy client, so the curve anchors on the representable limit.
    let limit_bits = target_to_compact(&params.pow_limit);
    let target_limit = match compact_to_u256(limit_bits) {
        Ok(limit) => limit,
        Err(_) => return 0,
    };

    let mut lower: Amount = CENT;
    let mut upper: Amount = MAX_MINT_PROOF_OF_WORK;
    while lower + CENT <= upper {
        let mid = (lower + upper) / 2;
        if fourth_power_times(mid, target_limit)
            > fourth_power_times(MAX_MINT_PROOF_OF_WORK, target)
        {
            upper = mid;
        } else {
            lower = mid;
        }
    }

    let subsidy = upper / CENT * CENT;
    subsidy.min(MAX_MINT_PROOF_OF_WORK)
}
