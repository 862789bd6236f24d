//! Per-type difficulty retargeting.
//!
//! Proof-of-work and proof-of-stake chains retarget independently: each
//! retarget looks at the spacing between the last two blocks of the same
//! type and nudges the target toward the type's desired spacing.

use ppcd_consensus::constants::{
    STAKE_TARGET_SPACING, TARGET_SPACING_WORK_MAX, TARGET_TIMESPAN,
};
use ppcd_consensus::ChainParams;
use primitive_types::U256;

use crate::compact::{compact_to_u256, u256_to_compact};

/// The last two same-type ancestors feeding one retarget step.
#[derive(Clone, Copy, Debug)]
pub struct RetargetAncestors {
    pub prev_time: i64,
    pub prev_height: i64,
    pub prev_bits: u32,
    pub prev_prev_time: i64,
}

/// Required compact bits for the block following `last_height`.
///
/// The caller resolves the ancestors by walking parent links for the
/// requested block type; genesis hits are handled there by returning the
/// network's initial hash target before ever calling this.
pub fn next_target_bits(
    last_height: i64,
    ancestors: &RetargetAncestors,
    proof_of_stake: bool,
    params: &ChainParams,
) -> u32 {
    let actual_spacing = ancestors.prev_time - ancestors.prev_prev_time;

    let target_spacing = if proof_of_stake {
        STAKE_TARGET_SPACING
    } else {
        TARGET_SPACING_WORK_MAX
            .min(STAKE_TARGET_SPACING * (1 + last_height - ancestors.prev_height))
    };
    let interval = TARGET_TIMESPAN / target_spacing;

    let numerator = (interval - 1) * target_spacing + 2 * actual_spacing;
    let denominator = (interval + 1) * target_spacing;
    if numerator <= 0 {
        return params.pow_limit_bits;
    }

    let prev_target = match compact_to_u256(ancestors.prev_bits) {
        Ok(target) => target,
        Err(_) => return params.pow_limit_bits,
    };

    let mut new_target =
        prev_target * U256::from(numerator as u64) / U256::from(denominator as u64);

    let pow_limit = U256::from_little_endian(&params.pow_limit);
    if new_target > pow_limit {
        new_target = pow_limit;
    }

    u256_to_compact(new_target)
}
