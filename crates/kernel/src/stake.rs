//! Kernel hash validation.
//!
//! A coinstake's kernel (input 0) must satisfy
//! `hash(modifier ‖ time_block_from ‖ offset ‖ time_tx_prev ‖ n ‖ time_tx)
//!  ≤ target × coin_day_weight`,
//! making the chance of minting proportional to coin age. The modifier
//! scrambles the computation so the proof cannot be known at the time the
//! staked output confirmed; block and transaction hashes are deliberately
//! excluded because they can be ground out in volume.

use ppcd_consensus::constants::{MAX_CLOCK_DRIFT, STAKE_MAX_AGE};
use ppcd_consensus::money::COIN;
use ppcd_consensus::{is_protocol_v03, ChainParams, Hash256, Network};
use ppcd_difficulty::compact_to_u256;
use ppcd_log::{log_debug, log_trace};
use ppcd_primitives::encoding::Encoder;
use ppcd_primitives::hash::sha256d;
use ppcd_primitives::outpoint::OutPoint;
use ppcd_primitives::transaction::Transaction;
use primitive_types::{U256, U512};

use crate::modifier::selection_interval;
use crate::{ChainView, KernelError};

/// The stake modifier actually used for hashing a kernel, found about one
/// selection interval after the staked coin's source block.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KernelModifier {
    pub modifier: u64,
    pub height: i64,
    pub time: i64,
}

/// Walks forward from the source block until a generated modifier at least
/// one selection interval later is found.
///
/// Reaching the chain tip first is soft (`Ok(None)`) while the coin is
/// young enough that the node may simply be behind. Once the coin is old
/// enough that the modifier must exist, or when a verbose proof is being
/// produced, it is a hard error.
pub fn get_kernel_stake_modifier(
    view: &impl ChainView,
    params: &ChainParams,
    block_from_hash: &Hash256,
    adjusted_time: i64,
    print_proof: bool,
) -> Result<Option<KernelModifier>, KernelError> {
    let from = view
        .block_index(block_from_hash)?
        .ok_or(KernelError::IndexMiss)?;
    let from_time = from.time;
    let selection_interval = selection_interval(params);
    let best_height = view.best_height()?;

    let mut cursor = from;
    let mut cursor_height = cursor.height;
    let mut modifier_height = cursor_height;
    let mut modifier_time = from_time;

    while modifier_time < from_time + selection_interval {
        if cursor_height >= best_height {
            // Reached best block; may happen if the node is behind.
            if print_proof
                || cursor.time + params.stake_min_age - selection_interval > adjusted_time
            {
                return Err(KernelError::ModifierUnavailable {
                    height: cursor_height,
                });
            }
            return Ok(None);
        }
        let next_hash = view
            .hash_by_height(cursor_height + 1)?
            .ok_or(KernelError::IndexMiss)?;
        cursor = view
            .block_index(&next_hash)?
            .ok_or(KernelError::IndexMiss)?;
        cursor_height += 1;
        if cursor.meta.generated_stake_modifier() {
            modifier_height = cursor_height;
            modifier_time = cursor.time;
        }
    }

    Ok(Some(KernelModifier {
        modifier: cursor.meta.stake_modifier,
        height: modifier_height,
        time: modifier_time,
    }))
}

/// The v0.3+ kernel hash: the stake modifier followed by the stake
/// location and timing fields, all little-endian.
fn kernel_hash_v03(
    modifier: u64,
    time_block_from: u32,
    tx_prev_offset: u32,
    time_tx_prev: u32,
    prevout_index: u32,
    time_tx: u32,
) -> Hash256 {
    let mut encoder = Encoder::with_capacity(28);
    encoder.write_u64_le(modifier);
    encoder.write_u32_le(time_block_from);
    encoder.write_u32_le(tx_prev_offset);
    encoder.write_u32_le(time_tx_prev);
    encoder.write_u32_le(prevout_index);
    encoder.write_u32_le(time_tx);
    sha256d(&encoder.into_inner())
}

/// The legacy v0.2 kernel hash commits to the difficulty bits instead of a
/// stake modifier.
fn kernel_hash_v02(
    bits: u32,
    time_block_from: u32,
    tx_prev_offset: u32,
    time_tx_prev: u32,
    prevout_index: u32,
    time_tx: u32,
) -> Hash256 {
    let mut encoder = Encoder::with_capacity(24);
    encoder.write_u32_le(bits);
    encoder.write_u32_le(time_block_from);
    encoder.write_u32_le(tx_prev_offset);
    encoder.write_u32_le(time_tx_prev);
    encoder.write_u32_le(prevout_index);
    encoder.write_u32_le(time_tx);
    sha256d(&encoder.into_inner())
}

/// Checks a coinstake kernel against the hash target weighted by coin age.
///
/// Returns the kernel proof hash and whether it meets the target. Timing
/// preconditions fail hard; a missing kernel modifier degrades to a
/// zero modifier exactly as the legacy client does, which then fails the
/// target comparison.
#[allow(clippy::too_many_arguments)]
pub fn check_stake_kernel_hash(
    view: &impl ChainView,
    params: &ChainParams,
    bits: u32,
    block_from_hash: &Hash256,
    block_from_time: i64,
    tx_prev_offset: u32,
    tx_prev: &Transaction,
    prevout: &OutPoint,
    time_tx: i64,
    adjusted_time: i64,
    print_proof: bool,
) -> Result<(Hash256, bool), KernelError> {
    let time_tx_prev = tx_prev.time as i64;
    if time_tx < time_tx_prev {
        return Err(KernelError::KernelTimeViolation);
    }
    if block_from_time + params.stake_min_age > time_tx {
        return Err(KernelError::MinAgeViolation);
    }

    let target_per_coin_day = compact_to_u256(bits).unwrap_or_else(|_| U256::zero());

    let value_in = tx_prev
        .vout
        .get(prevout.index as usize)
        .ok_or(KernelError::PrevoutOutOfRange)?
        .value;

    // v0.3 kernel weight starts from zero at the minimum age; this pulls
    // more active coins into the hash when stake difficulty is low.
    let time_reduction = if is_protocol_v03(params.network, time_tx) {
        params.stake_min_age
    } else {
        0
    };
    let time_weight = ((time_tx - time_tx_prev).min(STAKE_MAX_AGE) - time_reduction).max(0);
    let coin_day_weight = U256::from(value_in.max(0) as u64) * U256::from(time_weight as u64)
        / U256::from(COIN as u64)
        / U256::from(24u64 * 60 * 60);

    log_trace!(
        "kernel check: value_in={value_in} time_weight={time_weight} coin_day_weight={coin_day_weight}"
    );

    let hash_proof_of_stake = if is_protocol_v03(params.network, time_tx) {
        let kernel_modifier =
            get_kernel_stake_modifier(view, params, block_from_hash, adjusted_time, print_proof)?;
        let modifier = match kernel_modifier {
            Some(found) => {
                log_debug!(
                    "kernel check: using modifier {:016x} at height {} time {}",
                    found.modifier,
                    found.height,
                    found.time
                );
                found.modifier
            }
            None => 0,
        };
        kernel_hash_v03(
            modifier,
            block_from_time as u32,
            tx_prev_offset,
            tx_prev.time,
            prevout.index,
            time_tx as u32,
        )
    } else {
        kernel_hash_v02(
            bits,
            block_from_time as u32,
            tx_prev_offset,
            tx_prev.time,
            prevout.index,
            time_tx as u32,
        )
    };

    // The product can exceed 256 bits; the comparison is exact in 512.
    let hash_value = U512::from(U256::from_little_endian(&hash_proof_of_stake));
    let weighted_target = U512::from(target_per_coin_day) * U512::from(coin_day_weight);
    let success = hash_value <= weighted_target;

    Ok((hash_proof_of_stake, success))
}

/// Whether a coinstake timestamp is acceptable for its block timestamp.
pub fn check_coinstake_timestamp(network: Network, time_block: i64, time_tx: i64) -> bool {
    if is_protocol_v03(network, time_tx) {
        return time_block == time_tx;
    }
    // v0.2: the block may trail the coinstake by up to the clock drift.
    time_tx <= time_block && time_block <= time_tx + MAX_CLOCK_DRIFT
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex32(hash: &Hash256) -> String {
        hash.iter().map(|byte| format!("{byte:02x}")).collect()
    }

    #[test]
    fn v03_hash_vector() {
        let hash = kernel_hash_v03(
            0x1234_5678_9abc_def0,
            1_400_000_000,
            81,
            1_400_000_000,
            1,
            1_403_000_000,
        );
        assert_eq!(
            hex32(&hash),
            "cdb2bd7b7ebd19a736a6509d280ce70a0df5c50a73208048511cbe7073a63603"
        );
    }

    #[test]
    fn v02_hash_vector() {
        let hash = kernel_hash_v02(0x1c00ffff, 1_350_000_000, 81, 1_350_000_000, 0, 1_353_000_000);
        assert_eq!(
            hex32(&hash),
            "a227afb32c74d4cb503aac2797503d9f65795a98d0268fba37269f12fa83dfa1"
        );
    }

    #[test]
    fn coinstake_timestamp_rules() {
        // v0.3+: exact equality.
        assert!(check_coinstake_timestamp(
            Network::Mainnet,
            1_400_000_000,
            1_400_000_000
        ));
        assert!(!check_coinstake_timestamp(
            Network::Mainnet,
            1_400_000_001,
            1_400_000_000
        ));
        // v0.2: the block may trail by up to two hours.
        assert!(check_coinstake_timestamp(
            Network::Mainnet,
            1_350_000_000 + MAX_CLOCK_DRIFT,
            1_350_000_000
        ));
        assert!(!check_coinstake_timestamp(
            Network::Mainnet,
            1_350_000_000 + MAX_CLOCK_DRIFT + 1,
            1_350_000_000
        ));
        assert!(!check_coinstake_timestamp(
            Network::Mainnet,
            1_349_999_999,
            1_350_000_000
        ));
    }
}
