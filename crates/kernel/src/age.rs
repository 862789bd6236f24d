//! Coin-age accounting.
//!
//! Coin age is the total value-time spent by a transaction's inputs, in
//! coin-days. Only inputs past the minimum stake age count, so competing
//! branches converge on the same trust score. Inputs whose previous
//! transaction is unknown are skipped rather than failed; they may simply
//! not be indexed yet during initial download.

use ppcd_consensus::money::{CENT, COIN};
use ppcd_consensus::{ChainParams, Hash256};
use ppcd_log::log_trace;
use ppcd_primitives::transaction::Transaction;
use primitive_types::U256;

use crate::{InputView, KernelError};

/// Coin age destroyed by one transaction, in coin-days.
pub fn coin_age_tx(
    inputs: &impl InputView,
    params: &ChainParams,
    tx: &Transaction,
) -> Result<u64, KernelError> {
    if tx.is_coinbase() {
        return Ok(0);
    }

    let time = tx.time as i64;
    // Accumulated in cent-seconds to keep sub-coin stakes exact.
    let mut cent_seconds = U256::zero();

    for input in &tx.vin {
        let Some(prev) = inputs.spent_input(&input.prevout.hash)? else {
            // Previous transaction not in the main chain.
            continue;
        };
        let prev_time = prev.tx.time as i64;
        if time < prev_time {
            return Err(KernelError::KernelTimeViolation);
        }
        if prev.block_time + params.stake_min_age > time {
            continue; // only count coins meeting the minimum age
        }

        let value_in = prev
            .tx
            .vout
            .get(input.prevout.index as usize)
            .ok_or(KernelError::PrevoutOutOfRange)?
            .value;
        cent_seconds += U256::from(value_in.max(0) as u64) * U256::from((time - prev_time) as u64)
            / U256::from(CENT as u64);
    }

    let coin_days =
        cent_seconds * U256::from(CENT as u64) / U256::from(COIN as u64 * 24 * 60 * 60);
    log_trace!("coin age: {} coin-days", coin_days);
    Ok(coin_days.low_u64())
}

/// Coin age destroyed by a whole block, minimum one coin-day.
pub fn coin_age_block(
    inputs: &impl InputView,
    params: &ChainParams,
    transactions: &[Transaction],
) -> Result<u64, KernelError> {
    let mut coin_age = 0u64;
    for tx in transactions {
        coin_age += coin_age_tx(inputs, params, tx)?;
    }
    Ok(coin_age.max(1))
}
