//! Peercoin-specific block and transaction rules.

use ppcd_consensus::money::{Amount, MIN_TXOUT_AMOUNT, MIN_TX_FEE};
use ppcd_consensus::{proof_of_stake_reward, ChainParams};
use ppcd_kernel::age::coin_age_tx;
use ppcd_kernel::stake::check_coinstake_timestamp;
use ppcd_kernel::{InputView, KernelError};
use ppcd_primitives::block::Block;
use ppcd_primitives::transaction::{Transaction, TxOut};
use ppcd_script::{pubkey_from_p2pk, verify_hash_signature};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleError {
    /// A coinstake appears anywhere but as the second transaction.
    WrongCoinstakePosition,
    /// The coinbase of a proof-of-stake block must have a single empty output.
    CoinbaseNotEmpty,
    CoinstakeTimestampViolation,
    /// Block timestamp earlier than one of its transactions.
    BlockTimeBeforeTx,
    /// Empty output on a transaction that is neither coinbase nor coinstake.
    EmptyTxOut,
    TxOutBelowMinimum,
    InsufficientFee,
    StakeRewardExceeded,
    BadBlockSignature,
    BadCoinstakeSignature,
    /// Transaction timestamp earlier than one of its inputs.
    TimestampEarlierThanInput,
    DuplicateStake,
}

impl std::fmt::Display for RuleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleError::WrongCoinstakePosition => write!(f, "coinstake in wrong position"),
            RuleError::CoinbaseNotEmpty => {
                write!(f, "coinbase output not empty for proof-of-stake block")
            }
            RuleError::CoinstakeTimestampViolation => {
                write!(f, "coinstake timestamp violation")
            }
            RuleError::BlockTimeBeforeTx => {
                write!(f, "block timestamp earlier than transaction timestamp")
            }
            RuleError::EmptyTxOut => {
                write!(f, "transaction output empty for user transaction")
            }
            RuleError::TxOutBelowMinimum => {
                write!(f, "transaction output value below minimum")
            }
            RuleError::InsufficientFee => write!(f, "not paying required fee"),
            RuleError::StakeRewardExceeded => write!(f, "stake reward exceeded"),
            RuleError::BadBlockSignature => write!(f, "bad block signature"),
            RuleError::BadCoinstakeSignature => {
                write!(f, "signature verification failed on coinstake")
            }
            RuleError::TimestampEarlierThanInput => {
                write!(f, "transaction timestamp earlier than input transaction")
            }
            RuleError::DuplicateStake => write!(f, "duplicate proof-of-stake"),
        }
    }
}

impl std::error::Error for RuleError {}

/// Verification of a spending input against the output it spends; the
/// script engine behind it is outside the consensus core.
pub trait InputSignatureVerifier {
    fn verify_input(&self, tx: &Transaction, input_index: usize, prev_txout: &TxOut) -> bool;
}

/// Minimum fee for a transaction: one cent per started kilobyte.
pub fn min_fee(tx: &Transaction) -> Amount {
    (1 + tx.serialized_size() as Amount / 1000) * MIN_TX_FEE
}

/// Context-free output rules.
pub fn check_transaction_sanity(tx: &Transaction) -> Result<(), RuleError> {
    let exempt = tx.is_coinbase() || tx.is_coin_stake();
    for output in &tx.vout {
        if output.is_empty() && !exempt {
            return Err(RuleError::EmptyTxOut);
        }
        if !output.is_empty() && output.value < MIN_TXOUT_AMOUNT {
            return Err(RuleError::TxOutBelowMinimum);
        }
    }
    Ok(())
}

/// Context-free block rules: coinstake placement and shape, timestamp
/// ordering, and the block signature.
pub fn check_block_sanity(params: &ChainParams, block: &Block) -> Result<(), RuleError> {
    // Only the second transaction may be the optional coinstake.
    for tx in block.transactions.iter().skip(2) {
        if tx.is_coin_stake() {
            return Err(RuleError::WrongCoinstakePosition);
        }
    }

    let block_time = block.header.time as i64;
    if block.is_proof_of_stake() {
        let coinbase = &block.transactions[0];
        if coinbase.vout.len() != 1 || !coinbase.vout[0].is_empty() {
            return Err(RuleError::CoinbaseNotEmpty);
        }
        let coinstake_time = block.transactions[1].time as i64;
        if !check_coinstake_timestamp(params.network, block_time, coinstake_time) {
            return Err(RuleError::CoinstakeTimestampViolation);
        }
    }

    for tx in &block.transactions {
        if block_time < tx.time as i64 {
            return Err(RuleError::BlockTimeBeforeTx);
        }
    }

    if !check_block_signature(params, block) {
        return Err(RuleError::BadBlockSignature);
    }

    Ok(())
}

/// Checks the minter's signature over the block hash.
///
/// The key comes from the second coinstake output for proof-of-stake
/// blocks and from the first coinbase output otherwise; only
/// pay-to-pubkey scripts are accepted. Genesis carries no signature.
pub fn check_block_signature(params: &ChainParams, block: &Block) -> bool {
    let hash = block.header.hash();
    if hash == params.genesis_hash {
        return block.signature.is_empty();
    }

    let txout = if block.is_proof_of_stake() {
        match block.transactions.get(1).and_then(|tx| tx.vout.get(1)) {
            Some(txout) => txout,
            None => return false,
        }
    } else {
        match block.transactions.first().and_then(|tx| tx.vout.first()) {
            Some(txout) => txout,
            None => return false,
        }
    };

    let Some(pubkey) = pubkey_from_p2pk(&txout.script_pubkey) else {
        return false;
    };
    verify_hash_signature(pubkey, &block.signature, &hash)
}

/// Input-dependent value rules: the stake reward cap for coinstakes and
/// the fee floor for everything else.
pub fn check_transaction_inputs(
    inputs: &impl InputView,
    params: &ChainParams,
    tx: &Transaction,
    value_in: Amount,
    value_out: Amount,
) -> Result<(), ValueRuleError> {
    if tx.is_coin_stake() {
        let coin_age = coin_age_tx(inputs, params, tx)?;
        let stake_reward = value_out - value_in;
        let max_reward = proof_of_stake_reward(coin_age) - min_fee(tx) + MIN_TX_FEE;
        if stake_reward > max_reward {
            return Err(RuleError::StakeRewardExceeded.into());
        }
    } else {
        let fee = value_in - value_out;
        if fee < min_fee(tx) {
            return Err(RuleError::InsufficientFee.into());
        }
    }
    Ok(())
}

/// A spending transaction must not predate any transaction it spends.
pub fn check_input_timestamp(tx: &Transaction, prev_tx: &Transaction) -> Result<(), RuleError> {
    if prev_tx.time > tx.time {
        return Err(RuleError::TimestampEarlierThanInput);
    }
    Ok(())
}

#[derive(Debug)]
pub enum ValueRuleError {
    Rule(RuleError),
    Kernel(KernelError),
}

impl std::fmt::Display for ValueRuleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueRuleError::Rule(err) => write!(f, "{err}"),
            ValueRuleError::Kernel(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ValueRuleError {}

impl From<RuleError> for ValueRuleError {
    fn from(err: RuleError) -> Self {
        ValueRuleError::Rule(err)
    }
}

impl From<KernelError> for ValueRuleError {
    fn from(err: KernelError) -> Self {
        ValueRuleError::Kernel(err)
    }
}
