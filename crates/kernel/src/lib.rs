//! The proof-of-stake kernel: entropy bits, stake modifiers, the kernel
//! hash check, and coin-age arithmetic.
//!
//! Everything here is consensus-critical; outputs must match the legacy
//! client bit for bit or the node forks off the network.

pub mod age;
pub mod entropy;
pub mod modifier;
pub mod stake;

use ppcd_consensus::Hash256;
use ppcd_primitives::meta::Meta;
use ppcd_primitives::transaction::Transaction;

/// A block as seen through the index: parent link, timestamp, metadata,
/// and height. The header's remaining fields never matter to the kernel.
#[derive(Clone, Debug)]
pub struct IndexedBlock {
    pub prev_hash: Hash256,
    pub time: i64,
    pub meta: Meta,
    pub height: i64,
}

/// Read access to the block index.
///
/// Nodes carry no parent references; traversal is a sequence of lookups
/// through the stored parent hash.
pub trait ChainView {
    fn block_index(&self, hash: &Hash256) -> Result<Option<IndexedBlock>, KernelError>;
    fn hash_by_height(&self, height: i64) -> Result<Option<Hash256>, KernelError>;
    fn best_height(&self) -> Result<i64, KernelError>;
}

/// A resolved previous transaction together with its source block time.
#[derive(Clone, Debug)]
pub struct SpentInput {
    pub tx: Transaction,
    pub block_time: i64,
}

/// Lookup of the previous transactions spent by a transaction's inputs.
pub trait InputView {
    fn spent_input(&self, txid: &Hash256) -> Result<Option<SpentInput>, KernelError>;
}

#[derive(Debug)]
pub enum KernelError {
    /// A referenced block is not in the index.
    IndexMiss,
    Store(String),
    /// The parent walk ended at genesis without a generated modifier.
    NoGenesisGeneration,
    /// A selection round found no eligible candidate.
    NoCandidate { round: usize },
    /// An input references an output index its transaction does not have.
    PrevoutOutOfRange,
    /// Coinstake timestamp earlier than the staked transaction's.
    KernelTimeViolation,
    /// The staked coin has not reached the minimum age.
    MinAgeViolation,
    /// The forward walk hit the best block before the kernel modifier was
    /// due, for a coin old enough that the modifier should exist.
    ModifierUnavailable { height: i64 },
}

impl std::fmt::Display for KernelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KernelError::IndexMiss => write!(f, "block not found in index"),
            KernelError::Store(message) => write!(f, "{message}"),
            KernelError::NoGenesisGeneration => {
                write!(f, "no modifier generation at genesis block")
            }
            KernelError::NoCandidate { round } => {
                write!(f, "unable to select candidate block at round {round}")
            }
            KernelError::PrevoutOutOfRange => {
                write!(f, "previous output index out of range")
            }
            KernelError::KernelTimeViolation => write!(f, "coinstake timestamp violation"),
            KernelError::MinAgeViolation => write!(f, "stake minimum age violation"),
            KernelError::ModifierUnavailable { height } => {
                write!(f, "reached best block at height {height} before kernel modifier")
            }
        }
    }
}

impl std::error::Error for KernelError {}
