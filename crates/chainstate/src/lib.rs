//! Block index, admission pipeline, and Peercoin-specific block checks.

pub mod genesis;
pub mod index;
pub mod state;
pub mod validation;

pub use index::{BlockIndexEntry, ChainIndex, ChainTip, TxLocation};
pub use state::{ChainState, ChainStateError, StakeId};
pub use validation::{InputSignatureVerifier, RuleError};
