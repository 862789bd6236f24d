//! Block, transaction, and metadata primitives with their wire codec.

pub mod block;
pub mod encoding;
pub mod hash;
pub mod meta;
pub mod outpoint;
pub mod transaction;

pub use block::{Block, BlockHeader};
pub use meta::Meta;
pub use outpoint::OutPoint;
pub use transaction::{Transaction, TxIn, TxOut};
